use crate::config::Settings;
use crate::error::{Error, Result};
use crate::host::Host;
use crate::parse;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Control,
    CanBridge,
}

/// A serial node exposed by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    pub path: PathBuf,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub control: DeviceEndpoint,
    pub can_bridge: DeviceEndpoint,
}

/// Find the console and slcan endpoints under `settings.by_id_dir`.
///
/// Entries whose name contains the signature are ordered by USB interface
/// number when every entry carries an `-ifNN` suffix, lexically otherwise.
/// The first is the console, the second the slcan line.
pub fn discover(settings: &Settings) -> Result<Endpoints> {
    let not_found = |found| Error::DeviceNotFound {
        dir: settings.by_id_dir.clone(),
        signature: settings.signature.clone(),
        found,
    };

    let entries = match fs::read_dir(&settings.by_id_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("cannot list {}: {}", settings.by_id_dir.display(), e);
            return Err(not_found(0));
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.contains(&settings.signature))
        .collect();

    names.sort();
    if names.iter().all(|name| parse::interface_number(name).is_some()) {
        names.sort_by_key(|name| parse::interface_number(name));
    }

    let [control, can_bridge, ..] = names.as_slice() else {
        return Err(not_found(names.len()));
    };

    let endpoints = Endpoints {
        control: endpoint(&settings.by_id_dir, control, Role::Control),
        can_bridge: endpoint(&settings.by_id_dir, can_bridge, Role::CanBridge),
    };
    info!(
        "control endpoint {}, CAN endpoint {}",
        endpoints.control.path.display(),
        endpoints.can_bridge.path.display()
    );

    Ok(endpoints)
}

fn endpoint(dir: &Path, name: &str, role: Role) -> DeviceEndpoint {
    DeviceEndpoint {
        path: dir.join(name),
        role,
    }
}

/// Check the kernel log for the expected USB vendor and product.
pub fn verify_presence(host: &impl Host, settings: &Settings) -> Result<()> {
    let log = host.run("dmesg", &[])?;
    let wanted = (settings.usb_vendor, settings.usb_product);

    if log.lines().filter_map(parse::kernel_usb_id).any(|id| id == wanted) {
        debug!("kernel reports {:04x}:{:04x}", wanted.0, wanted.1);
        return Ok(());
    }

    Err(Error::DeviceMismatch {
        vendor: settings.usb_vendor,
        product: settings.usb_product,
    })
}
