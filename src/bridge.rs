use crate::config::Settings;
use crate::discovery::DeviceEndpoint;
use crate::error::{Error, Result};
use crate::host::{Host, Process};
use crate::parse;
use crate::wait;
use crate::Bitrate;
use log::{debug, info, warn};
use std::sync::atomic::AtomicBool;

/// Names of the network interfaces currently known to the kernel.
pub fn interfaces(host: &impl Host) -> Result<Vec<String>> {
    let listing = host.run("ip", &args(&["-o", "link", "show"]))?;
    Ok(listing
        .lines()
        .filter_map(parse::link_name)
        .map(str::to_string)
        .collect())
}

fn link_set(host: &impl Host, iface: &str, rest: &[&str]) -> Result<()> {
    let mut argv = args(&["link", "set", iface]);
    argv.extend(rest.iter().map(|s| s.to_string()));
    host.run("ip", &argv).map(|_| ())
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// `slcand` bound to the CAN endpoint, and the interface it created.
///
/// Dropping the bridge tears it down.
pub struct Bridge<'h, H: Host> {
    host: &'h H,
    iface: String,
    daemon: Option<Box<dyn Process>>,
}

impl<'h, H: Host> Bridge<'h, H> {
    /// Start the daemon at `bitrate` and bring its interface up.
    ///
    /// Any interface or daemon left over from an earlier session on the
    /// same endpoint is removed first. Once `quit` is set nothing more is
    /// started and whatever already runs is torn down.
    pub fn start(
        host: &'h H,
        endpoint: &DeviceEndpoint,
        bitrate: Bitrate,
        settings: &Settings,
        quit: &AtomicBool,
    ) -> Result<Self> {
        wait::check(quit)?;
        let tty = endpoint.path.to_string_lossy().into_owned();
        clear_stale(host, &tty, &settings.iface);

        let argv = vec![
            "-o".to_string(),
            "-c".to_string(),
            "-F".to_string(),
            format!("-{}", bitrate.token()),
            tty,
            settings.iface.clone(),
        ];
        let daemon = host.spawn("slcand", &argv)?;
        info!("slcand started (pid {}) at {}", daemon.id(), bitrate);

        let mut bridge = Self {
            host,
            iface: settings.iface.clone(),
            daemon: Some(daemon),
        };

        wait::pause(quit, settings.bridge_settle, settings.poll);
        if let Err(e) = bridge.bring_up(settings, quit) {
            bridge.teardown();
            return Err(e);
        }
        Ok(bridge)
    }

    fn bring_up(&mut self, settings: &Settings, quit: &AtomicBool) -> Result<()> {
        self.confirm_health(settings, quit)?;
        link_set(self.host, &self.iface, &["up"])?;
        link_set(
            self.host,
            &self.iface,
            &["txqueuelen", &settings.txqueuelen.to_string()],
        )?;
        info!("{} up, txqueuelen {}", self.iface, settings.txqueuelen);
        Ok(())
    }

    /// Poll the interface listing until the daemon's interface shows up.
    fn confirm_health(&mut self, settings: &Settings, quit: &AtomicBool) -> Result<()> {
        for attempt in 1..=settings.health_attempts {
            wait::check(quit)?;
            if interfaces(self.host)?.iter().any(|name| *name == self.iface) {
                debug!("{} present after {} poll(s)", self.iface, attempt);
                return Ok(());
            }

            if let Some(daemon) = self.daemon.as_mut() {
                if !daemon.is_running()? {
                    warn!("slcand exited before creating {}", self.iface);
                    break;
                }
            }
            wait::pause(quit, settings.health_interval, settings.poll);
        }

        Err(Error::BridgeStartFailed {
            iface: self.iface.clone(),
        })
    }

    pub fn iface(&self) -> &str {
        &self.iface
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.daemon.is_some()
    }

    /// Bring the interface down and stop the daemon.
    ///
    /// Failures are logged and skipped. Only the first call does anything.
    pub fn teardown(&mut self) {
        let Some(mut daemon) = self.daemon.take() else {
            return;
        };

        if let Err(e) = link_set(self.host, &self.iface, &["down"]) {
            warn!("ignoring failure to bring {} down: {}", self.iface, e);
        }
        if let Err(e) = daemon.terminate() {
            warn!("ignoring failure to stop slcand: {}", e);
        }
        info!("bridge on {} stopped", self.iface);
    }
}

impl<H: Host> Drop for Bridge<'_, H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn clear_stale(host: &impl Host, tty: &str, iface: &str) {
    if link_set(host, iface, &["down"]).is_ok() {
        debug!("brought stale {} down", iface);
    }
    let pattern = format!("slcand.*{}", tty);
    if host.run("pkill", &args(&["-f", &pattern])).is_ok() {
        info!("killed stale slcand on {}", tty);
    }
}
