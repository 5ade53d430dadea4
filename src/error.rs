use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("found {found} serial endpoint(s) matching `{signature}` in {dir}, need 2")]
    DeviceNotFound {
        dir: PathBuf,
        signature: String,
        found: usize,
    },

    #[error("USB device {vendor:04x}:{product:04x} not reported by the kernel")]
    DeviceMismatch { vendor: u16, product: u16 },

    #[error("interface {iface} did not appear after starting the bridge")]
    BridgeStartFailed { iface: String },

    #[error("`{program}` exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("interrupted")]
    Interrupted,

    #[error(transparent)]
    Io(#[from] io::Error),
}
