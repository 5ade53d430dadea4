//! Bridge a serial-attached slcan microcontroller to a Linux virtual CAN
//! interface.
//!
//! The microcontroller exposes two serial endpoints: a console used to set
//! its CAN mode, and a line that speaks slcan. The session configures the
//! console, hands the slcan line to `slcand` and then dumps or sends frames
//! on the resulting network interface with `candump` / `cansend`.

mod bridge;
mod config;
mod control;
mod discovery;
mod error;
mod frame;
mod host;
mod parse;
mod session;
mod wait;

use core::fmt::{Display, Formatter};

pub use bridge::Bridge;
pub use config::{ConfigurationFallback, LedCheck, Mode, SessionConfig, Settings};
pub use control::ControlChannel;
pub use discovery::{discover, verify_presence, DeviceEndpoint, Endpoints, Role};
pub use error::{Error, Result};
pub use frame::{example_frame, CanSend, Frame};
pub use host::{ControlPort, Host, Process, SystemHost};
pub use session::{Session, State};

/// Bitrate options.
///
/// The discriminant is the slcan setup index, which is also what `slcand`
/// takes as `-s<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bitrate {
    Rate10kbit = 0,
    Rate20kbit = 1,
    Rate50kbit = 2,
    Rate100kbit = 3,
    Rate125kbit = 4,
    Rate250kbit = 5,
    Rate500kbit = 6,
    Rate800kbit = 7,
    Rate1000kbit = 8,
}

impl Bitrate {
    /// Look up a rate given in kbit/s. 750 is accepted as an alias of 800.
    pub fn from_kbit(kbit: u32) -> Option<Self> {
        let rate = match kbit {
            10 => Self::Rate10kbit,
            20 => Self::Rate20kbit,
            50 => Self::Rate50kbit,
            100 => Self::Rate100kbit,
            125 => Self::Rate125kbit,
            250 => Self::Rate250kbit,
            500 => Self::Rate500kbit,
            750 | 800 => Self::Rate800kbit,
            1000 => Self::Rate1000kbit,
            _ => return None,
        };
        Some(rate)
    }

    pub fn kbit(self) -> u32 {
        match self {
            Self::Rate10kbit => 10,
            Self::Rate20kbit => 20,
            Self::Rate50kbit => 50,
            Self::Rate100kbit => 100,
            Self::Rate125kbit => 125,
            Self::Rate250kbit => 250,
            Self::Rate500kbit => 500,
            Self::Rate800kbit => 800,
            Self::Rate1000kbit => 1000,
        }
    }

    /// Daemon token, `s0` through `s8`.
    pub fn token(self) -> String {
        format!("s{}", self as u8)
    }
}

impl Default for Bitrate {
    fn default() -> Self {
        Self::Rate1000kbit
    }
}

impl Display for Bitrate {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} kbit/s", self.kbit())
    }
}

/// Select the frame parser on one of the device's CAN interfaces.
#[derive(Debug)]
pub struct SetCanMode<'a> {
    pub iface: &'a str,
}

impl<'a> SetCanMode<'a> {
    pub fn new(iface: &'a str) -> Self {
        Self { iface }
    }
}

impl Display for SetCanMode<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "set can-mode {} slcan", self.iface)
    }
}

/// Switch one of the on-board status LEDs.
#[derive(Debug)]
pub struct SetLed {
    pub index: u8,
    pub on: bool,
}

impl SetLed {
    pub fn new(index: u8, on: bool) -> Self {
        Self { index, on }
    }
}

impl Display for SetLed {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let state = if self.on { "on" } else { "off" };
        writeln!(f, "dio set LED0 {} {}", self.index, state)
    }
}

/// Ask the console to echo the commands it has accepted.
pub struct History {}

impl History {
    pub fn new() -> Self {
        Self {}
    }
}

impl Display for History {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "history")
    }
}
