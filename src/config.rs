use crate::Bitrate;
use core::fmt::{Display, Formatter};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;

/// What the session does once the interface is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Send,
    #[default]
    Receive,
}

impl Mode {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "send" | "s" => Some(Self::Send),
            "receive" | "r" => Some(Self::Receive),
            _ => None,
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Send => write!(f, "send"),
            Self::Receive => write!(f, "receive"),
        }
    }
}

/// Whether the status LEDs are lit for the duration of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedCheck {
    On,
    #[default]
    Off,
}

impl LedCheck {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            _ => None,
        }
    }

    pub fn enabled(self) -> bool {
        self == Self::On
    }
}

impl Display for LedCheck {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::On => write!(f, "on"),
            Self::Off => write!(f, "off"),
        }
    }
}

/// An argument that was replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationFallback {
    pub field: &'static str,
    pub given: String,
    pub default: String,
}

impl Display for ConfigurationFallback {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "invalid {} `{}`, using {}",
            self.field, self.given, self.default
        )
    }
}

/// Validated user choices for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionConfig {
    pub mode: Mode,
    pub bitrate: Bitrate,
    pub leds: LedCheck,
}

impl SessionConfig {
    /// Build a config from the raw positional arguments.
    ///
    /// Never fails: anything unrecognised is replaced by its default and
    /// reported in the returned list.
    pub fn validate(
        mode: Option<&str>,
        bitrate: Option<&str>,
        leds: Option<&str>,
    ) -> (Self, Vec<ConfigurationFallback>) {
        let defaults = Self::default();
        let mut fallbacks = Vec::new();

        let mode = pick("mode", mode, Mode::parse, defaults.mode, &mut fallbacks);
        let bitrate = pick(
            "bitrate",
            bitrate,
            |s| s.trim().parse().ok().and_then(Bitrate::from_kbit),
            defaults.bitrate,
            &mut fallbacks,
        );
        let leds = pick("LED flag", leds, LedCheck::parse, defaults.leds, &mut fallbacks);

        for fallback in &fallbacks {
            warn!("{}", fallback);
        }

        (
            Self {
                mode,
                bitrate,
                leds,
            },
            fallbacks,
        )
    }
}

fn pick<T: Copy + Display>(
    field: &'static str,
    given: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
    default: T,
    fallbacks: &mut Vec<ConfigurationFallback>,
) -> T {
    let Some(given) = given else {
        info!("no {} given, using {}", field, default);
        return default;
    };

    parse(given).unwrap_or_else(|| {
        fallbacks.push(ConfigurationFallback {
            field,
            given: given.to_string(),
            default: default.to_string(),
        });
        default
    })
}

/// Host-side constants: where to look for the device, what to call the
/// interfaces, and how long to wait between dependent steps.
#[derive(Debug, Clone)]
pub struct Settings {
    pub by_id_dir: PathBuf,
    /// Substring every matching by-id entry contains.
    pub signature: String,
    pub usb_vendor: u16,
    pub usb_product: u16,
    /// CAN interface name on the microcontroller side.
    pub device_iface: String,
    /// Network interface created by the bridge daemon.
    pub iface: String,
    pub control_baud: u32,
    pub txqueuelen: u32,
    pub led_count: u8,
    pub warmup: Duration,
    pub command_settle: Duration,
    pub bridge_settle: Duration,
    pub health_attempts: u32,
    pub health_interval: Duration,
    pub send_period: Duration,
    pub led_step: Duration,
    /// Granularity at which sleeps notice an interrupt.
    pub poll: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            by_id_dir: PathBuf::from("/dev/serial/by-id"),
            signature: "OnLogic".to_string(),
            usb_vendor: 0x353f,
            usb_product: 0xa101,
            device_iface: "VCAN0".to_string(),
            iface: "slcan0".to_string(),
            control_baud: 115_200,
            txqueuelen: 1000,
            led_count: 4,
            warmup: Duration::from_secs(2),
            command_settle: Duration::from_secs(1),
            bridge_settle: Duration::from_secs(1),
            health_attempts: 5,
            health_interval: Duration::from_millis(500),
            send_period: Duration::from_secs(1),
            led_step: Duration::from_millis(100),
            poll: Duration::from_millis(50),
        }
    }
}

#[cfg(test)]
impl Settings {
    /// Same names and ids, no waiting.
    pub(crate) fn immediate() -> Self {
        Self {
            warmup: Duration::ZERO,
            command_settle: Duration::ZERO,
            bridge_settle: Duration::ZERO,
            health_interval: Duration::ZERO,
            send_period: Duration::ZERO,
            led_step: Duration::ZERO,
            poll: Duration::ZERO,
            ..Self::default()
        }
    }
}
