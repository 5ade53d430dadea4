use anyhow::Context;
use clap::Parser;
use log::{error, info};
use slcan_bridge::{Error, Mode, Session, SessionConfig, Settings, SystemHost};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Bridge the device's slcan endpoint to a virtual CAN interface, then
/// dump or send frames on it.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// `send` or `receive` (default: receive)
    mode: Option<String>,

    /// Bit rate in kbit/s: 10 20 50 100 125 250 500 800 1000 (default: 1000)
    bitrate: Option<String>,

    /// LED check, `on` or `off` (default: off)
    leds: Option<String>,

    #[arg(long, env = "SLCAN_BY_ID_DIR", hide = true)]
    by_id_dir: Option<PathBuf>,

    #[arg(long, env = "SLCAN_SIGNATURE", hide = true)]
    signature: Option<String>,

    #[arg(long, env = "SLCAN_IFACE", hide = true)]
    iface: Option<String>,

    #[arg(long, env = "SLCAN_DEVICE_IFACE", hide = true)]
    device_iface: Option<String>,
}

impl Args {
    fn settings(&self) -> Settings {
        let defaults = Settings::default();
        Settings {
            by_id_dir: self.by_id_dir.clone().unwrap_or(defaults.by_id_dir),
            signature: self.signature.clone().unwrap_or(defaults.signature),
            iface: self.iface.clone().unwrap_or(defaults.iface),
            device_iface: self.device_iface.clone().unwrap_or(defaults.device_iface),
            ..defaults
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<Error>() {
            Some(Error::DeviceMismatch { .. }) => {
                error!("{}", e);
                ExitCode::SUCCESS
            }
            _ => {
                error!("{:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = args.settings();
    let (config, _) = SessionConfig::validate(
        args.mode.as_deref(),
        args.bitrate.as_deref(),
        args.leds.as_deref(),
    );

    let quit = Arc::new(AtomicBool::new(false));
    let flag = quit.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::Relaxed);
    })
    .context("failed to set ^C handler")?;

    let host = SystemHost::new();
    let mode = config.mode;
    let mut session = Session::new(&host, &settings, config);
    session.run(&quit)?;

    match mode {
        Mode::Send => info!("session finished, {} frame(s) sent", session.frames_sent()),
        Mode::Receive => info!("session finished"),
    }
    Ok(())
}
