use crate::bridge::Bridge;
use crate::config::{Mode, SessionConfig, Settings};
use crate::control::ControlChannel;
use crate::discovery::{self, DeviceEndpoint};
use crate::error::{Error, Result};
use crate::frame::{example_frame, CanSend};
use crate::host::{ControlPort, Host};
use crate::wait;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};

/// Session progress. Every state may jump straight to `Teardown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    EndpointsDiscovered,
    DeviceVerified,
    ControlChannelReady,
    DeviceConfigured,
    BridgeRunning,
    Receiving,
    Sending,
    Teardown,
}

/// One run against the attached device, from discovery to teardown.
pub struct Session<'a, H: Host> {
    host: &'a H,
    settings: &'a Settings,
    config: SessionConfig,
    states: Vec<State>,
    sent: u64,
}

/// What has to be released, in release order.
struct Held<'a, H: Host> {
    control: ControlChannel<Box<dyn ControlPort>>,
    bridge: Option<Bridge<'a, H>>,
    settings: &'a Settings,
}

impl<H: Host> Held<'_, H> {
    fn teardown(&mut self) {
        let settings = self.settings;
        if let Err(e) = self.control.leds_off(settings.led_count, settings.led_step) {
            warn!("ignoring failure to switch LEDs off: {}", e);
        }
        if let Some(bridge) = self.bridge.as_mut() {
            bridge.teardown();
        }
    }
}

impl<H: Host> Drop for Held<'_, H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<'a, H: Host> Session<'a, H> {
    pub fn new(host: &'a H, settings: &'a Settings, config: SessionConfig) -> Self {
        Self {
            host,
            settings,
            config,
            states: vec![State::Init],
            sent: 0,
        }
    }

    pub fn state(&self) -> State {
        self.states.last().copied().unwrap_or(State::Init)
    }

    /// Every state entered so far, in order.
    #[cfg(test)]
    pub(crate) fn states(&self) -> &[State] {
        &self.states
    }

    pub fn frames_sent(&self) -> u64 {
        self.sent
    }

    /// Run until `quit` is set or a step fails. Whatever was set up is torn
    /// down before returning. An interrupt is not an error.
    pub fn run(&mut self, quit: &AtomicBool) -> Result<()> {
        info!(
            "{} at {}, LED check {}",
            self.config.mode, self.config.bitrate, self.config.leds
        );
        let result = match self.establish(quit) {
            Err(Error::Interrupted) => {
                info!("interrupted in {:?}", self.state());
                Ok(())
            }
            other => other,
        };
        self.enter(State::Teardown);
        result
    }

    fn enter(&mut self, state: State) {
        debug!("{:?} -> {:?}", self.state(), state);
        self.states.push(state);
    }

    fn establish(&mut self, quit: &AtomicBool) -> Result<()> {
        let settings = self.settings;

        let endpoints = discovery::discover(settings)?;
        self.enter(State::EndpointsDiscovered);
        wait::check(quit)?;

        if let Err(e) = discovery::verify_presence(self.host, settings) {
            if self.config.leds.enabled() {
                self.clear_leds(&endpoints.control);
            }
            return Err(e);
        }
        self.enter(State::DeviceVerified);
        wait::check(quit)?;

        let mut held = Held {
            control: ControlChannel::prepare(self.host, &endpoints.control, settings, quit)?,
            bridge: None,
            settings,
        };
        self.enter(State::ControlChannelReady);

        held.control.configure(settings, quit)?;
        self.enter(State::DeviceConfigured);

        if self.config.leds.enabled() {
            held.control.leds_on(settings.led_count, settings.led_step)?;
        }
        wait::check(quit)?;

        let bridge = Bridge::start(
            self.host,
            &endpoints.can_bridge,
            self.config.bitrate,
            settings,
            quit,
        )?;
        let iface = bridge.iface().to_string();
        held.bridge = Some(bridge);
        self.enter(State::BridgeRunning);

        match self.config.mode {
            Mode::Receive => {
                self.enter(State::Receiving);
                self.receive(&iface, quit)?;
            }
            Mode::Send => {
                self.enter(State::Sending);
                self.send(&iface, quit);
            }
        }

        held.teardown();
        Ok(())
    }

    /// Dump frames with `candump` until interrupted or it exits.
    fn receive(&mut self, iface: &str, quit: &AtomicBool) -> Result<()> {
        wait::check(quit)?;
        let mut dump = self.host.spawn("candump", &[iface.to_string()])?;
        info!("dumping {} (Ctrl+C to stop)", iface);

        let watched = loop {
            if quit.load(Ordering::Relaxed) {
                break Ok(());
            }
            match dump.is_running() {
                Ok(true) => wait::pause(quit, self.settings.poll, self.settings.poll),
                Ok(false) => {
                    warn!("candump exited");
                    break Ok(());
                }
                Err(e) => break Err(e.into()),
            }
        };

        if let Err(e) = dump.terminate() {
            warn!("ignoring failure to stop candump: {}", e);
        }
        watched
    }

    /// Send the example frame once per period until interrupted.
    fn send(&mut self, iface: &str, quit: &AtomicBool) {
        let frame = CanSend::new(&example_frame()).to_string();
        let argv = [iface.to_string(), frame.clone()];
        info!("sending {} on {} (Ctrl+C to stop)", frame, iface);

        while !quit.load(Ordering::Relaxed) {
            match self.host.run("cansend", &argv) {
                Ok(_) => {
                    self.sent += 1;
                    info!("#{} sent {}", self.sent, frame);
                }
                Err(e) => warn!("cansend: {}", e),
            }
            wait::pause(quit, self.settings.send_period, self.settings.poll);
        }
    }

    fn clear_leds(&self, endpoint: &DeviceEndpoint) {
        let settings = self.settings;
        match self.host.open_serial(&endpoint.path, settings.control_baud) {
            Ok(port) => {
                let mut control = ControlChannel::new(port);
                if let Err(e) = control.clear_leds(settings.led_count, settings.led_step) {
                    warn!("ignoring failure to switch LEDs off: {}", e);
                }
            }
            Err(e) => warn!("cannot open {} to switch LEDs off: {}", endpoint.path.display(), e),
        }
    }
}
