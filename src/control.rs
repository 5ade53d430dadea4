use crate::config::Settings;
use crate::discovery::DeviceEndpoint;
use crate::error::Result;
use crate::host::{ControlPort, Host};
use crate::parse;
use crate::wait;
use crate::{History, SetCanMode, SetLed};
use core::fmt::Display;
use log::{debug, info, warn};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Line-oriented command channel to the device console.
///
/// Commands are written blind; whatever the console prints back is only
/// read to drain it or to look for a command in the `history` echo.
pub struct ControlChannel<P> {
    port: P,
    leds_lit: bool,
}

impl<P: Read + Write> ControlChannel<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            leds_lit: false,
        }
    }

    /// Discard console output for `warmup`, then return what was read.
    /// Stops early once `quit` is set.
    pub fn drain(&mut self, warmup: Duration, quit: &AtomicBool) -> Result<String> {
        let deadline = Instant::now() + warmup;
        let mut pending = Vec::new();
        let mut buf = [0u8; 256];

        loop {
            match self.port.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => pending.extend_from_slice(&buf[..n]),
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }

            if Instant::now() >= deadline || quit.load(Ordering::Relaxed) {
                break;
            }
        }

        let text = String::from_utf8_lossy(&pending).into_owned();
        if !text.is_empty() {
            debug!("console: {:?}", text);
        }
        Ok(text)
    }

    pub fn send(&mut self, command: impl Display) -> Result<()> {
        let line = command.to_string();
        debug!("console <- {:?}", line);
        self.port.write_all(line.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    /// Put the device-side CAN interface into slcan mode.
    ///
    /// The command is safe to repeat. After `settle` the console history is
    /// checked for it; a missing entry is reported but not fatal.
    pub fn configure(&mut self, settings: &Settings, quit: &AtomicBool) -> Result<bool> {
        let command = SetCanMode::new(&settings.device_iface);
        self.send(&command)?;
        wait::pause(quit, settings.command_settle, settings.poll);
        wait::check(quit)?;
        self.drain(Duration::ZERO, quit)?;

        self.send(History::new())?;
        let echo = self.drain(settings.command_settle, quit)?;
        wait::check(quit)?;
        let expected = command.to_string();
        let applied = echo
            .lines()
            .filter_map(parse::history_entry)
            .any(|entry| entry == expected.trim_end());

        if applied {
            info!("device accepted `{}`", expected.trim_end());
        } else {
            warn!("`{}` not found in console history", expected.trim_end());
        }
        Ok(applied)
    }

    /// Light the LEDs one after another, `step` apart. Each `step` is slept
    /// in full, interrupt or not.
    pub fn leds_on(&mut self, count: u8, step: Duration) -> Result<()> {
        self.leds_lit = true;
        self.switch_leds(count, step, true)
    }

    /// Turn the LEDs off if this channel lit them. Repeated calls are
    /// no-ops.
    pub fn leds_off(&mut self, count: u8, step: Duration) -> Result<()> {
        if !self.leds_lit {
            return Ok(());
        }
        self.leds_lit = false;
        self.switch_leds(count, step, false)
    }

    /// Turn every LED off whether or not this channel lit it.
    pub fn clear_leds(&mut self, count: u8, step: Duration) -> Result<()> {
        self.leds_lit = false;
        self.switch_leds(count, step, false)
    }

    #[cfg(test)]
    pub(crate) fn leds_lit(&self) -> bool {
        self.leds_lit
    }

    fn switch_leds(&mut self, count: u8, step: Duration, on: bool) -> Result<()> {
        for index in 0..count {
            self.send(SetLed::new(index, on))?;
            thread::sleep(step);
        }
        Ok(())
    }
}

impl ControlChannel<Box<dyn ControlPort>> {
    /// Open the console endpoint and let it settle.
    ///
    /// The node is made world read/write first; failing that is only a
    /// warning since the caller may already have access.
    pub fn prepare(
        host: &impl Host,
        endpoint: &DeviceEndpoint,
        settings: &Settings,
        quit: &AtomicBool,
    ) -> Result<Self> {
        if let Err(e) = host.share(&endpoint.path) {
            warn!("cannot share {}: {}", endpoint.path.display(), e);
        }

        let port = host.open_serial(&endpoint.path, settings.control_baud)?;
        let mut channel = Self::new(port);
        channel.drain(settings.warmup, quit)?;
        wait::check(quit)?;
        info!(
            "console {} ready at {} baud",
            endpoint.path.display(),
            settings.control_baud
        );
        Ok(channel)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// In-memory serial line: reads pop scripted chunks, then time out.
    /// `on_write` replies are queued whenever a written line matches.
    #[derive(Default, Clone)]
    pub struct FakePort {
        pub input: Arc<Mutex<VecDeque<Vec<u8>>>>,
        pub written: Arc<Mutex<Vec<u8>>>,
        pub replies: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl FakePort {
        pub fn with_input(chunks: &[&str]) -> Self {
            let port = Self::default();
            for chunk in chunks {
                port.input.lock().unwrap().push_back(chunk.as_bytes().to_vec());
            }
            port
        }

        pub fn on_write(self, line: &str, reply: &str) -> Self {
            self.replies
                .lock()
                .unwrap()
                .push((line.to_string(), reply.to_string()));
            self
        }

        pub fn written(&self) -> String {
            String::from_utf8(self.written.lock().unwrap().clone()).unwrap()
        }
    }

    impl Read for FakePort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.input.lock().unwrap().pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Err(io::ErrorKind::TimedOut.into()),
            }
        }
    }

    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.lock().unwrap().extend_from_slice(buf);
            let line = String::from_utf8_lossy(buf);
            for (expect, reply) in self.replies.lock().unwrap().iter() {
                if line == expect.as_str() {
                    self.input
                        .lock()
                        .unwrap()
                        .push_back(reply.as_bytes().to_vec());
                }
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn drain_collects_pending_output() {
        let port = FakePort::with_input(&["uart:~$ ", "\r\nuart:~$ "]);
        let mut channel = ControlChannel::new(port.clone());

        let quit = AtomicBool::new(false);
        let text = channel.drain(Duration::ZERO, &quit).unwrap();
        assert_eq!(text, "uart:~$ ");
        let text = channel.drain(Duration::from_millis(20), &quit).unwrap();
        assert_eq!(text, "\r\nuart:~$ ");
        assert!(port.written().is_empty());
    }

    #[test]
    fn configure_verified_by_history() {
        let port = FakePort::default().on_write(
            "history\n",
            "history\r\n  1  set can-mode VCAN0 slcan\r\n  2  history\r\nuart:~$ ",
        );
        let mut channel = ControlChannel::new(port.clone());

        let quit = AtomicBool::new(false);
        assert!(channel.configure(&Settings::immediate(), &quit).unwrap());
        assert_eq!(port.written(), "set can-mode VCAN0 slcan\nhistory\n");
    }

    #[test]
    fn configure_accepts_bracketed_history() {
        let port = FakePort::default().on_write(
            "history\n",
            "history\r\n[  0] set can-mode VCAN0 slcan\r\n[  1] history\r\nuart:~$ ",
        );
        let mut channel = ControlChannel::new(port);

        let quit = AtomicBool::new(false);
        assert!(channel.configure(&Settings::immediate(), &quit).unwrap());
    }

    #[test]
    fn configure_without_echo_continues() {
        let port = FakePort::default();
        let mut channel = ControlChannel::new(port.clone());

        let quit = AtomicBool::new(false);
        assert!(!channel.configure(&Settings::immediate(), &quit).unwrap());
        assert_eq!(port.written(), "set can-mode VCAN0 slcan\nhistory\n");
    }

    #[test]
    fn drain_stops_on_quit() {
        let port = FakePort::with_input(&["uart:~$ "]);
        let mut channel = ControlChannel::new(port);

        let quit = AtomicBool::new(true);
        let started = Instant::now();
        let text = channel.drain(Duration::from_secs(10), &quit).unwrap();
        assert_eq!(text, "uart:~$ ");
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn configure_interrupted_during_settle() {
        let port = FakePort::default().on_write("history\n", "  1  set can-mode VCAN0 slcan\r\n");
        let mut channel = ControlChannel::new(port.clone());
        let settings = Settings {
            command_settle: Duration::from_secs(10),
            poll: Duration::from_millis(10),
            ..Settings::immediate()
        };

        let quit = AtomicBool::new(true);
        let started = Instant::now();
        let result = channel.configure(&settings, &quit);
        assert!(matches!(result, Err(crate::Error::Interrupted)));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(port.written(), "set can-mode VCAN0 slcan\n");
    }

    #[test]
    fn leds_switch_in_order() {
        let port = FakePort::default();
        let mut channel = ControlChannel::new(port.clone());

        channel.leds_on(4, Duration::ZERO).unwrap();
        assert!(channel.leds_lit());
        channel.leds_off(4, Duration::ZERO).unwrap();
        channel.leds_off(4, Duration::ZERO).unwrap();

        assert_eq!(
            port.written(),
            "dio set LED0 0 on\ndio set LED0 1 on\ndio set LED0 2 on\ndio set LED0 3 on\n\
             dio set LED0 0 off\ndio set LED0 1 off\ndio set LED0 2 off\ndio set LED0 3 off\n"
        );
    }

    #[test]
    fn leds_off_without_on_writes_nothing() {
        let port = FakePort::default();
        let mut channel = ControlChannel::new(port.clone());

        channel.leds_off(4, Duration::ZERO).unwrap();
        assert!(port.written().is_empty());

        channel.clear_leds(2, Duration::ZERO).unwrap();
        assert_eq!(port.written(), "dio set LED0 0 off\ndio set LED0 1 off\n");
    }
}
