//! The operating system as seen by a session: external tools, long-running
//! daemons and serial device nodes.

use crate::error::{Error, Result};
use log::debug;
use serialport::{DataBits, FlowControl, Parity, StopBits};
use std::fs::{self, Permissions};
use std::io::{self, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// A byte stream to the device console.
pub trait ControlPort: Read + Write {}

impl<T: Read + Write + ?Sized> ControlPort for T {}

/// A spawned process owned by the session.
#[cfg_attr(test, mockall::automock)]
pub trait Process {
    fn id(&self) -> u32;

    fn is_running(&mut self) -> io::Result<bool>;

    /// Kill and reap. Succeeds if the process is already gone.
    fn terminate(&mut self) -> io::Result<()>;
}

#[cfg_attr(test, mockall::automock)]
pub trait Host {
    /// Run a tool to completion and return its stdout. A non-zero exit
    /// status is an error.
    fn run(&self, program: &str, args: &[String]) -> Result<String>;

    /// Start a tool that keeps running until terminated.
    fn spawn(&self, program: &str, args: &[String]) -> Result<Box<dyn Process>>;

    /// Open a serial line in raw mode: 8N1, no flow control, no echo.
    fn open_serial(&self, path: &Path, baud: u32) -> Result<Box<dyn ControlPort>>;

    /// Make a device node readable and writable by every user.
    fn share(&self, path: &Path) -> Result<()>;
}

/// [`Host`] backed by `std::process` and the `serialport` crate.
#[derive(Debug, Default)]
pub struct SystemHost {}

impl SystemHost {
    pub fn new() -> Self {
        Self {}
    }
}

impl Host for SystemHost {
    fn run(&self, program: &str, args: &[String]) -> Result<String> {
        debug!("run: {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Err(Error::Command {
                program: program.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn spawn(&self, program: &str, args: &[String]) -> Result<Box<dyn Process>> {
        debug!("spawn: {} {}", program, args.join(" "));
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()?;

        Ok(Box::new(ChildProcess { child }))
    }

    fn open_serial(&self, path: &Path, baud: u32) -> Result<Box<dyn ControlPort>> {
        let port = serialport::new(path.to_string_lossy(), baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(io::Error::from)?;

        Ok(Box::new(port))
    }

    fn share(&self, path: &Path) -> Result<()> {
        fs::set_permissions(path, Permissions::from_mode(0o666))?;
        Ok(())
    }
}

struct ChildProcess {
    child: Child,
}

impl Process for ChildProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn is_running(&mut self) -> io::Result<bool> {
        Ok(self.child.try_wait()?.is_none())
    }

    fn terminate(&mut self) -> io::Result<()> {
        if self.is_running()? {
            self.child.kill()?;
        }
        self.child.wait()?;
        Ok(())
    }
}
