use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Sleep for `total` in `slice` steps, returning early once `quit` is set.
pub fn pause(quit: &AtomicBool, total: Duration, slice: Duration) {
    let deadline = Instant::now() + total;
    while !quit.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(slice.min(deadline - now));
    }
}

/// `Err(Interrupted)` once `quit` is set.
pub fn check(quit: &AtomicBool) -> Result<()> {
    if quit.load(Ordering::Relaxed) {
        return Err(Error::Interrupted);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_returns_on_quit() {
        let quit = AtomicBool::new(true);
        let started = Instant::now();
        pause(&quit, Duration::from_secs(10), Duration::from_millis(10));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn pause_sleeps_out_the_total() {
        let quit = AtomicBool::new(false);
        let started = Instant::now();
        pause(&quit, Duration::from_millis(30), Duration::from_millis(10));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn check_reports_interrupt() {
        let quit = AtomicBool::new(false);
        assert!(check(&quit).is_ok());
        quit.store(true, Ordering::Relaxed);
        assert!(matches!(check(&quit), Err(Error::Interrupted)));
    }
}
