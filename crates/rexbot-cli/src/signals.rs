//! OS signals → [`ShutdownSignal`].
//!
//! `ctrlc` (with its `termination` feature) covers SIGINT, SIGTERM and
//! SIGHUP.  SIGQUIT and SIGABRT are caught by a `tokio` signal listener on a
//! small dedicated thread.  Every handler does the same single thing: raise
//! the shutdown flag.

use rexbot_kernel::ShutdownSignal;
use tracing::{info, warn};

/// Install every handler.  Failures are logged; the process keeps running
/// with whatever handlers could be installed.
pub fn install(signal: &ShutdownSignal) {
    let on_ctrlc = signal.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if on_ctrlc.signal() {
            info!(source = "SIGINT/SIGTERM/SIGHUP", "shutdown requested");
        }
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; Ctrl-C will not stop the bot cleanly");
    }

    #[cfg(unix)]
    if let Err(e) = unix::spawn_listener(signal.clone()) {
        warn!(error = %e, "failed to start SIGQUIT/SIGABRT listener");
    }
}

#[cfg(unix)]
mod unix {
    use std::io;
    use std::thread;

    use rexbot_kernel::ShutdownSignal;
    use tokio::signal::unix::{SignalKind, signal};
    use tracing::{info, warn};

    /// `SIGABRT` has no named constructor on `SignalKind`.
    const SIGABRT: i32 = 6;

    pub(super) fn spawn_listener(shutdown: ShutdownSignal) -> io::Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()?;

        // Register before returning so a signal arriving right after
        // `install` is not lost.
        let (mut quit, mut abort) = runtime.block_on(async {
            Ok::<_, io::Error>((signal(SignalKind::quit())?, signal(SignalKind::from_raw(SIGABRT))?))
        })?;

        thread::Builder::new()
            .name("rexbot-signals".to_string())
            .spawn(move || {
                let source = runtime.block_on(async {
                    tokio::select! {
                        received = quit.recv() => received.map(|_| "SIGQUIT"),
                        received = abort.recv() => received.map(|_| "SIGABRT"),
                    }
                });
                match source {
                    Some(source) => {
                        if shutdown.signal() {
                            info!(source, "shutdown requested");
                        }
                    }
                    None => warn!("signal listener closed"),
                }
            })?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;

    fn raise_and_wait(signum: i32) -> bool {
        let shutdown = ShutdownSignal::new();
        unix::spawn_listener(shutdown.clone()).expect("listener");
        assert!(!shutdown.is_signaled());

        // SAFETY: the listener above has replaced the default action.
        let rc = unsafe { libc::raise(signum) };
        assert_eq!(rc, 0);
        shutdown.wait_timeout(Duration::from_secs(5))
    }

    #[test]
    fn sigquit_raises_shutdown() {
        assert!(raise_and_wait(libc::SIGQUIT));
    }

    #[test]
    fn sigabrt_raises_shutdown() {
        assert!(raise_and_wait(libc::SIGABRT));
    }
}
