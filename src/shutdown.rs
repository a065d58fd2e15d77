//! Shutdown signals
//!
//! Long runs poll an [`AtomicBool`] between moves. The flag is raised by the
//! first Ctrl-C and, on Unix, by SIGTERM, so a supervisor stopping the
//! process still gets the final table save.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Flag raised by the first shutdown signal
///
/// The handlers are registered before this returns, so a signal arriving
/// right after the call is not lost. Must be called inside a Tokio runtime.
pub fn shutdown_flag() -> io::Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);

    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        #[cfg(unix)]
        let signal = tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|()| "interrupt"),
            _ = terminate.recv() => Ok("terminate"),
        };
        #[cfg(not(unix))]
        let signal = tokio::signal::ctrl_c().await.map(|()| "interrupt");

        match signal {
            Ok(signal) => {
                tracing::info!(signal, "shutdown requested, stopping");
                flag.store(true, Ordering::Relaxed);
            }
            Err(e) => tracing::warn!(error = %e, "cannot listen for Ctrl-C"),
        }
    });

    Ok(stop)
}
