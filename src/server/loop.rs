// Server loop module
// Accepts connections until a shutdown is signalled, then waits for them to drain

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// How long in-flight connections get to finish after shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Accept connections on `listener` until `shutdown` is notified.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
) -> std::io::Result<()> {
    let active_connections = Arc::new(AtomicUsize::new(0));
    let shutdown_requested = shutdown.notified();
    tokio::pin!(shutdown_requested);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = &mut shutdown_requested => break,
        }
    }

    drop(listener);
    drain_connections(&active_connections).await;
    Ok(())
}

/// Wait for open connections to close, up to `DRAIN_TIMEOUT`
async fn drain_connections(active: &AtomicUsize) {
    let open = active.load(Ordering::SeqCst);
    if open == 0 {
        return;
    }
    logger::log_info(&format!("[Shutdown] Waiting for {open} open connection(s)"));

    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while active.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;

    if drained.is_err() {
        logger::log_warning(&format!(
            "[Shutdown] {} connection(s) still open after {}s",
            active.load(Ordering::SeqCst),
            DRAIN_TIMEOUT.as_secs()
        ));
    }
}
