//! Session watchdog.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Run `on_expiry` once `duration` has elapsed, unless aborted first.
pub fn spawn_deadline<F>(runtime: &Handle, duration: Duration, on_expiry: F) -> AbortHandle
where
    F: FnOnce() + Send + 'static,
{
    runtime
        .spawn(async move {
            tokio::time::sleep(duration).await;
            on_expiry();
        })
        .abort_handle()
}
