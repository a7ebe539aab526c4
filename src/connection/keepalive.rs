//! Periodic unsolicited Pings.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use super::connection::Inner;

/// Start the keep-alive task for `inner`.
///
/// The task holds only a weak reference, so it ends once the connection is
/// dropped, aborted or closed. Without a running Tokio runtime no task is
/// started.
pub(crate) fn spawn<S>(inner: &Arc<Inner<S>>, interval: Duration)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        warn!("keep-alive requested outside a Tokio runtime, not started");
        return;
    };

    let weak = Arc::downgrade(inner);
    let stop = inner.aborted().clone();

    handle.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(inner) = weak.upgrade() else { break };
            let state = inner.state();
            if state.is_terminal() {
                break;
            }
            if !state.can_send() {
                continue;
            }

            match inner.send_keep_alive().await {
                Ok(()) => trace!("keep-alive ping sent"),
                Err(err) => debug!(error = %err, "keep-alive ping failed"),
            }
        }
        trace!("keep-alive task finished");
    });
}
