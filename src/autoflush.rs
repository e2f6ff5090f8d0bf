//! Background auto-flush of the submission queue.
//!
//! Runs a delivery pass at startup when online, whenever connectivity
//! comes back, and whenever the app returns to the foreground while
//! online. Never while offline; the queue's own in-flight flag keeps
//! overlapping triggers harmless.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::connectivity::ConnectivityHandle;
use crate::lifecycle::AppPhase;
use crate::queue::SubmissionQueue;

/// Spawn the auto-flush task. It exits when the connectivity monitor or
/// the lifecycle publisher goes away.
pub fn spawn_auto_flush(
    queue: Arc<SubmissionQueue>,
    connectivity: ConnectivityHandle,
    mut phases: watch::Receiver<AppPhase>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut net = connectivity.watch();
        let mut was_online = !net.borrow().is_offline();
        let mut prev_phase = *phases.borrow();

        if was_online {
            debug!("Auto-flush: initial pass");
            queue.flush().await;
        }

        loop {
            tokio::select! {
                changed = net.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = !net.borrow_and_update().is_offline();
                    if online && !was_online {
                        debug!("Auto-flush: connectivity restored");
                        queue.flush().await;
                    }
                    was_online = online;
                }
                changed = phases.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = *phases.borrow_and_update();
                    let was = prev_phase;
                    prev_phase = next;
                    if AppPhase::is_foregrounding(was, next) && !connectivity.is_offline() {
                        debug!("Auto-flush: app foregrounded");
                        queue.flush().await;
                    }
                }
            }
        }
    })
}
