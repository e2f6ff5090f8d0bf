//! App lifecycle phases as the embedding shell reports them.

use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppPhase {
    /// Frontmost and interactive. The phase a fresh launch starts in.
    #[default]
    Active,
    /// Visible but not interactive (app switcher, incoming call).
    Inactive,
    Background,
}

impl AppPhase {
    /// The one transition a foreground refresh reacts to: coming back
    /// to active from anywhere that was not active.
    pub fn is_foregrounding(from: AppPhase, to: AppPhase) -> bool {
        matches!(from, AppPhase::Background | AppPhase::Inactive) && to == AppPhase::Active
    }
}

/// Publisher the shell drives with phase changes; components subscribe
/// and watch for the transitions they care about.
pub struct AppLifecycle {
    tx: watch::Sender<AppPhase>,
}

impl AppLifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AppPhase::default());
        Self { tx }
    }

    pub fn set_phase(&self, phase: AppPhase) {
        if *self.tx.borrow() == phase {
            return;
        }
        debug!("App phase: {:?}", phase);
        let _ = self.tx.send(phase);
    }

    pub fn phase(&self) -> AppPhase {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppPhase> {
        self.tx.subscribe()
    }
}

impl Default for AppLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
