//! Transient user-facing messages that clear themselves after a delay.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct Slot {
    message: Option<String>,
    /// Bumped on every post so a stale timer never clears a newer notice.
    generation: u64,
}

/// Holds at most one notice. Posting arms a single-shot timer that clears
/// it; posting again or dismissing cancels the previous timer.
pub struct NoticeBoard {
    slot: Arc<Mutex<Slot>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    clear_after: Duration,
}

impl NoticeBoard {
    pub fn new(clear_after: Duration) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::default())),
            timer: Mutex::new(None),
            clear_after,
        }
    }

    /// Show `message`, replacing any current notice.
    ///
    /// Must be called from within a tokio runtime.
    pub fn post(&self, message: impl Into<String>) {
        let message = message.into();
        let generation = match self.slot.lock() {
            Ok(mut slot) => {
                slot.generation += 1;
                slot.message = Some(message);
                slot.generation
            }
            Err(e) => {
                tracing::error!("Notice board poisoned: {}", e);
                return;
            }
        };

        let slot = Arc::clone(&self.slot);
        let delay = self.clear_after;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Ok(mut slot) = slot.lock() {
                if slot.generation == generation {
                    slot.message = None;
                }
            }
        });

        self.replace_timer(Some(handle));
    }

    pub fn current(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.message.clone())
    }

    /// Clear the notice now and cancel its timer.
    pub fn dismiss(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.generation += 1;
            slot.message = None;
        }
        self.replace_timer(None);
    }

    fn replace_timer(&self, next: Option<JoinHandle<()>>) {
        if let Ok(mut timer) = self.timer.lock() {
            if let Some(previous) = std::mem::replace(&mut *timer, next) {
                previous.abort();
            }
        }
    }
}

impl Drop for NoticeBoard {
    fn drop(&mut self) {
        self.replace_timer(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notice_clears_after_delay() {
        let board = NoticeBoard::new(Duration::from_millis(30));
        board.post("Group name is too short");
        assert_eq!(board.current().as_deref(), Some("Group name is too short"));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(board.current(), None);
    }

    #[tokio::test]
    async fn test_newer_notice_rearms_timer() {
        let board = NoticeBoard::new(Duration::from_millis(80));
        board.post("first");
        tokio::time::sleep(Duration::from_millis(50)).await;
        board.post("second");
        tokio::time::sleep(Duration::from_millis(50)).await;

        // the first timer would have fired by now
        assert_eq!(board.current().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_dismiss() {
        let board = NoticeBoard::new(Duration::from_secs(5));
        board.post("oops");
        board.dismiss();
        assert_eq!(board.current(), None);
    }
}
