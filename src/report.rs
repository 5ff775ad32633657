// Human-readable outcome notices, one per submission attempt.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Success,
    Warning,
    Error,
}

/// The message surfaced for one submission attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub attempt: Uuid,
    pub level: Level,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn new(attempt: Uuid, level: Level, message: impl Into<String>) -> Self {
        Self {
            attempt,
            level,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Outcome text for a completed run.
pub fn outcome_message(did_win: bool, total_moves: u32) -> (Level, String) {
    if did_win {
        (Level::Success, format!("Finished in {total_moves} moves!"))
    } else {
        (Level::Warning, format!("Robot halted after {total_moves} moves!"))
    }
}

/// Where outcome notices go (a toast area, a log, a test probe).
pub trait Reporter: Send + Sync {
    fn report(&self, notice: Notice);
}

/// Logs every notice and fans it out to subscribers.
pub struct NoticeBoard {
    tx: broadcast::Sender<Notice>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for NoticeBoard {
    fn report(&self, notice: Notice) {
        match notice.level {
            Level::Success => tracing::info!(attempt = %notice.attempt, "{}", notice.message),
            Level::Warning => tracing::warn!(attempt = %notice.attempt, "{}", notice.message),
            Level::Error => tracing::error!(attempt = %notice.attempt, "{}", notice.message),
        }
        // No subscribers is fine: the log line above is the record
        let _ = self.tx.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_messages() {
        assert_eq!(
            outcome_message(true, 12),
            (Level::Success, "Finished in 12 moves!".to_string())
        );
        assert_eq!(
            outcome_message(false, 3),
            (Level::Warning, "Robot halted after 3 moves!".to_string())
        );
    }

    #[tokio::test]
    async fn test_notice_board_fans_out() {
        let board = NoticeBoard::new();
        let mut rx = board.subscribe();
        let attempt = Uuid::new_v4();
        board.report(Notice::new(attempt, Level::Error, "Error details"));

        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.attempt, attempt);
        assert_eq!(notice.level, Level::Error);
        assert_eq!(notice.message, "Error details");
    }

    #[test]
    fn test_notice_json() {
        let notice = Notice::new(Uuid::nil(), Level::Warning, "Robot halted after 1 moves!");
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["message"], "Robot halted after 1 moves!");
    }
}
