// Cancellable one-shot timers that post an event back into a queue.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Handle to a scheduled event. Cancelling (or dropping) the handle aborts
/// the timer if it has not fired yet.
#[derive(Debug)]
pub struct TimerHandle {
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    /// A handle for an event that was posted immediately.
    fn fired() -> Self {
        Self { task: None }
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether the timer is still waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Post `event` into `tx` after `delay`. A zero delay posts right away,
/// still behind anything already queued.
pub fn schedule<T>(tx: &mpsc::UnboundedSender<T>, delay: Duration, event: T) -> TimerHandle
where
    T: Send + 'static,
{
    if delay.is_zero() {
        if tx.send(event).is_err() {
            tracing::debug!("timer target closed before scheduling");
        }
        return TimerHandle::fired();
    }

    let tx = tx.clone();
    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        // The queue is gone once its consumer shut down; nothing left to notify
        let _ = tx.send(event);
    });
    TimerHandle { task: Some(task) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = schedule(&tx, Duration::from_millis(40), 7u32);
        assert!(handle.is_pending());

        tokio::time::sleep(Duration::from_millis(39)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.recv().await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = schedule(&tx, Duration::from_millis(10), 1u32);
        handle.cancel();
        assert!(!handle.is_pending());

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(tx);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_cancels() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        drop(schedule(&tx, Duration::from_millis(10), 1u32));
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(tx);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_zero_delay_posts_immediately() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = schedule(&tx, Duration::ZERO, "now");
        assert!(!handle.is_pending());
        assert_eq!(rx.try_recv().unwrap(), "now");
    }
}
