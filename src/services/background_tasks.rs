use std::fmt::Display;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Runs fire-and-forget side effects (notifications, broadcasts, emails,
/// blob deletions). A failed task is logged with its label and dropped.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks;

impl BackgroundTasks {
    pub fn new() -> Self {
        Self
    }

    pub fn spawn<F, E>(&self, label: &'static str, task: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        tokio::spawn(async move {
            match task.await {
                Ok(()) => debug!(task = label, "Background task finished"),
                Err(err) => warn!(task = label, error = %err, "Background task failed"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_successful_task_runs() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        BackgroundTasks::new()
            .spawn("flag", async move {
                flag.store(true, Ordering::SeqCst);
                Ok::<(), anyhow::Error>(())
            })
            .await
            .unwrap();

        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_task_does_not_panic() {
        let handle = BackgroundTasks::new().spawn("always_fails", async {
            Err::<(), _>(anyhow::anyhow!("smtp unreachable"))
        });
        assert!(handle.await.is_ok());
    }
}
