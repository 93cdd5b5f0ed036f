use anyhow::{anyhow, Result};
use chrono::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::services::{EventService, TimeSwapService};

pub const SWAP_EXPIRY_SCHEDULE: &str = "0 */15 * * * *";
pub const LESSON_REMINDER_SCHEDULE: &str = "0 0 * * * *";

/// How far ahead lesson reminders look
pub const REMINDER_WINDOW_HOURS: i64 = 24;

/// Periodic maintenance: expiring swap requests and sending lesson reminders
pub struct BackgroundJobService {
    scheduler: JobScheduler,
    swaps: TimeSwapService,
    events: EventService,
}

impl BackgroundJobService {
    pub async fn new(swaps: TimeSwapService, events: EventService) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create job scheduler: {}", e))?;

        Ok(Self {
            scheduler,
            swaps,
            events,
        })
    }

    pub async fn start(&self) -> Result<()> {
        self.add_swap_expiry_job().await?;
        self.add_lesson_reminder_job().await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| anyhow!("Failed to start job scheduler: {}", e))?;

        info!("Background job scheduler started");
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| anyhow!("Failed to stop job scheduler: {}", e))?;

        info!("Background job scheduler stopped");
        Ok(())
    }

    async fn add_swap_expiry_job(&self) -> Result<()> {
        let swaps = self.swaps.clone();
        let job = Job::new_async(SWAP_EXPIRY_SCHEDULE, move |_uuid, _l| {
            let swaps = swaps.clone();
            Box::pin(async move {
                run_swap_expiry(&swaps).await;
            })
        })
        .map_err(|e| anyhow!("Failed to create swap expiry job: {}", e))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to schedule swap expiry job: {}", e))?;
        Ok(())
    }

    async fn add_lesson_reminder_job(&self) -> Result<()> {
        let events = self.events.clone();
        let job = Job::new_async(LESSON_REMINDER_SCHEDULE, move |_uuid, _l| {
            let events = events.clone();
            Box::pin(async move {
                run_lesson_reminders(&events).await;
            })
        })
        .map_err(|e| anyhow!("Failed to create lesson reminder job: {}", e))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to schedule lesson reminder job: {}", e))?;
        Ok(())
    }
}

pub async fn run_swap_expiry(swaps: &TimeSwapService) {
    match swaps.expire_due().await {
        Ok(expired) => info!(count = expired.len(), "Swap expiry job finished"),
        Err(err) => error!(error = %err, "Swap expiry job failed"),
    }
}

pub async fn run_lesson_reminders(events: &EventService) {
    match events.claim_due_reminders(Duration::hours(REMINDER_WINDOW_HOURS)).await {
        Ok(due) => {
            for reminder in &due {
                events.send_reminder(reminder);
            }
            info!(count = due.len(), "Lesson reminder job finished");
        }
        Err(err) => error!(error = %err, "Lesson reminder job failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schedules_parse() {
        assert!(Job::new_async(SWAP_EXPIRY_SCHEDULE, |_uuid, _l| Box::pin(async {})).is_ok());
        assert!(Job::new_async(LESSON_REMINDER_SCHEDULE, |_uuid, _l| Box::pin(async {})).is_ok());
    }
}
