use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::Config;
use crate::models::events::IMPORT_ACTOR;
use crate::services::SharkAttackService;

pub struct BackgroundScheduler {
    #[allow(dead_code)]
    scheduler: Arc<JobScheduler>,
    #[allow(dead_code)]
    config: Arc<Config>,
}

impl BackgroundScheduler {
    pub async fn new(
        service: Arc<SharkAttackService>,
        config: Arc<Config>,
    ) -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new().await?;

        // Periodic dataset synchronization. The import is idempotent, so
        // overlapping with a manually triggered run is harmless.
        let job_service = service.clone();
        scheduler
            .add(Job::new_async(
                config.import_schedule.as_str(),
                move |_uuid, _l| {
                    let service = job_service.clone();
                    Box::pin(async move {
                        info!("Scheduled dataset import starting");
                        match service.import(IMPORT_ACTOR).await {
                            Ok(summary) => info!(
                                "Scheduled import processed {} records ({} failures)",
                                summary.ids.len(),
                                summary.failures.len()
                            ),
                            Err(e) => error!("Scheduled import failed: {}", e),
                        }
                    })
                },
            )?)
            .await?;

        scheduler.start().await?;
        info!("Background scheduler started");

        Ok(Self {
            scheduler: Arc::new(scheduler),
            config,
        })
    }

    pub async fn shutdown(&self) {
        // JobScheduler doesn't have a shutdown method in this version
        // It will shutdown when dropped
        info!("Background scheduler stopped");
    }
}
