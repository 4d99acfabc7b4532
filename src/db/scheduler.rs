use super::DBClient;
use tokio_cron_scheduler::{Job, JobScheduler};

impl DBClient {
    /// Daily cleanup: expired OTPs and stale unverified accounts.
    pub async fn start_cleanup_task(&self) {
        let sched = JobScheduler::new().await.unwrap();
        let pool = self.pool.clone();

        let job = Job::new_async("0 0 1 * * *", move |uuid, _l| {
            let pool = pool.clone();
            Box::pin(async move {
                tracing::info!("Running cleanup job {:?}", uuid);

                let otps = sqlx::query("DELETE FROM otps WHERE expires_at < NOW()")
                    .execute(&pool)
                    .await;

                let users = sqlx::query(
                    "DELETE FROM users WHERE status = 'pending' AND created_at < NOW() - INTERVAL '7 days'",
                )
                .execute(&pool)
                .await;

                match (otps, users) {
                    (Ok(o), Ok(u)) => {
                        tracing::info!(
                            "Cleanup job {:?} finished, deleted {} otps and {} stale users",
                            uuid,
                            o.rows_affected(),
                            u.rows_affected()
                        );
                    }
                    (otps, users) => {
                        if let Err(e) = otps {
                            tracing::error!("Cleanup job {:?} otp sweep failed: {:?}", uuid, e);
                        }
                        if let Err(e) = users {
                            tracing::error!("Cleanup job {:?} user sweep failed: {:?}", uuid, e);
                        }
                    }
                }
            })
        })
        .unwrap();

        sched.add(job).await.unwrap();
        //It doesn't block.
        sched.start().await.unwrap();
    }
}
