use super::DBClient;
use crate::models::ActivityLog;
use uuid::Uuid;

/// One audit event. Handlers fill only the fields that apply.
#[derive(Debug, Default, Clone)]
pub struct ActivityEvent {
    pub event_type: String,
    pub actor_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub enrollment_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub details: Option<String>,
}

impl ActivityEvent {
    pub fn new(event_type: impl Into<String>, actor_id: Uuid) -> Self {
        ActivityEvent {
            event_type: event_type.into(),
            actor_id: Some(actor_id),
            ..Default::default()
        }
    }
}

/// Activity-log database operations trait
pub trait ActivityExt {
    /// Best-effort append. Any failure is logged and swallowed so an audit
    /// outage never blocks the triggering operation.
    async fn record_activity(&self, event: ActivityEvent);

    async fn get_recent_activity(&self, limit: i64) -> Result<Vec<ActivityLog>, sqlx::Error>;
}

impl ActivityExt for DBClient {
    async fn record_activity(&self, event: ActivityEvent) {
        let result = sqlx::query(
            r#"
            INSERT INTO activity_logs
                (event_type, actor_id, target_user_id, course_id, enrollment_id, payment_id, details)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&event.event_type)
        .bind(event.actor_id)
        .bind(event.target_user_id)
        .bind(event.course_id)
        .bind(event.enrollment_id)
        .bind(event.payment_id)
        .bind(event.details.as_deref())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(event_type = %event.event_type, "Failed to record activity: {}", e);
        }
    }

    async fn get_recent_activity(&self, limit: i64) -> Result<Vec<ActivityLog>, sqlx::Error> {
        let events = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT id, event_type, actor_id, target_user_id, course_id, enrollment_id,
                   payment_id, details, created_at
            FROM activity_logs
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
