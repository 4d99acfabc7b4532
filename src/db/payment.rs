use super::DBClient;
use crate::models::Payment;
use rust_decimal::Decimal;
use uuid::Uuid;

const PAYMENT_COLUMNS: &str =
    "id, user_id, course_id, amount, status, provider, transaction_id, created_at, updated_at";

/// Revenue aggregate over an instructor's COMPLETED payments.
#[derive(Debug, sqlx::FromRow)]
pub struct PaymentStats {
    pub total_revenue: Decimal,
    pub monthly_revenue: Decimal,
    pub completed_count: i64,
}

/// Payment database operations trait
pub trait PaymentExt {
    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, sqlx::Error>;

    async fn get_my_payments(&self, user_id: Uuid) -> Result<Vec<Payment>, sqlx::Error>;

    async fn get_course_payments(&self, course_id: Uuid) -> Result<Vec<Payment>, sqlx::Error>;

    /// Persist a PENDING payment with a locally-minted transaction id.
    async fn create_payment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        amount: Decimal,
        transaction_id: &str,
    ) -> Result<Payment, sqlx::Error>;

    /// Mark the payment COMPLETED and create the buyer's enrollment in the
    /// same transaction. The status guard (`status = 'pending'`) makes a
    /// duplicate completion callback a no-op upstream, the ON CONFLICT
    /// guard tolerates an already-enrolled buyer without double-counting,
    /// and the capacity-guarded counter update rolls everything back if the
    /// last seat was taken between initiation and completion.
    async fn complete_payment(
        &self,
        payment_id: Uuid,
        external_transaction_id: Option<&str>,
    ) -> Result<Payment, sqlx::Error>;

    /// Mark the payment FAILED; status only, no side effects.
    async fn fail_payment(&self, payment_id: Uuid) -> Result<Payment, sqlx::Error>;

    async fn get_payment_stats(&self, instructor_id: Uuid) -> Result<PaymentStats, sqlx::Error>;
}

impl PaymentExt for DBClient {
    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, sqlx::Error> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    async fn get_my_payments(&self, user_id: Uuid) -> Result<Vec<Payment>, sqlx::Error> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    async fn get_course_payments(&self, course_id: Uuid) -> Result<Vec<Payment>, sqlx::Error> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE course_id = $1 ORDER BY created_at DESC"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    async fn create_payment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        amount: Decimal,
        transaction_id: &str,
    ) -> Result<Payment, sqlx::Error> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (user_id, course_id, amount, transaction_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(course_id)
        .bind(amount)
        .bind(transaction_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(payment)
    }

    async fn complete_payment(
        &self,
        payment_id: Uuid,
        external_transaction_id: Option<&str>,
    ) -> Result<Payment, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET status = 'completed',
                transaction_id = COALESCE($1, transaction_id),
                updated_at = NOW()
            WHERE id = $2 AND status = 'pending'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(external_transaction_id)
        .bind(payment_id)
        .fetch_one(&mut *tx)
        .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO enrollments (user_id, course_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, course_id) DO NOTHING
            "#,
        )
        .bind(payment.user_id)
        .bind(payment.course_id)
        .execute(&mut *tx)
        .await?;

        // Only a freshly created enrollment bumps the counter, and only while
        // a seat is left. Zero rows rolls back the whole completion so a full
        // course can never be oversold through the payment path.
        if inserted.rows_affected() == 1 {
            let bumped = sqlx::query(
                r#"
                UPDATE courses
                SET enrollment_count = enrollment_count + 1, updated_at = NOW()
                WHERE id = $1
                  AND (capacity IS NULL OR enrollment_count < capacity)
                "#,
            )
            .bind(payment.course_id)
            .execute(&mut *tx)
            .await?;

            if bumped.rows_affected() == 0 {
                return Err(sqlx::Error::Protocol("Course is full".into()));
            }
        }

        tx.commit().await?;

        Ok(payment)
    }

    async fn fail_payment(&self, payment_id: Uuid) -> Result<Payment, sqlx::Error> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET status = 'failed', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(payment)
    }

    async fn get_payment_stats(&self, instructor_id: Uuid) -> Result<PaymentStats, sqlx::Error> {
        let stats = sqlx::query_as::<_, PaymentStats>(
            r#"
            SELECT
                COALESCE(SUM(p.amount), 0) AS total_revenue,
                COALESCE(SUM(p.amount) FILTER (WHERE p.created_at >= date_trunc('month', NOW())), 0)
                    AS monthly_revenue,
                COUNT(*) AS completed_count
            FROM payments p
            INNER JOIN courses c ON p.course_id = c.id
            WHERE c.instructor_id = $1 AND p.status = 'completed'
            "#,
        )
        .bind(instructor_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}
