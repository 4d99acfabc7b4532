use super::DBClient;
use crate::models::{ApplicationStatus, InstructorApplication, Otp, User, UserRole};
use chrono::{DateTime, Utc};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, password, role, status, created_at, updated_at";

/// User, OTP, and instructor-application database operations.
pub trait UserExt {
    /// Get single user by ID or email.
    /// Returns Option - Some(user) if found, None if not found.
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error>;

    /// Get paginated list of all users.
    async fn get_users(&self, page: i32, limit: i32) -> Result<Vec<User>, sqlx::Error>;

    /// Get total count of all users.
    async fn get_user_count(&self) -> Result<i64, sqlx::Error>;

    /// Create a PENDING user, or refresh the name/password of an existing
    /// PENDING user with the same email. Returns None when the email belongs
    /// to an ACTIVE account (the caller translates that into Conflict).
    async fn save_pending_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<User>, sqlx::Error>;

    /// Activate a verified user and delete their OTP in one transaction.
    async fn activate_user(&self, user_id: Uuid) -> Result<User, sqlx::Error>;

    /// Store (or replace) the one live OTP for a user.
    async fn upsert_otp(
        &self,
        user_id: Uuid,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Otp, sqlx::Error>;

    async fn get_otp(&self, user_id: Uuid) -> Result<Option<Otp>, sqlx::Error>;

    async fn delete_otp(&self, user_id: Uuid) -> Result<(), sqlx::Error>;

    /// Latest instructor application for a user, if any.
    async fn get_latest_application(
        &self,
        user_id: Uuid,
    ) -> Result<Option<InstructorApplication>, sqlx::Error>;

    async fn get_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<InstructorApplication>, sqlx::Error>;

    async fn get_pending_applications(&self) -> Result<Vec<InstructorApplication>, sqlx::Error>;

    async fn create_application(
        &self,
        user_id: Uuid,
        motivation: &str,
    ) -> Result<InstructorApplication, sqlx::Error>;

    /// Record the review decision. Approval also flips the applicant's role
    /// to instructor, atomically with the application update.
    async fn review_application(
        &self,
        application_id: Uuid,
        applicant_id: Uuid,
        decision: ApplicationStatus,
        reason: Option<&str>,
        reviewer_id: Uuid,
    ) -> Result<InstructorApplication, sqlx::Error>;
}

impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
            ))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(email) = email {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
            ))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        }

        Ok(user)
    }

    async fn get_users(&self, page: i32, limit: i32) -> Result<Vec<User>, sqlx::Error> {
        let offset = (page - 1) * limit;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn get_user_count(&self) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn save_pending_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        // The conditional DO UPDATE leaves active accounts untouched, so an
        // already-verified email yields no row.
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
                SET name = EXCLUDED.name, password = EXCLUDED.password, updated_at = NOW()
                WHERE users.status = 'pending'
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn activate_user(&self, user_id: Uuid) -> Result<User, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET status = 'active', updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM otps WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(user)
    }

    async fn upsert_otp(
        &self,
        user_id: Uuid,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Otp, sqlx::Error> {
        let otp = sqlx::query_as::<_, Otp>(
            r#"
            INSERT INTO otps (user_id, code, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
                SET code = EXCLUDED.code, expires_at = EXCLUDED.expires_at, created_at = NOW()
            RETURNING id, user_id, code, expires_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(code)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(otp)
    }

    async fn get_otp(&self, user_id: Uuid) -> Result<Option<Otp>, sqlx::Error> {
        let otp = sqlx::query_as::<_, Otp>(
            "SELECT id, user_id, code, expires_at, created_at FROM otps WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(otp)
    }

    async fn delete_otp(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM otps WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_latest_application(
        &self,
        user_id: Uuid,
    ) -> Result<Option<InstructorApplication>, sqlx::Error> {
        let application = sqlx::query_as::<_, InstructorApplication>(
            r#"
            SELECT id, user_id, motivation, status, review_reason, reviewed_by, created_at, updated_at
            FROM instructor_applications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(application)
    }

    async fn get_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<InstructorApplication>, sqlx::Error> {
        let application = sqlx::query_as::<_, InstructorApplication>(
            r#"
            SELECT id, user_id, motivation, status, review_reason, reviewed_by, created_at, updated_at
            FROM instructor_applications
            WHERE id = $1
            "#,
        )
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(application)
    }

    async fn get_pending_applications(&self) -> Result<Vec<InstructorApplication>, sqlx::Error> {
        let applications = sqlx::query_as::<_, InstructorApplication>(
            r#"
            SELECT id, user_id, motivation, status, review_reason, reviewed_by, created_at, updated_at
            FROM instructor_applications
            WHERE status = 'pending'
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(applications)
    }

    async fn create_application(
        &self,
        user_id: Uuid,
        motivation: &str,
    ) -> Result<InstructorApplication, sqlx::Error> {
        let application = sqlx::query_as::<_, InstructorApplication>(
            r#"
            INSERT INTO instructor_applications (user_id, motivation)
            VALUES ($1, $2)
            RETURNING id, user_id, motivation, status, review_reason, reviewed_by, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(motivation)
        .fetch_one(&self.pool)
        .await?;

        Ok(application)
    }

    async fn review_application(
        &self,
        application_id: Uuid,
        applicant_id: Uuid,
        decision: ApplicationStatus,
        reason: Option<&str>,
        reviewer_id: Uuid,
    ) -> Result<InstructorApplication, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let application = sqlx::query_as::<_, InstructorApplication>(
            r#"
            UPDATE instructor_applications
            SET status = $1, review_reason = $2, reviewed_by = $3, updated_at = NOW()
            WHERE id = $4 AND status = 'pending'
            RETURNING id, user_id, motivation, status, review_reason, reviewed_by, created_at, updated_at
            "#,
        )
        .bind(decision)
        .bind(reason)
        .bind(reviewer_id)
        .bind(application_id)
        .fetch_one(&mut *tx)
        .await?;

        // Approval grants the instructor role; rejection leaves it untouched.
        if decision == ApplicationStatus::Approved {
            sqlx::query("UPDATE users SET role = $1, updated_at = NOW() WHERE id = $2")
                .bind(UserRole::Instructor)
                .bind(applicant_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(application)
    }
}
