use super::DBClient;
use crate::dtos::MyEnrollmentDto;
use crate::models::Enrollment;
use uuid::Uuid;

const ENROLLMENT_COLUMNS: &str =
    "id, user_id, course_id, status, progress, completed, enrolled_at, updated_at";

/// Enrollment database operations trait
pub trait EnrollmentExt {
    async fn get_enrollment(
        &self,
        enrollment_id: Uuid,
    ) -> Result<Option<Enrollment>, sqlx::Error>;

    async fn get_enrollment_by_pair(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>, sqlx::Error>;

    /// Caller's enrollments joined with course titles.
    async fn get_my_enrollments(&self, user_id: Uuid)
    -> Result<Vec<MyEnrollmentDto>, sqlx::Error>;

    async fn get_course_enrollments(
        &self,
        course_id: Uuid,
    ) -> Result<Vec<Enrollment>, sqlx::Error>;

    /// Insert the enrollment row and bump the course counter in one
    /// transaction. The counter update re-checks published status and
    /// capacity so a racing enroll cannot overshoot; a duplicate pair
    /// surfaces as the unique-constraint violation.
    async fn create_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Enrollment, sqlx::Error>;

    async fn update_progress(
        &self,
        enrollment_id: Uuid,
        progress: i32,
        completed: bool,
    ) -> Result<Enrollment, sqlx::Error>;

    /// Flip to cancelled and decrement the course counter atomically.
    /// RowNotFound when the enrollment is already cancelled.
    async fn cancel_enrollment(&self, enrollment_id: Uuid) -> Result<Enrollment, sqlx::Error>;
}

impl EnrollmentExt for DBClient {
    async fn get_enrollment(
        &self,
        enrollment_id: Uuid,
    ) -> Result<Option<Enrollment>, sqlx::Error> {
        let enrollment = sqlx::query_as::<_, Enrollment>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = $1"
        ))
        .bind(enrollment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(enrollment)
    }

    async fn get_enrollment_by_pair(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>, sqlx::Error> {
        let enrollment = sqlx::query_as::<_, Enrollment>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE user_id = $1 AND course_id = $2"
        ))
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(enrollment)
    }

    async fn get_my_enrollments(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<MyEnrollmentDto>, sqlx::Error> {
        let enrollments = sqlx::query_as::<_, MyEnrollmentDto>(
            r#"
            SELECT e.id, e.course_id, c.title AS course_title, e.status, e.progress,
                   e.completed, e.enrolled_at
            FROM enrollments e
            INNER JOIN courses c ON e.course_id = c.id
            WHERE e.user_id = $1
            ORDER BY e.enrolled_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(enrollments)
    }

    async fn get_course_enrollments(
        &self,
        course_id: Uuid,
    ) -> Result<Vec<Enrollment>, sqlx::Error> {
        let enrollments = sqlx::query_as::<_, Enrollment>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE course_id = $1 ORDER BY enrolled_at DESC"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(enrollments)
    }

    async fn create_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Enrollment, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE courses
            SET enrollment_count = enrollment_count + 1, updated_at = NOW()
            WHERE id = $1
              AND status = 'published'
              AND (capacity IS NULL OR enrollment_count < capacity)
            "#,
        )
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::Protocol("Course is not open for enrollment".into()));
        }

        let enrollment = sqlx::query_as::<_, Enrollment>(&format!(
            r#"
            INSERT INTO enrollments (user_id, course_id)
            VALUES ($1, $2)
            RETURNING {ENROLLMENT_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(enrollment)
    }

    async fn update_progress(
        &self,
        enrollment_id: Uuid,
        progress: i32,
        completed: bool,
    ) -> Result<Enrollment, sqlx::Error> {
        let enrollment = sqlx::query_as::<_, Enrollment>(&format!(
            r#"
            UPDATE enrollments
            SET progress = $1, completed = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING {ENROLLMENT_COLUMNS}
            "#
        ))
        .bind(progress)
        .bind(completed)
        .bind(enrollment_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(enrollment)
    }

    async fn cancel_enrollment(&self, enrollment_id: Uuid) -> Result<Enrollment, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let enrollment = sqlx::query_as::<_, Enrollment>(&format!(
            r#"
            UPDATE enrollments
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING {ENROLLMENT_COLUMNS}
            "#
        ))
        .bind(enrollment_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE courses
            SET enrollment_count = GREATEST(enrollment_count - 1, 0), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(enrollment.course_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(enrollment)
    }
}
