use super::DBClient;
use crate::models::{CourseModule, Lesson, LessonStatus, LessonType, next_sort_order};
use uuid::Uuid;

const MODULE_COLUMNS: &str = "id, course_id, title, sort_order, created_at, updated_at";
const LESSON_COLUMNS: &str = "id, module_id, title, content, lesson_type, status, sort_order, \
     duration_minutes, video_url, created_at, updated_at";

/// Module and lesson database operations.
///
/// Sibling `sort_order` values are kept dense and zero-based: appends take
/// max + 1, deletes decrement every later sibling.
pub trait ContentExt {
    async fn get_module(&self, module_id: Uuid) -> Result<Option<CourseModule>, sqlx::Error>;

    async fn get_modules(&self, course_id: Uuid) -> Result<Vec<CourseModule>, sqlx::Error>;

    async fn create_module(
        &self,
        course_id: Uuid,
        title: &str,
        sort_order: Option<i32>,
    ) -> Result<CourseModule, sqlx::Error>;

    async fn update_module(
        &self,
        module_id: Uuid,
        title: &str,
        sort_order: i32,
    ) -> Result<CourseModule, sqlx::Error>;

    /// Deletes the module (lessons cascade) and compacts the order of the
    /// remaining siblings in the same transaction.
    async fn delete_module(&self, module_id: Uuid) -> Result<(), sqlx::Error>;

    async fn get_lesson(&self, lesson_id: Uuid) -> Result<Option<Lesson>, sqlx::Error>;

    async fn get_lessons(&self, module_id: Uuid) -> Result<Vec<Lesson>, sqlx::Error>;

    async fn create_lesson(
        &self,
        module_id: Uuid,
        title: &str,
        content: &str,
        lesson_type: LessonType,
        sort_order: Option<i32>,
        duration_minutes: Option<i32>,
        video_url: Option<&str>,
    ) -> Result<Lesson, sqlx::Error>;

    async fn update_lesson(
        &self,
        lesson_id: Uuid,
        title: &str,
        content: &str,
        lesson_type: LessonType,
        status: LessonStatus,
        sort_order: i32,
        duration_minutes: Option<i32>,
        video_url: Option<&str>,
    ) -> Result<Lesson, sqlx::Error>;

    async fn delete_lesson(&self, lesson_id: Uuid) -> Result<(), sqlx::Error>;
}

impl ContentExt for DBClient {
    async fn get_module(&self, module_id: Uuid) -> Result<Option<CourseModule>, sqlx::Error> {
        let module = sqlx::query_as::<_, CourseModule>(&format!(
            "SELECT {MODULE_COLUMNS} FROM course_modules WHERE id = $1"
        ))
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(module)
    }

    async fn get_modules(&self, course_id: Uuid) -> Result<Vec<CourseModule>, sqlx::Error> {
        let modules = sqlx::query_as::<_, CourseModule>(&format!(
            "SELECT {MODULE_COLUMNS} FROM course_modules WHERE course_id = $1 ORDER BY sort_order ASC"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(modules)
    }

    async fn create_module(
        &self,
        course_id: Uuid,
        title: &str,
        sort_order: Option<i32>,
    ) -> Result<CourseModule, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let sort_order = match sort_order {
            Some(order) => order,
            None => {
                let max: Option<i32> = sqlx::query_scalar(
                    "SELECT MAX(sort_order) FROM course_modules WHERE course_id = $1",
                )
                .bind(course_id)
                .fetch_one(&mut *tx)
                .await?;
                next_sort_order(max)
            }
        };

        let module = sqlx::query_as::<_, CourseModule>(&format!(
            r#"
            INSERT INTO course_modules (course_id, title, sort_order)
            VALUES ($1, $2, $3)
            RETURNING {MODULE_COLUMNS}
            "#
        ))
        .bind(course_id)
        .bind(title)
        .bind(sort_order)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(module)
    }

    async fn update_module(
        &self,
        module_id: Uuid,
        title: &str,
        sort_order: i32,
    ) -> Result<CourseModule, sqlx::Error> {
        let module = sqlx::query_as::<_, CourseModule>(&format!(
            r#"
            UPDATE course_modules
            SET title = $1, sort_order = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING {MODULE_COLUMNS}
            "#
        ))
        .bind(title)
        .bind(sort_order)
        .bind(module_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(module)
    }

    async fn delete_module(&self, module_id: Uuid) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let deleted: Option<(Uuid, i32)> = sqlx::query_as(
            "DELETE FROM course_modules WHERE id = $1 RETURNING course_id, sort_order",
        )
        .bind(module_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((course_id, sort_order)) = deleted else {
            return Err(sqlx::Error::RowNotFound);
        };

        sqlx::query(
            r#"
            UPDATE course_modules
            SET sort_order = sort_order - 1, updated_at = NOW()
            WHERE course_id = $1 AND sort_order > $2
            "#,
        )
        .bind(course_id)
        .bind(sort_order)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn get_lesson(&self, lesson_id: Uuid) -> Result<Option<Lesson>, sqlx::Error> {
        let lesson = sqlx::query_as::<_, Lesson>(&format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1"
        ))
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lesson)
    }

    async fn get_lessons(&self, module_id: Uuid) -> Result<Vec<Lesson>, sqlx::Error> {
        let lessons = sqlx::query_as::<_, Lesson>(&format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE module_id = $1 ORDER BY sort_order ASC"
        ))
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lessons)
    }

    async fn create_lesson(
        &self,
        module_id: Uuid,
        title: &str,
        content: &str,
        lesson_type: LessonType,
        sort_order: Option<i32>,
        duration_minutes: Option<i32>,
        video_url: Option<&str>,
    ) -> Result<Lesson, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let sort_order = match sort_order {
            Some(order) => order,
            None => {
                let max: Option<i32> =
                    sqlx::query_scalar("SELECT MAX(sort_order) FROM lessons WHERE module_id = $1")
                        .bind(module_id)
                        .fetch_one(&mut *tx)
                        .await?;
                next_sort_order(max)
            }
        };

        let lesson = sqlx::query_as::<_, Lesson>(&format!(
            r#"
            INSERT INTO lessons (module_id, title, content, lesson_type, sort_order, duration_minutes, video_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {LESSON_COLUMNS}
            "#
        ))
        .bind(module_id)
        .bind(title)
        .bind(content)
        .bind(lesson_type)
        .bind(sort_order)
        .bind(duration_minutes)
        .bind(video_url)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(lesson)
    }

    async fn update_lesson(
        &self,
        lesson_id: Uuid,
        title: &str,
        content: &str,
        lesson_type: LessonType,
        status: LessonStatus,
        sort_order: i32,
        duration_minutes: Option<i32>,
        video_url: Option<&str>,
    ) -> Result<Lesson, sqlx::Error> {
        let lesson = sqlx::query_as::<_, Lesson>(&format!(
            r#"
            UPDATE lessons
            SET title = $1, content = $2, lesson_type = $3, status = $4, sort_order = $5,
                duration_minutes = $6, video_url = $7, updated_at = NOW()
            WHERE id = $8
            RETURNING {LESSON_COLUMNS}
            "#
        ))
        .bind(title)
        .bind(content)
        .bind(lesson_type)
        .bind(status)
        .bind(sort_order)
        .bind(duration_minutes)
        .bind(video_url)
        .bind(lesson_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(lesson)
    }

    async fn delete_lesson(&self, lesson_id: Uuid) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let deleted: Option<(Uuid, i32)> =
            sqlx::query_as("DELETE FROM lessons WHERE id = $1 RETURNING module_id, sort_order")
                .bind(lesson_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((module_id, sort_order)) = deleted else {
            return Err(sqlx::Error::RowNotFound);
        };

        sqlx::query(
            r#"
            UPDATE lessons
            SET sort_order = sort_order - 1, updated_at = NOW()
            WHERE module_id = $1 AND sort_order > $2
            "#,
        )
        .bind(module_id)
        .bind(sort_order)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}
