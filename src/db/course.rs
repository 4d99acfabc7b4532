use super::DBClient;
use crate::dtos::CourseListItemDto;
use crate::models::{Course, CourseStatus};
use rust_decimal::Decimal;
use uuid::Uuid;

const COURSE_COLUMNS: &str = "id, instructor_id, title, description, price, category, level, \
     thumbnail_url, status, rejection_reason, capacity, enrollment_count, published_at, \
     created_at, updated_at";

/// Catalog filters for the public course listing.
#[derive(Debug, Default, Clone)]
pub struct CourseFilters {
    pub category: Option<String>,
    pub level: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub search: Option<String>,
}

/// Course database operations trait
pub trait CourseExt {
    async fn get_course(&self, course_id: Uuid) -> Result<Option<Course>, sqlx::Error>;

    /// Published courses only, with pagination and the aggregated rating
    /// computed over the full review set per course.
    async fn get_published_courses(
        &self,
        page: i32,
        limit: i32,
        filters: &CourseFilters,
    ) -> Result<Vec<CourseListItemDto>, sqlx::Error>;

    async fn get_published_course_count(
        &self,
        filters: &CourseFilters,
    ) -> Result<i64, sqlx::Error>;

    async fn get_instructor_courses(&self, instructor_id: Uuid)
    -> Result<Vec<Course>, sqlx::Error>;

    /// New courses always start DRAFT regardless of client input.
    async fn create_course(
        &self,
        instructor_id: Uuid,
        title: &str,
        description: &str,
        price: Decimal,
        category: Option<&str>,
        level: Option<&str>,
        thumbnail_url: Option<&str>,
        capacity: Option<i32>,
    ) -> Result<Course, sqlx::Error>;

    /// Full-row update with values already merged by the caller.
    async fn update_course(
        &self,
        course_id: Uuid,
        title: &str,
        description: &str,
        price: Decimal,
        category: Option<&str>,
        level: Option<&str>,
        thumbnail_url: Option<&str>,
        capacity: Option<i32>,
    ) -> Result<Course, sqlx::Error>;

    async fn delete_course(&self, course_id: Uuid) -> Result<(), sqlx::Error>;

    /// Lifecycle transition. Stamps published_at on publish and stores the
    /// mandatory reason on rejection; clears the reason otherwise.
    async fn set_course_status(
        &self,
        course_id: Uuid,
        status: CourseStatus,
        rejection_reason: Option<&str>,
    ) -> Result<Course, sqlx::Error>;
}

impl CourseExt for DBClient {
    async fn get_course(&self, course_id: Uuid) -> Result<Option<Course>, sqlx::Error> {
        let course = sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"
        ))
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(course)
    }

    async fn get_published_courses(
        &self,
        page: i32,
        limit: i32,
        filters: &CourseFilters,
    ) -> Result<Vec<CourseListItemDto>, sqlx::Error> {
        let offset = (page - 1) * limit;

        let courses = sqlx::query_as::<_, CourseListItemDto>(
            r#"
            SELECT
                c.id,
                c.title,
                c.description,
                c.price,
                c.category,
                c.level,
                c.thumbnail_url,
                u.name AS instructor_name,
                c.enrollment_count,
                (SELECT AVG(r.rating)::float8 FROM reviews r WHERE r.course_id = c.id) AS average_rating,
                (SELECT COUNT(*) FROM reviews r WHERE r.course_id = c.id) AS review_count,
                c.published_at
            FROM courses c
            INNER JOIN users u ON c.instructor_id = u.id
            WHERE c.status = 'published'
              AND ($1::text IS NULL OR c.category = $1)
              AND ($2::text IS NULL OR c.level = $2)
              AND ($3::numeric IS NULL OR c.price >= $3)
              AND ($4::numeric IS NULL OR c.price <= $4)
              AND ($5::text IS NULL
                   OR c.title ILIKE '%' || $5 || '%'
                   OR c.description ILIKE '%' || $5 || '%')
            ORDER BY c.published_at DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(filters.category.as_deref())
        .bind(filters.level.as_deref())
        .bind(filters.min_price)
        .bind(filters.max_price)
        .bind(filters.search.as_deref())
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(courses)
    }

    async fn get_published_course_count(
        &self,
        filters: &CourseFilters,
    ) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM courses c
            WHERE c.status = 'published'
              AND ($1::text IS NULL OR c.category = $1)
              AND ($2::text IS NULL OR c.level = $2)
              AND ($3::numeric IS NULL OR c.price >= $3)
              AND ($4::numeric IS NULL OR c.price <= $4)
              AND ($5::text IS NULL
                   OR c.title ILIKE '%' || $5 || '%'
                   OR c.description ILIKE '%' || $5 || '%')
            "#,
        )
        .bind(filters.category.as_deref())
        .bind(filters.level.as_deref())
        .bind(filters.min_price)
        .bind(filters.max_price)
        .bind(filters.search.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn get_instructor_courses(
        &self,
        instructor_id: Uuid,
    ) -> Result<Vec<Course>, sqlx::Error> {
        let courses = sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE instructor_id = $1 ORDER BY created_at DESC"
        ))
        .bind(instructor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(courses)
    }

    async fn create_course(
        &self,
        instructor_id: Uuid,
        title: &str,
        description: &str,
        price: Decimal,
        category: Option<&str>,
        level: Option<&str>,
        thumbnail_url: Option<&str>,
        capacity: Option<i32>,
    ) -> Result<Course, sqlx::Error> {
        let course = sqlx::query_as::<_, Course>(&format!(
            r#"
            INSERT INTO courses (instructor_id, title, description, price, category, level, thumbnail_url, capacity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COURSE_COLUMNS}
            "#
        ))
        .bind(instructor_id)
        .bind(title)
        .bind(description)
        .bind(price)
        .bind(category)
        .bind(level)
        .bind(thumbnail_url)
        .bind(capacity)
        .fetch_one(&self.pool)
        .await?;

        Ok(course)
    }

    async fn update_course(
        &self,
        course_id: Uuid,
        title: &str,
        description: &str,
        price: Decimal,
        category: Option<&str>,
        level: Option<&str>,
        thumbnail_url: Option<&str>,
        capacity: Option<i32>,
    ) -> Result<Course, sqlx::Error> {
        let course = sqlx::query_as::<_, Course>(&format!(
            r#"
            UPDATE courses
            SET title = $1, description = $2, price = $3, category = $4, level = $5,
                thumbnail_url = $6, capacity = $7, updated_at = NOW()
            WHERE id = $8
            RETURNING {COURSE_COLUMNS}
            "#
        ))
        .bind(title)
        .bind(description)
        .bind(price)
        .bind(category)
        .bind(level)
        .bind(thumbnail_url)
        .bind(capacity)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(course)
    }

    async fn delete_course(&self, course_id: Uuid) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(course_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn set_course_status(
        &self,
        course_id: Uuid,
        status: CourseStatus,
        rejection_reason: Option<&str>,
    ) -> Result<Course, sqlx::Error> {
        let course = sqlx::query_as::<_, Course>(&format!(
            r#"
            UPDATE courses
            SET status = $1,
                rejection_reason = $2,
                published_at = CASE WHEN $1 = 'published'::course_status THEN NOW() ELSE published_at END,
                updated_at = NOW()
            WHERE id = $3
            RETURNING {COURSE_COLUMNS}
            "#
        ))
        .bind(status)
        .bind(rejection_reason)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(course)
    }
}
