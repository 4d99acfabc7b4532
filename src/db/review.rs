use super::DBClient;
use crate::dtos::ReviewDto;
use uuid::Uuid;

/// Review database operations trait
pub trait ReviewExt {
    async fn get_reviews(
        &self,
        course_id: Uuid,
        page: i32,
        limit: i32,
    ) -> Result<Vec<ReviewDto>, sqlx::Error>;

    async fn get_course_review_count(&self, course_id: Uuid) -> Result<i64, sqlx::Error>;

    /// Insert a review; the unique (user, course) index is the backstop
    /// against racing duplicates.
    async fn create_review(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        rating: i32,
        comment: Option<&str>,
    ) -> Result<ReviewDto, sqlx::Error>;

    /// Per-star counts over the full review set for the course.
    async fn get_rating_buckets(&self, course_id: Uuid) -> Result<Vec<(i32, i64)>, sqlx::Error>;
}

impl ReviewExt for DBClient {
    async fn get_reviews(
        &self,
        course_id: Uuid,
        page: i32,
        limit: i32,
    ) -> Result<Vec<ReviewDto>, sqlx::Error> {
        let offset = (page - 1) * limit;

        let reviews = sqlx::query_as::<_, ReviewDto>(
            r#"
            SELECT r.id, u.name AS user_name, r.course_id, r.rating, r.comment,
                   r.created_at, r.updated_at
            FROM reviews r
            INNER JOIN users u ON r.user_id = u.id
            WHERE r.course_id = $1
            ORDER BY r.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(course_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    async fn get_course_review_count(&self, course_id: Uuid) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE course_id = $1")
            .bind(course_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn create_review(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        rating: i32,
        comment: Option<&str>,
    ) -> Result<ReviewDto, sqlx::Error> {
        // CTE to insert and return the review with the reviewer's name.
        let review = sqlx::query_as::<_, ReviewDto>(
            r#"
            WITH new_review AS (
                INSERT INTO reviews (user_id, course_id, rating, comment)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT nr.id, u.name AS user_name, nr.course_id, nr.rating, nr.comment,
                   nr.created_at, nr.updated_at
            FROM new_review nr
            INNER JOIN users u ON nr.user_id = u.id
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(&self.pool)
        .await?;

        Ok(review)
    }

    async fn get_rating_buckets(&self, course_id: Uuid) -> Result<Vec<(i32, i64)>, sqlx::Error> {
        let buckets: Vec<(i32, i64)> = sqlx::query_as(
            "SELECT rating, COUNT(*) FROM reviews WHERE course_id = $1 GROUP BY rating",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(buckets)
    }
}

/// Fold per-star counts into (true average, total, buckets[1..=5]).
pub fn fold_rating_stats(rows: &[(i32, i64)]) -> (Option<f64>, i64, [i64; 5]) {
    let mut buckets = [0i64; 5];
    let mut total = 0i64;
    let mut weighted = 0i64;

    for &(rating, count) in rows {
        if (1..=5).contains(&rating) {
            buckets[(rating - 1) as usize] = count;
            total += count;
            weighted += rating as i64 * count;
        }
    }

    let average = if total > 0 {
        Some(weighted as f64 / total as f64)
    } else {
        None
    };

    (average, total, buckets)
}

#[cfg(test)]
mod tests {
    use super::fold_rating_stats;

    #[test]
    fn empty_review_set_has_no_average() {
        let (average, total, buckets) = fold_rating_stats(&[]);
        assert_eq!(average, None);
        assert_eq!(total, 0);
        assert_eq!(buckets, [0; 5]);
    }

    #[test]
    fn single_five_star_review_averages_five() {
        let (average, total, buckets) = fold_rating_stats(&[(5, 1)]);
        assert_eq!(average, Some(5.0));
        assert_eq!(total, 1);
        assert_eq!(buckets, [0, 0, 0, 0, 1]);
    }

    #[test]
    fn mixed_ratings_weighted_average() {
        // Two 5-star, one 2-star: (10 + 2) / 3 = 4.0
        let (average, total, buckets) = fold_rating_stats(&[(5, 2), (2, 1)]);
        assert_eq!(average, Some(4.0));
        assert_eq!(total, 3);
        assert_eq!(buckets, [0, 1, 0, 0, 2]);
    }

    #[test]
    fn out_of_range_ratings_ignored() {
        let (average, total, _) = fold_rating_stats(&[(0, 3), (6, 2), (3, 1)]);
        assert_eq!(average, Some(3.0));
        assert_eq!(total, 1);
    }
}
