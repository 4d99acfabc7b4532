use crate::{
    AppState,
    db::{ActivityEvent, ActivityExt, CourseExt, EnrollmentExt, ReviewExt, fold_rating_stats},
    dtos::{
        InputReviewDto, PaginationDto, RatingStatsDto, RequestQueryDto, ReviewListResponseDto,
        SingleReviewResponseDto,
    },
    error::{ErrorMessage, HttpError},
    middleware::{JWTAuthMiddleware, auth},
    models::EnrollmentStatus,
};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// Router for course reviews. Reading reviews and stats is public; writing
/// one requires auth and an enrollment in the course.
pub fn review_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(create_review)
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
        .route("/course/{course_id}", get(get_course_reviews))
        .route("/course/{course_id}/stats", get(get_rating_stats))
}

/// Leave a review on a course the caller is enrolled in. One review per
/// user and course.
#[instrument(skip(user, app_state, body), fields(user_id = %user.user.id))]
pub async fn create_review(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Json(body): Json<InputReviewDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let course = app_state
        .db_client
        .get_course(body.course_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting course: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Course not found"))?;

    // Reviews come from actively enrolled students only.
    let enrollment = app_state
        .db_client
        .get_enrollment_by_pair(user.user.id, course.id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting enrollment: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    if !enrollment
        .map(|e| e.status == EnrollmentStatus::Active)
        .unwrap_or(false)
    {
        return Err(HttpError::bad_request(
            "You must be enrolled in this course to review it",
        ));
    }

    let review = app_state
        .db_client
        .create_review(user.user.id, course.id, body.rating, body.comment.as_deref())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                HttpError::conflict("You have already reviewed this course")
            }
            _ => {
                tracing::error!("DB error, creating review: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    app_state
        .db_client
        .record_activity(ActivityEvent {
            course_id: Some(course.id),
            details: Some(format!("rated {}", body.rating)),
            ..ActivityEvent::new("review.created", user.user.id)
        })
        .await;

    tracing::info!(review_id = %review.id, "Review created");
    Ok((
        StatusCode::CREATED,
        Json(SingleReviewResponseDto {
            status: "success".to_string(),
            data: review,
        }),
    ))
}

/// Reviews for a course, newest first, with pagination metadata.
#[instrument(skip(app_state))]
pub async fn get_course_reviews(
    Path(course_id): Path<Uuid>,
    Query(query_params): Query<RequestQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query_params.page.unwrap_or(1);
    let limit = query_params.limit.unwrap_or(10);

    let reviews = app_state
        .db_client
        .get_reviews(course_id, page, limit)
        .await
        .map_err(|e| {
            tracing::error!("DB error, listing reviews: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total = app_state
        .db_client
        .get_course_review_count(course_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, counting reviews: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total_pages = (total as f64 / limit as f64).ceil() as i32;

    Ok(Json(ReviewListResponseDto {
        status: "success".to_string(),
        data: reviews,
        pagination: PaginationDto {
            page,
            limit,
            total: total as i32,
            total_pages,
        },
    }))
}

/// Rating distribution and true average over every review of the course.
#[instrument(skip(app_state))]
pub async fn get_rating_stats(
    Path(course_id): Path<Uuid>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let rows = app_state
        .db_client
        .get_rating_buckets(course_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting rating buckets: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let (average, count, buckets) = fold_rating_stats(&rows);

    Ok(Json(RatingStatsDto {
        status: "success".to_string(),
        average,
        count,
        buckets,
    }))
}
