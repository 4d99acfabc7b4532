use crate::{
    AppState,
    db::{ActivityEvent, ActivityExt, CourseExt, EnrollmentExt},
    dtos::{
        EnrollDto, EnrollmentListResponseDto, EnrollmentResponseDto, MyEnrollmentListResponseDto,
        UpdateProgressDto,
    },
    error::{ErrorMessage, HttpError},
    middleware::JWTAuthMiddleware,
    models::{Course, UserRole, derive_completed},
};
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// Router for enrollment endpoints. All routes require auth (applied in
/// routes.rs).
pub fn enrollment_handler() -> Router<AppState> {
    Router::new()
        .route("/", post(enroll))
        .route("/my", get(get_my_enrollments))
        .route("/course/{course_id}", get(get_course_enrollments))
        .route("/{enrollment_id}/progress", patch(update_progress))
        .route("/{enrollment_id}/cancel", patch(cancel_enrollment))
}

/// Fail-fast checks before the transactional enrollment insert. A repeat
/// enrollment is a conflict regardless of the course's state, so it is
/// checked ahead of the status and capacity rules.
fn enroll_precheck(course: &Course, already_enrolled: bool) -> Result<(), HttpError> {
    if already_enrolled {
        return Err(HttpError::conflict("You are already enrolled in this course"));
    }
    if !course.status.is_enrollable() {
        return Err(HttpError::bad_request("Course is not open for enrollment"));
    }
    if !course.has_capacity() {
        return Err(HttpError::bad_request("Course is full"));
    }
    Ok(())
}

/// Enroll the caller in a published course with free capacity. One
/// enrollment per user and course, ever.
#[instrument(skip(user, app_state, body), fields(user_id = %user.user.id))]
pub async fn enroll(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Json(body): Json<EnrollDto>,
) -> Result<impl IntoResponse, HttpError> {
    let course = app_state
        .db_client
        .get_course(body.course_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting course: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Course not found"))?;

    let existing = app_state
        .db_client
        .get_enrollment_by_pair(user.user.id, course.id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting enrollment: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    // Pre-checks give precise errors; the transactional guard below remains
    // the authority under concurrency.
    enroll_precheck(&course, existing.is_some())?;

    let enrollment = app_state
        .db_client
        .create_enrollment(user.user.id, course.id)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                HttpError::conflict("You are already enrolled in this course")
            }
            sqlx::Error::Protocol(_) => {
                // Lost a race: the course filled up or was unpublished between
                // the pre-check and the guarded update.
                HttpError::bad_request("Course is not open for enrollment")
            }
            _ => {
                tracing::error!("DB error, creating enrollment: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    app_state
        .db_client
        .record_activity(ActivityEvent {
            course_id: Some(course.id),
            enrollment_id: Some(enrollment.id),
            ..ActivityEvent::new("enrollment.created", user.user.id)
        })
        .await;

    tracing::info!(enrollment_id = %enrollment.id, "Enrollment created");
    Ok((
        StatusCode::CREATED,
        Json(EnrollmentResponseDto {
            status: "success".to_string(),
            data: enrollment,
        }),
    ))
}

/// The caller's own enrollments, newest first.
#[instrument(skip(user, app_state), fields(user_id = %user.user.id))]
pub async fn get_my_enrollments(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let enrollments = app_state
        .db_client
        .get_my_enrollments(user.user.id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, listing enrollments: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(MyEnrollmentListResponseDto {
        status: "success".to_string(),
        data: enrollments,
    }))
}

/// Roster for a course: owning instructor or admin only.
#[instrument(skip(user, app_state), fields(user_id = %user.user.id, course_id = %course_id))]
pub async fn get_course_enrollments(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let course = app_state
        .db_client
        .get_course(course_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting course: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Course not found"))?;

    if !user.user.can_view_course_enrollments(&course) {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    let enrollments = app_state
        .db_client
        .get_course_enrollments(course.id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, listing course enrollments: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(EnrollmentListResponseDto {
        status: "success".to_string(),
        data: enrollments,
    }))
}

/// Set progress on the caller's own enrollment. `completed` is derived from
/// the new value, so re-sending the same progress is a no-op.
#[instrument(skip(user, app_state, body), fields(user_id = %user.user.id, enrollment_id = %enrollment_id))]
pub async fn update_progress(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(enrollment_id): Path<Uuid>,
    Json(body): Json<UpdateProgressDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let enrollment = app_state
        .db_client
        .get_enrollment(enrollment_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting enrollment: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Enrollment not found"))?;

    if enrollment.user_id != user.user.id && user.user.role != UserRole::Admin {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    let completed = derive_completed(body.progress);

    let enrollment = app_state
        .db_client
        .update_progress(enrollment.id, body.progress, completed)
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating progress: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(EnrollmentResponseDto {
        status: "success".to_string(),
        data: enrollment,
    }))
}

/// Cancel the caller's enrollment, freeing a capacity slot. Cancelling an
/// already-cancelled enrollment is rejected.
#[instrument(skip(user, app_state), fields(user_id = %user.user.id, enrollment_id = %enrollment_id))]
pub async fn cancel_enrollment(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(enrollment_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let enrollment = app_state
        .db_client
        .get_enrollment(enrollment_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting enrollment: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Enrollment not found"))?;

    if enrollment.user_id != user.user.id && user.user.role != UserRole::Admin {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    let enrollment = app_state
        .db_client
        .cancel_enrollment(enrollment.id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                HttpError::bad_request("Enrollment is already cancelled")
            }
            _ => {
                tracing::error!("DB error, cancelling enrollment: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    app_state
        .db_client
        .record_activity(ActivityEvent {
            course_id: Some(enrollment.course_id),
            enrollment_id: Some(enrollment.id),
            ..ActivityEvent::new("enrollment.cancelled", user.user.id)
        })
        .await;

    tracing::info!(enrollment_id = %enrollment.id, "Enrollment cancelled");
    Ok(Json(EnrollmentResponseDto {
        status: "success".to_string(),
        data: enrollment,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CourseStatus;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn published_course() -> Course {
        Course {
            id: Uuid::new_v4(),
            instructor_id: Uuid::new_v4(),
            title: "Async Rust in Practice".to_string(),
            description: "Tokio from the ground up".to_string(),
            price: Decimal::new(2999, 2),
            category: None,
            level: None,
            thumbnail_url: None,
            status: CourseStatus::Published,
            rejection_reason: None,
            capacity: None,
            enrollment_count: 0,
            published_at: Some(Utc::now()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn open_course_accepts_enrollment() {
        assert!(enroll_precheck(&published_course(), false).is_ok());
    }

    #[test]
    fn duplicate_enrollment_is_a_conflict_even_when_full() {
        let mut course = published_course();
        course.capacity = Some(1);
        course.enrollment_count = 1;

        let err = enroll_precheck(&course, true).unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "You are already enrolled in this course");
    }

    #[test]
    fn full_course_rejects_new_enrollment() {
        let mut course = published_course();
        course.capacity = Some(1);
        course.enrollment_count = 1;

        let err = enroll_precheck(&course, false).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Course is full");
    }

    #[test]
    fn unpublished_course_rejects_new_enrollment() {
        let mut course = published_course();
        course.status = CourseStatus::Draft;

        let err = enroll_precheck(&course, false).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Course is not open for enrollment");
    }
}
