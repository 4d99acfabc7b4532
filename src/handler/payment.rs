use crate::{
    AppState,
    db::{ActivityEvent, ActivityExt, CourseExt, PaymentExt},
    dtos::{
        InitiatePaymentDto, InitiatePaymentResponseDto, PaymentListResponseDto,
        PaymentResponseDto, PaymentStatsDto, ProcessPaymentDto,
    },
    error::{ErrorMessage, HttpError},
    middleware::{JWTAuthMiddleware, role_check},
    models::{Course, PaymentStatus, UserRole},
};
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// Router for the simulated payment flow. All routes require auth (applied
/// in routes.rs); stats are additionally instructor/admin only.
pub fn payment_handler() -> Router<AppState> {
    Router::new()
        .route("/initiate", post(initiate_payment))
        .route("/{payment_id}/process", post(process_payment))
        .route("/my", get(get_my_payments))
        .route("/course/{course_id}", get(get_course_payments))
        .route(
            "/stats",
            get(get_payment_stats).layer(middleware::from_fn(|req, next| {
                role_check(req, next, vec![UserRole::Instructor, UserRole::Admin])
            })),
        )
}

/// A course can be bought only while it is published and has a seat left.
/// Completion re-checks the seat inside the transaction; this is the
/// fail-fast version for initiation.
fn purchase_precheck(course: &Course) -> Result<(), HttpError> {
    if !course.status.is_enrollable() {
        return Err(HttpError::bad_request("Course is not available for purchase"));
    }

    if !course.has_capacity() {
        return Err(HttpError::bad_request("Course is full"));
    }

    Ok(())
}

/// Start a payment for a published course. The amount must match the course
/// price exactly; the response carries the handle the client uses to
/// complete the simulated flow.
#[instrument(skip(user, app_state, body), fields(user_id = %user.user.id))]
pub async fn initiate_payment(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Json(body): Json<InitiatePaymentDto>,
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

    purchase_precheck(&course)?;

    let amount = Decimal::try_from(body.amount)
        .map_err(|_| HttpError::bad_request("Amount is not a valid value"))?;

    if amount != course.price {
        return Err(HttpError::bad_request(
            "Amount does not match the course price",
        ));
    }

    let transaction_id = format!("txn_{}", Uuid::new_v4().simple());

    let payment = app_state
        .db_client
        .create_payment(user.user.id, course.id, amount, &transaction_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, creating payment: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    app_state
        .db_client
        .record_activity(ActivityEvent {
            course_id: Some(course.id),
            payment_id: Some(payment.id),
            ..ActivityEvent::new("payment.initiated", user.user.id)
        })
        .await;

    tracing::info!(payment_id = %payment.id, "Payment initiated");
    Ok((
        StatusCode::CREATED,
        Json(InitiatePaymentResponseDto {
            status: "success".to_string(),
            payment_id: payment.id,
            transaction_id: payment.transaction_id.clone(),
            processing_url: format!(
                "{}/payments/{}/process",
                app_state.env.frontend_url, payment.id
            ),
        }),
    ))
}

/// Gateway callback for the simulated flow. A completed payment creates the
/// enrollment; a payment already in a terminal state is acknowledged without
/// any further side effects, so retried callbacks are harmless.
#[instrument(skip(user, app_state, body), fields(user_id = %user.user.id, payment_id = %payment_id))]
pub async fn process_payment(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(body): Json<ProcessPaymentDto>,
) -> Result<impl IntoResponse, HttpError> {
    let payment = app_state
        .db_client
        .get_payment(payment_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting payment: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Payment not found"))?;

    if payment.user_id != user.user.id && user.user.role != UserRole::Admin {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    // Idempotency guard: terminal payments never transition again.
    if payment.status.is_terminal() {
        return Ok(Json(PaymentResponseDto {
            status: "success".to_string(),
            data: payment,
        }));
    }

    let payment = match body.status {
        PaymentStatus::Completed => app_state
            .db_client
            .complete_payment(payment.id, body.external_transaction_id.as_deref())
            .await,
        PaymentStatus::Failed => app_state.db_client.fail_payment(payment.id).await,
        _ => {
            return Err(HttpError::bad_request(
                "Processing outcome must be completed or failed",
            ));
        }
    }
    .map_err(|e| match e {
        // A concurrent callback won the status-guarded update.
        sqlx::Error::RowNotFound => HttpError::conflict("Payment was already processed"),
        // The capacity-guarded counter update found no seat left.
        sqlx::Error::Protocol(message) => HttpError::bad_request(message),
        _ => {
            tracing::error!("DB error, processing payment: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        }
    })?;

    let completed = payment.status == PaymentStatus::Completed;

    app_state
        .db_client
        .record_activity(ActivityEvent {
            course_id: Some(payment.course_id),
            payment_id: Some(payment.id),
            ..ActivityEvent::new(
                if completed {
                    "payment.completed"
                } else {
                    "payment.failed"
                },
                user.user.id,
            )
        })
        .await;

    tracing::info!(payment_id = %payment.id, completed, "Payment processed");
    Ok(Json(PaymentResponseDto {
        status: "success".to_string(),
        data: payment,
    }))
}

/// The caller's payment history, newest first.
#[instrument(skip(user, app_state), fields(user_id = %user.user.id))]
pub async fn get_my_payments(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let payments = app_state
        .db_client
        .get_my_payments(user.user.id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, listing payments: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(PaymentListResponseDto {
        status: "success".to_string(),
        data: payments,
    }))
}

/// Payment ledger for a course: owning instructor or admin only.
#[instrument(skip(user, app_state), fields(user_id = %user.user.id, course_id = %course_id))]
pub async fn get_course_payments(
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

    let payments = app_state
        .db_client
        .get_course_payments(course.id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, listing course payments: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(PaymentListResponseDto {
        status: "success".to_string(),
        data: payments,
    }))
}

/// Revenue summary over the caller's own courses.
#[instrument(skip(user, app_state), fields(user_id = %user.user.id))]
pub async fn get_payment_stats(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let stats = app_state
        .db_client
        .get_payment_stats(user.user.id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting payment stats: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(PaymentStatsDto {
        status: "success".to_string(),
        total_revenue: stats.total_revenue,
        monthly_revenue: stats.monthly_revenue,
        completed_count: stats.completed_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CourseStatus;
    use chrono::Utc;

    fn published_course() -> Course {
        Course {
            id: Uuid::new_v4(),
            instructor_id: Uuid::new_v4(),
            title: "Rust for Backend Engineers".to_string(),
            description: "From ownership to production".to_string(),
            price: Decimal::new(4999, 2),
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
    fn purchase_allowed_for_published_course_with_seats() {
        let mut course = published_course();
        course.capacity = Some(10);
        course.enrollment_count = 9;
        assert!(purchase_precheck(&course).is_ok());
    }

    #[test]
    fn purchase_rejected_for_unpublished_course() {
        let mut course = published_course();
        course.status = CourseStatus::Draft;
        let err = purchase_precheck(&course).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Course is not available for purchase");
    }

    #[test]
    fn purchase_rejected_when_course_is_full() {
        let mut course = published_course();
        course.capacity = Some(1);
        course.enrollment_count = 1;
        let err = purchase_precheck(&course).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Course is full");
    }
}
