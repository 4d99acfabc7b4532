use crate::{
    AppState,
    db::{ActivityEvent, ActivityExt, UserExt},
    dtos::{
        ActivityListResponseDto, ApplicationListResponseDto, ApplicationResponseDto,
        ApplyInstructorDto, FilterUserDto, RequestQueryDto, ReviewApplicationDto, UserData,
        UserListResponseDto, UserResponseDto,
    },
    error::{ErrorMessage, HttpError},
    mail::mails::send_application_result_email,
    middleware::{JWTAuthMiddleware, role_check},
    models::{ApplicationStatus, UserRole},
};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// Router for user-profile, admin, and instructor-application endpoints.
///
/// All routes are protected by the auth middleware (applied in routes.rs);
/// admin-only routes carry an additional role gate.
pub fn users_handler() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route(
            "/",
            get(get_users).layer(middleware::from_fn(|req, next| {
                role_check(req, next, vec![UserRole::Admin])
            })),
        )
        .route(
            "/apply-instructor",
            post(apply_instructor).layer(middleware::from_fn(|req, next| {
                // Instructors pass the gate so a repeat application can be
                // answered with a conflict instead of a 403.
                role_check(req, next, vec![UserRole::Student, UserRole::Instructor])
            })),
        )
        .route(
            "/applications",
            get(get_pending_applications).layer(middleware::from_fn(|req, next| {
                role_check(req, next, vec![UserRole::Admin])
            })),
        )
        .route(
            "/applications/{application_id}",
            patch(review_application).layer(middleware::from_fn(|req, next| {
                role_check(req, next, vec![UserRole::Admin])
            })),
        )
        .route(
            "/activity",
            get(get_activity).layer(middleware::from_fn(|req, next| {
                role_check(req, next, vec![UserRole::Admin])
            })),
        )
}

/// Current user's profile.
#[instrument(skip(user), fields(user_id = %user.user.id))]
pub async fn get_me(
    Extension(user): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let filtered_user = FilterUserDto::filter_user(&user.user);

    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: filtered_user,
        },
    }))
}

/// Paginated user listing (admin only).
#[instrument(skip(app_state))]
pub async fn get_users(
    Query(query_params): Query<RequestQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query_params.page.unwrap_or(1);
    let limit = query_params.limit.unwrap_or(10);

    let users = app_state
        .db_client
        .get_users(page, limit)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting users: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let user_count = app_state.db_client.get_user_count().await.map_err(|e| {
        tracing::error!("DB error, getting user count: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    Ok(Json(UserListResponseDto {
        status: "success".to_string(),
        users: FilterUserDto::filter_users(&users),
        results: user_count,
    }))
}

/// A previous application blocks a new one unless it was rejected.
fn application_conflict(status: ApplicationStatus) -> Option<&'static str> {
    match status {
        ApplicationStatus::Pending => Some("You already have a pending application"),
        ApplicationStatus::Approved => Some("Your application was already approved"),
        ApplicationStatus::Rejected => None,
    }
}

/// Submit an instructor application. One open application per user; a new
/// application is allowed again only after a rejection.
#[instrument(skip(user, app_state, body), fields(user_id = %user.user.id))]
pub async fn apply_instructor(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Json(body): Json<ApplyInstructorDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    if let Some(latest) = app_state
        .db_client
        .get_latest_application(user.user.id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting latest application: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
    {
        if let Some(message) = application_conflict(latest.status) {
            return Err(HttpError::conflict(message));
        }
    }

    let application = app_state
        .db_client
        .create_application(user.user.id, &body.motivation)
        .await
        .map_err(|e| {
            tracing::error!("DB error, creating application: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    app_state
        .db_client
        .record_activity(ActivityEvent {
            details: Some("instructor application submitted".to_string()),
            ..ActivityEvent::new("application.submitted", user.user.id)
        })
        .await;

    tracing::info!(application_id = %application.id, "Instructor application submitted");
    Ok((
        StatusCode::CREATED,
        Json(ApplicationResponseDto {
            status: "success".to_string(),
            data: application,
        }),
    ))
}

/// Pending instructor applications, oldest first (admin only).
#[instrument(skip(app_state))]
pub async fn get_pending_applications(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let applications = app_state
        .db_client
        .get_pending_applications()
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting pending applications: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(ApplicationListResponseDto {
        status: "success".to_string(),
        data: applications,
    }))
}

/// Approve or reject an instructor application (admin only). Approval flips
/// the applicant's role to instructor; rejection requires a reason.
#[instrument(skip(admin, app_state, body), fields(admin_id = %admin.user.id, application_id = %application_id))]
pub async fn review_application(
    Extension(admin): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Json(body): Json<ReviewApplicationDto>,
) -> Result<impl IntoResponse, HttpError> {
    if body.status == ApplicationStatus::Pending {
        return Err(HttpError::bad_request(
            "Decision must be approved or rejected",
        ));
    }
    if body.status == ApplicationStatus::Rejected
        && body.reason.as_deref().map(str::trim).unwrap_or("").is_empty()
    {
        return Err(HttpError::bad_request("A rejection requires a reason"));
    }

    let application = app_state
        .db_client
        .get_application(application_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting application: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Application not found"))?;

    if application.status != ApplicationStatus::Pending {
        return Err(HttpError::conflict("Application was already reviewed"));
    }

    let application = app_state
        .db_client
        .review_application(
            application.id,
            application.user_id,
            body.status,
            body.reason.as_deref(),
            admin.user.id,
        )
        .await
        .map_err(|e| match e {
            // Lost the race against a concurrent review of the same application.
            sqlx::Error::RowNotFound => HttpError::conflict("Application was already reviewed"),
            _ => {
                tracing::error!("DB error, reviewing application: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    let approved = application.status == ApplicationStatus::Approved;

    if let Ok(Some(applicant)) = app_state
        .db_client
        .get_user(Some(application.user_id), None)
        .await
    {
        let mailer = app_state.mailer.clone();
        let reason = application.review_reason.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = send_application_result_email(
                &mailer,
                &applicant.email,
                &applicant.name,
                approved,
                reason.as_deref(),
            ) {
                tracing::error!("Failed to send application result email: {}", e);
            }
        });
    }

    app_state
        .db_client
        .record_activity(ActivityEvent {
            target_user_id: Some(application.user_id),
            details: Some(if approved {
                "instructor application approved".to_string()
            } else {
                "instructor application rejected".to_string()
            }),
            ..ActivityEvent::new(
                if approved {
                    "application.approved"
                } else {
                    "application.rejected"
                },
                admin.user.id,
            )
        })
        .await;

    tracing::info!(application_id = %application.id, approved, "Application reviewed");
    Ok(Json(ApplicationResponseDto {
        status: "success".to_string(),
        data: application,
    }))
}

/// Recent audit-log entries, newest first (admin only).
#[instrument(skip(app_state))]
pub async fn get_activity(
    Query(query_params): Query<RequestQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    query_params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let limit = query_params.limit.unwrap_or(50);

    let events = app_state
        .db_client
        .get_recent_activity(limit as i64)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting activity: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(ActivityListResponseDto {
        status: "success".to_string(),
        data: events,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_application_blocks_a_new_one() {
        assert_eq!(
            application_conflict(ApplicationStatus::Pending),
            Some("You already have a pending application")
        );
    }

    #[test]
    fn approved_instructor_reapplying_gets_a_conflict() {
        assert_eq!(
            application_conflict(ApplicationStatus::Approved),
            Some("Your application was already approved")
        );
    }

    #[test]
    fn rejected_applicant_may_apply_again() {
        assert_eq!(application_conflict(ApplicationStatus::Rejected), None);
    }
}
