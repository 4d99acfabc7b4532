use crate::{
    AppState,
    db::{ActivityEvent, ActivityExt, CourseExt, CourseFilters, UserExt},
    dtos::{
        CourseListResponseDto, CourseResponseDto, CoursesQueryParams, CreateCourseDto,
        InstructorCourseListResponseDto, PaginationDto, RejectCourseDto, Response, UpdateCourseDto,
    },
    error::{ErrorMessage, HttpError},
    handler::content::content_handler,
    middleware::{JWTAuthMiddleware, auth, role_check},
    models::{Course, CourseStatus, User, UserRole},
    utils::token,
};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post, put},
};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// Router for the course catalog and lifecycle endpoints.
///
/// Listing and published-course detail are public; everything else requires
/// auth, with role gates on creation and review.
pub fn course_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_courses))
        .route(
            "/",
            post(create_course)
                .route_layer(middleware::from_fn(|req, next| {
                    role_check(req, next, vec![UserRole::Instructor, UserRole::Admin])
                }))
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/my",
            get(get_my_courses)
                .route_layer(middleware::from_fn(|req, next| {
                    role_check(req, next, vec![UserRole::Instructor, UserRole::Admin])
                }))
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/{course_id}", get(get_course))
        .route(
            "/{course_id}",
            put(update_course)
                .delete(delete_course)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/{course_id}/submit",
            patch(submit_course)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/{course_id}/approve",
            patch(approve_course)
                .route_layer(middleware::from_fn(|req, next| {
                    role_check(req, next, vec![UserRole::Admin])
                }))
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/{course_id}/reject",
            patch(reject_course)
                .route_layer(middleware::from_fn(|req, next| {
                    role_check(req, next, vec![UserRole::Admin])
                }))
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/{course_id}/publish",
            patch(publish_course)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .nest("/{course_id}/modules", content_handler(app_state))
}

fn price_from_f64(price: f64) -> Result<Decimal, HttpError> {
    Decimal::try_from(price).map_err(|_| HttpError::bad_request("Price is not a valid amount"))
}

/// Look up a course and check that the caller may manage it.
async fn get_managed_course(
    app_state: &AppState,
    caller: &User,
    course_id: Uuid,
) -> Result<Course, HttpError> {
    let course = app_state
        .db_client
        .get_course(course_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting course: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Course not found"))?;

    if !caller.can_manage_course(&course) {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }

    Ok(course)
}

/// Public catalog: published courses only, filterable and paginated.
#[instrument(skip(app_state))]
pub async fn get_courses(
    Query(params): Query<CoursesQueryParams>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(10);

    let min_price = params.min_price.map(price_from_f64).transpose()?;
    let max_price = params.max_price.map(price_from_f64).transpose()?;

    let filters = CourseFilters {
        category: params.category,
        level: params.level,
        min_price,
        max_price,
        search: params.search,
    };

    let courses = app_state
        .db_client
        .get_published_courses(page, limit, &filters)
        .await
        .map_err(|e| {
            tracing::error!("DB error, listing courses: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total = app_state
        .db_client
        .get_published_course_count(&filters)
        .await
        .map_err(|e| {
            tracing::error!("DB error, counting courses: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total_pages = (total as f64 / limit as f64).ceil() as i32;

    Ok(Json(CourseListResponseDto {
        status: "success".to_string(),
        data: courses,
        pagination: PaginationDto {
            page,
            limit,
            total: total as i32,
            total_pages,
        },
    }))
}

/// Course detail. Published courses are public; any other status is visible
/// only to the owning instructor or an admin, identified by an optional
/// bearer token.
#[instrument(skip(app_state, headers))]
pub async fn get_course(
    Path(course_id): Path<Uuid>,
    State(app_state): State<AppState>,
    headers: HeaderMap,
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

    if course.status != CourseStatus::Published {
        let caller = optional_caller(&app_state, &headers).await;
        let allowed = caller
            .map(|user| user.can_manage_course(&course))
            .unwrap_or(false);
        // Unpublished courses stay invisible rather than forbidden.
        if !allowed {
            return Err(HttpError::not_found("Course not found"));
        }
    }

    Ok(Json(CourseResponseDto {
        status: "success".to_string(),
        data: course,
    }))
}

/// Best-effort caller identification for routes that are public but show
/// more to owners and admins.
pub(crate) async fn optional_caller(app_state: &AppState, headers: &HeaderMap) -> Option<User> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))?;

    let claims = token::decode_token(bearer, app_state.env.jwt_secret.as_bytes()).ok()?;
    let user_id = Uuid::parse_str(&claims.sub).ok()?;

    app_state
        .db_client
        .get_user(Some(user_id), None)
        .await
        .ok()
        .flatten()
}

/// The caller's own courses in every lifecycle state.
#[instrument(skip(user, app_state), fields(user_id = %user.user.id))]
pub async fn get_my_courses(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let courses = app_state
        .db_client
        .get_instructor_courses(user.user.id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, listing instructor courses: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(InstructorCourseListResponseDto {
        status: "success".to_string(),
        data: courses,
    }))
}

/// Create a course. Always starts DRAFT no matter what the client sends.
#[instrument(skip(user, app_state, body), fields(user_id = %user.user.id))]
pub async fn create_course(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Json(body): Json<CreateCourseDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let price = price_from_f64(body.price)?;

    let course = app_state
        .db_client
        .create_course(
            user.user.id,
            &body.title,
            &body.description,
            price,
            body.category.as_deref(),
            body.level.as_deref(),
            body.thumbnail_url.as_deref(),
            body.capacity,
        )
        .await
        .map_err(|e| {
            tracing::error!("DB error, creating course: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!(course_id = %course.id, "Course created");
    Ok((
        StatusCode::CREATED,
        Json(CourseResponseDto {
            status: "success".to_string(),
            data: course,
        }),
    ))
}

/// Update course fields. Owner or admin; omitted fields keep their value.
#[instrument(skip(user, app_state, body), fields(user_id = %user.user.id, course_id = %course_id))]
pub async fn update_course(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Json(body): Json<UpdateCourseDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let course = get_managed_course(&app_state, &user.user, course_id).await?;

    let price = match body.price {
        Some(price) => price_from_f64(price)?,
        None => course.price,
    };

    let course = app_state
        .db_client
        .update_course(
            course.id,
            body.title.as_deref().unwrap_or(&course.title),
            body.description.as_deref().unwrap_or(&course.description),
            price,
            body.category.as_deref().or(course.category.as_deref()),
            body.level.as_deref().or(course.level.as_deref()),
            body.thumbnail_url
                .as_deref()
                .or(course.thumbnail_url.as_deref()),
            body.capacity.or(course.capacity),
        )
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating course: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(CourseResponseDto {
        status: "success".to_string(),
        data: course,
    }))
}

/// Delete a course. Owner or admin; enrollments, modules, and lessons go
/// with it via FK cascade.
#[instrument(skip(user, app_state), fields(user_id = %user.user.id, course_id = %course_id))]
pub async fn delete_course(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let course = get_managed_course(&app_state, &user.user, course_id).await?;

    app_state
        .db_client
        .delete_course(course.id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => HttpError::not_found("Course not found"),
            _ => {
                tracing::error!("DB error, deleting course: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    tracing::info!(course_id = %course.id, "Course deleted");
    Ok(Json(Response {
        status: "success",
        message: "Course deleted successfully".to_string(),
    }))
}

/// Submit a draft for review. Owner only; DRAFT is the only legal source
/// state.
#[instrument(skip(user, app_state), fields(user_id = %user.user.id, course_id = %course_id))]
pub async fn submit_course(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let course = get_managed_course(&app_state, &user.user, course_id).await?;

    if !course.status.can_submit() {
        return Err(HttpError::bad_request(
            "Only a draft course can be submitted for review",
        ));
    }

    let course = app_state
        .db_client
        .set_course_status(course.id, CourseStatus::PendingReview, None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, submitting course: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    app_state
        .db_client
        .record_activity(ActivityEvent {
            course_id: Some(course.id),
            ..ActivityEvent::new("course.submitted", user.user.id)
        })
        .await;

    Ok(Json(CourseResponseDto {
        status: "success".to_string(),
        data: course,
    }))
}

/// Approve a submitted course (admin only).
#[instrument(skip(admin, app_state), fields(admin_id = %admin.user.id, course_id = %course_id))]
pub async fn approve_course(
    Extension(admin): Extension<JWTAuthMiddleware>,
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

    if !course.status.can_review() {
        return Err(HttpError::bad_request(
            "Only a course pending review can be approved",
        ));
    }

    let course = app_state
        .db_client
        .set_course_status(course.id, CourseStatus::Approved, None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, approving course: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    app_state
        .db_client
        .record_activity(ActivityEvent {
            course_id: Some(course.id),
            target_user_id: Some(course.instructor_id),
            ..ActivityEvent::new("course.approved", admin.user.id)
        })
        .await;

    tracing::info!(course_id = %course.id, "Course approved");
    Ok(Json(CourseResponseDto {
        status: "success".to_string(),
        data: course,
    }))
}

/// Reject a submitted course with a mandatory reason (admin only).
#[instrument(skip(admin, app_state, body), fields(admin_id = %admin.user.id, course_id = %course_id))]
pub async fn reject_course(
    Extension(admin): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Json(body): Json<RejectCourseDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let course = app_state
        .db_client
        .get_course(course_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting course: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Course not found"))?;

    if !course.status.can_review() {
        return Err(HttpError::bad_request(
            "Only a course pending review can be rejected",
        ));
    }

    let course = app_state
        .db_client
        .set_course_status(course.id, CourseStatus::Rejected, Some(&body.reason))
        .await
        .map_err(|e| {
            tracing::error!("DB error, rejecting course: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    app_state
        .db_client
        .record_activity(ActivityEvent {
            course_id: Some(course.id),
            target_user_id: Some(course.instructor_id),
            details: Some(body.reason.clone()),
            ..ActivityEvent::new("course.rejected", admin.user.id)
        })
        .await;

    tracing::info!(course_id = %course.id, "Course rejected");
    Ok(Json(CourseResponseDto {
        status: "success".to_string(),
        data: course,
    }))
}

/// Publish an approved course. Owner only; stamps published_at.
#[instrument(skip(user, app_state), fields(user_id = %user.user.id, course_id = %course_id))]
pub async fn publish_course(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let course = get_managed_course(&app_state, &user.user, course_id).await?;

    if !course.status.can_publish() {
        return Err(HttpError::bad_request(
            "Only an approved course can be published",
        ));
    }

    let course = app_state
        .db_client
        .set_course_status(course.id, CourseStatus::Published, None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, publishing course: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    app_state
        .db_client
        .record_activity(ActivityEvent {
            course_id: Some(course.id),
            ..ActivityEvent::new("course.published", user.user.id)
        })
        .await;

    tracing::info!(course_id = %course.id, "Course published");
    Ok(Json(CourseResponseDto {
        status: "success".to_string(),
        data: course,
    }))
}
