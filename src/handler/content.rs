use crate::{
    AppState,
    db::{ContentExt, CourseExt},
    dtos::{
        CreateLessonDto, CreateModuleDto, LessonListResponseDto, LessonResponseDto,
        ModuleListResponseDto, ModuleResponseDto, Response, UpdateLessonDto, UpdateModuleDto,
    },
    error::{ErrorMessage, HttpError},
    handler::course::optional_caller,
    middleware::{JWTAuthMiddleware, auth},
    models::{Course, CourseModule, CourseStatus, Lesson, User},
};
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// Router for module and lesson content, nested under a course. Reads follow
/// the course's visibility; mutations are owner/admin only.
pub fn content_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_modules))
        .route(
            "/",
            post(create_module)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/{module_id}",
            put(update_module)
                .delete(delete_module)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/{module_id}/lessons", get(get_lessons))
        .route(
            "/{module_id}/lessons",
            post(create_lesson)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/{module_id}/lessons/{lesson_id}",
            put(update_lesson)
                .delete(delete_lesson)
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

async fn get_course_or_404(app_state: &AppState, course_id: Uuid) -> Result<Course, HttpError> {
    app_state
        .db_client
        .get_course(course_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting course: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Course not found"))
}

/// Content reads mirror the course-detail rule: published is public, any
/// other status is visible to owner/admin only (and 404 otherwise).
async fn check_read_access(
    app_state: &AppState,
    course: &Course,
    headers: &HeaderMap,
) -> Result<(), HttpError> {
    if course.status == CourseStatus::Published {
        return Ok(());
    }

    let allowed = optional_caller(app_state, headers)
        .await
        .map(|user| user.can_manage_course(course))
        .unwrap_or(false);

    if allowed {
        Ok(())
    } else {
        Err(HttpError::not_found("Course not found"))
    }
}

fn check_write_access(caller: &User, course: &Course) -> Result<(), HttpError> {
    if caller.can_manage_course(course) {
        Ok(())
    } else {
        Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ))
    }
}

/// Fetch a module and verify it belongs to the course in the path.
async fn get_module_in_course(
    app_state: &AppState,
    course_id: Uuid,
    module_id: Uuid,
) -> Result<CourseModule, HttpError> {
    let module = app_state
        .db_client
        .get_module(module_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting module: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Module not found"))?;

    if module.course_id != course_id {
        return Err(HttpError::not_found("Module not found"));
    }

    Ok(module)
}

async fn get_lesson_in_module(
    app_state: &AppState,
    module_id: Uuid,
    lesson_id: Uuid,
) -> Result<Lesson, HttpError> {
    let lesson = app_state
        .db_client
        .get_lesson(lesson_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting lesson: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Lesson not found"))?;

    if lesson.module_id != module_id {
        return Err(HttpError::not_found("Lesson not found"));
    }

    Ok(lesson)
}

/// Modules of a course, ordered by sort_order.
#[instrument(skip(app_state, headers))]
pub async fn get_modules(
    Path(course_id): Path<Uuid>,
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    let course = get_course_or_404(&app_state, course_id).await?;
    check_read_access(&app_state, &course, &headers).await?;

    let modules = app_state.db_client.get_modules(course.id).await.map_err(|e| {
        tracing::error!("DB error, listing modules: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    Ok(Json(ModuleListResponseDto {
        status: "success".to_string(),
        data: modules,
    }))
}

/// Add a module. sort_order defaults to the next free slot.
#[instrument(skip(user, app_state, body), fields(user_id = %user.user.id, course_id = %course_id))]
pub async fn create_module(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Json(body): Json<CreateModuleDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let course = get_course_or_404(&app_state, course_id).await?;
    check_write_access(&user.user, &course)?;

    let module = app_state
        .db_client
        .create_module(course.id, &body.title, body.sort_order)
        .await
        .map_err(|e| {
            tracing::error!("DB error, creating module: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok((
        StatusCode::CREATED,
        Json(ModuleResponseDto {
            status: "success".to_string(),
            data: module,
        }),
    ))
}

#[instrument(skip(user, app_state, body), fields(user_id = %user.user.id, module_id = %module_id))]
pub async fn update_module(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path((course_id, module_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateModuleDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let course = get_course_or_404(&app_state, course_id).await?;
    check_write_access(&user.user, &course)?;

    let module = get_module_in_course(&app_state, course.id, module_id).await?;

    let module = app_state
        .db_client
        .update_module(
            module.id,
            body.title.as_deref().unwrap_or(&module.title),
            body.sort_order.unwrap_or(module.sort_order),
        )
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating module: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(ModuleResponseDto {
        status: "success".to_string(),
        data: module,
    }))
}

/// Delete a module. Its lessons go with it and later siblings shift down to
/// keep the order dense.
#[instrument(skip(user, app_state), fields(user_id = %user.user.id, module_id = %module_id))]
pub async fn delete_module(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path((course_id, module_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HttpError> {
    let course = get_course_or_404(&app_state, course_id).await?;
    check_write_access(&user.user, &course)?;

    get_module_in_course(&app_state, course.id, module_id).await?;

    app_state
        .db_client
        .delete_module(module_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => HttpError::not_found("Module not found"),
            _ => {
                tracing::error!("DB error, deleting module: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    Ok(Json(Response {
        status: "success",
        message: "Module deleted successfully".to_string(),
    }))
}

/// Lessons of a module, ordered by sort_order.
#[instrument(skip(app_state, headers))]
pub async fn get_lessons(
    Path((course_id, module_id)): Path<(Uuid, Uuid)>,
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    let course = get_course_or_404(&app_state, course_id).await?;
    check_read_access(&app_state, &course, &headers).await?;

    let module = get_module_in_course(&app_state, course.id, module_id).await?;

    let lessons = app_state.db_client.get_lessons(module.id).await.map_err(|e| {
        tracing::error!("DB error, listing lessons: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    Ok(Json(LessonListResponseDto {
        status: "success".to_string(),
        data: lessons,
    }))
}

/// Add a lesson. New lessons start DRAFT; their status is independent of the
/// parent course's lifecycle.
#[instrument(skip(user, app_state, body), fields(user_id = %user.user.id, module_id = %module_id))]
pub async fn create_lesson(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path((course_id, module_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<CreateLessonDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let course = get_course_or_404(&app_state, course_id).await?;
    check_write_access(&user.user, &course)?;

    let module = get_module_in_course(&app_state, course.id, module_id).await?;

    let lesson = app_state
        .db_client
        .create_lesson(
            module.id,
            &body.title,
            body.content.as_deref().unwrap_or(""),
            body.lesson_type,
            body.sort_order,
            body.duration_minutes,
            body.video_url.as_deref(),
        )
        .await
        .map_err(|e| {
            tracing::error!("DB error, creating lesson: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok((
        StatusCode::CREATED,
        Json(LessonResponseDto {
            status: "success".to_string(),
            data: lesson,
        }),
    ))
}

#[instrument(skip(user, app_state, body), fields(user_id = %user.user.id, lesson_id = %lesson_id))]
pub async fn update_lesson(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path((course_id, module_id, lesson_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(body): Json<UpdateLessonDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let course = get_course_or_404(&app_state, course_id).await?;
    check_write_access(&user.user, &course)?;

    let module = get_module_in_course(&app_state, course.id, module_id).await?;
    let lesson = get_lesson_in_module(&app_state, module.id, lesson_id).await?;

    let lesson = app_state
        .db_client
        .update_lesson(
            lesson.id,
            body.title.as_deref().unwrap_or(&lesson.title),
            body.content.as_deref().unwrap_or(&lesson.content),
            body.lesson_type.unwrap_or(lesson.lesson_type),
            body.status.unwrap_or(lesson.status),
            body.sort_order.unwrap_or(lesson.sort_order),
            body.duration_minutes.or(lesson.duration_minutes),
            body.video_url.as_deref().or(lesson.video_url.as_deref()),
        )
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating lesson: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(LessonResponseDto {
        status: "success".to_string(),
        data: lesson,
    }))
}

/// Delete a lesson and compact the remaining sibling order.
#[instrument(skip(user, app_state), fields(user_id = %user.user.id, lesson_id = %lesson_id))]
pub async fn delete_lesson(
    Extension(user): Extension<JWTAuthMiddleware>,
    State(app_state): State<AppState>,
    Path((course_id, module_id, lesson_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, HttpError> {
    let course = get_course_or_404(&app_state, course_id).await?;
    check_write_access(&user.user, &course)?;

    let module = get_module_in_course(&app_state, course.id, module_id).await?;
    get_lesson_in_module(&app_state, module.id, lesson_id).await?;

    app_state
        .db_client
        .delete_lesson(lesson_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => HttpError::not_found("Lesson not found"),
            _ => {
                tracing::error!("DB error, deleting lesson: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    Ok(Json(Response {
        status: "success",
        message: "Lesson deleted successfully".to_string(),
    }))
}
