use crate::{
    AppState,
    db::UserExt,
    dtos::{AuthResponseDto, FilterUserDto, LoginUserDto, RegisterUserDto, ResendOtpDto, Response,
        VerifyOtpDto},
    error::{ErrorMessage, HttpError},
    mail::mails::{send_otp_email, send_welcome_email},
    models::UserStatus,
    utils::{otp, password, token},
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::{Duration, Utc};
use validator::Validate;

use tracing::instrument;

/// Router for authentication endpoints
pub fn auth_handler() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-otp", post(verify_otp))
        .route("/resend-otp", post(resend_otp))
        .route("/login", post(login))
}

/// Register a new account. Registration is OTP-gated: the user stays PENDING
/// and receives a 6-digit code by email; no token is issued until the code
/// is verified.
#[instrument(skip(app_state, body), fields(email = %body.email))]
pub async fn register(
    State(app_state): State<AppState>,
    Json(body): Json<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid register input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let hash_password = password::hash(&body.password).map_err(|e| {
        tracing::error!("Password hashing error: {}", e);
        HttpError::server_error(e.to_string())
    })?;

    // None means the email already belongs to an ACTIVE account.
    let user = app_state
        .db_client
        .save_pending_user(&body.name, &body.email, &hash_password)
        .await
        .map_err(|e| {
            tracing::error!("DB error, saving pending user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| {
            tracing::error!("Registration attempt for active email");
            HttpError::conflict("Email is already registered")
        })?;

    let code = otp::generate_code();
    let expires_at = Utc::now() + Duration::minutes(app_state.env.otp_expires_minutes);

    app_state
        .db_client
        .upsert_otp(user.id, &code, expires_at)
        .await
        .map_err(|e| {
            tracing::error!("DB error, saving otp: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    // Fire-and-forget: the caller gets a response before the email is
    // confirmed sent.
    let mailer = app_state.mailer.clone();
    let to_email = body.email.clone();
    let name = body.name.clone();
    let expires_minutes = app_state.env.otp_expires_minutes;
    tokio::task::spawn_blocking(move || {
        if let Err(e) = send_otp_email(&mailer, &to_email, &name, &code, expires_minutes) {
            tracing::error!("Failed to send otp email: {}", e);
        }
    });

    tracing::info!(email = %body.email, "Register successful, verification pending");
    Ok((
        StatusCode::CREATED,
        Json(Response {
            status: "success",
            message: "Registration successful! Please check your email for the verification code."
                .to_string(),
        }),
    ))
}

/// Verify the emailed one-time code, activate the account, and issue the
/// session token.
#[instrument(skip(app_state, body), fields(email = %body.email))]
pub async fn verify_otp(
    State(app_state): State<AppState>,
    Json(body): Json<VerifyOtpDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid verify_otp input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let user = app_state
        .db_client
        .get_user(None, Some(&body.email))
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("User not found"))?;

    if user.status == UserStatus::Active {
        return Err(HttpError::bad_request("Account is already verified"));
    }

    let stored = app_state.db_client.get_otp(user.id).await.map_err(|e| {
        tracing::error!("DB error, getting otp: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let stored = stored.ok_or_else(|| {
        HttpError::bad_request("No verification code found, please request a new one")
    })?;

    if stored.is_expired(Utc::now()) {
        // Expired codes are consumed so they cannot be retried.
        app_state.db_client.delete_otp(user.id).await.map_err(|e| {
            tracing::error!("DB error, deleting expired otp: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
        return Err(HttpError::bad_request(
            "Verification code expired, please request a new one",
        ));
    }

    if stored.code != body.code {
        tracing::error!(user_id = %user.id, "OTP mismatch");
        return Err(HttpError::unauthorized("Invalid verification code"));
    }

    let user = app_state.db_client.activate_user(user.id).await.map_err(|e| {
        tracing::error!(user_id = %user.id, "DB error, activating user: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let session_token = token::create_token(
        &user,
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let mailer = app_state.mailer.clone();
    let to_email = user.email.clone();
    let name = user.name.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = send_welcome_email(&mailer, &to_email, &name) {
            tracing::error!("Failed to send welcome email: {}", e);
        }
    });

    tracing::info!(user_id = %user.id, "Email verification successful");
    Ok(Json(AuthResponseDto {
        status: "success".to_string(),
        token: session_token,
        user: FilterUserDto::filter_user(&user),
    }))
}

/// Re-issue the one-time code. Requests inside the cooldown window get 429.
#[instrument(skip(app_state, body), fields(email = %body.email))]
pub async fn resend_otp(
    State(app_state): State<AppState>,
    Json(body): Json<ResendOtpDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid resend_otp input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let user = app_state
        .db_client
        .get_user(None, Some(&body.email))
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("User not found"))?;

    if user.status == UserStatus::Active {
        return Err(HttpError::bad_request("Account is already verified"));
    }

    if let Some(existing) = app_state.db_client.get_otp(user.id).await.map_err(|e| {
        tracing::error!("DB error, getting otp: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })? {
        if existing.in_resend_cooldown(Utc::now(), app_state.env.otp_resend_cooldown_seconds) {
            return Err(HttpError::too_many_requests(
                "Please wait before requesting another code",
            ));
        }
    }

    let code = otp::generate_code();
    let expires_at = Utc::now() + Duration::minutes(app_state.env.otp_expires_minutes);

    app_state
        .db_client
        .upsert_otp(user.id, &code, expires_at)
        .await
        .map_err(|e| {
            tracing::error!("DB error, saving otp: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let mailer = app_state.mailer.clone();
    let to_email = user.email.clone();
    let name = user.name.clone();
    let expires_minutes = app_state.env.otp_expires_minutes;
    tokio::task::spawn_blocking(move || {
        if let Err(e) = send_otp_email(&mailer, &to_email, &name, &code, expires_minutes) {
            tracing::error!("Failed to send otp email: {}", e);
        }
    });

    tracing::info!(user_id = %user.id, "OTP resent");
    Ok(Json(Response {
        status: "success",
        message: "A new verification code has been sent to your email.".to_string(),
    }))
}

/// Login. Unknown email and wrong password both answer with the same
/// "Invalid credentials" so neither case is distinguishable.
#[instrument(skip(app_state, body), fields(email = %body.email))]
pub async fn login(
    State(app_state): State<AppState>,
    Json(body): Json<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid login input: {}", e);
        HttpError::bad_request(e.to_string())
    })?;

    let user = app_state
        .db_client
        .get_user(None, Some(&body.email))
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| {
            tracing::error!("User not found");
            HttpError::unauthorized(ErrorMessage::InvalidCredentials.to_string())
        })?;

    let stored_hash = user.password.as_deref().ok_or_else(|| {
        tracing::error!(user_id = %user.id, "Password login for federated-only account");
        HttpError::unauthorized(ErrorMessage::InvalidCredentials.to_string())
    })?;

    let password_matched = password::compare(&body.password, stored_hash).map_err(|e| {
        tracing::error!("Password error: {}", e);
        HttpError::unauthorized(ErrorMessage::InvalidCredentials.to_string())
    })?;

    if !password_matched {
        tracing::error!(user_id = %user.id, "Password mismatch");
        return Err(HttpError::unauthorized(
            ErrorMessage::InvalidCredentials.to_string(),
        ));
    }

    if user.status != UserStatus::Active {
        return Err(HttpError::unauthorized(
            "Account not verified. Please verify your email first.",
        ));
    }

    let session_token = token::create_token(
        &user,
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| {
        tracing::error!("Token creation error: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    tracing::info!(user_id = %user.id, "Login successful");
    Ok(Json(AuthResponseDto {
        status: "success".to_string(),
        token: session_token,
        user: FilterUserDto::filter_user(&user),
    }))
}
