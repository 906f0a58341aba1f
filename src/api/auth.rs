use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
    Extension, Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::crypto::{hash_password_async, verify_password_async};
use crate::db::{
    AuthResponse, LoginRequest, ProfileChanges, ProfileResponse, RegisterRequest, User,
    UserProfile, UserSummary,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    check_update_fields, normalize_email, optional_text, validate_bio, validate_email,
    validate_password, validate_username, PROFILE_UPDATE_FIELDS,
};

/// Response for token verification
#[derive(Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

/// Register a new account and log it in
///
/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let Json(request) = payload?;

    let username = request.username.trim().to_string();
    let email = normalize_email(&request.email);

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_username(&username) {
        errors.add("username", e);
    }
    if let Err(e) = validate_email(&email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&request.password) {
        errors.add("password", e);
    }
    errors.finish()?;

    if User::identity_taken(&state.db, &username, &email).await? {
        return Err(ApiError::conflict("User already exists"));
    }

    let password_hash = hash_password_async(request.password).await?;
    let user = User::create(&state.db, &username, &email, &password_hash).await?;
    let token = state.tokens.issue(&user.id)?;

    tracing::info!(user_id = %user.id, "Registered new user");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserSummary::from(user),
        }),
    ))
}

/// Exchange email and password for a session token
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(request) = payload?;
    let email = normalize_email(&request.email);

    let user = User::find_by_email(&state.db, &email).await?;

    // Unknown emails still pay for one hash verification
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    if !verify_password_async(request.password, stored_hash).await {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;
    let token = state.tokens.issue(&user.id)?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse {
        token,
        user: UserSummary::from(user),
    }))
}

/// Confirm that the presented token is valid
///
/// GET /api/auth/verify
pub async fn verify(Extension(_user): Extension<User>) -> Json<VerifyResponse> {
    Json(VerifyResponse { valid: true })
}

/// Get the caller's profile
///
/// GET /api/auth/profile
pub async fn get_profile(Extension(user): Extension<User>) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        user: UserProfile::from(user),
    })
}

/// Update a subset of the caller's profile fields
///
/// PATCH /api/auth/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let Json(body) = payload?;
    let fields = check_update_fields(&body, PROFILE_UPDATE_FIELDS)?;

    let mut changes = ProfileChanges::default();
    let mut new_password = None;
    let mut errors = ValidationErrorBuilder::new();

    for (key, value) in fields {
        match key.as_str() {
            "username" => match value.as_str().map(str::trim) {
                Some(username) => match validate_username(username) {
                    Ok(()) => changes.username = Some(username.to_string()),
                    Err(e) => {
                        errors.add("username", e);
                    }
                },
                None => {
                    errors.add("username", "Username must be a string");
                }
            },
            "email" => match value.as_str().map(normalize_email) {
                Some(email) => match validate_email(&email) {
                    Ok(()) => changes.email = Some(email),
                    Err(e) => {
                        errors.add("email", e);
                    }
                },
                None => {
                    errors.add("email", "Email must be a string");
                }
            },
            "password" | "secret" => match value.as_str() {
                Some(password) => match validate_password(password) {
                    Ok(()) => new_password = Some(password.to_string()),
                    Err(e) => {
                        errors.add("password", e);
                    }
                },
                None => {
                    errors.add("password", "Password must be a string");
                }
            },
            "bio" => match optional_text(value) {
                Ok(bio) => {
                    if let Some(Err(e)) = bio.as_deref().map(validate_bio) {
                        errors.add("bio", e);
                    }
                    changes.bio = Some(bio);
                }
                Err(()) => {
                    errors.add("bio", "Bio must be a string or null");
                }
            },
            "profilePicture" => match optional_text(value) {
                Ok(picture) => changes.profile_picture = Some(picture),
                Err(()) => {
                    errors.add("profilePicture", "Profile picture must be a string or null");
                }
            },
            _ => return Err(ApiError::invalid("Invalid updates")),
        }
    }
    errors.finish()?;

    if let Some(password) = new_password {
        changes.password_hash = Some(hash_password_async(password).await?);
    }

    let updated = User::update_profile(&state.db, &user.id, &changes).await?;

    tracing::info!(user_id = %updated.id, "Updated user profile");

    Ok(Json(ProfileResponse {
        user: UserProfile::from(updated),
    }))
}

/// Extract the bearer token from the Authorization header
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get("Authorization")?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Auth middleware: resolves the bearer token to a user and attaches it to
/// the request, or rejects with 401 "Please authenticate".
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers()).ok_or_else(ApiError::unauthenticated)?;

    let user_id = state.tokens.verify(token).map_err(|e| {
        tracing::debug!("Rejected session token: {}", e);
        ApiError::unauthenticated()
    })?;

    let user = User::get_by_id(&state.db, &user_id)
        .await?
        .ok_or_else(|| {
            tracing::debug!(user_id = %user_id, "Token refers to a missing user");
            ApiError::unauthenticated()
        })?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
