use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{AuthData, PublicUser},
        extractors::{AuthUser, BearerToken},
        service::CredentialService,
    },
    envelope::{ApiResponse, Empty},
    error::ApiResult,
    payload::Payload,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip_all)]
pub async fn register(
    State(credentials): State<CredentialService>,
    payload: Payload,
) -> ApiResult<ApiResponse<AuthData>> {
    let data = credentials.register(payload).await?;
    Ok(ApiResponse::ok(data, "User registered successfully"))
}

/// A missing or unreadable body is treated like missing credentials.
#[instrument(skip_all)]
pub async fn login(
    State(credentials): State<CredentialService>,
    payload: Option<Payload>,
) -> ApiResult<ApiResponse<AuthData>> {
    let payload = payload.unwrap_or_default();
    let data = credentials
        .login(payload.str("email"), payload.str("password"))
        .await?;
    Ok(ApiResponse::ok(data, "User logged in successfully"))
}

#[instrument(skip_all)]
pub async fn logout(
    State(credentials): State<CredentialService>,
    BearerToken(token): BearerToken,
) -> ApiResult<ApiResponse<Empty>> {
    credentials.logout(&token).await?;
    Ok(ApiResponse::empty("User logged out successfully"))
}

#[instrument(skip_all, fields(user_id = %principal.user_id, token_id = %principal.token_id))]
pub async fn get_me(
    State(credentials): State<CredentialService>,
    AuthUser(principal): AuthUser,
) -> ApiResult<ApiResponse<PublicUser>> {
    let user = credentials.current_user(principal).await?;
    Ok(ApiResponse::ok(user, "User retrieved successfully"))
}
