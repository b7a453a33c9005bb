//! HTTP surface for the credential lifecycle, mounted under
//! `/api/v1/users`.
//!
//! Handlers stay thin: extraction, the session guard where required, then a
//! call into [`AuthService`]. Success responses use the service-wide
//! envelope `{status, token?, data: {user}}`; session tokens travel both in
//! the body and as the `jwt` cookie.

use axum::{
    extract::{Extension, Path},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::require_role;
use crate::error::Error;
use crate::identity::{Identity, PublicIdentity, Role};
use crate::service::AuthService;
use crate::session::{
    authenticate, identify_if_present, logout_cookie, request_is_secure, session_cookie,
};

/// Build the subsystem router. The host service merges this into its app.
pub fn router(service: Arc<AuthService>) -> Router {
    let users = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/:token", patch(reset_password))
        .route("/update-password", patch(update_password))
        .route("/me", get(me).delete(deactivate_me))
        .route("/session", get(session))
        .route("/:id/role", patch(set_role));
    Router::new()
        .nest("/api/v1/users", users)
        .layer(Extension(service))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub password_current: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IdentityData {
    pub user: PublicIdentity,
}

/// Success envelope carrying a fresh session token.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionEnvelope {
    pub status: &'static str,
    pub token: String,
    pub data: IdentityData,
}

/// Success envelope without a token.
#[derive(Debug, Serialize, ToSchema)]
pub struct IdentityEnvelope {
    pub status: &'static str,
    pub data: IdentityData,
}

/// Requesting scheme://host, for links sent back out to the client.
fn request_origin(headers: &HeaderMap) -> String {
    let proto = if request_is_secure(headers) {
        "https"
    } else {
        "http"
    };
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("{proto}://{host}")
}

#[utoipa::path(
    post,
    path = "/api/v1/users/signup",
    responses(
        (status = 201, description = "Identity created and logged in", body = SessionEnvelope),
        (status = 400, description = "Validation failure or duplicate email")
    ),
    tag = "auth"
)]
pub async fn signup(
    service: Extension<Arc<AuthService>>,
    headers: HeaderMap,
    Json(request): Json<SignupRequest>,
) -> Result<Response, Error> {
    let origin = request_origin(&headers);
    let (identity, token) = service
        .signup(
            &request.name,
            &request.email,
            &request.password,
            &request.password_confirm,
            &origin,
        )
        .await?;
    send_token(&service, &identity, token, StatusCode::CREATED, &headers)
}

#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    responses(
        (status = 200, description = "Logged in", body = SessionEnvelope),
        (status = 401, description = "Incorrect email or password")
    ),
    tag = "auth"
)]
pub async fn login(
    service: Extension<Arc<AuthService>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Response, Error> {
    let (identity, token) = service.login(&request.email, &request.password).await?;
    send_token(&service, &identity, token, StatusCode::OK, &headers)
}

#[utoipa::path(
    get,
    path = "/api/v1/users/logout",
    responses((status = 200, description = "Session cookie overwritten")),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap) -> Result<Response, Error> {
    // Client-side hint only: issued tokens stay valid until their TTL; no
    // server-side revocation list exists.
    let cookie = logout_cookie(request_is_secure(&headers))
        .map_err(|err| Error::Internal(anyhow::Error::new(err)))?;
    let mut response = (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "success" })),
    )
        .into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

#[utoipa::path(
    post,
    path = "/api/v1/users/forgot-password",
    responses(
        (status = 200, description = "Reset token sent"),
        (status = 404, description = "Unknown email"),
        (status = 500, description = "Delivery failed; reset state rolled back")
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    service: Extension<Arc<AuthService>>,
    headers: HeaderMap,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Response, Error> {
    let origin = request_origin(&headers);
    service.forgot_password(&request.email, &origin).await?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "status": "success", "message": "Token sent to email!" })),
    )
        .into_response())
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/reset-password/{token}",
    params(("token" = String, Path, description = "Plaintext reset token from the emailed link")),
    responses(
        (status = 200, description = "Password reset, logged in", body = SessionEnvelope),
        (status = 400, description = "Token invalid or expired")
    ),
    tag = "auth"
)]
pub async fn reset_password(
    service: Extension<Arc<AuthService>>,
    headers: HeaderMap,
    Path(token): Path<String>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Response, Error> {
    let (identity, session_token) = service
        .reset_password(&token, &request.password, &request.password_confirm)
        .await?;
    send_token(&service, &identity, session_token, StatusCode::OK, &headers)
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/update-password",
    responses(
        (status = 200, description = "Password changed, fresh token issued", body = SessionEnvelope),
        (status = 401, description = "Not logged in or wrong current password")
    ),
    tag = "auth"
)]
pub async fn update_password(
    service: Extension<Arc<AuthService>>,
    headers: HeaderMap,
    Json(request): Json<UpdatePasswordRequest>,
) -> Result<Response, Error> {
    let identity = authenticate(&service, &headers).await?;
    let (identity, token) = service
        .update_password(
            &identity,
            &request.password_current,
            &request.password,
            &request.password_confirm,
        )
        .await?;
    send_token(&service, &identity, token, StatusCode::OK, &headers)
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "The authenticated identity", body = IdentityEnvelope),
        (status = 401, description = "Not authenticated")
    ),
    tag = "users"
)]
pub async fn me(
    service: Extension<Arc<AuthService>>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let identity = authenticate(&service, &headers).await?;
    Ok(identity_response(&identity))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/me",
    responses(
        (status = 204, description = "Identity deactivated"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "users"
)]
pub async fn deactivate_me(
    service: Extension<Arc<AuthService>>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let identity = authenticate(&service, &headers).await?;
    service.deactivate(&identity).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/users/session",
    responses(
        (status = 200, description = "A session is active", body = IdentityEnvelope),
        (status = 204, description = "No session; never an error")
    ),
    tag = "auth"
)]
pub async fn session(
    service: Extension<Arc<AuthService>>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    // Personalization probe: anonymous access must never be blocked here.
    match identify_if_present(&service, &headers).await {
        Some(identity) => Ok(identity_response(&identity)),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}/role",
    params(("id" = Uuid, Path, description = "Identity to update")),
    responses(
        (status = 200, description = "Role updated", body = IdentityEnvelope),
        (status = 403, description = "Caller is not an administrator"),
        (status = 404, description = "Unknown identity")
    ),
    tag = "users"
)]
pub async fn set_role(
    service: Extension<Arc<AuthService>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<SetRoleRequest>,
) -> Result<Response, Error> {
    // The only path that may mutate a role.
    let caller = authenticate(&service, &headers).await?;
    require_role(&caller, &[Role::Administrator])?;
    let updated = service.set_role(id, request.role).await?;
    Ok(identity_response(&updated))
}

fn identity_response(identity: &Identity) -> Response {
    let envelope = IdentityEnvelope {
        status: "success",
        data: IdentityData {
            user: identity.public(),
        },
    };
    (StatusCode::OK, Json(envelope)).into_response()
}

fn send_token(
    service: &AuthService,
    identity: &Identity,
    token: String,
    status: StatusCode,
    headers: &HeaderMap,
) -> Result<Response, Error> {
    let envelope = SessionEnvelope {
        status: "success",
        token,
        data: IdentityData {
            user: identity.public(),
        },
    };
    let secure = request_is_secure(headers);
    let cookie = session_cookie(
        &envelope.token,
        service.config().token_ttl_seconds(),
        secure,
    )
    .map_err(|err| Error::Internal(anyhow::Error::new(err)))?;
    let mut response = (status, Json(envelope)).into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}
