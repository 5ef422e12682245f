use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::extract::ValidatedJson;
use super::AppState;
use crate::auth::{
    CsrfProtected, CurrentUser, ForgotPasswordRequest, LoginRequest, MessageResponse, ResetPasswordRequest,
    SignupRequest, TokenResponse, VerifyEmailRequest, ACCESS_TOKEN_COOKIE, CSRF_COOKIE,
};
use crate::error::AppResult;
use crate::models::UserProfile;

/// Authentication routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/verify", post(verify_email))
        .route("/verify/resend", post(resend_verification))
        .route("/forgot", post(forgot_password))
        .route("/reset", post(reset_password))
}

/// Register a new user; the verification email is best-effort
#[tracing::instrument(skip(state, request))]
async fn signup(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SignupRequest>,
) -> AppResult<Json<UserProfile>> {
    let user = state.auth.signup(request).await?;

    if let Err(e) = state.auth_flows.send_verification(&user).await {
        tracing::warn!(user_id = user.id, "Failed to send verification email: {}", e);
    }

    Ok(Json(UserProfile::from(user)))
}

/// Login and set the access and CSRF cookies
#[tracing::instrument(skip(state, jar, request))]
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let (_user, response) = state.auth.login(&request).await?;
    let secure = state.config.auth.cookie_secure;

    let access_cookie = Cookie::build((ACCESS_TOKEN_COOKIE, response.access_token.clone()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/");

    // Readable by the frontend so it can echo it in X-CSRF-Token
    let csrf_cookie = Cookie::build((CSRF_COOKIE, response.csrf_token.clone()))
        .http_only(false)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/");

    Ok((jar.add(access_cookie).add(csrf_cookie), Json(response)))
}

#[tracing::instrument(skip(jar))]
async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    let jar = jar
        .remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"))
        .remove(Cookie::build(CSRF_COOKIE).path("/"));

    (jar, Json(MessageResponse::new("Logged out successfully")))
}

#[tracing::instrument(skip(current))]
async fn me(current: CurrentUser) -> Json<UserProfile> {
    Json(UserProfile::from(current.user))
}

#[tracing::instrument(skip(state, request))]
async fn verify_email(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<VerifyEmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    Ok(Json(state.auth_flows.verify_email(&request.token).await?))
}

#[tracing::instrument(skip(state, current))]
async fn resend_verification(
    State(state): State<AppState>,
    CsrfProtected(current): CsrfProtected,
) -> AppResult<Json<MessageResponse>> {
    Ok(Json(state.auth_flows.resend_verification(&current.user).await?))
}

#[tracing::instrument(skip(state, request))]
async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    Ok(Json(state.auth_flows.forgot_password(&request.email).await?))
}

#[tracing::instrument(skip(state, request))]
async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    Ok(Json(
        state
            .auth_flows
            .reset_password(&request.token, &request.new_password)
            .await?,
    ))
}
