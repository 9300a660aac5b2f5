//! Authentication route handlers.
//!
//! Sign-in stores the backend's tokens on the request's client session; the
//! backend session middleware turns them into cookies on the way out.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::{HeaderMap, header::COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use copyhub_client::ApiError;
use copyhub_client::types::{RegisterRequest, ResetPasswordRequest};
use serde::Deserialize;
use tower_sessions::{Session, cookie::Cookie};
use tracing::instrument;

use super::{Layout, flash_redirect, safe_next};
use crate::error::{Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{CspNonce, Flash, Visitor};
use crate::state::AppState;

/// Shortest password accepted by the forms.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Cookie and form field Google Identity Services uses for its CSRF check.
const GOOGLE_CSRF_FIELD: &str = "g_csrf_token";

// =============================================================================
// Form Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Checkbox; present only when ticked.
    #[serde(default)]
    pub is_agency: Option<String>,
    #[serde(default)]
    pub agency_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    pub email: String,
    pub token: String,
    pub password: String,
    pub password_confirm: String,
}

/// Posted by Google Identity Services after a one-tap or button sign-in.
#[derive(Debug, Deserialize)]
pub struct GoogleForm {
    pub credential: String,
    #[serde(default)]
    pub g_csrf_token: Option<String>,
}

// =============================================================================
// Query Types
// =============================================================================

/// Error or success codes carried across redirects.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetQuery {
    pub email: Option<String>,
    pub token: Option<String>,
    pub error: Option<String>,
}

/// Text for a redirect error code.
fn error_message(code: &str) -> &'static str {
    match code {
        "credentials" => "Invalid email or password.",
        "password_mismatch" => "Passwords do not match.",
        "password_too_short" => "Password must be at least 8 characters.",
        "missing_fields" => "Please fill in every required field.",
        "agency_name" => "Agencies need a shop name.",
        "google" => "Google sign-in failed. Please try again.",
        "invalid_reset_link" => "That reset link is invalid or has expired.",
        "reset_failed" => "We could not reset your password. Request a new link.",
        _ => "Something went wrong. Please try again.",
    }
}

fn success_message(code: &str) -> &'static str {
    match code {
        "email_sent" => "If that email has an account, a reset link is on its way.",
        "password_reset" => "Password updated. You can sign in now.",
        _ => "Done.",
    }
}

/// Check a password pair, returning the error code on failure.
fn password_problem(password: &str, confirm: &str) -> Option<&'static str> {
    if password != confirm {
        Some("password_mismatch")
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        Some("password_too_short")
    } else {
        None
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Build the registration request, or the error code for the form.
fn registration(form: RegisterForm) -> std::result::Result<RegisterRequest, &'static str> {
    if form.username.trim().is_empty() || form.email.trim().is_empty() {
        return Err("missing_fields");
    }
    if let Some(problem) = password_problem(&form.password, &form.password_confirm) {
        return Err(problem);
    }

    let is_agency = form.is_agency.is_some();
    let agency_name = non_blank(form.agency_name);
    if is_agency && agency_name.is_none() {
        return Err("agency_name");
    }

    Ok(RegisterRequest {
        username: form.username.trim().to_string(),
        email: form.email.trim().to_string(),
        password: form.password,
        phone_number: non_blank(form.phone_number),
        is_agency,
        agency_name: agency_name.filter(|_| is_agency),
    })
}

/// Whether the Google CSRF cookie matches the posted token.
fn google_csrf_ok(headers: &HeaderMap, posted: Option<&str>) -> bool {
    let Some(posted) = posted.filter(|token| !token.is_empty()) else {
        return false;
    };
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| Cookie::split_parse(raw).flatten())
        .any(|cookie| cookie.name() == GOOGLE_CSRF_FIELD && cookie.value() == posted)
}

/// Google sign-in button settings.
#[derive(Debug, Clone)]
pub struct GoogleButton {
    pub client_id: String,
    /// Absolute URL Google posts the credential to.
    pub login_uri: String,
}

fn google_button(state: &AppState) -> Option<GoogleButton> {
    let config = state.config();
    config.google_client_id.clone().map(|client_id| GoogleButton {
        client_id,
        login_uri: config.absolute_url("/auth/google"),
    })
}

/// Login path carrying an error code and the page to return to.
fn login_error(code: &str, next: &str) -> String {
    if next == "/" {
        return format!("/auth/login?error={code}");
    }
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("/auth/login?error={code}&next={encoded}")
}

// =============================================================================
// Templates
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub error: Option<&'static str>,
    pub success: Option<&'static str>,
    pub next: String,
    pub google: Option<GoogleButton>,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub layout: Layout,
    pub error: Option<&'static str>,
    pub min_password_len: usize,
    pub google: Option<GoogleButton>,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub layout: Layout,
    pub error: Option<&'static str>,
    pub success: Option<&'static str>,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
pub struct ResetPasswordTemplate {
    pub layout: Layout,
    pub error: Option<&'static str>,
    pub email: String,
    pub token: String,
    pub min_password_len: usize,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
#[instrument(skip(state, visitor, session, nonce))]
pub async fn login_page(
    State(state): State<AppState>,
    visitor: Visitor,
    session: Session,
    nonce: CspNonce,
    Query(query): Query<MessageQuery>,
) -> Response {
    let next = safe_next(query.next.as_deref()).to_string();
    if visitor.identity.is_authenticated {
        return Redirect::to(&next).into_response();
    }

    LoginTemplate {
        layout: Layout::new(&visitor, &session, nonce).await,
        error: query.error.as_deref().map(error_message),
        success: query.success.as_deref().map(success_message),
        next,
        google: google_button(&state),
    }
    .into_response()
}

/// Handle the login form.
#[instrument(skip(state, visitor, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let next = safe_next(form.next.as_deref()).to_string();

    match state
        .api()
        .login(&visitor.session, form.email.trim(), &form.password)
        .await
    {
        Ok(identity) => {
            if let Some(user_id) = identity.user_id {
                set_sentry_user(&user_id, identity.email.as_deref());
            }
            add_breadcrumb("auth", "Signed in", None);
            Ok(Redirect::to(&next).into_response())
        }
        Err(e) if rejected_credentials(&e) => {
            tracing::info!(error = %e, "Login rejected");
            Ok(Redirect::to(&login_error("credentials", &next)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Whether the backend turned down the credentials themselves.
fn rejected_credentials(err: &ApiError) -> bool {
    err.is_auth_failure() || matches!(err.status(), Some(400 | 404))
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
#[instrument(skip(state, visitor, session, nonce))]
pub async fn register_page(
    State(state): State<AppState>,
    visitor: Visitor,
    session: Session,
    nonce: CspNonce,
    Query(query): Query<MessageQuery>,
) -> RegisterTemplate {
    RegisterTemplate {
        layout: Layout::new(&visitor, &session, nonce).await,
        error: query.error.as_deref().map(error_message),
        min_password_len: MIN_PASSWORD_LEN,
        google: google_button(&state),
    }
}

/// Handle the registration form.
///
/// Agencies are created pending approval and land on the home page signed in.
#[instrument(skip(state, visitor, session, form), fields(email = %form.email))]
pub async fn register(
    State(state): State<AppState>,
    visitor: Visitor,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let request = match registration(form) {
        Ok(request) => request,
        Err(code) => return Ok(Redirect::to(&format!("/auth/register?error={code}")).into_response()),
    };

    match state.api().register(&visitor.session, &request).await {
        Ok(identity) => {
            if let Some(user_id) = identity.user_id {
                set_sentry_user(&user_id, identity.email.as_deref());
            }
            let message = if request.is_agency {
                "Welcome to CopyHub! Your agency will be listed once an admin approves it."
            } else {
                "Welcome to CopyHub!"
            };
            Ok(flash_redirect(&session, Flash::success(message), "/").await)
        }
        Err(e) if e.status().is_some_and(|status| (400..500).contains(&status)) => {
            // The backend explains duplicates and validation problems itself
            let message = crate::error::AppError::from(e).public_message();
            Ok(flash_redirect(&session, Flash::error(message), "/auth/register").await)
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Google Sign-in
// =============================================================================

/// Exchange a Google credential for a CopyHub session.
#[instrument(skip(state, visitor, headers, form))]
pub async fn google(
    State(state): State<AppState>,
    visitor: Visitor,
    headers: HeaderMap,
    Form(form): Form<GoogleForm>,
) -> Result<Response> {
    if !google_csrf_ok(&headers, form.g_csrf_token.as_deref()) {
        tracing::warn!("Google sign-in without a matching CSRF token");
        return Ok(Redirect::to(&login_error("google", "/")).into_response());
    }

    match state
        .api()
        .google_login(&visitor.session, &form.credential)
        .await
    {
        Ok(identity) => {
            if let Some(user_id) = identity.user_id {
                set_sentry_user(&user_id, identity.email.as_deref());
            }
            Ok(Redirect::to("/").into_response())
        }
        Err(e) if rejected_credentials(&e) => {
            tracing::info!(error = %e, "Google credential rejected");
            Ok(Redirect::to(&login_error("google", "/")).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Password Reset Routes
// =============================================================================

/// Display the forgot password page.
#[instrument(skip(visitor, session, nonce))]
pub async fn forgot_password_page(
    visitor: Visitor,
    session: Session,
    nonce: CspNonce,
    Query(query): Query<MessageQuery>,
) -> ForgotPasswordTemplate {
    ForgotPasswordTemplate {
        layout: Layout::new(&visitor, &session, nonce).await,
        error: query.error.as_deref().map(error_message),
        success: query.success.as_deref().map(success_message),
    }
}

/// Request a reset email.
///
/// Always reports success so the form does not reveal which accounts exist.
#[instrument(skip(state, visitor, form))]
pub async fn forgot_password(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    if let Err(e) = state
        .api()
        .forgot_password(&visitor.session, form.email.trim())
        .await
    {
        tracing::warn!(error = %e, "Password recovery request failed");
    }
    Redirect::to("/auth/forgot-password?success=email_sent").into_response()
}

/// Display the reset password page from the emailed link.
#[instrument(skip(visitor, session, nonce, query))]
pub async fn reset_password_page(
    visitor: Visitor,
    session: Session,
    nonce: CspNonce,
    Query(query): Query<ResetQuery>,
) -> Response {
    let (Some(email), Some(token)) = (non_blank(query.email), non_blank(query.token)) else {
        return Redirect::to("/auth/forgot-password?error=invalid_reset_link").into_response();
    };

    ResetPasswordTemplate {
        layout: Layout::new(&visitor, &session, nonce).await,
        error: query.error.as_deref().map(error_message),
        email,
        token,
        min_password_len: MIN_PASSWORD_LEN,
    }
    .into_response()
}

/// Set the new password.
#[instrument(skip(state, visitor, form), fields(email = %form.email))]
pub async fn reset_password(
    State(state): State<AppState>,
    visitor: Visitor,
    Form(form): Form<ResetPasswordForm>,
) -> Response {
    let retry = |code: &str| {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("email", &form.email)
            .append_pair("token", &form.token)
            .append_pair("error", code)
            .finish();
        Redirect::to(&format!("/auth/reset-password?{query}")).into_response()
    };

    if let Some(problem) = password_problem(&form.password, &form.password_confirm) {
        return retry(problem);
    }

    let request = ResetPasswordRequest {
        email: form.email.trim(),
        token: form.token.trim(),
        new_password: &form.password,
    };
    match state.api().reset_password(&visitor.session, &request).await {
        Ok(()) => Redirect::to("/auth/login?success=password_reset").into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Password reset failed");
            retry("reset_failed")
        }
    }
}

// =============================================================================
// Logout Route
// =============================================================================

/// Sign out and forget the token cookies.
#[instrument(skip(state, visitor))]
pub async fn logout(State(state): State<AppState>, visitor: Visitor) -> Response {
    state.api().sign_out(&visitor.session).await;
    clear_sentry_user();
    Redirect::to("/").into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn register_form() -> RegisterForm {
        RegisterForm {
            username: " ana ".to_string(),
            email: "ana@example.com".to_string(),
            password: "long enough".to_string(),
            password_confirm: "long enough".to_string(),
            phone_number: Some("  ".to_string()),
            is_agency: None,
            agency_name: Some("Ignored Prints".to_string()),
        }
    }

    #[test]
    fn test_registration_customer() {
        let request = registration(register_form()).unwrap();
        assert_eq!(request.username, "ana");
        assert!(!request.is_agency);
        assert_eq!(request.phone_number, None);
        assert_eq!(request.agency_name, None);
    }

    #[test]
    fn test_registration_agency_needs_name() {
        let mut form = register_form();
        form.is_agency = Some("on".to_string());
        form.agency_name = None;
        assert_eq!(registration(form).unwrap_err(), "agency_name");

        let mut form = register_form();
        form.is_agency = Some("on".to_string());
        let request = registration(form).unwrap();
        assert!(request.is_agency);
        assert_eq!(request.agency_name.as_deref(), Some("Ignored Prints"));
    }

    #[test]
    fn test_password_rules() {
        assert_eq!(password_problem("abcdefgh", "abcdefgh"), None);
        assert_eq!(password_problem("abcdefgh", "abcdefgx"), Some("password_mismatch"));
        assert_eq!(password_problem("short", "short"), Some("password_too_short"));
    }

    #[test]
    fn test_google_csrf_double_submit() {
        let mut headers = HeaderMap::new();
        assert!(!google_csrf_ok(&headers, Some("abc")));

        headers.insert(COOKIE, HeaderValue::from_static("a=1; g_csrf_token=abc"));
        assert!(google_csrf_ok(&headers, Some("abc")));
        assert!(!google_csrf_ok(&headers, Some("xyz")));
        assert!(!google_csrf_ok(&headers, None));
    }

    #[test]
    fn test_login_error_keeps_next() {
        assert_eq!(login_error("credentials", "/"), "/auth/login?error=credentials");
        assert_eq!(
            login_error("credentials", "/agencies/2/order"),
            "/auth/login?error=credentials&next=%2Fagencies%2F2%2Forder"
        );
    }

    #[test]
    fn test_unknown_codes_fall_back() {
        assert_eq!(error_message("nope"), "Something went wrong. Please try again.");
        assert_eq!(error_message("credentials"), "Invalid email or password.");
    }
}
