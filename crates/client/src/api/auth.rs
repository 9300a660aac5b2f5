//! Sign-in, registration, token refresh and password recovery.

use secrecy::ExposeSecret;
use tracing::instrument;

use super::{ApiClient, ApiError, ApiRequest};
use crate::session::{Identity, Session};
use crate::types::{
    ForgotPasswordRequest, GoogleLoginRequest, LoginRequest, RefreshRequest, RegisterRequest,
    ResetPasswordRequest, TokenResponse,
};

impl ApiClient {
    /// Sign in with email and password and store the issued tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the request fails.
    #[instrument(skip(self, session, password), fields(email = %email))]
    pub async fn login(
        &self,
        session: &Session,
        email: &str,
        password: &str,
    ) -> Result<Identity, ApiError> {
        let request = ApiRequest::post("auth/login")
            .anonymous()
            .json(&LoginRequest { email, password })?;
        self.sign_in(session, request).await
    }

    /// Create an account and sign in with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the registration.
    #[instrument(skip(self, session, form), fields(email = %form.email, agency = form.is_agency))]
    pub async fn register(
        &self,
        session: &Session,
        form: &RegisterRequest,
    ) -> Result<Identity, ApiError> {
        let request = ApiRequest::post("auth/register").anonymous().json(form)?;
        self.sign_in(session, request).await
    }

    /// Exchange a Google id token for CopyHub tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the id token is rejected.
    #[instrument(skip(self, session, id_token))]
    pub async fn google_login(&self, session: &Session, id_token: &str) -> Result<Identity, ApiError> {
        let request = ApiRequest::post("auth/google-login")
            .anonymous()
            .json(&GoogleLoginRequest { id_token })?;
        self.sign_in(session, request).await
    }

    async fn sign_in(&self, session: &Session, request: ApiRequest) -> Result<Identity, ApiError> {
        let tokens: TokenResponse = self.execute(session, &request).await?.json()?;
        session
            .store_tokens(tokens.access_token, tokens.refresh_token)
            .await;

        let identity = session.identity();
        tracing::info!(user_id = ?identity.user_id, "Signed in");
        Ok(identity)
    }

    /// Renew the session's tokens with its refresh token.
    ///
    /// Sent once, without retries; callers decide what a failure means.
    /// Refreshes of one session never overlap: if another refresh replaced
    /// the access token while this call waited, nothing is sent.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::RefreshFailed` if there is no refresh token or the
    /// backend rejects it.
    pub async fn refresh(&self, session: &Session) -> Result<(), ApiError> {
        let seen = session.access_token().await;
        self.refresh_unless_renewed(session, seen.as_ref().map(ExposeSecret::expose_secret))
            .await
    }

    /// Renew the tokens unless the access token is no longer `seen`.
    #[instrument(skip(self, session, seen))]
    pub(crate) async fn refresh_unless_renewed(
        &self,
        session: &Session,
        seen: Option<&str>,
    ) -> Result<(), ApiError> {
        let _refreshing = session.lock_refresh().await;

        let access_token = session.access_token().await;
        if access_token.as_ref().map(ExposeSecret::expose_secret) != seen {
            tracing::debug!("Tokens were renewed while waiting, skipping refresh");
            return Ok(());
        }
        let Some(refresh_token) = session.refresh_token().await else {
            return Err(ApiError::RefreshFailed("no refresh token".to_string()));
        };

        let request = ApiRequest::post("auth/refresh")
            .anonymous()
            .json(&RefreshRequest {
                access_token: access_token.as_ref().map(|token| token.expose_secret()),
                refresh_token: refresh_token.expose_secret(),
            })?;

        let tokens: TokenResponse = self
            .send_once(session, &request)
            .await
            .and_then(|response| response.json())
            .map_err(|e| ApiError::RefreshFailed(e.to_string()))?;

        session
            .store_tokens(tokens.access_token, tokens.refresh_token)
            .await;
        tracing::debug!("Tokens refreshed");
        Ok(())
    }

    /// Ask the backend to email a password reset link.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, session))]
    pub async fn forgot_password(&self, session: &Session, email: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post("auth/forgot-password")
            .anonymous()
            .json(&ForgotPasswordRequest { email })?;
        self.send(session, request).await
    }

    /// Set a new password with the token from the reset email.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is invalid or expired.
    #[instrument(skip(self, session, reset), fields(email = %reset.email))]
    pub async fn reset_password(
        &self,
        session: &Session,
        reset: &ResetPasswordRequest<'_>,
    ) -> Result<(), ApiError> {
        let request = ApiRequest::post("auth/reset-password")
            .anonymous()
            .json(reset)?;
        self.send(session, request).await
    }

    /// Forget the session's tokens. The backend keeps no server-side session.
    pub async fn sign_out(&self, session: &Session) {
        session.sign_out().await;
        tracing::info!("Signed out");
    }
}
