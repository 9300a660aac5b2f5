//! Profiles, agencies, agency approval and comments.

use std::sync::Arc;

use tracing::instrument;

use super::{ApiClient, ApiError, ApiRequest};
use crate::cache::{CacheKey, CacheValue};
use crate::session::Session;
use crate::types::{NewComment, UpdateProfileRequest, User};
use copyhub_core::{Agency, AgencyId, Comment, UserId};

impl ApiClient {
    // =========================================================================
    // Users
    // =========================================================================

    /// Get a user profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the user does not exist or the request fails.
    #[instrument(skip(self, session), fields(user_id = %id))]
    pub async fn get_user(&self, session: &Session, id: UserId) -> Result<User, ApiError> {
        self.fetch(session, ApiRequest::get(format!("users/{id}")))
            .await
    }

    /// Update the signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails on the backend.
    #[instrument(skip(self, session, update), fields(user_id = %id))]
    pub async fn update_profile(
        &self,
        session: &Session,
        id: UserId,
        update: &UpdateProfileRequest,
    ) -> Result<User, ApiError> {
        let request = ApiRequest::put(format!("users/{id}")).json(update)?;
        self.fetch(session, request).await
    }

    // =========================================================================
    // Agencies
    // =========================================================================

    /// List approved agencies. Cached for 5 minutes.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, session))]
    pub async fn list_agencies(&self, session: &Session) -> Result<Vec<Agency>, ApiError> {
        if let Some(agencies) = self.cache().agencies().await {
            return Ok(agencies.as_ref().clone());
        }

        let agencies: Vec<Agency> = self.fetch(session, ApiRequest::get("agencies")).await?;
        self.cache()
            .insert(
                CacheKey::Agencies,
                CacheValue::Agencies(Arc::new(agencies.clone())),
            )
            .await;
        Ok(agencies)
    }

    /// Get an agency with its price list and comments. Cached for 5 minutes.
    ///
    /// # Errors
    ///
    /// Returns an error if the agency does not exist or the request fails.
    #[instrument(skip(self, session), fields(agency_id = %id))]
    pub async fn get_agency(&self, session: &Session, id: AgencyId) -> Result<Agency, ApiError> {
        if let Some(agency) = self.cache().agency(id).await {
            return Ok(agency.as_ref().clone());
        }

        let agency: Agency = self
            .fetch(session, ApiRequest::get(format!("agencies/{id}")))
            .await?;
        self.cache()
            .insert(CacheKey::Agency(id), CacheValue::Agency(Arc::new(agency.clone())))
            .await;
        Ok(agency)
    }

    /// Agencies waiting for admin approval.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not an admin or the request fails.
    #[instrument(skip(self, session))]
    pub async fn list_pending_agencies(&self, session: &Session) -> Result<Vec<Agency>, ApiError> {
        self.fetch(session, ApiRequest::get("agencies/pending")).await
    }

    /// Approve an agency so it appears in listings.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not an admin or the request fails.
    #[instrument(skip(self, session), fields(agency_id = %id))]
    pub async fn approve_agency(&self, session: &Session, id: AgencyId) -> Result<(), ApiError> {
        self.send(session, ApiRequest::post(format!("agencies/{id}/approve")))
            .await?;
        self.cache().invalidate_agency(id).await;
        tracing::info!(agency_id = %id, "Agency approved");
        Ok(())
    }

    /// Reject an agency's registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not an admin or the request fails.
    #[instrument(skip(self, session), fields(agency_id = %id))]
    pub async fn reject_agency(&self, session: &Session, id: AgencyId) -> Result<(), ApiError> {
        self.send(session, ApiRequest::post(format!("agencies/{id}/reject")))
            .await?;
        self.cache().invalidate_agency(id).await;
        tracing::info!(agency_id = %id, "Agency rejected");
        Ok(())
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// List comments on an agency, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, session), fields(agency_id = %agency_id))]
    pub async fn list_comments(
        &self,
        session: &Session,
        agency_id: AgencyId,
    ) -> Result<Vec<Comment>, ApiError> {
        let mut comments: Vec<Comment> = self
            .fetch(session, ApiRequest::get(format!("agencies/{agency_id}/comments")))
            .await?;
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comments)
    }

    /// Post a rated comment on an agency.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BusinessRule` for a rating outside 1 to 5, or an
    /// error if the request fails.
    #[instrument(skip(self, session, comment), fields(agency_id = %agency_id, rating = comment.rating))]
    pub async fn add_comment(
        &self,
        session: &Session,
        agency_id: AgencyId,
        comment: &NewComment,
    ) -> Result<Comment, ApiError> {
        if !(1..=5).contains(&comment.rating) {
            return Err(ApiError::BusinessRule(
                "Rating must be between 1 and 5 stars".to_string(),
            ));
        }
        if comment.text.trim().is_empty() {
            return Err(ApiError::BusinessRule("Comment cannot be empty".to_string()));
        }

        let request = ApiRequest::post(format!("agencies/{agency_id}/comments")).json(comment)?;
        let created: Comment = self.fetch(session, request).await?;
        // Rating and comment list both live on the cached agency.
        self.cache().invalidate_agency(agency_id).await;
        Ok(created)
    }
}
