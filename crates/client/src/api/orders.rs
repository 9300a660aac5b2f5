//! Orders: creation, listing, lifecycle transitions and analytics.

use tracing::instrument;

use super::{ApiClient, ApiError, ApiRequest};
use crate::http::{FileUpload, MultipartBody};
use crate::session::Session;
use crate::types::{
    CompleteOrderRequest, CompletionCodeResponse, CreateOrderRequest, OrderAnalytics,
    StateChange, StateChangeRequest,
};
use copyhub_core::{AgencyId, Order, OrderCode, OrderState};

/// Message shown when the backend refuses an order because the customer has
/// no email address on file.
pub const MISSING_EMAIL_MESSAGE: &str =
    "Please add an email address to your profile before placing an order.";

/// Re-word backend business-rule failures on order creation.
///
/// A failure that looks like a missing email (mentions "email" together with
/// "null", "required", "missing" or "empty") becomes
/// [`ApiError::BusinessRule`] asking the customer to complete their profile.
/// Everything else is returned unchanged.
#[must_use]
pub fn reword_order_error(err: ApiError) -> ApiError {
    let ApiError::Status { message, .. } = &err else {
        return err;
    };

    let lower = message.to_ascii_lowercase();
    let about_email = lower.contains("email");
    let missing = ["null", "required", "missing", "empty"]
        .iter()
        .any(|word| lower.contains(word));

    if about_email && missing {
        ApiError::BusinessRule(MISSING_EMAIL_MESSAGE.to_string())
    } else {
        err
    }
}

impl ApiClient {
    /// Place an order with its PDF files.
    ///
    /// Sent as multipart: the order line data as a JSON `order` field and
    /// one `files` part per PDF.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the order; a missing email is
    /// re-worded, see [`reword_order_error`].
    #[instrument(
        skip(self, session, order, files),
        fields(agency_id = %order.agency_id, pages = order.page_count, copies = order.copy_count, files = files.len())
    )]
    pub async fn create_order(
        &self,
        session: &Session,
        order: &CreateOrderRequest,
        files: Vec<FileUpload>,
    ) -> Result<Order, ApiError> {
        let body = files.into_iter().fold(
            MultipartBody::default().text("order", serde_json::to_string(order)?),
            |body, file| body.file("files", file),
        );

        let created: Order = self
            .fetch(session, ApiRequest::post("orders").multipart(body))
            .await
            .map_err(reword_order_error)?;

        if !created.total_is_consistent() {
            tracing::warn!(
                order_code = %created.order_code,
                total = %created.total_price,
                expected = %created.expected_total(),
                "Backend total differs from price x pages x copies"
            );
        }
        tracing::info!(order_code = %created.order_code, "Order created");
        Ok(created)
    }

    /// Orders placed by the signed-in customer, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, session))]
    pub async fn list_my_orders(&self, session: &Session) -> Result<Vec<Order>, ApiError> {
        let orders = self.fetch(session, ApiRequest::get("orders/mine")).await?;
        Ok(newest_first(orders))
    }

    /// Orders placed with one agency, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller does not manage the agency.
    #[instrument(skip(self, session), fields(agency_id = %agency_id))]
    pub async fn list_agency_orders(
        &self,
        session: &Session,
        agency_id: AgencyId,
    ) -> Result<Vec<Order>, ApiError> {
        let orders = self
            .fetch(session, ApiRequest::get(format!("agencies/{agency_id}/orders")))
            .await?;
        Ok(newest_first(orders))
    }

    /// Every order on the marketplace, optionally filtered by state.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not an admin.
    #[instrument(skip(self, session))]
    pub async fn list_all_orders(
        &self,
        session: &Session,
        state: Option<OrderState>,
    ) -> Result<Vec<Order>, ApiError> {
        let mut request = ApiRequest::get("orders");
        if let Some(state) = state {
            request = request.query("state", state.ordinal());
        }
        let orders = self.fetch(session, request).await?;
        Ok(newest_first(orders))
    }

    /// Get one order.
    ///
    /// # Errors
    ///
    /// Returns an error if the order does not exist or is not visible to the
    /// caller.
    #[instrument(skip(self, session), fields(order_code = %code))]
    pub async fn get_order(&self, session: &Session, code: &OrderCode) -> Result<Order, ApiError> {
        self.fetch(session, ApiRequest::get(format!("orders/{code}")))
            .await
    }

    /// Move an order to another state.
    ///
    /// The backend decides whether the transition is legal; moves that do not
    /// follow the forward lifecycle are only logged. Entering `Finished`
    /// issues a pickup completion code, which is fetched and returned. Once
    /// the backend has accepted the change, a failed code fetch is reported
    /// as [`StateChange::CodeUnavailable`] rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the transition.
    #[instrument(skip(self, session), fields(order_code = %code, target = %target))]
    pub async fn update_order_state(
        &self,
        session: &Session,
        code: &OrderCode,
        current: Option<OrderState>,
        target: OrderState,
    ) -> Result<StateChange, ApiError> {
        if let Some(current) = current
            && !current.is_forward_transition(target)
        {
            tracing::warn!(from = %current, to = %target, "Requesting a non-forward state change");
        }

        let request = ApiRequest::put(format!("orders/{code}/state"))
            .json(&StateChangeRequest { state: target })?;
        self.send(session, request).await?;
        tracing::info!(order_code = %code, state = %target, "Order state changed");

        if !target.requires_completion_code() {
            return Ok(StateChange::Moved);
        }
        match self.get_completion_code(session, code).await {
            Ok(pickup) => Ok(StateChange::ReadyForPickup(pickup)),
            Err(e) => {
                tracing::warn!(
                    order_code = %code,
                    error = %e,
                    "Pickup code not available after state change"
                );
                Ok(StateChange::CodeUnavailable)
            }
        }
    }

    /// Cancel an order on the customer's behalf.
    ///
    /// # Errors
    ///
    /// Returns an error if the order can no longer be canceled.
    #[instrument(skip(self, session), fields(order_code = %code))]
    pub async fn cancel_order(&self, session: &Session, code: &OrderCode) -> Result<(), ApiError> {
        self.send(session, ApiRequest::post(format!("orders/{code}/cancel")))
            .await?;
        tracing::info!(order_code = %code, "Order canceled");
        Ok(())
    }

    /// Pickup code of a finished order.
    ///
    /// # Errors
    ///
    /// Returns an error if the order has no code yet.
    #[instrument(skip(self, session), fields(order_code = %code))]
    pub async fn get_completion_code(
        &self,
        session: &Session,
        code: &OrderCode,
    ) -> Result<String, ApiError> {
        let response: CompletionCodeResponse = self
            .fetch(session, ApiRequest::get(format!("orders/{code}/completion-code")))
            .await?;
        Ok(response.completion_code)
    }

    /// Hand a finished order over using the customer's pickup code.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BusinessRule` for a blank code, or an error if the
    /// backend rejects the code.
    #[instrument(skip(self, session, completion_code), fields(order_code = %code))]
    pub async fn complete_order(
        &self,
        session: &Session,
        code: &OrderCode,
        completion_code: &str,
    ) -> Result<(), ApiError> {
        let completion_code = completion_code.trim();
        if completion_code.is_empty() {
            return Err(ApiError::BusinessRule(
                "Enter the pickup code shown to the customer".to_string(),
            ));
        }

        let request = ApiRequest::post(format!("orders/{code}/complete"))
            .json(&CompleteOrderRequest { completion_code })?;
        self.send(session, request).await?;
        tracing::info!(order_code = %code, "Order completed");
        Ok(())
    }

    /// Order counts and revenue, scoped by the backend to the caller's role.
    ///
    /// # Errors
    ///
    /// Returns an error if the caller is not staff.
    #[instrument(skip(self, session))]
    pub async fn order_analytics(&self, session: &Session) -> Result<OrderAnalytics, ApiError> {
        self.fetch(session, ApiRequest::get("orders/analytics")).await
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}
