//! Status enums: order lifecycle, user roles and agency approval.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Order lifecycle state.
///
/// The lifecycle is linear:
///
/// ```text
/// Pending → Confirmed → Started → Finished → Completed
///     ╲          ╲          ╲          ╲
///      ────────────────────────────────── Rejected
/// ```
///
/// `Completed` and `Rejected` are terminal. The backend stores the state as its
/// ordinal, so it is serialized as an integer and deserialized from either the
/// integer or the name.
///
/// The backend adjudicates which transitions are legal; the helpers here only
/// describe the forward order so that views can offer sensible actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OrderState {
    Pending = 0,
    Confirmed = 1,
    Started = 2,
    Finished = 3,
    Completed = 4,
    Rejected = 5,
}

impl OrderState {
    /// All states in ordinal order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Started,
        Self::Finished,
        Self::Completed,
        Self::Rejected,
    ];

    /// The state's ordinal as stored by the backend.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Look up a state by ordinal.
    #[must_use]
    pub const fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Pending),
            1 => Some(Self::Confirmed),
            2 => Some(Self::Started),
            3 => Some(Self::Finished),
            4 => Some(Self::Completed),
            5 => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Name used by the backend and in forms.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Started => "Started",
            Self::Finished => "Finished",
            Self::Completed => "Completed",
            Self::Rejected => "Rejected",
        }
    }

    /// Customer-facing description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Pending => "Waiting for the agency to confirm",
            Self::Confirmed => "Confirmed by the agency",
            Self::Started => "Printing in progress",
            Self::Finished => "Ready for pickup",
            Self::Completed => "Picked up",
            Self::Rejected => "Rejected or canceled",
        }
    }

    /// Whether no further transition can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    /// The next state along the forward path, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Confirmed),
            Self::Confirmed => Some(Self::Started),
            Self::Started => Some(Self::Finished),
            Self::Finished => Some(Self::Completed),
            Self::Completed | Self::Rejected => None,
        }
    }

    /// Whether moving to `target` follows the lifecycle: strictly forward, or
    /// directly to `Rejected` from any non-terminal state.
    #[must_use]
    pub fn is_forward_transition(self, target: Self) -> bool {
        // Rejected has the highest ordinal, so the ordering covers it too.
        !self.is_terminal() && target > self
    }

    /// Whether the customer may still cancel an order in this state.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        !self.is_terminal()
    }

    /// Whether entering this state issues a pickup completion code.
    #[must_use]
    pub const fn requires_completion_code(self) -> bool {
        matches!(self, Self::Finished)
    }

    /// States an agency may move an order to from here.
    #[must_use]
    pub fn agency_actions(self) -> Vec<Self> {
        let mut actions: Vec<Self> = self.next().into_iter().collect();
        if !self.is_terminal() {
            actions.push(Self::Rejected);
        }
        actions
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned for an unknown order state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid order state: {0}")]
pub struct OrderStateError(pub String);

impl FromStr for OrderState {
    type Err = OrderStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(ordinal) = trimmed.parse::<u8>() {
            return Self::from_ordinal(ordinal).ok_or_else(|| OrderStateError(s.to_owned()));
        }
        Self::ALL
            .into_iter()
            .find(|state| state.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| OrderStateError(s.to_owned()))
    }
}

impl Serialize for OrderState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.ordinal())
    }
}

impl<'de> Deserialize<'de> for OrderState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Ordinal(u8),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Ordinal(value) => Self::from_ordinal(value).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid order state ordinal: {value}"))
            }),
            Raw::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Role carried in the access token's role claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRole {
    /// Marketplace operator: catalog, approvals, every order.
    Admin,
    /// Print shop: its own prices and orders.
    Agency,
    /// Places orders.
    Customer,
}

impl UserRole {
    /// Parse a role claim value, case-insensitively.
    #[must_use]
    pub fn from_claim(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" => Some(Self::Admin),
            "agency" => Some(Self::Agency),
            "customer" | "user" => Some(Self::Customer),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "Admin"),
            Self::Agency => write!(f, "Agency"),
            Self::Customer => write!(f, "Customer"),
        }
    }
}

/// Agency approval status in the admin approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_follow_lifecycle() {
        let ordinals: Vec<u8> = OrderState::ALL.iter().map(|s| s.ordinal()).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_forward_transitions() {
        assert!(OrderState::Pending.is_forward_transition(OrderState::Confirmed));
        assert!(OrderState::Pending.is_forward_transition(OrderState::Finished));
        assert!(OrderState::Started.is_forward_transition(OrderState::Rejected));
        assert!(!OrderState::Started.is_forward_transition(OrderState::Confirmed));
        assert!(!OrderState::Started.is_forward_transition(OrderState::Started));
    }

    #[test]
    fn test_terminal_states_absorb() {
        for terminal in [OrderState::Completed, OrderState::Rejected] {
            assert!(terminal.is_terminal());
            assert_eq!(terminal.next(), None);
            assert!(terminal.agency_actions().is_empty());
            for target in OrderState::ALL {
                assert!(!terminal.is_forward_transition(target));
            }
        }
    }

    #[test]
    fn test_agency_actions() {
        assert_eq!(
            OrderState::Started.agency_actions(),
            vec![OrderState::Finished, OrderState::Rejected]
        );
        assert_eq!(
            OrderState::Finished.agency_actions(),
            vec![OrderState::Completed, OrderState::Rejected]
        );
    }

    #[test]
    fn test_only_finished_requires_completion_code() {
        let requiring: Vec<_> = OrderState::ALL
            .into_iter()
            .filter(|s| s.requires_completion_code())
            .collect();
        assert_eq!(requiring, vec![OrderState::Finished]);
    }

    #[test]
    fn test_serde_accepts_ordinal_and_name() {
        assert_eq!(serde_json::to_string(&OrderState::Started).unwrap(), "2");
        let from_num: OrderState = serde_json::from_str("3").unwrap();
        let from_name: OrderState = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(from_num, OrderState::Finished);
        assert_eq!(from_name, OrderState::Completed);
        assert!(serde_json::from_str::<OrderState>("9").is_err());
    }

    #[test]
    fn test_role_claims() {
        assert_eq!(UserRole::from_claim("ADMIN"), Some(UserRole::Admin));
        assert_eq!(UserRole::from_claim("Agency"), Some(UserRole::Agency));
        assert_eq!(UserRole::from_claim("guest"), None);
    }
}
