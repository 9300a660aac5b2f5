//! Agency profiles and customer comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{AgencyId, CommentId, UserId};
use super::product::AgencyProduct;
use super::status::ApprovalStatus;

/// Street address and coordinates of a print shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Location {
    /// Coordinates when both are known.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// A customer's review of an agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub author_id: UserId,
    pub author_name: String,
    /// Star rating, 1 to 5.
    pub rating: u8,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A print shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agency {
    pub id: AgencyId,
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub products: Vec<AgencyProduct>,
    /// Aggregate star rating, 0 when unrated.
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub approval_status: ApprovalStatus,
}

impl Agency {
    /// Rating rounded to whole stars for display.
    #[must_use]
    pub fn stars(&self) -> u8 {
        // Clamped to 0..=5 so the cast cannot truncate.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let stars = self.rating.clamp(0.0, 5.0).round() as u8;
        stars
    }
}
