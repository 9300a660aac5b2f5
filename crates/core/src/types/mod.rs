//! Core types for CopyHub.
//!
//! This module provides type-safe wrappers for common domain concepts and the
//! client-side view of the records owned by the backend.

pub mod agency;
pub mod email;
pub mod id;
pub mod money;
pub mod order;
pub mod print;
pub mod product;
pub mod status;

pub use agency::{Agency, Comment, Location};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::format_money;
pub use order::{Order, OrderFile};
pub use print::{ColorOption, OptionParseError, PaperType, PrintOptions, PrintType};
pub use product::{AgencyProduct, Product};
pub use status::*;
