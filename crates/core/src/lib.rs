//! CopyHub Core - Shared domain types.
//!
//! This crate provides the types used across all CopyHub components:
//! - `client` - Consumer of the CopyHub backend REST API
//! - `web` - Customer storefront and agency/admin back office
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, money, print options, order states and records
//! - [`pricing`] - Product matching and price quotes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod types;

pub use pricing::{
    CopiesError, MAX_COPIES, MIN_COPIES, Quote, count_matching_products, find_matching_product,
    validate_copies,
};
pub use types::*;
