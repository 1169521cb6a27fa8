//! Telegram Mini App launch data.
//!
//! A launch-data token goes through three steps, each gating the next:
//!
//! ```text
//! raw initData → UnverifiedLaunchData::parse → SignatureVerifier::verify → FreshnessGuard::check
//! ```
//!
//! Fields that identify the user are only readable on [`VerifiedLaunchData`].

mod error;
mod freshness;
mod parser;
mod verify;

pub use error::InitDataError;
pub use freshness::{FreshnessGuard, AUTH_DATE_TOLERANCE_SECS};
pub use parser::{canonical_string, UnverifiedLaunchData};
pub use verify::{SignatureVerifier, VerifiedLaunchData};
