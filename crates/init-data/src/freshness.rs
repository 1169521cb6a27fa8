//! Issuance-time window for launch data.

use crate::error::InitDataError;
use crate::verify::VerifiedLaunchData;
use chrono::{DateTime, Utc};

/// Maximum accepted age of `auth_date`, in seconds.
pub const AUTH_DATE_TOLERANCE_SECS: i64 = 300;

/// Rejects launch data issued too long ago.
///
/// There is no lower bound: an `auth_date` in the future passes.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessGuard {
    tolerance_secs: i64,
}

impl Default for FreshnessGuard {
    fn default() -> Self {
        Self {
            tolerance_secs: AUTH_DATE_TOLERANCE_SECS,
        }
    }
}

impl FreshnessGuard {
    /// Check verified launch data against `now`, returning its age in seconds.
    pub fn check(&self, data: &VerifiedLaunchData, now: DateTime<Utc>) -> Result<i64, InitDataError> {
        self.check_auth_date(data.auth_date(), now)
    }

    /// Check a raw `auth_date` value against `now`.
    pub fn check_auth_date(&self, auth_date: &str, now: DateTime<Utc>) -> Result<i64, InitDataError> {
        let issued: i64 = auth_date.parse().map_err(|_| {
            InitDataError::MalformedPayload(format!("auth_date is not an integer: {:?}", auth_date))
        })?;

        let age = now.timestamp().saturating_sub(issued);
        if age > self.tolerance_secs {
            return Err(InitDataError::Expired {
                age,
                limit: self.tolerance_secs,
            });
        }

        Ok(age)
    }
}
