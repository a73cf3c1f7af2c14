//! Caller identity
//!
//! Authentication happens at the gateway, which forwards the caller as two
//! headers:
//!
//! - `x-caller-id`: opaque caller id
//! - `x-caller-role`: `staff`, `admin` or `patient`
//!
//! Patients may only see their own record, so resolve and search are limited
//! to staff and admins.

use std::fmt;
use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

pub const CALLER_ID_HEADER: &str = "x-caller-id";
pub const CALLER_ROLE_HEADER: &str = "x-caller-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerRole {
    Staff,
    Admin,
    Patient,
}

impl CallerRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::Admin => "admin",
            Self::Patient => "patient",
        }
    }

    pub fn can_look_up_patients(self) -> bool {
        matches!(self, Self::Staff | Self::Admin)
    }
}

impl FromStr for CallerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staff" => Ok(Self::Staff),
            "admin" => Ok(Self::Admin),
            "patient" => Ok(Self::Patient),
            other => Err(format!("unknown caller role: {other}")),
        }
    }
}

impl fmt::Display for CallerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub id: String,
    pub role: CallerRole,
}

impl CallerIdentity {
    /// Reject callers that may not look up arbitrary patients.
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.role.can_look_up_patients() {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "role '{}' may not look up patients",
                self.role
            )))
        }
    }
}

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let id = header(CALLER_ID_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing caller identity"))?
            .to_string();
        let role = header(CALLER_ROLE_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing caller role"))?
            .parse::<CallerRole>()
            .map_err(ApiError::unauthorized)?;

        Ok(Self { id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(headers: &[(&str, &str)]) -> Result<CallerIdentity, ApiError> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        CallerIdentity::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extracts_staff_caller() {
        let caller = extract(&[(CALLER_ID_HEADER, "u-1"), (CALLER_ROLE_HEADER, "Staff")])
            .await
            .unwrap();
        assert_eq!(caller.role, CallerRole::Staff);
        assert!(caller.require_staff().is_ok());
    }

    #[tokio::test]
    async fn test_missing_headers_are_unauthorized() {
        let err = extract(&[(CALLER_ROLE_HEADER, "staff")]).await.unwrap_err();
        assert_eq!(err.error_code(), "UNAUTHORIZED");

        let err = extract(&[(CALLER_ID_HEADER, "u-1"), (CALLER_ROLE_HEADER, "nurse")])
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_patient_may_not_look_up() {
        let caller = extract(&[(CALLER_ID_HEADER, "p-9"), (CALLER_ROLE_HEADER, "patient")])
            .await
            .unwrap();
        assert_eq!(caller.require_staff().unwrap_err().error_code(), "FORBIDDEN");
    }
}
