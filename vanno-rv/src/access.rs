//! Session role and display name
//!
//! There is no authentication. The frontend sends the role and display name
//! chosen at session start in `x-vanno-role` and `x-vanno-user`; pages that a
//! role may not see answer with a redirect instead of data.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::Serialize;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const ROLE_HEADER: &str = "x-vanno-role";
pub const USER_HEADER: &str = "x-vanno-user";

/// Where denied requests are sent
pub const HOME_LOCATION: &str = "/";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Study participant
    #[default]
    User,
    /// Researcher trying out the participant page
    Test,
    Researcher,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "test" => Ok(Role::Test),
            "researcher" => Ok(Role::Researcher),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Test => write!(f, "test"),
            Role::Researcher => write!(f, "researcher"),
        }
    }
}

/// Who is making the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub role: Role,
    pub display_name: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let role = match header(ROLE_HEADER) {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                debug!("{}, treating request as participant", e);
                Role::User
            }),
            None => Role::User,
        };

        Ok(Viewer {
            role,
            display_name: header(USER_HEADER),
        })
    }
}

/// Request refused for the caller's role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDenied {
    pub location: String,
    /// Shown to the user after the redirect
    pub message: String,
}

/// Refuse access when `role` is the forbidden one
pub fn assert_role_not(role: Role, forbidden: Role, redirect_to: &str) -> Result<(), AccessDenied> {
    if role != forbidden {
        return Ok(());
    }
    Err(AccessDenied {
        location: redirect_to.to_string(),
        message: format!(
            "You can't access that page with your role (current role: {}).",
            role
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_assert_role_not() {
        assert!(assert_role_not(Role::Researcher, Role::User, "/").is_ok());
        assert!(assert_role_not(Role::Test, Role::User, "/").is_ok());

        let denied = assert_role_not(Role::User, Role::User, "/login").unwrap_err();
        assert_eq!(denied.location, "/login");
        assert!(denied.message.contains("current role: user"));
    }

    #[tokio::test]
    async fn test_viewer_from_headers() {
        let request = Request::builder()
            .header(ROLE_HEADER, "Researcher")
            .header(USER_HEADER, " dana ")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let viewer = Viewer::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(viewer.role, Role::Researcher);
        assert_eq!(viewer.display_name.as_deref(), Some("dana"));

        let request = Request::builder().header(ROLE_HEADER, "admin").body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        let viewer = Viewer::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(viewer.role, Role::User);
        assert!(viewer.display_name.is_none());
    }
}
