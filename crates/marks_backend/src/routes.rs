//! OAuth callback and sign-out routes.
//!
//! Both are one-shot redirect handlers: they take an authorization code or
//! a session token and answer with a redirect that either establishes or
//! clears the session cookie.

use crate::platform::Platform;
use tracing::{info, warn};

/// Effect of a redirect on the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCookie {
    /// Store this access token.
    Set(String),
    /// Remove the stored token.
    Clear,
}

/// A redirect response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Target URL.
    pub location: String,
    /// What to do with the session cookie.
    pub cookie: SessionCookie,
}

/// Exchanges an authorization code for a session.
///
/// Without a code, or with one that does not exchange, the user lands back
/// on the site signed out.
pub fn callback(platform: &Platform, code: Option<&str>) -> Redirect {
    let site = &platform.config().site_url;
    let Some(code) = code else {
        warn!("callback without authorization code");
        return Redirect {
            location: format!("{site}/?error=missing_code"),
            cookie: SessionCookie::Clear,
        };
    };

    match platform.auth().exchange_code(code) {
        Ok(session) => {
            info!(user = %session.identity.user_id, "sign-in completed");
            Redirect {
                location: format!("{site}/"),
                cookie: SessionCookie::Set(session.access_token),
            }
        }
        Err(e) => {
            warn!("code exchange failed: {e}");
            Redirect {
                location: format!("{site}/?error=auth_failed"),
                cookie: SessionCookie::Clear,
            }
        }
    }
}

/// Invalidates a session and sends the user home.
pub fn sign_out(platform: &Platform, token: Option<&str>) -> Redirect {
    if let Some(token) = token {
        if let Err(e) = platform.auth().revoke(token) {
            warn!("sign-out with unusable token: {e}");
        }
    }
    Redirect {
        location: format!("{}/", platform.config().site_url),
        cookie: SessionCookie::Clear,
    }
}
