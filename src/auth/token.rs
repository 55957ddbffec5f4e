//! Token endpoint response parsing and validation
//!
//! The identity provider answers a refresh exchange with a JSON document
//! (RFC 6749 section 5.1).  This module turns that loosely-shaped document
//! into a [`TokenResponse`] whose fields are known to be present and in
//! range, so that the token manager never writes a partial or already-expired
//! token set into the session.

use serde::Deserialize;

use crate::error::RefreshError;

// ---------------------------------------------------------------------------
// TokenResponse
// ---------------------------------------------------------------------------

/// Token material returned by a successful refresh exchange.
///
/// `expires_in` is relative to the moment of issuance; the absolute expiry is
/// computed at store time with [`TokenResponse::expires_at`].  A response is
/// consumed once by the token manager and never persisted as a whole.
///
/// # Examples
///
/// ```
/// use oidc_login::auth::token::TokenResponse;
///
/// let response = TokenResponse::new("A2", "R2", 3600);
/// assert!(response.validate().is_ok());
/// assert_eq!(response.expires_at(1_000).unwrap(), 4_600);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    /// New bearer credential.
    pub access_token: String,

    /// Refresh token to present on the next exchange.
    pub refresh_token: String,

    /// Lifetime of `access_token` in seconds from issuance.
    pub expires_in: i64,

    /// ID token, when the provider re-issues one on refresh.
    pub id_token: Option<String>,
}

impl TokenResponse {
    /// Creates a response without an ID token.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_in,
            id_token: None,
        }
    }

    /// Attaches an ID token.
    pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token = Some(id_token.into());
        self
    }

    /// Checks that both tokens are non-empty and `expires_in` is not negative.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::InvalidTokenResponse`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), RefreshError> {
        if self.access_token.trim().is_empty() {
            return Err(RefreshError::InvalidTokenResponse(
                "access_token is empty".to_string(),
            ));
        }
        if self.refresh_token.trim().is_empty() {
            return Err(RefreshError::InvalidTokenResponse(
                "refresh_token is empty".to_string(),
            ));
        }
        if self.expires_in < 0 {
            return Err(RefreshError::InvalidTokenResponse(format!(
                "expires_in must not be negative, got {}",
                self.expires_in
            )));
        }
        if matches!(self.id_token.as_deref(), Some(id) if id.trim().is_empty()) {
            return Err(RefreshError::InvalidTokenResponse(
                "id_token is present but empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute expiry in seconds since the epoch: `now + expires_in`.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::InvalidTokenResponse`] if the response does not
    /// validate or the sum overflows.
    pub fn expires_at(&self, now: i64) -> Result<i64, RefreshError> {
        self.validate()?;
        now.checked_add(self.expires_in).ok_or_else(|| {
            RefreshError::InvalidTokenResponse(format!(
                "expires_in {} overflows the expiry timestamp",
                self.expires_in
            ))
        })
    }

    /// Parses and validates a token endpoint JSON body.
    ///
    /// Providers that do not rotate refresh tokens omit `refresh_token` from
    /// the refresh response.  In that case `presented_refresh_token`, the
    /// token that was just exchanged, is carried forward.  `expires_in` is
    /// accepted as a JSON number or a numeric string.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::InvalidTokenResponse`] when the body is not a
    /// JSON object, a required field is missing, or validation fails.
    pub fn from_json(
        body: &str,
        presented_refresh_token: Option<&str>,
    ) -> Result<Self, RefreshError> {
        let raw: RawTokenResponse = serde_json::from_str(body).map_err(|e| {
            RefreshError::InvalidTokenResponse(format!("token response is not valid JSON: {e}"))
        })?;
        raw.into_token_response(presented_refresh_token)
    }
}

// ---------------------------------------------------------------------------
// Raw token endpoint response
// ---------------------------------------------------------------------------

/// Token endpoint JSON exactly as received; every field optional.
#[derive(Debug, Deserialize)]
struct RawTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
    #[serde(default)]
    id_token: Option<String>,
}

impl RawTokenResponse {
    fn into_token_response(
        self,
        presented_refresh_token: Option<&str>,
    ) -> Result<TokenResponse, RefreshError> {
        let access_token = self.access_token.ok_or_else(|| missing("access_token"))?;
        let refresh_token = match self.refresh_token {
            Some(token) => token,
            None => presented_refresh_token
                .map(str::to_string)
                .ok_or_else(|| missing("refresh_token"))?,
        };
        let expires_in = match self.expires_in {
            Some(value) => parse_expires_in(&value)?,
            None => return Err(missing("expires_in")),
        };

        let response = TokenResponse {
            access_token,
            refresh_token,
            expires_in,
            id_token: self.id_token,
        };
        response.validate()?;
        Ok(response)
    }
}

fn missing(field: &str) -> RefreshError {
    RefreshError::InvalidTokenResponse(format!("token response is missing {field}"))
}

fn parse_expires_in(value: &serde_json::Value) -> Result<i64, RefreshError> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        RefreshError::InvalidTokenResponse(format!("expires_in is not an integer: {value}"))
    })
}

/// Short, non-reversible rendering of a credential for log output.
pub(crate) fn fingerprint(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    if token.chars().count() > 6 {
        format!("{prefix}...")
    } else {
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // validate / expires_at
    // -----------------------------------------------------------------------

    #[test]
    fn test_validate_accepts_well_formed_response() {
        assert!(TokenResponse::new("A2", "R2", 3600).validate().is_ok());
    }

    #[test]
    fn test_validate_accepts_zero_lifetime() {
        assert!(TokenResponse::new("A2", "R2", 0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_lifetime() {
        let err = TokenResponse::new("A2", "R2", -10).validate().unwrap_err();
        assert!(matches!(err, RefreshError::InvalidTokenResponse(_)));
        assert!(err.to_string().contains("-10"));
    }

    #[test]
    fn test_validate_rejects_empty_access_token() {
        let err = TokenResponse::new("", "R2", 60).validate().unwrap_err();
        assert!(err.to_string().contains("access_token"));
    }

    #[test]
    fn test_validate_rejects_blank_refresh_token() {
        let err = TokenResponse::new("A2", "  ", 60).validate().unwrap_err();
        assert!(err.to_string().contains("refresh_token"));
    }

    #[test]
    fn test_validate_rejects_empty_id_token() {
        let response = TokenResponse::new("A2", "R2", 60).with_id_token("");
        assert!(response.validate().is_err());
    }

    #[test]
    fn test_expires_at_adds_lifetime_to_now() {
        let response = TokenResponse::new("A2", "R2", 3600);
        assert_eq!(response.expires_at(1_700_000_000).unwrap(), 1_700_003_600);
    }

    #[test]
    fn test_expires_at_rejects_overflow() {
        let response = TokenResponse::new("A2", "R2", i64::MAX);
        assert!(response.expires_at(10).is_err());
    }

    // -----------------------------------------------------------------------
    // from_json
    // -----------------------------------------------------------------------

    #[test]
    fn test_from_json_parses_standard_body() {
        let body = r#"{
            "access_token": "A2",
            "token_type": "Bearer",
            "refresh_token": "R2",
            "expires_in": 3600,
            "id_token": "header.payload.sig"
        }"#;
        let response = TokenResponse::from_json(body, Some("R1")).unwrap();
        assert_eq!(response.access_token, "A2");
        assert_eq!(response.refresh_token, "R2");
        assert_eq!(response.expires_in, 3600);
        assert_eq!(response.id_token.as_deref(), Some("header.payload.sig"));
    }

    #[test]
    fn test_from_json_accepts_string_expires_in() {
        let body = r#"{"access_token":"A2","refresh_token":"R2","expires_in":"300"}"#;
        let response = TokenResponse::from_json(body, None).unwrap();
        assert_eq!(response.expires_in, 300);
    }

    #[test]
    fn test_from_json_carries_presented_refresh_token_forward() {
        let body = r#"{"access_token":"A2","expires_in":60}"#;
        let response = TokenResponse::from_json(body, Some("R1")).unwrap();
        assert_eq!(response.refresh_token, "R1");
    }

    #[test]
    fn test_from_json_without_any_refresh_token_is_invalid() {
        let body = r#"{"access_token":"A2","expires_in":60}"#;
        let err = TokenResponse::from_json(body, None).unwrap_err();
        assert!(err.to_string().contains("refresh_token"));
    }

    #[test]
    fn test_from_json_missing_access_token_is_invalid() {
        let body = r#"{"refresh_token":"R2","expires_in":60}"#;
        let err = TokenResponse::from_json(body, None).unwrap_err();
        assert!(err.to_string().contains("access_token"));
    }

    #[test]
    fn test_from_json_missing_expires_in_is_invalid() {
        let body = r#"{"access_token":"A2","refresh_token":"R2"}"#;
        let err = TokenResponse::from_json(body, None).unwrap_err();
        assert!(err.to_string().contains("expires_in"));
    }

    #[test]
    fn test_from_json_negative_expires_in_is_invalid() {
        let body = r#"{"access_token":"A2","refresh_token":"R2","expires_in":-10}"#;
        assert!(TokenResponse::from_json(body, None).is_err());
    }

    #[test]
    fn test_from_json_fractional_expires_in_is_invalid() {
        let body = r#"{"access_token":"A2","refresh_token":"R2","expires_in":1.5}"#;
        assert!(TokenResponse::from_json(body, None).is_err());
    }

    #[test]
    fn test_from_json_rejects_non_json_body() {
        let err = TokenResponse::from_json("<html>oops</html>", None).unwrap_err();
        assert!(matches!(err, RefreshError::InvalidTokenResponse(_)));
    }

    // -----------------------------------------------------------------------
    // fingerprint
    // -----------------------------------------------------------------------

    #[test]
    fn test_fingerprint_truncates_long_tokens() {
        assert_eq!(fingerprint("abcdefghijkl"), "abcdef...");
    }

    #[test]
    fn test_fingerprint_keeps_short_tokens() {
        assert_eq!(fingerprint("abc"), "abc");
    }
}
