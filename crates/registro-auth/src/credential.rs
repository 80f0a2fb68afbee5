//! Credential model.
//!
//! A [`Credential`] is the access/refresh token pair issued by the identity
//! provider plus the claims the client reads out of the access token
//! (roles, email, expiry). Only the two tokens are persisted; claims are
//! re-derived whenever a credential is loaded.
//!
//! The JWT signature is not verified here. The backend verifies every token
//! it receives; the client only needs the payload for display and
//! role-based gating.

use std::collections::BTreeSet;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Values the browser-era client wrote instead of removing a key.
const PLACEHOLDER_TOKENS: &[&str] = &["undefined", "null"];

/// Returns `true` if a stored token value is actually usable.
///
/// Empty strings and the literal placeholders `undefined`/`null` count as
/// absent.
#[must_use]
pub fn is_usable_token(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && !PLACEHOLDER_TOKENS.contains(&trimmed)
}

/// Token pair as persisted in a [`CredentialStore`](crate::storage::CredentialStore).
///
/// Serialized under the fixed keys `access_token` and `refresh_token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Body of a successful `/auth/login` or `/auth/refresh` response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Authenticated session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    refresh_token: Option<String>,
    roles: BTreeSet<String>,
    email: Option<String>,
    expires_at: Option<OffsetDateTime>,
}

impl Credential {
    /// Builds a credential from a token pair, reading claims from the access token.
    ///
    /// Placeholder refresh tokens are dropped.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        let access_token = access_token.into();
        let claims = Claims::decode(&access_token).unwrap_or_default();
        Self {
            refresh_token: refresh_token.filter(|t| is_usable_token(t)),
            roles: claims.roles(),
            email: claims.email(),
            expires_at: claims
                .exp
                .and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok()),
            access_token,
        }
    }

    /// Rebuilds a credential from persisted tokens.
    ///
    /// Returns `None` if the stored access token is a placeholder.
    #[must_use]
    pub fn from_stored(tokens: StoredTokens) -> Option<Self> {
        if !is_usable_token(&tokens.access_token) {
            return None;
        }
        Some(Self::new(tokens.access_token, tokens.refresh_token))
    }

    /// Tokens to persist.
    #[must_use]
    pub fn to_stored(&self) -> StoredTokens {
        StoredTokens {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }

    /// Applies a refresh response. The previous refresh token is kept when
    /// the backend does not rotate it.
    #[must_use]
    pub fn renewed(&self, response: TokenResponse) -> Self {
        let refresh_token = response
            .refresh_token
            .filter(|t| is_usable_token(t))
            .or_else(|| self.refresh_token.clone());
        let mut renewed = Self::new(response.access_token, refresh_token);
        if renewed.email.is_none() {
            renewed.email = self.email.clone();
        }
        renewed
    }

    /// Uses `email` as the account email when the access token carries no
    /// email claim.
    #[must_use]
    pub fn with_email_fallback(mut self, email: &str) -> Self {
        let email = email.trim();
        if self.email.is_none() && !email.is_empty() {
            self.email = Some(email.to_string());
        }
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.expires_at
    }

    /// Returns `true` if the access token carries the given role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Returns `true` if the token's `exp` claim is in the past.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|exp| exp <= OffsetDateTime::now_utc())
    }
}

/// The subset of JWT claims the client reads.
#[derive(Debug, Default, Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    realm_access: Option<RealmAccess>,
}

#[derive(Debug, Default, Deserialize)]
struct RealmAccess {
    #[serde(default)]
    roles: Vec<String>,
}

impl Claims {
    /// Decodes the payload segment of a compact JWT.
    fn decode(token: &str) -> Option<Self> {
        let payload = token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn roles(&self) -> BTreeSet<String> {
        self.roles
            .iter()
            .chain(self.realm_access.iter().flat_map(|r| r.roles.iter()))
            .cloned()
            .collect()
    }

    fn email(&self) -> Option<String> {
        self.email
            .clone()
            .or_else(|| self.preferred_username.clone())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds an unsigned JWT carrying the given JSON payload.
    pub(crate) fn jwt(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.sig")
    }

    #[test]
    fn test_usable_token() {
        assert!(is_usable_token("abc"));
        assert!(!is_usable_token(""));
        assert!(!is_usable_token("   "));
        assert!(!is_usable_token("undefined"));
        assert!(!is_usable_token("null"));
    }

    #[test]
    fn test_claims_from_keycloak_token() {
        let token = jwt(serde_json::json!({
            "exp": 4_102_444_800i64,
            "preferred_username": "doctor@example.org",
            "realm_access": { "roles": ["Doctor", "offline_access"] }
        }));
        let credential = Credential::new(token, Some("r1".into()));
        assert!(credential.has_role("Doctor"));
        assert!(!credential.has_role("Admin"));
        assert_eq!(credential.email(), Some("doctor@example.org"));
        assert!(!credential.is_expired());
    }

    #[test]
    fn test_opaque_token_has_no_claims() {
        let credential = Credential::new("opaque", None);
        assert!(credential.roles().is_empty());
        assert_eq!(credential.email(), None);
        assert_eq!(credential.expires_at(), None);
        assert!(!credential.is_expired());
    }

    #[test]
    fn test_expired_token() {
        let token = jwt(serde_json::json!({ "exp": 1_000 }));
        assert!(Credential::new(token, None).is_expired());
    }

    #[test]
    fn test_placeholder_refresh_token_is_dropped() {
        let credential = Credential::new("a", Some("undefined".into()));
        assert_eq!(credential.refresh_token(), None);
    }

    #[test]
    fn test_from_stored_rejects_placeholder_access_token() {
        let stored = StoredTokens {
            access_token: "null".into(),
            refresh_token: Some("r".into()),
        };
        assert!(Credential::from_stored(stored).is_none());
    }

    #[test]
    fn test_renewed_keeps_refresh_token_when_not_rotated() {
        let credential = Credential::new("a1", Some("r1".into()));
        let renewed = credential.renewed(TokenResponse {
            access_token: "a2".into(),
            refresh_token: None,
        });
        assert_eq!(renewed.access_token(), "a2");
        assert_eq!(renewed.refresh_token(), Some("r1"));

        let rotated = credential.renewed(TokenResponse {
            access_token: "a3".into(),
            refresh_token: Some("r2".into()),
        });
        assert_eq!(rotated.refresh_token(), Some("r2"));
    }

    #[test]
    fn test_login_email_fills_missing_claim() {
        let credential = Credential::new("opaque", Some("r1".into()))
            .with_email_fallback(" doctor@example.org ");
        assert_eq!(credential.email(), Some("doctor@example.org"));

        let renewed = credential.renewed(TokenResponse {
            access_token: "opaque2".into(),
            refresh_token: None,
        });
        assert_eq!(renewed.email(), Some("doctor@example.org"));

        let token = jwt(serde_json::json!({ "email": "claim@example.org" }));
        let credential = Credential::new(token, None).with_email_fallback("typed@example.org");
        assert_eq!(credential.email(), Some("claim@example.org"));
    }

    #[test]
    fn test_stored_tokens_use_fixed_keys() {
        let stored = Credential::new("a", Some("r".into())).to_stored();
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["access_token"], "a");
        assert_eq!(json["refresh_token"], "r");
    }
}
