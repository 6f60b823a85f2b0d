//! Shared utility functions for backend adapters.

use ta_domain::config::{AuthConfig, AuthMode};
use ta_domain::error::{Error, Result};
use tokio_tungstenite::tungstenite;

/// Convert a [`tungstenite::Error`] into the domain [`Error`] type.
pub(crate) fn from_ws(e: tungstenite::Error) -> Error {
    Error::WebSocket(e.to_string())
}

/// Redact the API key from a URL for safe logging.
pub(crate) fn redact_url_key(url: &str) -> String {
    if let Some(idx) = url.find("key=") {
        let prefix = &url[..idx + 4];
        let rest = &url[idx + 4..];
        let end = rest.find('&').unwrap_or(rest.len());
        format!("{prefix}[REDACTED]{}", &rest[end..])
    } else {
        url.to_string()
    }
}

/// Resolve the Gemini API key from the single source `auth.mode` selects.
///
/// Sources are never mixed: a keychain miss falls back only to the
/// `{SERVICE}_{ACCOUNT}` env var, not to `auth.env` or `auth.key`.
pub fn resolve_api_key(auth: &AuthConfig) -> Result<String> {
    let key = match auth.mode {
        AuthMode::Env => std::env::var(&auth.env).map_err(|_| {
            Error::Auth(format!(
                "environment variable '{}' not set or not valid UTF-8",
                auth.env
            ))
        })?,
        AuthMode::Inline => {
            let key = auth.key.clone().ok_or_else(|| {
                Error::Auth("auth mode 'inline' needs 'key' in [backend.auth]".into())
            })?;
            tracing::warn!("using plaintext API key from config; prefer mode 'env' or 'keychain'");
            key
        }
        AuthMode::Keychain => {
            let (Some(service), Some(account)) = (&auth.service, &auth.account) else {
                return Err(Error::Auth(
                    "auth mode 'keychain' needs 'service' and 'account' in [backend.auth]".into(),
                ));
            };
            keychain_key(service, account)?
        }
    };

    if key.trim().is_empty() {
        return Err(Error::Auth(format!("API key from {:?} source is empty", auth.mode)));
    }
    Ok(key)
}

fn keychain_key(service: &str, account: &str) -> Result<String> {
    let err = match keyring::Entry::new(service, account).and_then(|entry| entry.get_password()) {
        Ok(secret) => return Ok(secret),
        Err(e) => e,
    };
    let fallback = keychain_fallback_env_name(service, account);
    let secret = std::env::var(&fallback).map_err(|_| {
        Error::Auth(format!(
            "keychain lookup for {service}/{account} failed ({err}) and '{fallback}' is not set"
        ))
    })?;
    tracing::debug!(env_var = %fallback, "keychain unavailable, using env fallback");
    Ok(secret)
}

/// Build the headless fallback env var name for a keychain service/account.
///
/// Example: `("talkagent", "gemini-api-key")` → `"TALKAGENT_GEMINI_API_KEY"`.
pub fn keychain_fallback_env_name(service: &str, account: &str) -> String {
    format!(
        "{}_{}",
        service.to_uppercase().replace('-', "_"),
        account.to_uppercase().replace('-', "_"),
    )
}
