//! Shared helpers for provider adapters.

use sv_domain::config::AuthConfig;
use sv_domain::error::{Error, Result};

/// Map a [`reqwest::Error`] into the domain error: deadlines become
/// [`Error::Timeout`], everything else [`Error::Http`].
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve an API key: plaintext `key` (warned), then the OS keychain
/// (`service` + `account`), then the `env` variable.
pub fn resolve_api_key(auth: &AuthConfig) -> Result<String> {
    if let Some(key) = &auth.key {
        tracing::warn!(
            "API key loaded from plaintext config field 'key'; prefer 'env' or keychain"
        );
        return Ok(key.clone());
    }

    if let (Some(service), Some(account)) = (&auth.service, &auth.account) {
        match resolve_from_keychain(service, account) {
            Ok(secret) => return Ok(secret),
            Err(e) => tracing::warn!(
                service = %service,
                account = %account,
                error = %e,
                "keychain lookup failed, trying env"
            ),
        }
    }

    if let Some(var) = &auth.env {
        return std::env::var(var)
            .map_err(|_| Error::Auth(format!("environment variable '{var}' is not set")));
    }

    Err(Error::Auth(
        "no API key configured: set 'key', 'env', or keychain 'service' + 'account'".into(),
    ))
}

pub fn resolve_from_keychain(service: &str, account: &str) -> Result<String> {
    let entry = keyring::Entry::new(service, account)
        .map_err(|e| Error::Auth(format!("keyring entry: {e}")))?;
    entry
        .get_password()
        .map_err(|e| Error::Auth(format!("keyring lookup: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_wins() {
        let auth = AuthConfig {
            key: Some("sk-plain".into()),
            env: Some("SV_TEST_SHOULD_NOT_BE_READ".into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "sk-plain");
    }

    #[test]
    fn env_var_is_read() {
        let var = "SV_TEST_PROVIDER_KEY_4411";
        std::env::set_var(var, "from-env");
        let auth = AuthConfig {
            env: Some(var.into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "from-env");
        std::env::remove_var(var);
    }

    #[test]
    fn missing_env_names_the_variable() {
        let auth = AuthConfig {
            env: Some("SV_TEST_MISSING_KEY_9031".into()),
            ..Default::default()
        };
        let err = resolve_api_key(&auth).unwrap_err();
        assert!(err.to_string().contains("SV_TEST_MISSING_KEY_9031"));
    }

    #[test]
    fn nothing_configured() {
        let err = resolve_api_key(&AuthConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
