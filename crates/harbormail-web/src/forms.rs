//! Login form checks, run before any connection is opened.

use serde::Deserialize;

use harbormail_core::validation::is_valid_email;
use harbormail_core::{CoreError, CoreResult, ProviderRegistry};

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginForm {
    /// Field-level checks: both fields present, a plausible address, a
    /// provider we know how to talk to. The caller decides how much of
    /// the failure cause the client gets to see.
    pub fn validate(&self, registry: &ProviderRegistry) -> CoreResult<()> {
        if self.email.trim().is_empty() {
            return Err(CoreError::InvalidRequest("Missing field: email".into()));
        }
        if self.password.is_empty() {
            return Err(CoreError::InvalidRequest("Missing field: password".into()));
        }
        if !is_valid_email(&self.email) {
            return Err(CoreError::InvalidRequest(format!(
                "Not a valid address: {}",
                self.email
            )));
        }
        registry.for_address(&self.email).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(email: &str, password: &str) -> LoginForm {
        LoginForm {
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_accepts_supported_providers() {
        let registry = ProviderRegistry::with_defaults();
        assert!(form("kate@gmail.com", "hunter2").validate(&registry).is_ok());
        assert!(form("olena@ukr.net", "hunter2").validate(&registry).is_ok());
    }

    #[test]
    fn test_rejects_missing_fields() {
        let registry = ProviderRegistry::with_defaults();
        assert!(form("", "hunter2").validate(&registry).is_err());
        assert!(form("kate@gmail.com", "").validate(&registry).is_err());
    }

    #[test]
    fn test_rejects_malformed_address() {
        let registry = ProviderRegistry::with_defaults();
        assert!(form("not-an-address", "hunter2").validate(&registry).is_err());
    }

    #[test]
    fn test_rejects_unsupported_provider() {
        let registry = ProviderRegistry::with_defaults();
        let err = form("taras@i.ua", "hunter2").validate(&registry).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedProvider(_)));
    }
}
