use chrono::{DateTime, Utc};
use std::fmt;

use crate::s3::signer::SignerError;

/// Access key pair used to sign requests
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Temporary-credential token, sent as `x-amz-security-token`
    pub session_token: Option<String>,
    /// Temporary credentials past this instant are refused
    pub expiration: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            expiration: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Both key fields must be present, and unexpired, before anything is signed
    pub fn validate(&self) -> Result<(), SignerError> {
        if self.access_key_id.is_empty() || self.secret_access_key.is_empty() {
            return Err(SignerError::InvalidCredentials);
        }
        if self.expiration.is_some_and(|expiration| expiration <= Utc::now()) {
            return Err(SignerError::InvalidCredentials);
        }
        Ok(())
    }
}

// Keep secrets out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("expiration", &self.expiration)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(Credentials::new("AKID", "secret").validate().is_ok());
        assert!(matches!(
            Credentials::new("", "secret").validate(),
            Err(SignerError::InvalidCredentials)
        ));
        assert!(matches!(
            Credentials::new("AKID", "").validate(),
            Err(SignerError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_rejects_expired() {
        let hour = chrono::Duration::hours(1);
        let expired = Credentials::new("AKID", "secret").with_expiration(Utc::now() - hour);
        assert!(matches!(expired.validate(), Err(SignerError::InvalidCredentials)));

        let fresh = Credentials::new("AKID", "secret").with_expiration(Utc::now() + hour);
        assert!(fresh.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("AKID", "supersecret").with_session_token("tok");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("AKID"));
        assert!(!debug.contains("supersecret"));
        assert!(!debug.contains("tok\""));
    }
}
