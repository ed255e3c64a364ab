//! Session authenticator: the five-step SSO handshake.
//!
//! A [`LoginAttempt`] walks `Init → ChallengeReceived → CredentialsEncrypted
//! → AuthSubmitted → Verified | Failed`. Each step is a separate method so the
//! protocol can be driven and tested step by step; [`Authenticator::login`]
//! runs them in order. Steps are never retried.

mod attempt;
mod encryptor;

pub use attempt::{AuthState, LoginAttempt, SessionContext, VerificationTokens};
pub use encryptor::{CredentialEncryptor, Pkcs1v15Encryptor};

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::cache::AccountStore;
use crate::config::LvdConfig;
use crate::error::AuthError;
use crate::http::HttpTransport;
use crate::model::Credentials;

/// Proof of a verified login. The transport holds the session cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    pub user_id: String,
    pub verified_at: DateTime<Utc>,
}

pub struct Authenticator {
    transport: Arc<dyn HttpTransport>,
    encryptor: Arc<dyn CredentialEncryptor>,
    accounts: AccountStore,
    config: LvdConfig,
}

impl Authenticator {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        encryptor: Arc<dyn CredentialEncryptor>,
        accounts: AccountStore,
        config: LvdConfig,
    ) -> Self {
        Self {
            transport,
            encryptor,
            accounts,
            config,
        }
    }

    pub fn attempt(&self) -> LoginAttempt<'_> {
        LoginAttempt::new(self.transport.as_ref(), self.encryptor.as_ref(), &self.config)
    }

    /// Run the full handshake. On success the account id and timestamp are
    /// recorded; the secret is never stored.
    pub async fn login(&self, creds: &Credentials) -> Result<AuthenticatedSession, AuthError> {
        tracing::info!(user = %creds.id, "login started");
        let mut attempt = self.attempt();
        let token = attempt.initiate().await?;
        let challenge = attempt.exchange_challenge(&token).await?;
        let e2 = attempt.encrypt_credentials(creds, &challenge)?;
        let tokens = attempt.authenticate(&e2).await?;
        attempt.finalize(&tokens).await?;

        let verified_at = Utc::now();
        if let Err(e) = self.accounts.record_verified(&creds.id).await {
            tracing::warn!("could not record verified account: {:#}", e);
        }
        tracing::info!(user = %creds.id, "login verified");
        Ok(AuthenticatedSession {
            user_id: creds.id.clone(),
            verified_at,
        })
    }
}

#[cfg(test)]
mod tests;
