//! One login attempt and its state machine.

use serde::Serialize;

use super::encryptor::CredentialEncryptor;
use crate::config::LvdConfig;
use crate::error::AuthError;
use crate::http::{HttpError, HttpTransport};
use crate::model::Credentials;
use crate::page_model::{self, SsoChallenge};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Init,
    ChallengeReceived,
    CredentialsEncrypted,
    AuthSubmitted,
    Verified,
    Failed,
}

impl AuthState {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthState::Init => "INIT",
            AuthState::ChallengeReceived => "CHALLENGE_RECEIVED",
            AuthState::CredentialsEncrypted => "CREDENTIALS_ENCRYPTED",
            AuthState::AuthSubmitted => "AUTH_SUBMITTED",
            AuthState::Verified => "VERIFIED",
            AuthState::Failed => "FAILED",
        }
    }
}

/// Tokens returned by the auth service, forwarded verbatim to finalize.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationTokens {
    pub e3: String,
    pub e4: String,
    pub s2: String,
    pub cltid: String,
}

/// Per-attempt handshake context. Holds no secret and is never serialized.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub challenge_token: Option<String>,
    pub public_key_modulus: Option<String>,
    pub public_key_exponent: Option<String>,
    pub verification_tokens: Option<VerificationTokens>,
    pub verified: bool,
}

/// Field order matters to the SSO server: userid, userpw, ssoChallenge.
#[derive(Serialize)]
struct CredentialPayload<'a> {
    userid: &'a str,
    userpw: &'a str,
    #[serde(rename = "ssoChallenge")]
    sso_challenge: &'a str,
}

pub struct LoginAttempt<'a> {
    transport: &'a dyn HttpTransport,
    encryptor: &'a dyn CredentialEncryptor,
    config: &'a LvdConfig,
    state: AuthState,
    ctx: SessionContext,
}

impl<'a> LoginAttempt<'a> {
    pub fn new(
        transport: &'a dyn HttpTransport,
        encryptor: &'a dyn CredentialEncryptor,
        config: &'a LvdConfig,
    ) -> Self {
        Self {
            transport,
            encryptor,
            config,
            state: AuthState::Init,
            ctx: SessionContext::default(),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    fn require(&self, expected: AuthState, step: &'static str) -> Result<(), AuthError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(AuthError::OutOfOrder {
                step,
                state: self.state.as_str(),
            })
        }
    }

    /// Record the outcome of a step: success advances, failure is terminal.
    fn settle<T>(&mut self, result: Result<T, AuthError>, next: AuthState) -> Result<T, AuthError> {
        match result {
            Ok(v) => {
                self.state = next;
                Ok(v)
            }
            Err(e) => {
                tracing::warn!(state = self.state.as_str(), "login step failed: {}", e);
                self.state = AuthState::Failed;
                Err(e)
            }
        }
    }

    /// Form fields every SSO request carries.
    fn base_form(&self) -> Vec<(&'static str, String)> {
        let origin = self.config.platform_base().to_string();
        vec![
            ("app_id", self.config.app_id.clone()),
            ("retUrl", origin.clone()),
            ("failUrl", origin.clone()),
            ("baseUrl", origin),
        ]
    }

    async fn post(&self, url: &str, fields: Vec<(&'static str, String)>) -> Result<String, HttpError> {
        let form: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        Ok(self.transport.post_form(url, &form).await?.body)
    }

    /// GET the platform login page and extract the `S1` session token.
    pub async fn initiate(&mut self) -> Result<String, AuthError> {
        self.require(AuthState::Init, "initiate")?;
        let url = format!("{}/passni/sso/spLogin2.php", self.config.platform_base());
        let result = match self.transport.get(&url).await {
            Ok(page) => page_model::parse_input_tags(&page.body)
                .remove("S1")
                .filter(|s| !s.is_empty())
                .ok_or(AuthError::ParseFailure {
                    step: "initiate",
                    what: "S1",
                }),
            Err(source) => Err(AuthError::NetworkFailure {
                step: "initiate",
                source,
            }),
        };
        let token = self.settle(result, AuthState::Init)?;
        self.ctx.challenge_token = Some(token.clone());
        Ok(token)
    }

    /// Exchange `S1` for the SSO challenge and RSA public key.
    pub async fn exchange_challenge(&mut self, token: &str) -> Result<SsoChallenge, AuthError> {
        self.require(AuthState::Init, "exchange_challenge")?;
        let url = format!("{}/sso/PmSSOService", self.config.sso_base());
        let mut fields = self.base_form();
        fields.push(("S1", token.to_string()));
        fields.push(("refererUrl", self.config.platform_base().to_string()));
        let result = match self.post(&url, fields).await {
            Ok(body) => page_model::parse_sso_challenge(&body).ok_or(AuthError::ParseFailure {
                step: "exchange_challenge",
                what: "ssoChallenge/public key",
            }),
            Err(source) => Err(AuthError::NetworkFailure {
                step: "exchange_challenge",
                source,
            }),
        };
        let challenge = self.settle(result, AuthState::ChallengeReceived)?;
        self.ctx.challenge_token = Some(token.to_string());
        self.ctx.public_key_modulus = Some(challenge.modulus.clone());
        self.ctx.public_key_exponent = Some(challenge.exponent.clone());
        Ok(challenge)
    }

    /// Encrypt `{userid, userpw, ssoChallenge}` and return it as uppercase hex (`E2`).
    pub fn encrypt_credentials(
        &mut self,
        creds: &Credentials,
        challenge: &SsoChallenge,
    ) -> Result<String, AuthError> {
        self.require(AuthState::ChallengeReceived, "encrypt_credentials")?;
        let payload = CredentialPayload {
            userid: &creds.id,
            userpw: &creds.secret,
            sso_challenge: &challenge.challenge,
        };
        let result = serde_json::to_vec(&payload)
            .map_err(|e| AuthError::EncryptionFailure(e.to_string()))
            .and_then(|plain| {
                self.encryptor
                    .encrypt(&plain, &challenge.modulus, &challenge.exponent)
                    .map_err(|e| AuthError::EncryptionFailure(format!("{:#}", e)))
            })
            .and_then(|ct| {
                if ct.is_empty() {
                    Err(AuthError::EncryptionFailure("primitive returned no ciphertext".into()))
                } else {
                    Ok(hex::encode_upper(ct))
                }
            });
        self.settle(result, AuthState::CredentialsEncrypted)
    }

    /// Submit `E2`; the response form carries `E3`/`E4` (and optionally `S2`, `CLTID`).
    pub async fn authenticate(&mut self, e2: &str) -> Result<VerificationTokens, AuthError> {
        self.require(AuthState::CredentialsEncrypted, "authenticate")?;
        let url = format!("{}/sso/PmSSOAuthService", self.config.sso_base());
        let mut fields = self.base_form();
        fields.push(("loginType", "invokeID".to_string()));
        fields.push(("E2", e2.to_string()));
        fields.push(("refererUrl", self.config.platform_base().to_string()));
        let result = match self.post(&url, fields).await {
            Ok(body) => {
                let mut inputs = page_model::parse_input_tags(&body);
                let e3 = inputs.remove("E3").filter(|s| !s.is_empty());
                let e4 = inputs.remove("E4").filter(|s| !s.is_empty());
                match (e3, e4) {
                    (Some(e3), Some(e4)) => Ok(VerificationTokens {
                        e3,
                        e4,
                        s2: inputs.remove("S2").unwrap_or_default(),
                        cltid: inputs.remove("CLTID").unwrap_or_default(),
                    }),
                    _ => Err(AuthError::ParseFailure {
                        step: "authenticate",
                        what: "E3/E4",
                    }),
                }
            }
            Err(source) => Err(AuthError::NetworkFailure {
                step: "authenticate",
                source,
            }),
        };
        let tokens = self.settle(result, AuthState::AuthSubmitted)?;
        self.ctx.verification_tokens = Some(tokens.clone());
        Ok(tokens)
    }

    async fn complete_and_probe(&self, tokens: &VerificationTokens) -> Result<bool, AuthError> {
        let base = self.config.platform_base();
        let mut fields = self.base_form();
        fields.push(("E3", tokens.e3.clone()));
        fields.push(("E4", tokens.e4.clone()));
        fields.push(("S2", tokens.s2.clone()));
        fields.push(("CLTID", tokens.cltid.clone()));
        fields.push(("refererUrl", base.to_string()));
        let net = |source| AuthError::NetworkFailure {
            step: "finalize",
            source,
        };

        self.post(&format!("{base}/passni/sso/spLoginData.php"), fields)
            .await
            .map_err(net)?;
        self.transport
            .get(&format!("{base}/passni/spLoginProcess.php"))
            .await
            .map_err(net)?;
        let home = self.transport.get(&format!("{base}/")).await.map_err(net)?;
        Ok(page_model::has_logout_link(&home.body))
    }

    /// Complete the login and verify it independently against the platform home page.
    pub async fn finalize(&mut self, tokens: &VerificationTokens) -> Result<(), AuthError> {
        self.require(AuthState::AuthSubmitted, "finalize")?;
        let result = match self.complete_and_probe(tokens).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::VerificationFailed),
            Err(e) => Err(e),
        };
        self.settle(result, AuthState::Verified)?;
        self.ctx.verified = true;
        Ok(())
    }
}
