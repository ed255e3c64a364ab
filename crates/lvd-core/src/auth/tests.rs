//! Handshake tests against a scripted transport.

use std::sync::Arc;

use anyhow::Result;

use super::*;
use crate::cache::open_memory;
use crate::http::testing::{Reply, ScriptedTransport};
use crate::http::HttpTransport;

const LOGIN: &str = "https://ys.learnus.org/passni/sso/spLogin2.php";
const EXCHANGE: &str = "https://infra.yonsei.ac.kr/sso/PmSSOService";
const AUTH: &str = "https://infra.yonsei.ac.kr/sso/PmSSOAuthService";
const DATA: &str = "https://ys.learnus.org/passni/sso/spLoginData.php";
const PROCESS: &str = "https://ys.learnus.org/passni/spLoginProcess.php";
const HOME: &str = "https://ys.learnus.org/";

/// Returns the plaintext as "ciphertext" so tests can inspect the payload.
struct EchoEncryptor;

impl CredentialEncryptor for EchoEncryptor {
    fn encrypt(&self, plaintext: &[u8], _m: &str, _e: &str) -> Result<Vec<u8>> {
        Ok(plaintext.to_vec())
    }
}

struct EmptyEncryptor;

impl CredentialEncryptor for EmptyEncryptor {
    fn encrypt(&self, _p: &[u8], _m: &str, _e: &str) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

fn happy_transport(home: &str) -> ScriptedTransport {
    ScriptedTransport::new()
        .html(LOGIN, r#"<form><input type="hidden" name="S1" value="S1-TOKEN"></form>"#)
        .html(
            EXCHANGE,
            r#"<script>var ssoChallenge = 'CH-1'; rsa.setPublic('ABCDEF', '10001');</script>"#,
        )
        .html(
            AUTH,
            r#"<form><input name="E3" value="e3v"><input name="E4" value="e4v"><input name="S2" value="s2v"></form>"#,
        )
        .html(DATA, "<html>ok</html>")
        .html(PROCESS, "<html>ok</html>")
        .html(HOME, home)
}

async fn authenticator(
    transport: Arc<ScriptedTransport>,
    encryptor: Arc<dyn CredentialEncryptor>,
) -> (Authenticator, AccountStore) {
    let accounts = AccountStore::new(open_memory().await.unwrap());
    let auth = Authenticator::new(
        transport as Arc<dyn HttpTransport>,
        encryptor,
        accounts.clone(),
        LvdConfig::default(),
    );
    (auth, accounts)
}

fn creds() -> Credentials {
    Credentials::new("2020123456", "pw")
}

#[tokio::test]
async fn full_login_verifies_and_records_account() {
    let t = Arc::new(happy_transport(r#"<a href="/login/logout.php?sesskey=x">Logout</a>"#));
    let (auth, accounts) = authenticator(t.clone(), Arc::new(EchoEncryptor)).await;

    let session = auth.login(&creds()).await.unwrap();
    assert_eq!(session.user_id, "2020123456");
    assert!(accounts.get("2020123456").await.unwrap().is_some());

    let calls = t.calls();
    let urls: Vec<_> = calls.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(urls, [LOGIN, EXCHANGE, AUTH, DATA, PROCESS, HOME]);

    let exchange = &calls[1];
    assert!(exchange.form.contains(&("S1".into(), "S1-TOKEN".into())));
    assert!(exchange.form.contains(&("app_id".into(), "ednetYonsei".into())));

    let auth_call = &calls[2];
    assert!(auth_call.form.contains(&("loginType".into(), "invokeID".into())));
    let e2 = &auth_call.form.iter().find(|(k, _)| k == "E2").unwrap().1;
    let plain = String::from_utf8(hex::decode(e2).unwrap()).unwrap();
    assert_eq!(plain, r#"{"userid":"2020123456","userpw":"pw","ssoChallenge":"CH-1"}"#);
    assert_eq!(e2, &e2.to_uppercase());

    let data = &calls[3];
    assert!(data.form.contains(&("E3".into(), "e3v".into())));
    assert!(data.form.contains(&("S2".into(), "s2v".into())));
    assert!(data.form.contains(&("CLTID".into(), String::new())));
}

#[tokio::test]
async fn missing_logout_link_fails_verification() {
    let t = Arc::new(happy_transport(r#"<a href="/login/index.php">Login</a>"#));
    let (auth, accounts) = authenticator(t, Arc::new(EchoEncryptor)).await;
    let err = auth.login(&creds()).await.unwrap_err();
    assert!(matches!(err, AuthError::VerificationFailed));
    assert!(accounts.get("2020123456").await.unwrap().is_none());
}

#[tokio::test]
async fn missing_s1_is_parse_failure() {
    let t = Arc::new(ScriptedTransport::new().html(LOGIN, "<form></form>"));
    let (auth, _) = authenticator(t.clone(), Arc::new(EchoEncryptor)).await;
    let mut attempt = auth.attempt();
    let err = attempt.initiate().await.unwrap_err();
    assert!(matches!(err, AuthError::ParseFailure { what: "S1", .. }));
    assert_eq!(attempt.state(), AuthState::Failed);
    assert_eq!(t.call_count(), 1);
}

#[tokio::test]
async fn missing_public_key_is_parse_failure() {
    let t = Arc::new(
        ScriptedTransport::new()
            .html(LOGIN, r#"<input name="S1" value="x">"#)
            .html(EXCHANGE, "var ssoChallenge = 'c';"),
    );
    let (auth, _) = authenticator(t, Arc::new(EchoEncryptor)).await;
    let err = auth.login(&creds()).await.unwrap_err();
    assert!(matches!(err, AuthError::ParseFailure { step: "exchange_challenge", .. }));
}

#[tokio::test]
async fn empty_ciphertext_is_encryption_failure() {
    let t = Arc::new(happy_transport(""));
    let (auth, _) = authenticator(t.clone(), Arc::new(EmptyEncryptor)).await;
    let err = auth.login(&creds()).await.unwrap_err();
    assert!(matches!(err, AuthError::EncryptionFailure(_)));
    // Nothing after the challenge exchange was sent.
    assert_eq!(t.call_count(), 2);
}

#[tokio::test]
async fn missing_e3_is_parse_failure() {
    let t = Arc::new(
        ScriptedTransport::new()
            .html(LOGIN, r#"<input name="S1" value="x">"#)
            .html(EXCHANGE, "var ssoChallenge = 'c'; rsa.setPublic('AB','3');")
            .html(AUTH, r#"<input name="E4" value="only-e4">"#),
    );
    let (auth, _) = authenticator(t, Arc::new(EchoEncryptor)).await;
    let err = auth.login(&creds()).await.unwrap_err();
    assert!(matches!(err, AuthError::ParseFailure { what: "E3/E4", .. }));
}

#[tokio::test]
async fn transport_failure_is_network_failure() {
    let t = Arc::new(ScriptedTransport::new().route(LOGIN, Reply::Timeout));
    let (auth, _) = authenticator(t, Arc::new(EchoEncryptor)).await;
    let err = auth.login(&creds()).await.unwrap_err();
    assert!(matches!(err, AuthError::NetworkFailure { step: "initiate", .. }));
}

#[tokio::test]
async fn out_of_order_step_is_rejected_without_state_change() {
    let t = Arc::new(happy_transport(""));
    let (auth, _) = authenticator(t.clone(), Arc::new(EchoEncryptor)).await;
    let mut attempt = auth.attempt();
    let err = attempt
        .authenticate("DEADBEEF")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::OutOfOrder { step: "authenticate", state: "INIT" }));
    assert_eq!(attempt.state(), AuthState::Init);
    assert_eq!(t.call_count(), 0);
}

#[tokio::test]
async fn step_by_step_walks_the_state_machine() {
    let t = Arc::new(happy_transport(r#"<a href="https://ys.learnus.org/login/logout.php">x</a>"#));
    let (auth, _) = authenticator(t, Arc::new(EchoEncryptor)).await;
    let mut a = auth.attempt();
    let token = a.initiate().await.unwrap();
    assert_eq!(a.state(), AuthState::Init);
    let ch = a.exchange_challenge(&token).await.unwrap();
    assert_eq!(a.state(), AuthState::ChallengeReceived);
    assert_eq!(a.context().public_key_modulus.as_deref(), Some("ABCDEF"));
    let e2 = a.encrypt_credentials(&creds(), &ch).unwrap();
    assert_eq!(a.state(), AuthState::CredentialsEncrypted);
    let tokens = a.authenticate(&e2).await.unwrap();
    assert_eq!(a.state(), AuthState::AuthSubmitted);
    a.finalize(&tokens).await.unwrap();
    assert_eq!(a.state(), AuthState::Verified);
    assert!(a.context().verified);

    // A verified attempt cannot be finalized twice.
    assert!(matches!(
        a.finalize(&tokens).await,
        Err(AuthError::OutOfOrder { .. })
    ));
}
