use super::*;
use crate::security::Principal;
use serde_json::json;

const KEY: &[u8] = b"login-test-key";

fn fixture_service() -> LoginService {
    LoginService::new(
        vec![
            UserInfo {
                user_name: "ada".into(),
                user_id: "u-1".into(),
                password: "correct horse".into(),
                roles: vec!["admin".into()],
            },
            UserInfo {
                user_name: "grace".into(),
                user_id: "u-2".into(),
                password: "hopper".into(),
                roles: vec![],
            },
        ],
        DEFAULT_EXPIRE_SECONDS,
        KEY,
    )
}

// =============================================================================
// login
// =============================================================================

#[test]
fn login_issues_verifiable_token() {
    let service = fixture_service();
    let token = service.login("ada", "correct horse").unwrap();
    let claims = security::verify(&token, KEY).unwrap();
    assert_eq!(claims.subject, "u-1");
    assert_eq!(claims.roles, vec!["admin"]);
    assert!(!claims.is_expired());
}

#[test]
fn wrong_password_is_rejected() {
    let service = fixture_service();
    let err = service.login("ada", "wrong").unwrap_err();
    assert!(matches!(err, DispatchError::NotAuthorized));
}

#[test]
fn unknown_user_is_rejected() {
    let service = fixture_service();
    let err = service.login("nobody", "hopper").unwrap_err();
    assert!(matches!(err, DispatchError::NotAuthorized));
}

#[test]
fn empty_user_list_rejects_everyone() {
    let service = LoginService::new(vec![], DEFAULT_EXPIRE_SECONDS, KEY);
    assert!(service.login("ada", "correct horse").is_err());
}

// =============================================================================
// service surface
// =============================================================================

#[tokio::test]
async fn invoke_login_returns_token_string() {
    let service = fixture_service();
    let value = service
        .invoke(&CallContext::anonymous(), "login", &[json!("grace"), json!("hopper")])
        .await
        .unwrap();
    let token = value.as_str().unwrap();
    assert!(security::verify(token, KEY).is_ok());
}

#[tokio::test]
async fn invoke_login_with_missing_args_is_bad_arguments() {
    let service = fixture_service();
    let err = service
        .invoke(&CallContext::anonymous(), "login", &[json!("grace")])
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::BadArguments(_)));
}

#[tokio::test]
async fn is_login_reflects_the_bound_principal() {
    let service = fixture_service();
    let anonymous = service
        .invoke(&CallContext::anonymous(), "is_login", &[])
        .await
        .unwrap();
    assert_eq!(anonymous, json!(false));

    let token = service.login("ada", "correct horse").unwrap();
    let ctx = CallContext::with_principal(Principal::from_token(&token, KEY).unwrap());
    let bound = service.invoke(&ctx, "is_login", &[]).await.unwrap();
    assert_eq!(bound, json!(true));
}

#[tokio::test]
async fn logout_acknowledges() {
    let service = fixture_service();
    let value = service.invoke(&CallContext::anonymous(), "logout", &[]).await.unwrap();
    assert_eq!(value, json!(true));
}
