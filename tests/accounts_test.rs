mod common;

use realvsai::services::accounts::{AccountService, LoginOutcome};
use realvsai::GameError;

use common::{create_test_db, noon};

#[tokio::test]
async fn test_register_then_login() {
    let db = create_test_db().await;
    let accounts = AccountService::new(db.clone());

    let id = accounts
        .register("ada", "ada@example.com", "correct horse")
        .await
        .unwrap();

    let outcome = accounts
        .login("ada", "correct horse", Some("192.0.2.7"), noon(2024, 1, 1))
        .await
        .unwrap();
    match outcome {
        LoginOutcome::Success(user) => {
            assert_eq!(user.id, id);
            assert_eq!(user.username, "ada");
        }
        LoginOutcome::InvalidCredentials => panic!("login should succeed"),
    }
    assert_eq!(db.ip_addresses(id).await.unwrap(), vec!["192.0.2.7".to_string()]);

    let outcome = accounts
        .login("ada", "wrong horse", None, noon(2024, 1, 1))
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::InvalidCredentials));
}

#[tokio::test]
async fn test_duplicate_registration_is_invalid() {
    let db = create_test_db().await;
    let accounts = AccountService::new(db);

    accounts
        .register("ada", "ada@example.com", "correct horse")
        .await
        .unwrap();
    let err = accounts
        .register("ada", "someone@example.com", "correct horse")
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::Invalid(_)));
}
