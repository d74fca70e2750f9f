use inkwell_core::clock::now_secs;
use inkwell_core::db::open_db_in_memory;
use inkwell_core::model::{ProfilePatch, Role};
use inkwell_core::{
    AuthService, CoreError, Identity, SqliteUserRepository, TokenError, TokenService,
};
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration;

const TEST_COST: u32 = 4;
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn tokens() -> Arc<TokenService> {
    Arc::new(TokenService::new("test-secret", DAY))
}

fn service(conn: &Connection) -> AuthService<SqliteUserRepository<'_>> {
    AuthService::new(SqliteUserRepository::try_new(conn).unwrap(), tokens(), TEST_COST)
}

#[test]
fn login_token_subject_is_the_registered_user_id() {
    let conn = open_db_in_memory().unwrap();
    let auth = service(&conn);

    let registered = auth
        .register("Reader@Example.com", "Reader", "hunter22")
        .unwrap();
    let session = auth.login("reader@example.com", "hunter22").unwrap();

    let identity = tokens().validate_token(&session.token).unwrap();
    assert_eq!(identity.user_id, registered.user.id);
    assert_eq!(identity.role, Role::User);
    assert_eq!(session.user, registered.user);
    assert_eq!(registered.user.email, "reader@example.com");
}

#[test]
fn wrong_password_and_unknown_email_are_indistinguishable() {
    let conn = open_db_in_memory().unwrap();
    let auth = service(&conn);
    auth.register("reader@example.com", "Reader", "hunter22")
        .unwrap();

    let wrong_password = auth.login("reader@example.com", "nope-nope").unwrap_err();
    let unknown_email = auth.login("ghost@example.com", "hunter22").unwrap_err();

    assert!(matches!(wrong_password, CoreError::Unauthenticated));
    assert!(matches!(unknown_email, CoreError::Unauthenticated));
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
}

#[test]
fn duplicate_email_is_a_conflict() {
    let conn = open_db_in_memory().unwrap();
    let auth = service(&conn);
    auth.register("reader@example.com", "Reader", "hunter22")
        .unwrap();

    let err = auth
        .register("READER@example.com", "Other", "hunter22")
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
    assert_eq!(err.status_code(), 409);
}

#[test]
fn registration_validates_input() {
    let conn = open_db_in_memory().unwrap();
    let auth = service(&conn);

    for (email, name, password) in [
        ("not-an-email", "Reader", "hunter22"),
        ("reader@example.com", "  ", "hunter22"),
        ("reader@example.com", "Reader", "short"),
    ] {
        let err = auth.register(email, name, password).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)), "{email} {name} {password}");
    }
}

#[test]
fn stored_password_is_a_bcrypt_hash() {
    let conn = open_db_in_memory().unwrap();
    let auth = service(&conn);
    let session = auth
        .register("reader@example.com", "Reader", "hunter22")
        .unwrap();

    let stored: String = conn
        .query_row(
            "SELECT password FROM users WHERE id = ?1;",
            [session.user.id.as_str()],
            |row| row.get(0),
        )
        .unwrap();
    assert_ne!(stored, "hunter22");
    assert!(stored.starts_with("$2"));

    let json = serde_json::to_value(&session).unwrap();
    assert!(json["user"].get("password").is_none());
    assert_eq!(json["user"]["role"], "user");
}

#[test]
fn expired_token_is_rejected_even_with_a_valid_signature() {
    let conn = open_db_in_memory().unwrap();
    let auth = service(&conn);
    let issuer = tokens();

    let stale = issuer
        .issue_token_at("user-1", Role::User, now_secs() - 2 * DAY.as_secs() as i64)
        .unwrap();
    assert!(matches!(
        issuer.validate_token(&stale).unwrap_err(),
        TokenError::Expired
    ));

    let header = format!("Bearer {stale}");
    let err = auth.authenticate(Some(&header)).unwrap_err();
    assert!(matches!(err, CoreError::Unauthenticated));
    assert_eq!(err.status_code(), 401);
}

#[test]
fn authenticate_resolves_bearer_header() {
    let conn = open_db_in_memory().unwrap();
    let auth = service(&conn);
    let session = auth
        .register("reader@example.com", "Reader", "hunter22")
        .unwrap();

    let identity = auth
        .authenticate(Some(&format!("Bearer {}", session.token)))
        .unwrap();
    assert_eq!(identity, Identity::new(session.user.id.clone(), Role::User));
    assert_eq!(auth.current_user(&identity).unwrap(), session.user);

    for header in [None, Some(""), Some("Basic abc"), Some("Bearer"), Some("Bearer a.b.c")] {
        assert!(matches!(
            auth.authenticate(header).unwrap_err(),
            CoreError::Unauthenticated
        ));
    }
}

#[test]
fn token_signed_with_another_secret_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let auth = service(&conn);
    let foreign = TokenService::new("other-secret", DAY)
        .issue_token("user-1", Role::Admin)
        .unwrap();

    let err = auth
        .authenticate(Some(&format!("Bearer {foreign}")))
        .unwrap_err();
    assert!(matches!(err, CoreError::Unauthenticated));
}

#[test]
fn change_password_requires_the_current_one() {
    let conn = open_db_in_memory().unwrap();
    let auth = service(&conn);
    let session = auth
        .register("reader@example.com", "Reader", "hunter22")
        .unwrap();
    let identity = Identity::new(session.user.id.clone(), Role::User);

    let err = auth
        .change_password(&identity, "wrong-one", "brand-new")
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    auth.change_password(&identity, "hunter22", "brand-new")
        .unwrap();
    assert!(auth.login("reader@example.com", "hunter22").is_err());
    assert!(auth.login("reader@example.com", "brand-new").is_ok());
}

#[test]
fn profile_update_is_sparse() {
    let conn = open_db_in_memory().unwrap();
    let auth = service(&conn);
    let session = auth
        .register("reader@example.com", "Reader", "hunter22")
        .unwrap();
    let identity = Identity::new(session.user.id.clone(), Role::User);

    let updated = auth
        .update_profile(
            &identity,
            &ProfilePatch {
                bio: Some("writes about Rust".to_string()),
                ..ProfilePatch::default()
            },
        )
        .unwrap();
    assert_eq!(updated.name, "Reader");
    assert_eq!(updated.bio, "writes about Rust");
}

#[test]
fn user_administration_requires_the_admin_role() {
    let conn = open_db_in_memory().unwrap();
    let auth = service(&conn);
    let admin = auth
        .register_with_role("admin@example.com", "Admin", "hunter22", Role::Admin)
        .unwrap();
    let reader = auth
        .register("reader@example.com", "Reader", "hunter22")
        .unwrap();
    let admin_identity = Identity::new(admin.user.id.clone(), Role::Admin);
    let reader_identity = Identity::new(reader.user.id.clone(), Role::User);

    assert!(matches!(
        auth.list_users(&reader_identity, None, 1, 20).unwrap_err(),
        CoreError::Forbidden(_)
    ));
    let everyone = auth.list_users(&admin_identity, None, 1, 20).unwrap();
    assert_eq!(everyone.total, 2);
    let matched = auth
        .list_users(&admin_identity, Some("reader"), 1, 20)
        .unwrap();
    assert_eq!(matched.items, vec![reader.user.clone()]);

    auth.update_user_role(&admin_identity, &reader.user.id, Role::Admin)
        .unwrap();
    assert_eq!(auth.current_user(&reader_identity).unwrap().role, Role::Admin);

    assert!(matches!(
        auth.delete_user(&admin_identity, &admin.user.id).unwrap_err(),
        CoreError::Validation(_)
    ));
    auth.delete_user(&admin_identity, &reader.user.id).unwrap();
    assert!(matches!(
        auth.current_user(&reader_identity).unwrap_err(),
        CoreError::NotFound { entity: "user", .. }
    ));
}
