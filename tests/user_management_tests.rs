use rolodex::{ConnectConfig, ContactRecord, RolodexError, SessionManager};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const BOOT: &str = "boot-secret";
const OWNER: &str = "admin";
const OWNER_PWD: &str = "ownerpw";

fn temp_db(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "rolodex-{tag}-{}-{nanos}.sqlite",
        std::process::id()
    ));
    path
}

fn cfg(path: &Path, user: &str, pwd: &str) -> ConnectConfig {
    ConnectConfig::new(path.to_string_lossy(), BOOT, user, pwd)
}

/// Creates the database with an ADMIN owner and an ALICE tenant, then
/// disconnects.
async fn bootstrap(path: &Path) {
    let mut mgr = SessionManager::new();
    let session = mgr
        .connect(&cfg(path, OWNER, OWNER_PWD))
        .await
        .expect("owner connect failed");
    session
        .add_user("alice", "alicepw", OWNER_PWD)
        .await
        .expect("add_user failed");
    mgr.disconnect().await;
}

#[tokio::test]
async fn adding_a_user_provisions_their_namespace() {
    let path = temp_db("add-user");
    bootstrap(&path).await;

    let mut mgr = SessionManager::new();
    let session = mgr
        .connect(&cfg(&path, OWNER, OWNER_PWD))
        .await
        .expect("owner reconnect failed");

    assert_eq!(session.list_users().await.unwrap(), vec!["ADMIN", "ALICE"]);
    let tables = session.list_tables().await.unwrap();
    assert_eq!(
        tables,
        vec![
            "ADMIN.SECURE",
            "ALICE.CONTACTS",
            "ALICE.GROUPS",
            "ALICE.SECURE"
        ]
    );

    mgr.disconnect().await;
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn user_management_is_owner_only() {
    let path = temp_db("owner-only");
    bootstrap(&path).await;

    let mut mgr = SessionManager::new();
    let session = mgr
        .connect(&cfg(&path, "alice", "alicepw"))
        .await
        .expect("alice connect failed");

    assert!(matches!(
        session.list_users().await.unwrap_err(),
        RolodexError::Authorization { .. }
    ));
    assert!(matches!(
        session.add_user("bob", "bobpw", "alicepw").await.unwrap_err(),
        RolodexError::Authorization { .. }
    ));
    assert!(matches!(
        session.delete_user("alice", "alicepw").await.unwrap_err(),
        RolodexError::Authorization { .. }
    ));
    assert!(matches!(
        session
            .reset_password("alice", "newpw", "alicepw")
            .await
            .unwrap_err(),
        RolodexError::Authorization { .. }
    ));

    mgr.disconnect().await;
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn add_user_reverifies_the_owner_password() {
    let path = temp_db("owner-pwd");
    bootstrap(&path).await;

    let mut mgr = SessionManager::new();
    let session = mgr
        .connect(&cfg(&path, OWNER, OWNER_PWD))
        .await
        .expect("owner reconnect failed");

    assert!(matches!(
        session.add_user("bob", "bobpw", "not-the-owner-pwd").await.unwrap_err(),
        RolodexError::Credential
    ));
    assert!(matches!(
        session.delete_user("alice", "not-the-owner-pwd").await.unwrap_err(),
        RolodexError::Credential
    ));

    mgr.disconnect().await;
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn duplicate_user_fails_without_touching_existing_data() {
    let path = temp_db("duplicate");
    bootstrap(&path).await;

    // alice stores a contact
    let mut mgr = SessionManager::new();
    let session = mgr
        .connect(&cfg(&path, "alice", "alicepw"))
        .await
        .expect("alice connect failed");
    let mut contact = ContactRecord::new();
    contact.set("firstname", "bob").unwrap();
    session.add_contact(&contact).await.expect("add_contact failed");
    mgr.disconnect().await;

    // re-provisioning the same username fails and corrupts nothing
    let session = mgr
        .connect(&cfg(&path, OWNER, OWNER_PWD))
        .await
        .expect("owner reconnect failed");
    assert!(matches!(
        session.add_user("alice", "other", OWNER_PWD).await.unwrap_err(),
        RolodexError::AlreadyExists { .. }
    ));
    assert!(matches!(
        session.add_user("ALICE", "other", OWNER_PWD).await.unwrap_err(),
        RolodexError::AlreadyExists { .. }
    ));

    let table = session.read_table("ALICE.CONTACTS").await.unwrap();
    assert_eq!(table.len(), 2, "alice's data should be intact");
    assert_eq!(table[1][1].as_deref(), Some("bob"));
    mgr.disconnect().await;

    // the original password still works
    let session = mgr
        .connect(&cfg(&path, "alice", "alicepw"))
        .await
        .expect("alice login should be unchanged");
    assert!(!session.is_owner());

    mgr.disconnect().await;
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn change_password_takes_effect_on_next_connect() {
    let path = temp_db("chpwd");
    bootstrap(&path).await;

    let mut mgr = SessionManager::new();
    let session = mgr
        .connect(&cfg(&path, "alice", "alicepw"))
        .await
        .expect("alice connect failed");

    assert!(matches!(
        session.change_password("wrong-old", "newpw").await.unwrap_err(),
        RolodexError::Credential
    ));
    session
        .change_password("alicepw", "newpw")
        .await
        .expect("change_password failed");
    mgr.disconnect().await;

    assert!(matches!(
        mgr.connect(&cfg(&path, "alice", "alicepw")).await.unwrap_err(),
        RolodexError::Credential
    ));
    mgr.connect(&cfg(&path, "alice", "newpw"))
        .await
        .expect("new password should work");

    mgr.disconnect().await;
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn reset_password_is_owner_driven() {
    let path = temp_db("reset");
    bootstrap(&path).await;

    let mut mgr = SessionManager::new();
    let session = mgr
        .connect(&cfg(&path, OWNER, OWNER_PWD))
        .await
        .expect("owner reconnect failed");

    assert!(matches!(
        session
            .reset_password("nobody", "newpw", OWNER_PWD)
            .await
            .unwrap_err(),
        RolodexError::NotFound { .. }
    ));
    session
        .reset_password("alice", "issued-pw", OWNER_PWD)
        .await
        .expect("reset_password failed");
    mgr.disconnect().await;

    mgr.connect(&cfg(&path, "alice", "issued-pw"))
        .await
        .expect("reset password should work");

    mgr.disconnect().await;
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn delete_user_removes_namespace_and_login() {
    let path = temp_db("del-user");
    bootstrap(&path).await;

    let mut mgr = SessionManager::new();
    let session = mgr
        .connect(&cfg(&path, OWNER, OWNER_PWD))
        .await
        .expect("owner reconnect failed");

    // the owner account itself is immutable
    assert!(matches!(
        session.delete_user(OWNER, OWNER_PWD).await.unwrap_err(),
        RolodexError::Authorization { .. }
    ));
    assert!(matches!(
        session.delete_user("nobody", OWNER_PWD).await.unwrap_err(),
        RolodexError::NotFound { .. }
    ));

    session
        .delete_user("alice", OWNER_PWD)
        .await
        .expect("delete_user failed");
    assert_eq!(session.list_users().await.unwrap(), vec!["ADMIN"]);
    assert_eq!(session.list_tables().await.unwrap(), vec!["ADMIN.SECURE"]);
    mgr.disconnect().await;

    assert!(matches!(
        mgr.connect(&cfg(&path, "alice", "alicepw")).await.unwrap_err(),
        RolodexError::Credential
    ));

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn password_whitespace_rules_are_enforced() {
    let path = temp_db("pwd-rules");
    bootstrap(&path).await;

    let mut mgr = SessionManager::new();
    let session = mgr
        .connect(&cfg(&path, OWNER, OWNER_PWD))
        .await
        .expect("owner reconnect failed");

    assert!(matches!(
        session.add_user("bob", " padded ", OWNER_PWD).await.unwrap_err(),
        RolodexError::Validation { .. }
    ));
    assert!(matches!(
        session.add_user("bob", "   ", OWNER_PWD).await.unwrap_err(),
        RolodexError::Validation { .. }
    ));
    assert!(matches!(
        session
            .reset_password("alice", "padded ", OWNER_PWD)
            .await
            .unwrap_err(),
        RolodexError::Validation { .. }
    ));
    assert!(matches!(
        session.add_user("bad name", "pw", OWNER_PWD).await.unwrap_err(),
        RolodexError::Validation { .. }
    ));

    mgr.disconnect().await;
    let _ = std::fs::remove_file(&path);
}
