use rolodex::RolodexError;
use rolodex::credential::{SALT_LENGTH, generate_salt, hash_password, verify_password};

#[test]
fn hash_then_verify_round_trips() {
    let salt = generate_salt(SALT_LENGTH).expect("salt generation failed");
    let hash = hash_password("correct horse battery staple", &salt);
    assert!(verify_password("correct horse battery staple", &hash, &salt));
}

#[test]
fn any_single_character_change_fails_verification() {
    let salt = generate_salt(SALT_LENGTH).expect("salt generation failed");
    let password = "hunter2";
    let hash = hash_password(password, &salt);

    for (idx, _) in password.char_indices() {
        let mut tampered: Vec<char> = password.chars().collect();
        tampered[idx] = if tampered[idx] == 'x' { 'y' } else { 'x' };
        let tampered: String = tampered.into_iter().collect();
        assert!(
            !verify_password(&tampered, &hash, &salt),
            "tampered password {tampered:?} verified"
        );
    }
}

#[test]
fn verification_is_salt_sensitive() {
    let salt_a = generate_salt(64).expect("salt generation failed");
    let salt_b = generate_salt(64).expect("salt generation failed");
    assert_ne!(salt_a, salt_b);

    let hash = hash_password("pw", &salt_a);
    assert!(!verify_password("pw", &hash, &salt_b));
}

#[test]
fn same_password_different_salt_different_hash() {
    let salt_a = generate_salt(64).expect("salt generation failed");
    let salt_b = generate_salt(64).expect("salt generation failed");
    let hash_a = hash_password("pw", &salt_a);
    let hash_b = hash_password("pw", &salt_b);
    assert_ne!(hash_a, hash_b);
}

#[test]
fn salt_length_must_be_positive() {
    assert!(matches!(
        generate_salt(0),
        Err(RolodexError::Validation { .. })
    ));
    assert!(generate_salt(1).is_ok());
}
