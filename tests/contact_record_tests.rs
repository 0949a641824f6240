use rolodex::{ContactRecord, RolodexError};

#[test]
fn rejects_injection_attempt_and_keeps_prior_value() {
    let mut record = ContactRecord::new();
    record.set("firstname", "bob").expect("valid name rejected");

    let err = record.set("firstname", "; DROP TABLE").unwrap_err();
    assert!(matches!(err, RolodexError::Validation { .. }));
    assert_eq!(record.get("firstname").unwrap(), Some("bob"));
}

#[test]
fn phone_rejects_formatting_characters() {
    let mut record = ContactRecord::new();
    assert!(record.set("phone", "+1-555-1234").is_err());
    assert!(record.set("phone", "this is not a phone number").is_err());
    assert!(record.set("phone", "555+1234").is_err());
    assert!(record.set("phone", "+").is_err());

    record.set("phone", "+15551234").expect("valid phone rejected");
    assert_eq!(record.get("phone").unwrap(), Some("+15551234"));
}

#[test]
fn field_lookup_is_case_insensitive_and_unknown_fields_fail() {
    let mut record = ContactRecord::new();
    record.set("PhOnE", "123").expect("case-insensitive lookup failed");
    assert_eq!(record.get("phone").unwrap(), Some("123"));

    let err = record.set("email", "bob@example.com").unwrap_err();
    assert!(matches!(err, RolodexError::Validation { .. }));
    assert!(record.get("email").is_err());
}

#[test]
fn whitespace_value_clears_a_field() {
    let mut record = ContactRecord::new();
    record.set("surname", "Jones").unwrap();
    record.set("surname", "   ").unwrap();
    assert_eq!(record.get("surname").unwrap(), None);
}

#[test]
fn apostrophes_are_escaped_on_assignment() {
    let mut record = ContactRecord::new();
    record.set("surname", "O'Neill").unwrap();
    assert_eq!(record.get("surname").unwrap(), Some("O''Neill"));
}

#[test]
fn projection_skips_null_fields_and_collapses_to_none() {
    let empty = ContactRecord::new();
    assert!(empty.projection().is_none());
    assert!(empty.insert_fragment().is_none());

    let mut record = ContactRecord::new();
    record.set("firstname", "Colin").unwrap();
    record.set("surname", "O'Neill").unwrap();
    let (columns, values) = record.projection().expect("projection was empty");
    assert_eq!(columns, vec!["FIRSTNAME", "SURNAME"]);
    assert_eq!(values, vec!["Colin", "O''Neill"]);

    assert_eq!(
        record.insert_fragment().unwrap(),
        "(FIRSTNAME, SURNAME) values ('Colin', 'O''Neill')"
    );
}

#[test]
fn update_fragment_writes_null_for_cleared_fields() {
    let mut record = ContactRecord::new();
    record.set("surname", "jones").unwrap();
    assert_eq!(
        record.update_fragment(),
        "FIRSTNAME = NULL, SURNAME = 'jones', PHONE = NULL"
    );
}

#[test]
fn over_length_values_are_rejected() {
    let mut record = ContactRecord::new();
    let long_name = "a".repeat(41);
    assert!(record.set("firstname", &long_name).is_err());
    assert!(record.set("firstname", &"a".repeat(40)).is_ok());

    let long_phone = "1".repeat(17);
    assert!(record.set("phone", &long_phone).is_err());
}

#[test]
fn column_defs_follow_the_fixed_schema() {
    assert_eq!(
        ContactRecord::column_defs(),
        "FIRSTNAME varchar(40), SURNAME varchar(40), PHONE varchar(16)"
    );
}
