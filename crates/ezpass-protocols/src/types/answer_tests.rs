use super::*;

fn sample_preferences() -> Vec<RoleAssignment> {
    vec![
        RoleAssignment::new(Role::Username, FieldLocator::by_id("u")),
        RoleAssignment::new(Role::Password, FieldLocator::by_id("p")),
    ]
}

#[test]
fn test_single_match_deserialize() {
    let json = r##"{
        "preferences": [
            {"role": "Username", "selector": "#u"},
            {"role": "Password", "selector": "#p"}
        ],
        "username_email": "a@b.com",
        "password": "secret"
    }"##;
    let answer: CredentialAnswer = serde_json::from_str(json).unwrap();
    assert_eq!(answer.preferences, sample_preferences());
    assert_eq!(answer.username_email.as_deref(), Some("a@b.com"));
    assert_eq!(answer.password.as_deref(), Some("secret"));
    assert!(!answer.needs_disambiguation());
    assert!(answer.is_fillable());
}

#[test]
fn test_multiple_accounts_deserialize() {
    let json = r#"{
        "preferences": [],
        "multiple_accounts": [["pw1", "alice"], ["pw2", null]]
    }"#;
    let answer: CredentialAnswer = serde_json::from_str(json).unwrap();
    assert!(answer.needs_disambiguation());
    assert_eq!(answer.account_labels(), vec!["alice", "Account 2"]);
}

#[test]
fn test_null_fields_tolerated() {
    let json = r#"{"preferences": null, "username_email": null, "password": null, "multiple_accounts": null}"#;
    let answer: CredentialAnswer = serde_json::from_str(json).unwrap();
    assert!(answer.preferences.is_empty());
    assert!(!answer.needs_disambiguation());
    assert!(!answer.is_fillable());
}

#[test]
fn test_empty_object_is_nothing_known() {
    let answer: CredentialAnswer = serde_json::from_str("{}").unwrap();
    assert_eq!(answer, CredentialAnswer::default());
    assert!(!answer.is_fillable());
}

#[test]
fn test_empty_candidate_list_needs_no_choice() {
    let answer = CredentialAnswer {
        multiple_accounts: Some(vec![]),
        ..Default::default()
    };
    assert!(!answer.needs_disambiguation());
}

#[test]
fn test_select_account_merges_and_clears() {
    let answer = CredentialAnswer {
        preferences: sample_preferences(),
        username_email: None,
        password: None,
        multiple_accounts: Some(vec![
            AccountCandidate::new("pw1", Some("alice".to_string())),
            AccountCandidate::new("pw2", Some("bob".to_string())),
        ]),
    };

    let picked = answer.select_account(1).unwrap();
    assert_eq!(picked.username_email.as_deref(), Some("bob"));
    assert_eq!(picked.password.as_deref(), Some("pw2"));
    assert_eq!(picked.preferences, sample_preferences());
    assert!(picked.multiple_accounts.is_none());
    assert!(!picked.needs_disambiguation());

    assert!(answer.select_account(2).is_none());
}

#[test]
fn test_fillable_requires_preferences() {
    let answer = CredentialAnswer {
        username_email: Some("a@b.com".to_string()),
        password: Some("secret".to_string()),
        ..Default::default()
    };
    assert!(!answer.is_fillable());
}

#[test]
fn test_debug_redacts_password() {
    let answer = CredentialAnswer {
        password: Some("hunter2".to_string()),
        multiple_accounts: Some(vec![AccountCandidate::new("topsecret", None)]),
        ..Default::default()
    };
    let debug = format!("{:?}", answer);
    assert!(!debug.contains("hunter2"));
    assert!(!debug.contains("topsecret"));
    assert!(debug.contains("<redacted>"));
}

#[test]
fn test_account_candidate_serializes_as_pair() {
    let candidate = AccountCandidate::new("pw", Some("me".to_string()));
    assert_eq!(serde_json::to_string(&candidate).unwrap(), r#"["pw","me"]"#);
}
