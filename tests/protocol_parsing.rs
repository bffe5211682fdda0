// tests/protocol_parsing.rs

use proptest::prelude::*;

use hostcare::ipc::identity::{extract_identity, identity_from_body, identity_from_name};
use hostcare::ipc::protocol::{CommandResponse, ParseError, parse_command};
use hostcare::types::CommandType;

const ID: &str = "0123456789abcdef0123456789abcdef";

#[test]
fn type_aliases_and_codes_are_accepted() {
    let cases = [
        (r#""Clean""#, CommandType::Clean),
        (r#""cleanall""#, CommandType::Clean),
        (r#""CLEANALL""#, CommandType::Clean),
        (r#""UpdateAll""#, CommandType::UpdateAll),
        (r#""update""#, CommandType::UpdateAll),
        ("0", CommandType::Clean),
        ("1", CommandType::UpdateAll),
        (r#""0""#, CommandType::Clean),
        (r#""1""#, CommandType::UpdateAll),
    ];

    for (raw, expected) in cases {
        let body = format!(r#"{{"Id":"{ID}","Type":{raw}}}"#);
        let request = parse_command(&body, ID).unwrap_or_else(|e| panic!("{raw}: {e}"));
        assert_eq!(request.kind, expected, "{raw}");
    }
}

#[test]
fn unknown_types_are_structured_errors() {
    for raw in [r#""Reboot""#, "2", "-1", "1.5", "true", "null", r#"["Clean"]"#] {
        let body = format!(r#"{{"Type":{raw}}}"#);
        let err = parse_command(&body, ID).expect_err(raw);
        assert!(matches!(err, ParseError::InvalidType(_)), "{raw}: {err:?}");
    }
}

#[test]
fn missing_type_and_non_objects_are_rejected() {
    assert!(matches!(parse_command(r#"{"Id":"x"}"#, ID), Err(ParseError::MissingType)));
    assert!(matches!(parse_command("[1,2]", ID), Err(ParseError::NotAnObject)));
    assert!(matches!(parse_command("{nope", ID), Err(ParseError::InvalidJson(_))));
}

#[test]
fn options_are_read_case_insensitively() {
    let body = r#"{
        "type": "Clean",
        "LEVEL": "rapide",
        "groups": ["browser", "temp"],
        "Simulation": true,
        "sources": ["winget"]
    }"#;

    let request = parse_command(body, ID).expect("valid command");

    assert_eq!(request.id, ID);
    assert_eq!(request.options.level.as_deref(), Some("rapide"));
    assert_eq!(
        request.options.groups,
        Some(vec!["browser".to_string(), "temp".to_string()])
    );
    assert!(request.options.simulate);
    assert_eq!(request.options.sources, Some(vec!["winget".to_string()]));
}

#[test]
fn mistyped_options_are_rejected() {
    let err = parse_command(r#"{"Type":"Clean","Groups":"temp"}"#, ID).expect_err("groups must be an array");
    assert!(matches!(err, ParseError::InvalidField { field: "Groups", .. }));

    let err = parse_command(r#"{"Type":"Clean","Simulate":"yes"}"#, ID).expect_err("simulate must be a bool");
    assert!(matches!(err, ParseError::InvalidField { field: "Simulate", .. }));

    let err = parse_command(r#"{"Type":"Clean","Id":42}"#, ID).expect_err("id must be a string");
    assert!(matches!(err, ParseError::InvalidField { field: "Id", .. }));
}

#[test]
fn payload_identity_wins_over_file_name() {
    let body = r#"{"ID":"job-42","Type":"Clean"}"#;
    assert_eq!(extract_identity(&format!("{ID}.json"), body), Some("job-42".to_string()));
}

#[test]
fn blank_or_unsafe_payload_identity_falls_back_to_file_name() {
    for id in ["", "   ", "../escape", r"..\escape", "a/b"] {
        let body = serde_json::json!({ "Id": id, "Type": "Clean" }).to_string();
        assert_eq!(identity_from_body(&body), None, "{id:?}");
        assert_eq!(extract_identity(&format!("cmd-{ID}.json"), &body), Some(ID.to_string()));
    }
}

#[test]
fn file_name_identity_needs_32_hex_digits() {
    assert_eq!(identity_from_name("cmd.json"), None);
    assert_eq!(identity_from_name("0123456789abcdef0123456789abcde.json"), None);
    assert_eq!(
        identity_from_name("x_0123456789ABCDEF0123456789ABCDEF_y.json"),
        Some("0123456789ABCDEF0123456789ABCDEF".to_string())
    );
    assert_eq!(extract_identity("notes.json", "not json at all"), None);
}

#[test]
fn response_uses_pascal_case_keys() {
    let response = CommandResponse::success(CommandType::UpdateAll, "2 items updated");
    assert_eq!(
        response.to_json().expect("serializable"),
        r#"{"Success":true,"Kind":"UpdateAll","Message":"2 items updated"}"#
    );
}

proptest! {
    #[test]
    fn any_hex_token_in_a_name_is_found(prefix in "[g-z_-]{0,8}", id in "[0-9a-f]{32}", suffix in "[g-z_.]{0,8}") {
        let name = format!("{prefix}{id}{suffix}.json");
        prop_assert_eq!(identity_from_name(&name), Some(id));
    }

    #[test]
    fn type_names_parse_regardless_of_case(flags in proptest::collection::vec(any::<bool>(), 9)) {
        let cased: String = "updateall"
            .chars()
            .zip(flags)
            .map(|(c, upper)| if upper { c.to_ascii_uppercase() } else { c })
            .collect();
        prop_assert_eq!(cased.parse::<CommandType>(), Ok(CommandType::UpdateAll));
    }

    #[test]
    fn parsing_never_panics(body in ".{0,64}") {
        let _ = parse_command(&body, ID);
        let _ = extract_identity("x.json", &body);
    }
}
