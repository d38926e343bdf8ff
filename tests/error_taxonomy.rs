use orchestrate::errors::{self, is_error_class, TxError};
use proptest::prelude::*;

#[test]
fn family_codes_render_as_five_hex_digits() {
    let warning = errors::warning("nonce too low, retrying");
    assert_eq!(warning.code, 4096);
    assert_eq!(warning.hex(), "01000");

    let connection = errors::connection_error("broker down");
    assert_eq!(connection.code, 32768);
    assert_eq!(connection.hex(), "08000");

    assert_eq!(errors::internal_error("boom").hex(), "FF000");
    assert_eq!(errors::invalid_signature_error("bad").hex(), "42201");
    assert_eq!(errors::already_exists_error("dup").hex(), "DB101");
}

#[test]
fn family_predicates_accept_sub_families_and_leaves() {
    let kafka = errors::kafka_connection_error("failed to produce");
    assert!(errors::is_connection_error(&kafka));
    assert!(errors::is_kafka_connection_error(&kafka));
    assert!(!errors::is_http_connection_error(&kafka));
    assert!(!errors::is_data_error(&kafka));

    let signature = errors::invalid_signature_error("bad signature");
    assert!(errors::is_data_error(&signature));
    assert!(errors::is_solidity_error(&signature));
    assert!(errors::is_invalid_signature_error(&signature));
    assert!(!errors::is_encoding_error(&signature));
    assert!(!errors::is_invalid_args_count_error(&signature));
}

#[test]
fn parent_codes_are_not_members_of_their_children() {
    let connection = errors::connection_error("generic");
    assert!(!errors::is_kafka_connection_error(&connection));

    let solidity = errors::solidity_error("generic");
    assert!(!errors::is_invalid_signature_error(&solidity));
    assert!(errors::is_data_error(&solidity));
}

#[test]
fn warnings_are_classified_by_family() {
    assert!(errors::is_warning(&errors::nonce_too_low_warning("low")));
    assert!(errors::is_invalid_nonce_warning(&errors::nonce_too_high_warning("high")));
    assert!(!errors::is_warning(&errors::nonce_too_low_error("low")));
    assert!(errors::is_ethereum_error(&errors::nonce_too_low_error("low")));
}

#[test]
fn class_membership_uses_family_byte_and_sub_family_nibble() {
    assert!(is_error_class(0x42201, 0x42000));
    assert!(is_error_class(0x42201, 0x42200));
    assert!(!is_error_class(0x42201, 0x42100));
    assert!(!is_error_class(0x08100, 0x42000));
    assert!(is_error_class(0xFF000, 0xFF000));
}

#[test]
fn components_extend_outward() {
    let err = errors::data_error("bad payload")
        .extend_component("loader")
        .extend_component("handler");
    assert_eq!(err.component, "handler.loader");
    assert_eq!(err.to_string(), "42000@handler.loader: bad payload");

    let untouched = errors::data_error("x").extend_component("");
    assert_eq!(untouched.component, "");

    let replaced = errors::data_error("x")
        .extend_component("a")
        .with_component("b");
    assert_eq!(replaced.component, "b");
}

#[test]
fn foreign_errors_become_internal() {
    let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
    let converted = errors::from_error(&io);
    assert!(errors::is_internal_error(&converted));
    assert_eq!(converted.message, "disk full");
    assert_eq!(converted.component, "");

    let typed = errors::invalid_parameter_error("gas").with_component("crafter");
    let passed = errors::from_error(&typed);
    assert_eq!(passed, typed);
}

#[test]
fn custom_codes_keep_their_value() {
    let err = TxError::new(5, "test Error").extend_component("foo");
    assert_eq!(err.to_string(), "00005@foo: test Error");
}

proptest! {
    #[test]
    fn every_code_belongs_to_its_family(code in 0u64..0x10_0000) {
        prop_assert!(is_error_class(code, code & 0xFF000));
    }

    #[test]
    fn sub_family_membership_requires_matching_nibble(family in 1u64..0x100, sub in 1u64..0x10, other in 1u64..0x10, leaf in 0u64..0x100) {
        let base = (family << 12) | (sub << 8);
        let code = (family << 12) | (other << 8) | leaf;
        prop_assert_eq!(is_error_class(code, base), sub == other);
    }
}
