#![forbid(unsafe_code)]

//! Hierarchical error codes attached to envelopes.
//!
//! Codes live in a 20-bit space rendered as five hex digits: the two leading
//! digits name the family, the third the sub-family and the last two the leaf.
//! Family and sub-family predicates accept any code underneath them, so an
//! invalid signature is at once a Solidity error and a data error. Leaf
//! predicates match their exact code.

mod tx_error;

pub use tx_error::TxError;

/// Returns true when `code` belongs to the class rooted at `base`.
///
/// The family byte always participates; the sub-family nibble only does when
/// `base` sets one.
pub const fn is_error_class(code: u64, base: u64) -> bool {
    let mask = (0xFF << 12) + ((0xF << 8) & base);
    (base ^ code) & mask == 0
}

macro_rules! error_codes {
    (
        families { $( $fcode:ident = $fvalue:expr => $fctor:ident, $fis:ident; )* }
        leaves { $( $lcode:ident = $lvalue:expr => $lctor:ident, $lis:ident; )* }
    ) => {
        $(
            pub const $fcode: u64 = $fvalue;

            pub fn $fctor(message: impl Into<String>) -> TxError {
                TxError::new($fcode, message)
            }

            pub fn $fis(err: &TxError) -> bool {
                is_error_class(err.code, $fcode)
            }
        )*
        $(
            pub const $lcode: u64 = $lvalue;

            pub fn $lctor(message: impl Into<String>) -> TxError {
                TxError::new($lcode, message)
            }

            pub fn $lis(err: &TxError) -> bool {
                err.code == $lcode
            }
        )*
    };
}

error_codes! {
    families {
        WARNING = 1 << 12 => warning, is_warning;
        RETRY_WARNING = WARNING + (1 << 8) => retry_warning, is_retry_warning;
        FAUCET_WARNING = WARNING + (2 << 8) => faucet_warning, is_faucet_warning;
        INVALID_NONCE_WARNING = WARNING + (3 << 8) => invalid_nonce_warning, is_invalid_nonce_warning;

        CONNECTION = 8 << 12 => connection_error, is_connection_error;
        KAFKA_CONNECTION = CONNECTION + (1 << 8) => kafka_connection_error, is_kafka_connection_error;
        HTTP_CONNECTION = CONNECTION + (2 << 8) => http_connection_error, is_http_connection_error;
        ETH_CONNECTION = CONNECTION + (3 << 8) => eth_connection_error, is_eth_connection_error;
        GRPC_CONNECTION = CONNECTION + (4 << 8) => grpc_connection_error, is_grpc_connection_error;
        REDIS_CONNECTION = CONNECTION + (5 << 8) => redis_connection_error, is_redis_connection_error;
        POSTGRES_CONNECTION = CONNECTION + (6 << 8) => postgres_connection_error, is_postgres_connection_error;
        SERVICE_CONNECTION = CONNECTION + (7 << 8) => service_connection_error, is_service_connection_error;

        INVALID_AUTHENTICATION = 9 << 12 => invalid_authentication_error, is_invalid_authentication_error;

        FEATURE_NOT_SUPPORTED = 10 << 12 => feature_not_supported_error, is_feature_not_supported_error;

        INVALID_STATE = 0x24 << 12 => invalid_state_error, is_invalid_state_error;
        FAILED_PRECONDITION = INVALID_STATE + (1 << 8) => failed_precondition_error, is_failed_precondition_error;
        CONFLICTED = INVALID_STATE + (2 << 8) => conflicted_error, is_conflicted_error;

        DATA = 0x42 << 12 => data_error, is_data_error;
        ENCODING = DATA + (1 << 8) => encoding_error, is_encoding_error;
        SOLIDITY = DATA + (2 << 8) => solidity_error, is_solidity_error;
        INVALID_FORMAT = DATA + (3 << 8) => invalid_format_error, is_invalid_format_error;
        INVALID_PARAMETER = DATA + (4 << 8) => invalid_parameter_error, is_invalid_parameter_error;

        ETHEREUM = 0xBE << 12 => ethereum_error, is_ethereum_error;

        CRYPTO_OPERATION = 0xC0 << 12 => crypto_operation_error, is_crypto_operation_error;

        STORAGE = 0xDB << 12 => storage_error, is_storage_error;
        CONSTRAINT_VIOLATED = STORAGE + (1 << 8) => constraint_violated_error, is_constraint_violated_error;
        NOT_FOUND = STORAGE + (2 << 8) => not_found_error, is_not_found_error;

        CONFIG = 0xF0 << 12 => config_error, is_config_error;

        INTERNAL = 0xFF << 12 => internal_error, is_internal_error;
        DATA_CORRUPTED = INTERNAL + (1 << 8) => data_corrupted_error, is_data_corrupted_error;
        DEPENDENCY_FAILURE = INTERNAL + (2 << 8) => dependency_failure_error, is_dependency_failure_error;
    }
    leaves {
        NONCE_TOO_HIGH_WARNING = INVALID_NONCE_WARNING + 1 => nonce_too_high_warning, is_nonce_too_high_warning;
        NONCE_TOO_LOW_WARNING = INVALID_NONCE_WARNING + 2 => nonce_too_low_warning, is_nonce_too_low_warning;

        UNAUTHORIZED = INVALID_AUTHENTICATION + 1 => unauthorized_error, is_unauthorized_error;
        PERMISSION_DENIED = INVALID_AUTHENTICATION + 2 => permission_denied_error, is_permission_denied_error;

        INVALID_SIGNATURE = SOLIDITY + 1 => invalid_signature_error, is_invalid_signature_error;
        INVALID_ARGS_COUNT = SOLIDITY + 2 => invalid_args_count_error, is_invalid_args_count_error;
        INVALID_ARG = SOLIDITY + 3 => invalid_arg_error, is_invalid_arg_error;
        INVALID_TOPICS_COUNT = SOLIDITY + 4 => invalid_topics_count_error, is_invalid_topics_count_error;
        INVALID_EVENT_DATA = SOLIDITY + 5 => invalid_event_data_error, is_invalid_event_data_error;

        NONCE_TOO_LOW = ETHEREUM + 1 => nonce_too_low_error, is_nonce_too_low_error;
        INVALID_NONCE = ETHEREUM + 2 => invalid_nonce_error, is_invalid_nonce_error;

        INVALID_CRYPTOGRAPHIC_SIGNATURE = CRYPTO_OPERATION + 1 => invalid_cryptographic_signature_error, is_invalid_cryptographic_signature_error;

        ALREADY_EXISTS = CONSTRAINT_VIOLATED + 1 => already_exists_error, is_already_exists_error;
    }
}

/// Converts any error into a typed one. Typed errors pass through untouched,
/// everything else is classified as internal with no component.
pub fn from_error(err: &(dyn std::error::Error + 'static)) -> TxError {
    match err.downcast_ref::<TxError>() {
        Some(typed) => typed.clone(),
        None => internal_error(err.to_string()),
    }
}
