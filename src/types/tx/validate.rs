#![forbid(unsafe_code)]

use super::Envelope;
use crate::errors::{self, TxError};
use crate::types::primitives::is_hex;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use uuid::Uuid;

impl Envelope {
    /// Checks the structural invariants and returns one data error per violation.
    pub fn validate(&self) -> Vec<TxError> {
        let mut violations = Vec::new();

        if self.id.is_empty() {
            violations.push(errors::data_error("id is required"));
        } else if !is_uuid_v4(&self.id) {
            violations.push(errors::data_error(format!(
                "invalid id - expected a UUID v4, got {}",
                self.id
            )));
        }

        if !self.tx.data.is_empty() && !is_hex(&self.tx.data) {
            violations.push(errors::data_error(format!(
                "invalid data - expected hex, got {}",
                self.tx.data
            )));
        }
        if !self.tx.raw.is_empty() && !is_hex(&self.tx.raw) {
            violations.push(errors::data_error(format!(
                "invalid raw - expected hex, got {}",
                self.tx.raw
            )));
        }
        match (self.tx.raw.is_empty(), self.tx.tx_hash.is_some()) {
            (false, false) => violations.push(errors::data_error("raw requires txHash")),
            (true, true) => violations.push(errors::data_error("txHash requires raw")),
            _ => {}
        }

        if !self.chain.chain_uuid.is_empty() && !is_uuid_v4(&self.chain.chain_uuid) {
            violations.push(errors::data_error(format!(
                "invalid chainUUID - expected a UUID v4, got {}",
                self.chain.chain_uuid
            )));
        }

        if !self.contract.contract_tag.is_empty() && self.contract.contract_name.is_empty() {
            violations.push(errors::data_error("contractTag requires contractName"));
        }
        if !self.contract.method_signature.is_empty()
            && !is_valid_method_signature(&self.contract.method_signature)
        {
            violations.push(errors::data_error(format!(
                "invalid methodSignature - got {}",
                self.contract.method_signature
            )));
        }

        for entry in &self.private.private_for {
            if !is_base64(entry) {
                violations.push(errors::data_error(format!(
                    "invalid privateFor - expected base64, got {entry}"
                )));
            }
        }
        if !self.private.private_from.is_empty() && !is_base64(&self.private.private_from) {
            violations.push(errors::data_error(format!(
                "invalid privateFrom - expected base64, got {}",
                self.private.private_from
            )));
        }
        if self.is_eea_private()
            && !self.private.privacy_group_id.is_empty()
            && !self.private.private_for.is_empty()
        {
            violations.push(errors::data_error(
                "privacyGroupId and privateFor fields are mutually exclusive",
            ));
        }

        violations
    }
}

fn is_uuid_v4(value: &str) -> bool {
    Uuid::parse_str(value)
        .map(|id| id.get_version_num() == 4)
        .unwrap_or(false)
}

fn is_base64(value: &str) -> bool {
    !value.is_empty() && STANDARD.decode(value).is_ok()
}

/// `name(types)` where the name is an identifier.
pub(crate) fn is_valid_method_signature(signature: &str) -> bool {
    let Some(open) = signature.find('(') else {
        return false;
    };
    if !signature.ends_with(')') {
        return false;
    }
    let name = &signature[..open];
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}
