#![forbid(unsafe_code)]

use super::{JobType, Method, JOB_UUID_LABEL, SCHEDULE_UUID_LABEL};
use crate::errors::{self, TxError};
use crate::types::ethereum::Receipt;
use crate::types::primitives::{
    checksum_address, hash_to_string, is_hex, parse_address, parse_hash, short_string,
};
use ethereum_types::{Address, H256};
use num_bigint::BigInt;
use std::collections::HashMap;

/// Canonical, mutable state of one transaction as it moves through the pipeline.
///
/// Optional scalars are `Option`s. Checked accessors return a data error when
/// the field is unset; `must_*` accessors fall back to the zero value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Envelope {
    pub id: String,
    pub headers: HashMap<String, String>,
    pub context_labels: HashMap<String, String>,
    pub internal_labels: HashMap<String, String>,
    pub method: Method,
    pub job_type: JobType,
    pub tx: Tx,
    pub chain: Chain,
    pub contract: Contract,
    pub private: Private,
    pub receipt: Option<Receipt>,
    pub errors: Vec<TxError>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tx {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub gas: Option<u64>,
    pub gas_price: Option<BigInt>,
    pub value: Option<BigInt>,
    pub nonce: Option<u64>,
    pub data: String,
    pub raw: String,
    pub tx_hash: Option<H256>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Chain {
    pub chain_id: Option<BigInt>,
    pub chain_name: String,
    pub chain_uuid: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Contract {
    pub contract_name: String,
    pub contract_tag: String,
    pub method_signature: String,
    pub args: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Private {
    pub private_for: Vec<String>,
    pub private_from: String,
    pub private_tx_type: String,
    pub privacy_group_id: String,
}

fn not_filled(field: &str) -> TxError {
    errors::data_error(format!("no {field} is filled"))
}

fn invalid(field: &str, value: &str) -> TxError {
    errors::data_error(format!("invalid {field} - got {value}"))
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.id = id.into();
        self
    }

    pub fn set_method(&mut self, method: Method) -> &mut Self {
        self.method = method;
        self
    }

    pub fn set_job_type(&mut self, job_type: JobType) -> &mut Self {
        self.job_type = job_type;
        self
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn set_context_label(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.context_labels.insert(key.into(), value.into());
        self
    }

    pub fn context_label(&self, key: &str) -> Option<&str> {
        self.context_labels.get(key).map(String::as_str)
    }

    pub fn set_internal_label(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.internal_labels.insert(key.into(), value.into());
        self
    }

    pub fn internal_label(&self, key: &str) -> Option<&str> {
        self.internal_labels.get(key).map(String::as_str)
    }

    /// Context labels double as the distributed tracing carrier.
    pub fn carrier(&mut self) -> &mut HashMap<String, String> {
        &mut self.context_labels
    }

    pub fn job_uuid(&self) -> &str {
        self.internal_label(JOB_UUID_LABEL).unwrap_or_default()
    }

    pub fn set_job_uuid(&mut self, job_uuid: impl Into<String>) -> &mut Self {
        self.set_internal_label(JOB_UUID_LABEL, job_uuid)
    }

    pub fn schedule_uuid(&self) -> &str {
        self.internal_label(SCHEDULE_UUID_LABEL).unwrap_or_default()
    }

    pub fn set_schedule_uuid(&mut self, schedule_uuid: impl Into<String>) -> &mut Self {
        self.set_internal_label(SCHEDULE_UUID_LABEL, schedule_uuid)
    }

    // Sender / recipient

    pub fn from_address(&self) -> Result<Address, TxError> {
        self.tx.from.ok_or_else(|| not_filled("from"))
    }

    pub fn must_from_address(&self) -> Address {
        self.tx.from.unwrap_or_default()
    }

    pub fn from_checksum(&self) -> String {
        self.tx.from.as_ref().map(checksum_address).unwrap_or_default()
    }

    pub fn set_from(&mut self, from: Address) -> &mut Self {
        self.tx.from = Some(from);
        self
    }

    pub fn set_from_string(&mut self, from: &str) -> Result<&mut Self, TxError> {
        if !from.is_empty() {
            self.tx.from = Some(parse_address(from).ok_or_else(|| invalid("from", from))?);
        }
        Ok(self)
    }

    pub fn to_address(&self) -> Result<Address, TxError> {
        self.tx.to.ok_or_else(|| not_filled("to"))
    }

    pub fn must_to_address(&self) -> Address {
        self.tx.to.unwrap_or_default()
    }

    pub fn to_checksum(&self) -> String {
        self.tx.to.as_ref().map(checksum_address).unwrap_or_default()
    }

    pub fn set_to(&mut self, to: Address) -> &mut Self {
        self.tx.to = Some(to);
        self
    }

    pub fn set_to_string(&mut self, to: &str) -> Result<&mut Self, TxError> {
        if !to.is_empty() {
            self.tx.to = Some(parse_address(to).ok_or_else(|| invalid("to", to))?);
        }
        Ok(self)
    }

    // Gas and nonce

    pub fn gas(&self) -> Result<u64, TxError> {
        self.tx.gas.ok_or_else(|| not_filled("gas"))
    }

    pub fn must_gas(&self) -> u64 {
        self.tx.gas.unwrap_or_default()
    }

    pub fn gas_string(&self) -> String {
        self.tx.gas.map(|gas| gas.to_string()).unwrap_or_default()
    }

    pub fn set_gas(&mut self, gas: u64) -> &mut Self {
        self.tx.gas = Some(gas);
        self
    }

    pub fn set_gas_string(&mut self, gas: &str) -> Result<&mut Self, TxError> {
        if !gas.is_empty() {
            self.tx.gas = Some(parse_u64(gas).ok_or_else(|| invalid("gas", gas))?);
        }
        Ok(self)
    }

    pub fn nonce(&self) -> Result<u64, TxError> {
        self.tx.nonce.ok_or_else(|| not_filled("nonce"))
    }

    pub fn must_nonce(&self) -> u64 {
        self.tx.nonce.unwrap_or_default()
    }

    pub fn nonce_string(&self) -> String {
        self.tx.nonce.map(|nonce| nonce.to_string()).unwrap_or_default()
    }

    pub fn set_nonce(&mut self, nonce: u64) -> &mut Self {
        self.tx.nonce = Some(nonce);
        self
    }

    pub fn set_nonce_string(&mut self, nonce: &str) -> Result<&mut Self, TxError> {
        if !nonce.is_empty() {
            self.tx.nonce = Some(parse_u64(nonce).ok_or_else(|| invalid("nonce", nonce))?);
        }
        Ok(self)
    }

    // Amounts

    pub fn gas_price(&self) -> Result<&BigInt, TxError> {
        self.tx.gas_price.as_ref().ok_or_else(|| not_filled("gasPrice"))
    }

    pub fn must_gas_price(&self) -> BigInt {
        self.tx.gas_price.clone().unwrap_or_default()
    }

    pub fn gas_price_string(&self) -> String {
        big_to_string(self.tx.gas_price.as_ref())
    }

    pub fn set_gas_price(&mut self, gas_price: BigInt) -> &mut Self {
        self.tx.gas_price = Some(gas_price);
        self
    }

    pub fn set_gas_price_string(&mut self, gas_price: &str) -> Result<&mut Self, TxError> {
        if !gas_price.is_empty() {
            self.tx.gas_price = Some(parse_big(gas_price).ok_or_else(|| invalid("gasPrice", gas_price))?);
        }
        Ok(self)
    }

    pub fn value(&self) -> Result<&BigInt, TxError> {
        self.tx.value.as_ref().ok_or_else(|| not_filled("value"))
    }

    pub fn must_value(&self) -> BigInt {
        self.tx.value.clone().unwrap_or_default()
    }

    pub fn value_string(&self) -> String {
        big_to_string(self.tx.value.as_ref())
    }

    pub fn set_value(&mut self, value: BigInt) -> &mut Self {
        self.tx.value = Some(value);
        self
    }

    pub fn set_value_string(&mut self, value: &str) -> Result<&mut Self, TxError> {
        if !value.is_empty() {
            self.tx.value = Some(parse_big(value).ok_or_else(|| invalid("value", value))?);
        }
        Ok(self)
    }

    // Payload

    pub fn data(&self) -> &str {
        &self.tx.data
    }

    pub fn set_data_string(&mut self, data: &str) -> Result<&mut Self, TxError> {
        if !data.is_empty() && !is_hex(data) {
            return Err(invalid("data", data));
        }
        self.tx.data = data.to_string();
        Ok(self)
    }

    pub fn set_data(&mut self, data: &[u8]) -> &mut Self {
        self.tx.data = crate::types::primitives::encode_hex(data);
        self
    }

    pub fn raw(&self) -> &str {
        &self.tx.raw
    }

    pub fn short_raw(&self) -> String {
        short_string(&self.tx.raw, 30)
    }

    pub fn set_raw_string(&mut self, raw: &str) -> Result<&mut Self, TxError> {
        if !raw.is_empty() && !is_hex(raw) {
            return Err(invalid("raw", raw));
        }
        self.tx.raw = raw.to_string();
        Ok(self)
    }

    pub fn set_raw(&mut self, raw: &[u8]) -> &mut Self {
        self.tx.raw = crate::types::primitives::encode_hex(raw);
        self
    }

    pub fn tx_hash(&self) -> Result<H256, TxError> {
        self.tx.tx_hash.ok_or_else(|| not_filled("tx hash"))
    }

    pub fn must_tx_hash(&self) -> H256 {
        self.tx.tx_hash.unwrap_or_default()
    }

    pub fn tx_hash_string(&self) -> String {
        self.tx.tx_hash.as_ref().map(hash_to_string).unwrap_or_default()
    }

    pub fn set_tx_hash(&mut self, tx_hash: H256) -> &mut Self {
        self.tx.tx_hash = Some(tx_hash);
        self
    }

    pub fn set_tx_hash_string(&mut self, tx_hash: &str) -> Result<&mut Self, TxError> {
        if !tx_hash.is_empty() {
            self.tx.tx_hash = Some(parse_hash(tx_hash).ok_or_else(|| invalid("txHash", tx_hash))?);
        }
        Ok(self)
    }

    /// Any transaction field present.
    pub fn has_tx(&self) -> bool {
        self.tx != Tx::default()
    }

    // Chain

    pub fn chain_id(&self) -> Result<&BigInt, TxError> {
        self.chain.chain_id.as_ref().ok_or_else(|| not_filled("chain id"))
    }

    pub fn must_chain_id(&self) -> BigInt {
        self.chain.chain_id.clone().unwrap_or_default()
    }

    pub fn chain_id_string(&self) -> String {
        big_to_string(self.chain.chain_id.as_ref())
    }

    pub fn set_chain_id(&mut self, chain_id: BigInt) -> &mut Self {
        self.chain.chain_id = Some(chain_id);
        self
    }

    pub fn set_chain_id_string(&mut self, chain_id: &str) -> Result<&mut Self, TxError> {
        if !chain_id.is_empty() {
            self.chain.chain_id = Some(parse_big(chain_id).ok_or_else(|| invalid("chainID", chain_id))?);
        }
        Ok(self)
    }

    pub fn chain_name(&self) -> &str {
        &self.chain.chain_name
    }

    pub fn set_chain_name(&mut self, chain_name: impl Into<String>) -> &mut Self {
        self.chain.chain_name = chain_name.into();
        self
    }

    pub fn chain_uuid(&self) -> &str {
        &self.chain.chain_uuid
    }

    pub fn set_chain_uuid(&mut self, chain_uuid: impl Into<String>) -> &mut Self {
        self.chain.chain_uuid = chain_uuid.into();
        self
    }

    // Contract

    pub fn set_contract_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.contract.contract_name = name.into();
        self
    }

    pub fn set_contract_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.contract.contract_tag = tag.into();
        self
    }

    pub fn set_method_signature(&mut self, signature: impl Into<String>) -> &mut Self {
        self.contract.method_signature = signature.into();
        self
    }

    pub fn set_args(&mut self, args: Vec<String>) -> &mut Self {
        self.contract.args = args;
        self
    }

    /// `Name[Tag]`, the bare name when untagged, empty when no contract is set.
    pub fn short_contract(&self) -> String {
        let Contract {
            contract_name,
            contract_tag,
            ..
        } = &self.contract;
        match (contract_name.is_empty(), contract_tag.is_empty()) {
            (true, _) => String::new(),
            (false, true) => contract_name.clone(),
            (false, false) => format!("{contract_name}[{contract_tag}]"),
        }
    }

    pub fn method_name(&self) -> &str {
        self.contract
            .method_signature
            .split('(')
            .next()
            .unwrap_or_default()
    }

    pub fn is_constructor(&self) -> bool {
        self.method_name() == "constructor"
    }

    pub fn is_contract_creation(&self) -> bool {
        self.tx.to.is_none()
    }

    // Privacy

    pub fn set_private_for(&mut self, private_for: Vec<String>) -> &mut Self {
        self.private.private_for = private_for;
        self
    }

    pub fn set_private_from(&mut self, private_from: impl Into<String>) -> &mut Self {
        self.private.private_from = private_from.into();
        self
    }

    pub fn set_private_tx_type(&mut self, private_tx_type: impl Into<String>) -> &mut Self {
        self.private.private_tx_type = private_tx_type.into();
        self
    }

    pub fn set_privacy_group_id(&mut self, privacy_group_id: impl Into<String>) -> &mut Self {
        self.private.privacy_group_id = privacy_group_id.into();
        self
    }

    pub fn is_eea_private(&self) -> bool {
        self.job_type == JobType::EthOrionEeaTx
    }

    // Receipt and errors

    pub fn set_receipt(&mut self, receipt: Receipt) -> &mut Self {
        self.receipt = Some(receipt);
        self
    }

    pub fn append_error(&mut self, err: TxError) -> &mut Self {
        self.errors.push(err);
        self
    }

    pub fn append_errors(&mut self, errs: impl IntoIterator<Item = TxError>) -> &mut Self {
        self.errors.extend(errs);
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn only_warnings(&self) -> bool {
        self.errors.iter().all(errors::is_warning)
    }

    /// Quoted list of rendered errors, empty when there are none.
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        let rendered: Vec<String> = self
            .errors
            .iter()
            .map(|err| format!("{:?}", err.to_string()))
            .collect();
        format!("[{}]", rendered.join(" "))
    }
}

/// Plain decimal digits only: no sign, separators or whitespace.
fn is_decimal(digits: &str) -> bool {
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

fn parse_u64(value: &str) -> Option<u64> {
    is_decimal(value).then(|| value.parse().ok()).flatten()
}

/// Decimal integer with an optional leading `-`.
fn parse_big(value: &str) -> Option<BigInt> {
    let digits = value.strip_prefix('-').unwrap_or(value);
    is_decimal(digits)
        .then(|| BigInt::parse_bytes(value.as_bytes(), 10))
        .flatten()
}

fn big_to_string(value: Option<&BigInt>) -> String {
    value.map(BigInt::to_string).unwrap_or_default()
}
