#![forbid(unsafe_code)]

//! Transaction envelope and its protobuf wire shapes.

mod convert;
mod envelope;
mod partition;
mod validate;

pub use envelope::{Chain, Contract, Envelope, Private, Tx};

use crate::errors::TxError;
use crate::types::ethereum::Receipt;
use prost::Message;
use std::collections::HashMap;

pub const CHAIN_ID_LABEL: &str = "chainID";
pub const TX_HASH_LABEL: &str = "txHash";
pub const CHAIN_UUID_LABEL: &str = "chainUUID";
pub const SCHEDULE_UUID_LABEL: &str = "scheduleUUID";
pub const JOB_UUID_LABEL: &str = "jobUUID";
pub const NEXT_JOB_UUID_LABEL: &str = "nextJobUUID";
pub const PARENT_JOB_UUID_LABEL: &str = "parentJobUUID";
pub const PRIORITY_LABEL: &str = "priority";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Method {
    EthSendRawTransaction = 0,
    EthSendPrivateTransaction = 1,
    EthSendRawPrivateTransaction = 2,
    EeaSendPrivateTransaction = 3,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::EthSendRawTransaction => "ETH_SENDRAWTRANSACTION",
            Method::EthSendPrivateTransaction => "ETH_SENDPRIVATETRANSACTION",
            Method::EthSendRawPrivateTransaction => "ETH_SENDRAWPRIVATETRANSACTION",
            Method::EeaSendPrivateTransaction => "EEA_SENDPRIVATETRANSACTION",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ETH_SENDRAWTRANSACTION" => Some(Method::EthSendRawTransaction),
            "ETH_SENDPRIVATETRANSACTION" => Some(Method::EthSendPrivateTransaction),
            "ETH_SENDRAWPRIVATETRANSACTION" => Some(Method::EthSendRawPrivateTransaction),
            "EEA_SENDPRIVATETRANSACTION" => Some(Method::EeaSendPrivateTransaction),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum JobType {
    EthTx = 0,
    EthRawTx = 1,
    EthOrionMarkingTx = 2,
    EthOrionEeaTx = 3,
    EthTesseraPublicTx = 4,
    EthTesseraPrivateTx = 5,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::EthTx => "eth://ethereum/transaction",
            JobType::EthRawTx => "eth://ethereum/rawTransaction",
            JobType::EthOrionMarkingTx => "eth://orion/markingTransaction",
            JobType::EthOrionEeaTx => "eth://orion/eeaTransaction",
            JobType::EthTesseraPublicTx => "eth://tessera/publicTransaction",
            JobType::EthTesseraPrivateTx => "eth://tessera/privateTransaction",
        }
    }
}

/// Client facing request to craft and send a transaction.
#[derive(Clone, PartialEq, Message)]
pub struct TxRequest {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(map = "string, string", tag = "2")]
    pub headers: HashMap<String, String>,
    #[prost(string, tag = "3")]
    pub chain: String,
    #[prost(enumeration = "Method", tag = "4")]
    pub method: i32,
    #[prost(message, optional, tag = "5")]
    pub params: Option<Params>,
    #[prost(map = "string, string", tag = "6")]
    pub context_labels: HashMap<String, String>,
    #[prost(enumeration = "JobType", tag = "7")]
    pub job_type: i32,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct Params {
    #[prost(string, tag = "1")]
    pub from: String,
    #[prost(string, tag = "2")]
    pub to: String,
    #[prost(string, tag = "3")]
    pub gas: String,
    #[prost(string, tag = "4")]
    pub gas_price: String,
    #[prost(string, tag = "5")]
    pub value: String,
    #[prost(string, tag = "6")]
    pub nonce: String,
    #[prost(string, tag = "7")]
    pub data: String,
    #[prost(string, tag = "8")]
    pub contract: String,
    #[prost(string, tag = "9")]
    pub method_signature: String,
    #[prost(string, repeated, tag = "10")]
    pub args: Vec<String>,
    #[prost(string, tag = "11")]
    pub raw: String,
    #[prost(string, repeated, tag = "12")]
    pub private_for: Vec<String>,
    #[prost(string, tag = "13")]
    pub private_from: String,
    #[prost(string, tag = "14")]
    pub private_tx_type: String,
    #[prost(string, tag = "15")]
    pub privacy_group_id: String,
}

impl Params {
    /// Splits `Name[Tag]` into its parts; anything else is a bare name.
    pub fn parsed_contract(&self) -> (String, String) {
        parse_contract(&self.contract)
    }
}

pub(crate) fn parse_contract(contract: &str) -> (String, String) {
    if let Some(body) = contract.strip_suffix(']') {
        if let Some(open) = body.rfind('[') {
            return (body[..open].to_string(), body[open + 1..].to_string());
        }
    }
    (contract.to_string(), String::new())
}

/// Outcome of a transaction, published once it has been sent or mined.
#[derive(Clone, PartialEq, Message)]
pub struct TxResponse {
    #[prost(map = "string, string", tag = "1")]
    pub headers: HashMap<String, String>,
    #[prost(string, tag = "2")]
    pub id: String,
    #[prost(string, tag = "3")]
    pub job_uuid: String,
    #[prost(map = "string, string", tag = "4")]
    pub context_labels: HashMap<String, String>,
    #[prost(message, optional, tag = "5")]
    pub transaction: Option<Transaction>,
    #[prost(message, optional, tag = "6")]
    pub receipt: Option<Receipt>,
    #[prost(string, tag = "7")]
    pub chain: String,
    #[prost(message, repeated, tag = "8")]
    pub errors: Vec<TxError>,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct Transaction {
    #[prost(string, tag = "1")]
    pub from: String,
    #[prost(string, tag = "2")]
    pub nonce: String,
    #[prost(string, tag = "3")]
    pub to: String,
    #[prost(string, tag = "4")]
    pub value: String,
    #[prost(string, tag = "5")]
    pub gas: String,
    #[prost(string, tag = "6")]
    pub gas_price: String,
    #[prost(string, tag = "7")]
    pub data: String,
    #[prost(string, tag = "8")]
    pub raw: String,
    #[prost(string, tag = "9")]
    pub tx_hash: String,
}

/// Inter-stage envelope: a request or a response plus the internal label side channel.
#[derive(Clone, PartialEq, Message)]
pub struct TxEnvelope {
    #[prost(oneof = "tx_envelope::Msg", tags = "1, 2")]
    pub msg: Option<tx_envelope::Msg>,
    #[prost(map = "string, string", tag = "3")]
    pub internal_labels: HashMap<String, String>,
}

pub mod tx_envelope {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Msg {
        #[prost(message, tag = "1")]
        TxRequest(super::TxRequest),
        #[prost(message, tag = "2")]
        TxResponse(super::TxResponse),
    }
}

impl TxEnvelope {
    pub fn id(&self) -> &str {
        match &self.msg {
            Some(tx_envelope::Msg::TxRequest(req)) => &req.id,
            Some(tx_envelope::Msg::TxResponse(res)) => &res.id,
            None => "",
        }
    }

    pub fn chain_id(&self) -> Option<&str> {
        self.internal_labels.get(CHAIN_ID_LABEL).map(String::as_str)
    }

    pub fn tx_hash(&self) -> Option<&str> {
        self.internal_labels.get(TX_HASH_LABEL).map(String::as_str)
    }

    pub fn chain_uuid(&self) -> Option<&str> {
        self.internal_labels.get(CHAIN_UUID_LABEL).map(String::as_str)
    }
}
