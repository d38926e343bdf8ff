#![forbid(unsafe_code)]

use prost::Message;
use std::collections::HashMap;

/// Mined transaction outcome. Hashes and addresses are carried as `0x` strings.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct Receipt {
    #[prost(string, tag = "1")]
    pub tx_hash: String,
    #[prost(string, tag = "2")]
    pub block_hash: String,
    #[prost(uint64, tag = "3")]
    pub block_number: u64,
    #[prost(uint64, tag = "4")]
    pub tx_index: u64,
    #[prost(string, tag = "5")]
    pub contract_address: String,
    #[prost(string, tag = "6")]
    pub post_state: String,
    #[prost(uint64, tag = "7")]
    pub status: u64,
    #[prost(string, tag = "8")]
    pub bloom: String,
    #[prost(message, repeated, tag = "9")]
    pub logs: Vec<Log>,
    #[prost(uint64, tag = "10")]
    pub gas_used: u64,
    #[prost(uint64, tag = "11")]
    pub cumulative_gas_used: u64,
    #[prost(string, tag = "12")]
    pub revert_reason: String,
    #[prost(string, tag = "13")]
    pub output: String,
    #[prost(string, tag = "14")]
    pub private_from: String,
    #[prost(string, repeated, tag = "15")]
    pub private_for: Vec<String>,
    #[prost(string, tag = "16")]
    pub privacy_group_id: String,
    #[prost(string, tag = "17")]
    pub contract_name: String,
    #[prost(string, tag = "18")]
    pub contract_tag: String,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct Log {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(string, repeated, tag = "2")]
    pub topics: Vec<String>,
    #[prost(string, tag = "3")]
    pub data: String,
    #[prost(string, tag = "4")]
    pub event: String,
    #[prost(map = "string, string", tag = "5")]
    pub decoded_data: HashMap<String, String>,
    #[prost(uint64, tag = "6")]
    pub block_number: u64,
    #[prost(string, tag = "7")]
    pub tx_hash: String,
    #[prost(uint64, tag = "8")]
    pub tx_index: u64,
    #[prost(string, tag = "9")]
    pub block_hash: String,
    #[prost(uint64, tag = "10")]
    pub index: u64,
    #[prost(bool, tag = "11")]
    pub removed: bool,
}

impl Receipt {
    /// Status 1 marks a successful execution.
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}
