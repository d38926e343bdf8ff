#![forbid(unsafe_code)]

//! Canonical string encodings for chain primitives.

use ethereum_types::{Address, H256};
use tiny_keccak::{Hasher, Keccak};

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut keccak = Keccak::v256();
    let mut output = [0u8; 32];
    keccak.update(data);
    keccak.finalize(&mut output);
    output
}

/// Parses a 20 byte address with or without `0x` prefix.
pub fn parse_address(value: &str) -> Option<Address> {
    let digits = strip_hex_prefix(value);
    if digits.len() != 40 {
        return None;
    }
    let bytes = hex::decode(digits).ok()?;
    Some(Address::from_slice(&bytes))
}

/// EIP-55 mixed case rendering.
pub fn checksum_address(address: &Address) -> String {
    let lower = hex::encode(address.as_bytes());
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (index, ch) in lower.chars().enumerate() {
        let nibble = if index % 2 == 0 {
            hash[index / 2] >> 4
        } else {
            hash[index / 2] & 0x0f
        };
        if ch.is_ascii_alphabetic() && nibble >= 8 {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Parses a `0x` prefixed 32 byte hash.
pub fn parse_hash(value: &str) -> Option<H256> {
    let bytes = decode_hex(value)?;
    if bytes.len() != 32 {
        return None;
    }
    Some(H256::from_slice(&bytes))
}

pub fn hash_to_string(hash: &H256) -> String {
    encode_hex(hash.as_bytes())
}

/// Decodes a `0x` prefixed, even length hex string. `"0x"` decodes to no bytes.
pub fn decode_hex(value: &str) -> Option<Vec<u8>> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))?;
    hex::decode(digits).ok()
}

pub fn is_hex(value: &str) -> bool {
    decode_hex(value).is_some()
}

pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Keeps the head and tail of long strings, eliding the middle.
pub fn short_string(value: &str, max: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= max {
        return value.to_string();
    }
    let half = max / 2;
    let head: String = chars[..half].iter().collect();
    let tail: String = chars[chars.len() - half..].iter().collect();
    format!("{head}...{tail}")
}

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}
