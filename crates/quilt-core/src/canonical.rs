//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 milliseconds)
//!
//! The canonical encoding is the hashing and signing pre-image: the same
//! record or block produces identical bytes (and thus identical hashes) on
//! every platform. Wire and cache serialization use serde separately; a
//! value that survives a serde round trip re-canonicalizes to the same
//! bytes because the encoding here is a pure function of the struct.

use ciborium::value::Value;

use crate::block::{Block, BlockEntry};
use crate::record::{AccessEntry, Record};
use crate::reference::Reference;

/// Field keys (integer keys for compact encoding).
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub mod record {
        pub const TIMESTAMP: u64 = 0;
        pub const CREATOR: u64 = 1;
        pub const ACCESS: u64 = 2;
        pub const PAYLOAD: u64 = 3;
        pub const ENCRYPTION: u64 = 4;
        pub const SIGNATURE: u64 = 5;
        pub const SIGNATURE_ALGORITHM: u64 = 6;
        pub const COMPRESSION: u64 = 7;
        pub const REFERENCES: u64 = 8;
        pub const METADATA: u64 = 9;
    }

    pub mod access {
        pub const ALIAS: u64 = 0;
        pub const EPHEMERAL: u64 = 1;
        pub const NONCE: u64 = 2;
        pub const WRAPPED: u64 = 3;
        pub const WRAP: u64 = 4;
    }

    pub mod reference {
        pub const CHANNEL: u64 = 0;
        pub const BLOCK: u64 = 1;
        pub const RECORD: u64 = 2;
        pub const INDEX: u64 = 3;
        pub const TIMESTAMP: u64 = 4;
    }

    pub mod block {
        pub const TIMESTAMP: u64 = 0;
        pub const CHANNEL: u64 = 1;
        pub const LENGTH: u64 = 2;
        pub const PREVIOUS: u64 = 3;
        pub const MINER: u64 = 4;
        pub const NONCE: u64 = 5;
        pub const ENTRIES: u64 = 6;
    }

    pub mod entry {
        pub const HASH: u64 = 0;
        pub const RECORD: u64 = 1;
    }
}

/// Encode a record to canonical bytes.
pub fn canonical_record_bytes(record: &Record) -> Vec<u8> {
    encode_canonical(&record_to_value(record))
}

/// Encode a block to canonical bytes.
pub fn canonical_block_bytes(block: &Block) -> Vec<u8> {
    encode_canonical(&block_to_value(block))
}

/// Encode a reference to canonical bytes.
pub fn canonical_reference_bytes(reference: &Reference) -> Vec<u8> {
    encode_canonical(&reference_to_value(reference))
}

fn record_to_value(record: &Record) -> Value {
    use keys::record as k;

    let access: Vec<Value> = record.access.iter().map(access_to_value).collect();
    let references: Vec<Value> = record.references.iter().map(reference_to_value).collect();
    let metadata: Vec<(Value, Value)> = record
        .metadata
        .iter()
        .map(|(key, value)| (Value::Text(key.clone()), Value::Text(value.clone())))
        .collect();

    Value::Map(vec![
        (
            Value::Integer(k::TIMESTAMP.into()),
            Value::Integer(record.timestamp.into()),
        ),
        (
            Value::Integer(k::CREATOR.into()),
            Value::Text(record.creator.as_str().to_owned()),
        ),
        (Value::Integer(k::ACCESS.into()), Value::Array(access)),
        (
            Value::Integer(k::PAYLOAD.into()),
            Value::Bytes(record.payload.to_vec()),
        ),
        (
            Value::Integer(k::ENCRYPTION.into()),
            Value::Integer(record.encryption.to_u8().into()),
        ),
        (
            Value::Integer(k::SIGNATURE.into()),
            Value::Bytes(record.signature.0.to_vec()),
        ),
        (
            Value::Integer(k::SIGNATURE_ALGORITHM.into()),
            Value::Integer(record.signature_algorithm.to_u8().into()),
        ),
        (
            Value::Integer(k::COMPRESSION.into()),
            Value::Integer(record.compression.to_u8().into()),
        ),
        (
            Value::Integer(k::REFERENCES.into()),
            Value::Array(references),
        ),
        (Value::Integer(k::METADATA.into()), Value::Map(metadata)),
    ])
}

fn access_to_value(entry: &AccessEntry) -> Value {
    use keys::access as k;

    Value::Map(vec![
        (
            Value::Integer(k::ALIAS.into()),
            Value::Text(entry.alias.as_str().to_owned()),
        ),
        (
            Value::Integer(k::EPHEMERAL.into()),
            Value::Bytes(entry.ephemeral.to_vec()),
        ),
        (
            Value::Integer(k::NONCE.into()),
            Value::Bytes(entry.nonce.to_vec()),
        ),
        (
            Value::Integer(k::WRAPPED.into()),
            Value::Bytes(entry.wrapped.clone()),
        ),
        (
            Value::Integer(k::WRAP.into()),
            Value::Integer(entry.wrap.to_u8().into()),
        ),
    ])
}

fn reference_to_value(reference: &Reference) -> Value {
    use keys::reference as k;

    let opt_hash = |h: &Option<crate::types::Hash>| match h {
        Some(h) => Value::Bytes(h.0.to_vec()),
        None => Value::Null,
    };

    Value::Map(vec![
        (
            Value::Integer(k::CHANNEL.into()),
            Value::Text(reference.channel.as_str().to_owned()),
        ),
        (Value::Integer(k::BLOCK.into()), opt_hash(&reference.block)),
        (Value::Integer(k::RECORD.into()), opt_hash(&reference.record)),
        (
            Value::Integer(k::INDEX.into()),
            match reference.index {
                Some(i) => Value::Integer(i.into()),
                None => Value::Null,
            },
        ),
        (
            Value::Integer(k::TIMESTAMP.into()),
            match reference.timestamp {
                Some(t) => Value::Integer(t.into()),
                None => Value::Null,
            },
        ),
    ])
}

fn block_to_value(block: &Block) -> Value {
    use keys::block as k;

    let entries: Vec<Value> = block.entries.iter().map(entry_to_value).collect();

    Value::Map(vec![
        (
            Value::Integer(k::TIMESTAMP.into()),
            Value::Integer(block.timestamp.into()),
        ),
        (
            Value::Integer(k::CHANNEL.into()),
            Value::Text(block.channel.as_str().to_owned()),
        ),
        (
            Value::Integer(k::LENGTH.into()),
            Value::Integer(block.length.into()),
        ),
        (
            Value::Integer(k::PREVIOUS.into()),
            match &block.previous {
                Some(h) => Value::Bytes(h.0.to_vec()),
                None => Value::Null,
            },
        ),
        (
            Value::Integer(k::MINER.into()),
            Value::Text(block.miner.as_str().to_owned()),
        ),
        (
            Value::Integer(k::NONCE.into()),
            Value::Integer(block.nonce.into()),
        ),
        (Value::Integer(k::ENTRIES.into()), Value::Array(entries)),
    ])
}

fn entry_to_value(entry: &BlockEntry) -> Value {
    use keys::entry as k;

    Value::Map(vec![
        (
            Value::Integer(k::HASH.into()),
            Value::Bytes(entry.hash.0.to_vec()),
        ),
        (
            Value::Integer(k::RECORD.into()),
            record_to_value(&entry.record),
        ),
    ])
}

/// Encode a CBOR Value to canonical bytes.
fn encode_canonical(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr),
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        _ => unreachable!("unsupported CBOR value type in canonical encoding"),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type, smallest form.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode an array (major type 4).
fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item);
    }
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut key_value_pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);
    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}
