//! References: pointers into the ledger.
//!
//! A reference names a channel and optionally pins a block, a record, an
//! index within a block, and a timestamp. Channel heads are references
//! carrying a block hash and a timestamp.

use serde::{Deserialize, Serialize};

use crate::types::{ChannelName, Hash};

/// A location within the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// The channel the reference points into.
    pub channel: ChannelName,

    /// Block hash, if the reference pins a block.
    pub block: Option<Hash>,

    /// Record hash, if the reference pins a record.
    pub record: Option<Hash>,

    /// Index of the record within its block.
    pub index: Option<u64>,

    /// Timestamp of the referenced value (Unix milliseconds).
    pub timestamp: Option<i64>,
}

impl Reference {
    /// A reference naming only a channel.
    pub fn channel(channel: ChannelName) -> Self {
        Self {
            channel,
            block: None,
            record: None,
            index: None,
            timestamp: None,
        }
    }

    /// A head reference: channel, block hash, and timestamp.
    pub fn head(channel: ChannelName, block: Hash, timestamp: i64) -> Self {
        Self {
            channel,
            block: Some(block),
            record: None,
            index: None,
            timestamp: Some(timestamp),
        }
    }

    /// A reference pinning a block.
    pub fn block(channel: ChannelName, block: Hash) -> Self {
        Self {
            channel,
            block: Some(block),
            record: None,
            index: None,
            timestamp: None,
        }
    }

    /// A reference pinning a record.
    pub fn record(channel: ChannelName, record: Hash) -> Self {
        Self {
            channel,
            block: None,
            record: Some(record),
            index: None,
            timestamp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_cbor_roundtrip() {
        let name = ChannelName::new("T").unwrap();
        let r = Reference::head(name, Hash::of(b"block"), 1_736_870_400_000);
        let mut buf = Vec::new();
        ciborium::into_writer(&r, &mut buf).unwrap();
        let recovered: Reference = ciborium::from_reader(buf.as_slice()).unwrap();
        assert_eq!(r, recovered);
    }
}
