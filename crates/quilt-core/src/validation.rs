//! Record- and block-level structural validation.
//!
//! Chain-context validation (proof-of-work, uniqueness, live flag,
//! periodic) lives in `quilt-chain`; these checks need nothing beyond the
//! value itself and the creator's key.

use crate::block::Block;
use crate::crypto::SigningPublicKey;
use crate::error::CoreError;
use crate::record::Record;
use crate::types::MAX_PAYLOAD_BYTES;

/// Validate a record: payload size and signature.
pub fn validate_record(record: &Record, creator_key: &SigningPublicKey) -> Result<(), CoreError> {
    if record.payload.len() > MAX_PAYLOAD_BYTES {
        return Err(CoreError::PayloadTooLarge(record.payload.len()));
    }
    record.verify(creator_key)
}

/// Validate a block's shape: genesis consistency and the size limit.
pub fn validate_block(block: &Block) -> Result<(), CoreError> {
    block.validate_shape()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::record::RecordBuilder;
    use crate::types::Alias;

    #[test]
    fn test_valid_record() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let record = RecordBuilder::new(Alias::new("alice").unwrap(), 1_000)
            .payload(b"hello".to_vec())
            .sign(&keypair)
            .unwrap();
        validate_record(&record, &keypair.public_key()).unwrap();
    }

    #[test]
    fn test_wrong_key_rejected() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let other = Keypair::from_seed(&[0x43; 32]);
        let record = RecordBuilder::new(Alias::new("alice").unwrap(), 1_000)
            .payload(b"hello".to_vec())
            .sign(&keypair)
            .unwrap();
        assert!(matches!(
            validate_record(&record, &other.public_key()),
            Err(CoreError::InvalidSignature)
        ));
    }
}
