//! Proptest strategies shared by property tests.

use proptest::prelude::*;

/// Arbitrary byte buffers up to `max` bytes, biased toward small alphabets
/// so diffs find real common subsequences.
pub fn byte_buffer(max: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop_oneof![Just(b'a'), Just(b'b'), Just(b'c'), any::<u8>()], 0..max)
}

/// A buffer and an independently generated second buffer.
pub fn buffer_pair(max: usize) -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
    (byte_buffer(max), byte_buffer(max))
}

/// A buffer plus an edited copy: a splice of random bytes over a random
/// range, the shape real file writes take.
pub fn edited_buffer(max: usize) -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
    byte_buffer(max).prop_flat_map(|original| {
        let len = original.len();
        (
            Just(original),
            0..=len,
            prop::collection::vec(any::<u8>(), 0..16),
        )
            .prop_flat_map(move |(original, start, insert)| {
                let remaining = original.len() - start;
                (Just(original), Just(start), Just(insert), 0..=remaining)
            })
            .prop_map(|(original, start, insert, delete)| {
                let mut edited = original.clone();
                edited.splice(start..start + delete, insert);
                (original, edited)
            })
    })
}
