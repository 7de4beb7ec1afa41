//! Property tests for MICE framing.

use proptest::prelude::*;
use sxg_core::mice;

proptest! {
    /// Bodies within one record encode as prefix + body, regardless of size.
    #[test]
    fn small_bodies_are_prefix_plus_body(body in proptest::collection::vec(any::<u8>(), 0..=512)) {
        let encoding = mice::encode(&body, 16384).unwrap();
        prop_assert_eq!(&encoding.body[..8], &16384u64.to_be_bytes()[..]);
        prop_assert_eq!(&encoding.body[8..], &body[..]);
    }

    /// Encoded length is 8 + |body| + 32 per interleaved proof.
    #[test]
    fn encoded_length_is_exact(
        body in proptest::collection::vec(any::<u8>(), 1..=256),
        record_size in 1u64..=64,
    ) {
        let encoding = mice::encode(&body, record_size).unwrap();
        let records = body.len().div_ceil(record_size as usize);
        prop_assert_eq!(encoding.body.len(), 8 + body.len() + 32 * (records - 1));
    }

    /// Stripping the framing recovers the original body.
    #[test]
    fn framing_is_reversible(
        body in proptest::collection::vec(any::<u8>(), 0..=256),
        record_size in 1u64..=64,
    ) {
        let encoding = mice::encode(&body, record_size).unwrap();

        let mut rest = &encoding.body[8..];
        let mut recovered = Vec::new();
        let rs = record_size as usize;
        // First record has no proof in front of it.
        let take = rs.min(rest.len());
        recovered.extend_from_slice(&rest[..take]);
        rest = &rest[take..];
        while !rest.is_empty() {
            rest = &rest[32..]; // interleaved proof
            let take = rs.min(rest.len());
            recovered.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
        }
        prop_assert_eq!(recovered, body);
    }

    /// The digest root depends on the body.
    #[test]
    fn digest_tracks_body(body in proptest::collection::vec(any::<u8>(), 1..=64)) {
        let a = mice::encode(&body, 16).unwrap();
        let mut flipped = body.clone();
        flipped[0] ^= 0xFF;
        let b = mice::encode(&flipped, 16).unwrap();
        prop_assert_ne!(a.root, b.root);
    }
}
