use ipsdelta::ips::decoder;
use ipsdelta::ips::encoder::{self, CreateOptions};
use proptest::prelude::*;

fn equal_length_pair() -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
    (0usize..1024).prop_flat_map(|len| {
        (
            proptest::collection::vec(any::<u8>(), len),
            proptest::collection::vec(any::<u8>(), len),
        )
    })
}

proptest! {
    #[test]
    fn prop_create_apply_roundtrip((source, target) in equal_length_pair()) {
        let patch = encoder::create(&source, &target).unwrap();
        let decoded = decoder::apply(&source, &patch).unwrap();
        prop_assert_eq!(decoded, target);
    }

    #[test]
    fn prop_roundtrip_without_rle((source, target) in equal_length_pair()) {
        let patch = encoder::create_with(
            &source,
            &target,
            CreateOptions { use_rle: false },
            &mut |_: &str| {},
        )
        .unwrap();
        let decoded = decoder::apply(&source, &patch).unwrap();
        prop_assert_eq!(decoded, target);
    }

    #[test]
    fn prop_identical_buffers_need_no_hunks(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let patch = encoder::create(&data, &data).unwrap();
        prop_assert_eq!(patch.as_slice(), b"PATCHEOF" as &[u8]);
    }

    #[test]
    fn prop_rle_only_shrinks_patches(
        (source, target) in equal_length_pair()
    ) {
        // Both modes pick the same ranges, so the RLE-enabled patch is
        // never larger than the regular-only one.
        let with_rle = encoder::create(&source, &target).unwrap();
        let without = encoder::create_with(
            &source,
            &target,
            CreateOptions { use_rle: false },
            &mut |_: &str| {},
        )
        .unwrap();
        prop_assert!(with_rle.len() <= without.len());
    }

    #[test]
    fn prop_decoder_never_panics(
        source in proptest::collection::vec(any::<u8>(), 0..256),
        patch in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        // Arbitrary bytes must produce Ok or a structured error, never a panic.
        let _ = decoder::apply(&source, &patch);
    }

    #[test]
    fn prop_mismatched_lengths_are_rejected(
        source in proptest::collection::vec(any::<u8>(), 0..128),
        target in proptest::collection::vec(any::<u8>(), 0..128),
    ) {
        prop_assume!(source.len() != target.len());
        prop_assert!(encoder::create(&source, &target).is_err());
    }
}
