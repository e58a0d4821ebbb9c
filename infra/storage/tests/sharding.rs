use depot_storage::shard_path;
use proptest::prelude::*;

proptest! {
    #[test]
    fn primary_items_have_three_segments(id in "[a-zA-Z0-9_-]{1,40}") {
        let segments = shard_path(&id, "");
        prop_assert_eq!(segments.len(), 3);
        prop_assert_eq!(segments[0].chars().count(), 3);
        prop_assert_eq!(segments[1].chars().count(), 3);
    }

    #[test]
    fn qualified_items_have_four_segments(
        id in "[a-zA-Z0-9_-]{1,40}",
        qualifier in "[a-z][a-z0-9-]{0,15}",
    ) {
        let segments = shard_path(&id, &qualifier);
        prop_assert_eq!(segments.len(), 4);
        prop_assert_eq!(&segments[3], &qualifier);
        prop_assert_eq!(&segments[..3], &shard_path(&id, "")[..]);
    }

    #[test]
    fn segments_are_prefixes_of_padded_id(id in "[a-zA-Z0-9]{1,40}") {
        let segments = shard_path(&id, "");
        prop_assert!(segments[2].starts_with(&id));
        prop_assert!(segments[2].len() >= 6);
        prop_assert_eq!(format!("{}{}", segments[0], segments[1]), &segments[2][..6]);
    }

    #[test]
    fn mapping_is_deterministic(id in "\\PC{1,24}", qualifier in "\\PC{0,8}") {
        prop_assert_eq!(shard_path(&id, &qualifier), shard_path(&id, &qualifier));
    }
}

#[test]
fn short_ids_are_zero_padded() {
    assert_eq!(shard_path("AB", ""), ["AB0", "000", "AB0000"]);
}
