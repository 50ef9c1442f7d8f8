use derecho_primitives::TypeTag;
use sha2::{Digest, Sha256};

/// Storage key prefix for a single subgroup+shard's persistent fields: the
/// SHA-256 of the replicated type's tag, hex-encoded to keep it filename-safe
/// and of fixed length, followed by the subgroup index and shard number.
pub fn generate_prefix(type_tag: &TypeTag, subgroup_index: u32, shard_num: u32) -> String {
    let digest = Sha256::digest(type_tag.as_str().as_bytes());
    format!("{}-{subgroup_index}-{shard_num}", hex::encode(digest))
}

/// True if `candidate` was produced by [`generate_prefix`] for the same
/// arguments (used to recognize a subgroup's own files among unrelated ones
/// in the same storage root).
pub fn match_prefix(candidate: &str, type_tag: &TypeTag, subgroup_index: u32, shard_num: u32) -> bool {
    candidate.starts_with(&generate_prefix(type_tag, subgroup_index, shard_num))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_produce_the_same_prefix() {
        let tag = TypeTag::new("cascade_store");
        assert_eq!(generate_prefix(&tag, 0, 1), generate_prefix(&tag, 0, 1));
    }

    #[test]
    fn different_shards_produce_different_prefixes() {
        let tag = TypeTag::new("cascade_store");
        assert_ne!(generate_prefix(&tag, 0, 0), generate_prefix(&tag, 0, 1));
    }

    #[test]
    fn match_prefix_recognizes_its_own_prefix() {
        let tag = TypeTag::new("cascade_store");
        let prefix = generate_prefix(&tag, 2, 3);
        let filename = format!("{prefix}/00000000000000000042");
        assert!(match_prefix(&filename, &tag, 2, 3));
        assert!(!match_prefix(&filename, &tag, 2, 4));
    }

    #[test]
    fn match_prefix_handles_candidate_shorter_than_prefix() {
        let tag = TypeTag::new("cascade_store");
        assert!(!match_prefix("x", &tag, 0, 0));
    }
}
