//! Stable hashing for bucketed map columns
//!
//! Bucket membership of a map key is a pure function of the key bytes:
//! FNV-1a (32-bit) of the UTF-8 key, modulo the bucket count. The mapping
//! must never change, since data already written to `attr_str_{n}` is not
//! migrated between buckets.

/// Number of physical sub-columns a bucketed map column is split into.
pub const ATTRIBUTE_BUCKETS: u32 = 20;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over raw bytes.
pub fn fnv_1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Bucket index of `key` in `[0, buckets)`.
///
/// `buckets` must be non-zero; callers validate this when the transformer
/// is configured.
pub fn bucket_for(key: &str, buckets: u32) -> u32 {
    fnv_1a(key.as_bytes()) % buckets
}

/// Bucket index using the default [`ATTRIBUTE_BUCKETS`].
pub fn attribute_bucket(key: &str) -> u32 {
    bucket_for(key, ATTRIBUTE_BUCKETS)
}

/// Name of the physical sub-column holding bucket `index` of `column`.
pub fn bucket_column_name(column: &str, index: u32) -> String {
    format!("{}_{}", column, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv_1a_reference_vectors() {
        assert_eq!(fnv_1a(b""), 0x811c_9dc5);
        assert_eq!(fnv_1a(b"a"), 0xe40c_292c);
        assert_eq!(fnv_1a(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_bucket_is_in_range() {
        for key in ["", "a", "foo", "checkout.latency", "sentry.environment"] {
            assert!(attribute_bucket(key) < ATTRIBUTE_BUCKETS);
        }
    }

    #[test]
    fn test_known_buckets() {
        assert_eq!(attribute_bucket("foo"), 3);
        assert_eq!(attribute_bucket("checkout.latency"), 5);
        assert_eq!(attribute_bucket("sentry.environment"), 9);
    }

    #[test]
    fn test_bucket_is_deterministic() {
        let first = attribute_bucket("checkout.latency");
        for _ in 0..100 {
            assert_eq!(attribute_bucket("checkout.latency"), first);
        }
    }

    #[test]
    fn test_multibyte_keys_hash_utf8_bytes() {
        let key = "caf\u{e9}";
        assert_eq!(fnv_1a(key.as_bytes()), fnv_1a("café".as_bytes()));
        assert!(attribute_bucket(key) < ATTRIBUTE_BUCKETS);
    }

    #[test]
    fn test_bucket_column_name() {
        assert_eq!(bucket_column_name("attr_str", 0), "attr_str_0");
        assert_eq!(bucket_column_name("attr_num", 19), "attr_num_19");
    }
}
