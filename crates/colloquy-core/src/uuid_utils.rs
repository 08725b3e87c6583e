//! UUID v7 utilities for time-ordered identifiers.
//!
//! Job and record ids use UUIDv7, which embeds a millisecond-precision
//! timestamp in the first 48 bits, giving natural time-ordering and
//! efficient temporal queries against the durable store.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// # Example
///
/// ```
/// use colloquy_core::uuid_utils::new_v7;
///
/// let id = new_v7();
/// // IDs generated later will be lexicographically greater
/// ```
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v7_version() {
        let id = new_v7();
        assert_eq!(id.get_version_num(), 7);
    }

    #[test]
    fn test_new_v7_monotonic_ordering() {
        let a = new_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_v7();
        assert!(b > a, "later v7 ids sort after earlier ones");
    }
}
