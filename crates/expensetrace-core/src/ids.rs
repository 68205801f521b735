//! Opaque identifiers

use rand::rngs::OsRng;
use rand::RngCore;

/// Bytes of entropy behind every generated identifier
pub const ID_BYTES: usize = 16;

/// A fresh identifier: 16 bytes from the OS RNG, hex-encoded (32 chars)
pub fn random_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_id_shape() {
        let id = random_id();
        assert_eq!(id.len(), ID_BYTES * 2);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_random_ids_differ() {
        assert_ne!(random_id(), random_id());
    }
}
