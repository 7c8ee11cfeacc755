//! Swarm descriptor parsing and construction

use super::SwarmError;

/// Opaque identifier used to join a peer swarm.
///
/// Wraps a magnet-style URI and the 20-byte content hash extracted from it.
/// Identity (equality, hashing) is the content hash alone, so two quality
/// variants that point at the same swarm share one cache slot.
#[derive(Debug, Clone)]
pub struct SwarmDescriptor {
    magnet: String,
    info_hash: [u8; 20],
}

impl SwarmDescriptor {
    /// Builds a descriptor from a 40-hex-char content hash and display title.
    ///
    /// # Errors
    /// - `SwarmError::InvalidDescriptor` - hash is not 40 hex characters
    pub fn from_info_hash(hash_hex: &str, title: &str) -> Result<Self, SwarmError> {
        let info_hash = decode_info_hash(hash_hex)?;
        let magnet = format!(
            "magnet:?xt=urn:btih:{}&dn={}",
            hash_hex.to_ascii_lowercase(),
            urlencoding::encode(title)
        );
        Ok(Self { magnet, info_hash })
    }

    /// Parses an existing magnet URI into a descriptor.
    ///
    /// # Errors
    /// - `SwarmError::InvalidDescriptor` - malformed URI or missing btih hash
    pub fn from_magnet(uri: &str) -> Result<Self, SwarmError> {
        let magnet =
            magnet_url::Magnet::new(uri).map_err(|e| SwarmError::InvalidDescriptor {
                reason: format!("invalid magnet link: {e}"),
            })?;

        let canonical = magnet.to_string();
        for param in canonical.split(['?', '&']).skip(1) {
            if let Some(hash_hex) = param.strip_prefix("xt=urn:btih:") {
                return Ok(Self {
                    magnet: uri.to_string(),
                    info_hash: decode_info_hash(hash_hex)?,
                });
            }
        }

        Err(SwarmError::InvalidDescriptor {
            reason: format!("missing btih hash in magnet link: {uri}"),
        })
    }

    /// The full magnet URI handed to the swarm connector.
    pub fn as_magnet(&self) -> &str {
        &self.magnet
    }

    /// The 20-byte content hash.
    pub fn info_hash(&self) -> &[u8; 20] {
        &self.info_hash
    }

    /// Short hash prefix for log lines.
    pub fn short_hash(&self) -> String {
        hex::encode(&self.info_hash[..8])
    }
}

impl PartialEq for SwarmDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.info_hash == other.info_hash
    }
}

impl Eq for SwarmDescriptor {}

impl std::hash::Hash for SwarmDescriptor {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.info_hash.hash(state);
    }
}

impl std::fmt::Display for SwarmDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "swarm:{}", self.short_hash())
    }
}

fn decode_info_hash(hash_hex: &str) -> Result<[u8; 20], SwarmError> {
    if hash_hex.len() != 40 {
        return Err(SwarmError::InvalidDescriptor {
            reason: format!("hash length {} (expected 40)", hash_hex.len()),
        });
    }

    let bytes = hex::decode(hash_hex).map_err(|_| SwarmError::InvalidDescriptor {
        reason: format!("non-hex character in hash: {hash_hex}"),
    })?;

    let mut hash = [0u8; 20];
    hash.copy_from_slice(&bytes);
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn test_from_info_hash_builds_magnet() {
        let descriptor = SwarmDescriptor::from_info_hash(HASH, "The Movie").unwrap();
        assert_eq!(
            descriptor.as_magnet(),
            format!("magnet:?xt=urn:btih:{HASH}&dn=The%20Movie")
        );
        assert_eq!(descriptor.short_hash(), "0123456789abcdef");
    }

    #[test]
    fn test_from_info_hash_rejects_bad_hash() {
        assert!(SwarmDescriptor::from_info_hash("tooshort", "t").is_err());
        let non_hex = "z".repeat(40);
        assert!(SwarmDescriptor::from_info_hash(&non_hex, "t").is_err());
    }

    #[test]
    fn test_from_magnet_roundtrip() {
        let uri = format!("magnet:?xt=urn:btih:{HASH}&dn=Test");
        let descriptor = SwarmDescriptor::from_magnet(&uri).unwrap();
        assert_eq!(descriptor.as_magnet(), uri);
        assert_eq!(descriptor.info_hash()[0], 0x01);
    }

    #[test]
    fn test_identity_is_hash_only() {
        let a = SwarmDescriptor::from_info_hash(HASH, "Title A").unwrap();
        let b = SwarmDescriptor::from_info_hash(HASH, "Title B").unwrap();
        assert_eq!(a, b);

        use std::collections::HashSet;
        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }
}
