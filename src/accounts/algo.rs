//! The iterated-digest registry behind credential verification.
//!
//! Each account names one digest from a fixed registry plus an iteration
//! count; deriving a hash feeds each round's lowercase-hex output into the
//! next round. The chain is unsalted and not memory-hard. It is kept for
//! compatibility with existing credential stores and must not be mistaken
//! for a modern password KDF. Extendable-output digests (the shake family)
//! are excluded: the scheme carries no output-length parameter.

use blake2::{Blake2b512, Blake2s256};
use digest::Digest;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
    /// 64-byte-digest BLAKE2b
    Blake2b,
    /// 32-byte-digest BLAKE2s
    Blake2s,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 12] = [
        Self::Md5,
        Self::Sha1,
        Self::Sha224,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
        Self::Sha3_224,
        Self::Sha3_256,
        Self::Sha3_384,
        Self::Sha3_512,
        Self::Blake2b,
        Self::Blake2s,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            Self::Sha3_224 => "sha3_224",
            Self::Sha3_256 => "sha3_256",
            Self::Sha3_384 => "sha3_384",
            Self::Sha3_512 => "sha3_512",
            Self::Blake2b => "blake2b",
            Self::Blake2s => "blake2s",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        Self::ALL.into_iter().find(|algo| algo.name() == name)
    }

    /// Apply the digest `rounds` times, hex re-encoding between rounds.
    pub fn chain(self, password: &str, rounds: u32) -> String {
        match self {
            Self::Md5 => chain::<Md5>(password, rounds),
            Self::Sha1 => chain::<Sha1>(password, rounds),
            Self::Sha224 => chain::<Sha224>(password, rounds),
            Self::Sha256 => chain::<Sha256>(password, rounds),
            Self::Sha384 => chain::<Sha384>(password, rounds),
            Self::Sha512 => chain::<Sha512>(password, rounds),
            Self::Sha3_224 => chain::<Sha3_224>(password, rounds),
            Self::Sha3_256 => chain::<Sha3_256>(password, rounds),
            Self::Sha3_384 => chain::<Sha3_384>(password, rounds),
            Self::Sha3_512 => chain::<Sha3_512>(password, rounds),
            Self::Blake2b => chain::<Blake2b512>(password, rounds),
            Self::Blake2s => chain::<Blake2s256>(password, rounds),
        }
    }
}

fn chain<D: Digest>(password: &str, rounds: u32) -> String {
    let mut derived = password.to_owned();
    for _ in 0..rounds {
        derived = hex::encode(D::digest(derived.as_bytes()));
    }
    derived
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_round_matches_known_vectors() {
        assert_eq!(
            HashAlgorithm::Md5.chain("password", 1),
            "5f4dcc3b5aa765d61d8327deb882cf99"
        );
        assert_eq!(
            HashAlgorithm::Sha1.chain("password", 1),
            "5baa61e4c9b93f3f0682250b6cf8331b7ee68fd8"
        );
        assert_eq!(
            HashAlgorithm::Sha256.chain("password", 1),
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
    }

    #[test]
    fn chains_compose() {
        let algo = HashAlgorithm::Sha256;
        let three = algo.chain("secret", 3);
        let staged = algo.chain(&algo.chain("secret", 1), 2);
        assert_eq!(three, staged);
    }

    #[test]
    fn round_count_changes_the_result() {
        let algo = HashAlgorithm::Sha512;
        assert_ne!(algo.chain("secret", 4), algo.chain("secret", 5));
    }

    #[test]
    fn zero_rounds_is_the_identity() {
        assert_eq!(HashAlgorithm::Sha256.chain("secret", 0), "secret");
    }

    #[test]
    fn registry_names_round_trip() {
        for algo in HashAlgorithm::ALL {
            assert_eq!(HashAlgorithm::from_name(algo.name()), Some(algo));
        }
    }

    #[test]
    fn from_name_is_case_insensitive() {
        assert_eq!(
            HashAlgorithm::from_name("SHA256"),
            Some(HashAlgorithm::Sha256)
        );
    }

    #[test]
    fn shake_variants_are_not_supported() {
        assert_eq!(HashAlgorithm::from_name("shake_128"), None);
        assert_eq!(HashAlgorithm::from_name("shake_256"), None);
    }

    #[test]
    fn blake2_digest_widths() {
        assert_eq!(HashAlgorithm::Blake2b.chain("x", 1).len(), 128);
        assert_eq!(HashAlgorithm::Blake2s.chain("x", 1).len(), 64);
    }

    #[test]
    fn algorithms_disagree_on_output() {
        let a = HashAlgorithm::Sha256.chain("secret", 2);
        let b = HashAlgorithm::Sha3_256.chain("secret", 2);
        assert_ne!(a, b);
    }
}
