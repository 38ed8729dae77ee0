// src/hash.rs

//! Content hashing for bundle graphs and files
//!
//! Every context and file packaged into a bundle is identified by a digest
//! of its bytes. Bundle hash records store the raw digest prefixed by its
//! size, and graph files are named after the hex form of the digest.
//!
//! | Algorithm | Digest size | Use |
//! |-----------|-------------|-----|
//! | SHA-224 | 28 bytes | Default for graph and file hashes |
//! | SHA-256 | 32 bytes | Available for callers that need it |

use sha2::{Digest as _, Sha224, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    /// SHA-224 (224-bit cryptographic hash)
    #[default]
    Sha224,

    /// SHA-256 (256-bit cryptographic hash)
    Sha256,
}

impl HashAlgorithm {
    /// Get the digest length in bytes
    #[inline]
    pub const fn output_len(&self) -> usize {
        match self {
            Self::Sha224 => 28,
            Self::Sha256 => 32,
        }
    }

    /// The algorithm whose digests are `len` bytes long
    pub fn for_output_len(len: usize) -> Option<Self> {
        [Self::Sha224, Self::Sha256]
            .into_iter()
            .find(|algorithm| algorithm.output_len() == len)
    }

    /// Internal block size of the compression function
    #[inline]
    pub const fn block_size(&self) -> usize {
        64
    }

    /// Size of the chunks read when hashing a stream
    ///
    /// Large enough to keep syscalls rare, small enough to bound memory for
    /// graph dumps of any size.
    #[inline]
    pub const fn read_chunk_size(&self) -> usize {
        self.block_size() << 15
    }

    /// Get the algorithm name as a string
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A finished digest with its algorithm
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: HashAlgorithm,
    bytes: Vec<u8>,
}

impl Digest {
    #[inline]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Raw digest bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex form of the digest
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Incremental hasher over any supported algorithm
pub struct Hasher {
    state: HasherState,
}

enum HasherState {
    Sha224(Sha224),
    Sha256(Sha256),
}

impl Hasher {
    /// Create a new hasher with the specified algorithm
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Sha224 => HasherState::Sha224(Sha224::new()),
            HashAlgorithm::Sha256 => HasherState::Sha256(Sha256::new()),
        };
        Self { state }
    }

    /// Update the hasher with more data
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Sha224(hasher) => hasher.update(data),
            HasherState::Sha256(hasher) => hasher.update(data),
        }
    }

    /// Finalize and return the digest
    pub fn finalize(self) -> Digest {
        match self.state {
            HasherState::Sha224(hasher) => Digest {
                algorithm: HashAlgorithm::Sha224,
                bytes: hasher.finalize().to_vec(),
            },
            HasherState::Sha256(hasher) => Digest {
                algorithm: HashAlgorithm::Sha256,
                bytes: hasher.finalize().to_vec(),
            },
        }
    }
}

/// Compute the digest of a byte slice
pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Digest {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Compute the digest of data from a reader
///
/// Reads in fixed-size chunks so memory use does not depend on input size.
pub fn hash_reader<R: Read>(algorithm: HashAlgorithm, reader: &mut R) -> io::Result<Digest> {
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = vec![0u8; algorithm.read_chunk_size()];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize())
}

/// Compute the digest of a file's contents
pub fn hash_file(algorithm: HashAlgorithm, path: &Path) -> io::Result<Digest> {
    let mut file = File::open(path)?;
    hash_reader(algorithm, &mut file)
}
