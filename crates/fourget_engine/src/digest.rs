use std::fmt;
use std::io;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use md5::Md5;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncReadExt;

/// Read size used when hashing files already on disk.
const CHUNK_SIZE: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
}

impl DigestAlgorithm {
    /// Digest length in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            DigestAlgorithm::Md5 => 16,
            DigestAlgorithm::Sha256 => 32,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    #[error("invalid base64 digest: {0}")]
    Base64(String),
    #[error("invalid hex digest: {0}")]
    Hex(String),
    #[error("{algorithm} digest must be {expected} bytes, got {actual}")]
    Length {
        algorithm: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Expected or computed digest of some content, tagged with its algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentDigest {
    algorithm: DigestAlgorithm,
    bytes: Vec<u8>,
}

impl ContentDigest {
    pub fn new(algorithm: DigestAlgorithm, bytes: Vec<u8>) -> Result<Self, DigestError> {
        if bytes.len() != algorithm.digest_len() {
            return Err(DigestError::Length {
                algorithm: algorithm.as_str(),
                expected: algorithm.digest_len(),
                actual: bytes.len(),
            });
        }
        Ok(Self { algorithm, bytes })
    }

    pub fn from_base64(algorithm: DigestAlgorithm, encoded: &str) -> Result<Self, DigestError> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|err| DigestError::Base64(err.to_string()))?;
        Self::new(algorithm, bytes)
    }

    pub fn from_hex(algorithm: DigestAlgorithm, encoded: &str) -> Result<Self, DigestError> {
        let bytes = hex::decode(encoded).map_err(|err| DigestError::Hex(err.to_string()))?;
        Self::new(algorithm, bytes)
    }

    /// Digest of an in-memory buffer.
    pub fn of_bytes(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        let mut hasher = StreamingDigest::new(algorithm);
        hasher.update(data);
        hasher.finalize()
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.as_str(), self.to_hex())
    }
}

enum Hasher {
    Md5(Md5),
    Sha256(Sha256),
}

/// Incremental hasher fed chunk by chunk.
pub struct StreamingDigest {
    algorithm: DigestAlgorithm,
    hasher: Hasher,
}

impl StreamingDigest {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        let hasher = match algorithm {
            DigestAlgorithm::Md5 => Hasher::Md5(Md5::new()),
            DigestAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
        };
        Self { algorithm, hasher }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.hasher {
            Hasher::Md5(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> ContentDigest {
        let bytes = match self.hasher {
            Hasher::Md5(h) => h.finalize().to_vec(),
            Hasher::Sha256(h) => h.finalize().to_vec(),
        };
        ContentDigest {
            algorithm: self.algorithm,
            bytes,
        }
    }
}

/// Hashes the file at `path`, reading it in fixed-size chunks.
pub async fn digest_file(path: &Path, algorithm: DigestAlgorithm) -> io::Result<ContentDigest> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = StreamingDigest::new(algorithm);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        match file.read(&mut buffer).await? {
            0 => break,
            n => hasher.update(&buffer[..n]),
        }
    }
    Ok(hasher.finalize())
}

/// True only when `path` exists and its content hashes to `expected`.
pub async fn file_matches(path: &Path, expected: &ContentDigest) -> io::Result<bool> {
    match digest_file(path, expected.algorithm()).await {
        Ok(actual) => Ok(&actual == expected),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}
