//! Content digests over whole files.
//!
//! Files are streamed through the hasher in fixed-size reads so memory use
//! stays bounded regardless of artifact size.

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

const BUF_SIZE: usize = 64 * 1024;

/// Digest algorithm the clients use to compute the content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// Hex MD5, as produced by browser-side SparkMD5 style hashing.
    #[default]
    Md5,
    Sha256,
}

impl HashAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            other => Err(format!("unknown hash algorithm: {other}")),
        }
    }
}

fn hash_reader<D: Digest>(mut reader: impl Read) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compute the digest of a file as lowercase hex.
pub fn digest_path(path: &Path, algorithm: HashAlgorithm) -> io::Result<String> {
    let f = File::open(path)?;
    match algorithm {
        HashAlgorithm::Md5 => hash_reader::<Md5>(f),
        HashAlgorithm::Sha256 => hash_reader::<Sha256>(f),
    }
}

/// Digest of an in-memory buffer as lowercase hex.
pub fn digest_bytes(data: &[u8], algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::Md5 => hex::encode(Md5::digest(data)),
        HashAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn sha256_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let digest = digest_path(f.path(), HashAlgorithm::Sha256).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_known_content() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        let digest = digest_path(f.path(), HashAlgorithm::Sha256).unwrap();
        assert_eq!(
            digest,
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn md5_known_content() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        assert_eq!(
            digest_path(f.path(), HashAlgorithm::Md5).unwrap(),
            "b1946ac92492d2347c6235b4d2611184"
        );
    }

    #[test]
    fn md5_empty_input() {
        assert_eq!(
            digest_bytes(b"", HashAlgorithm::Md5),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn file_and_buffer_digests_agree_across_read_boundaries() {
        let data: Vec<u8> = (0u8..=250).cycle().take(BUF_SIZE * 2 + 17).collect();
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&data).unwrap();
        f.flush().unwrap();
        for algo in [HashAlgorithm::Md5, HashAlgorithm::Sha256] {
            assert_eq!(digest_path(f.path(), algo).unwrap(), digest_bytes(&data, algo));
        }
    }

    #[test]
    fn algorithm_from_str() {
        assert_eq!("MD5".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Md5);
        assert_eq!("sha-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert!("crc32".parse::<HashAlgorithm>().is_err());
    }
}
