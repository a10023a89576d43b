//! SHA-256 file hashing and checksum-manifest parsing.
//!
//! The algorithm is fixed: upstream image mirrors publish `SHA256SUMS`
//! manifests, one `<hex-digest>  <filename>` pair per line.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Compute SHA-256 of a file and return the digest as lowercase hex.
/// Reads in chunks to keep memory use bounded; image files are large.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut f = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Case-insensitive digest comparison; mirrors publish both cases.
pub fn digests_match(expected: &str, computed: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(computed.trim())
}

/// Scan a checksum manifest body for the digest of `filename`.
///
/// Comment lines (`#`) are skipped. The filename field may carry a leading
/// `*` (binary-mode marker) or `./` prefix, both of which are tolerated.
pub fn find_digest<'a>(body: &'a str, filename: &str) -> Option<&'a str> {
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(digest), Some(name)) = (fields.next(), fields.next()) else {
            continue;
        };
        let name = name.trim_start_matches('*').trim_start_matches("./");
        if name == filename {
            return Some(digest);
        }
    }
    None
}
