//! Digest + encoding for `!CFNToolsCRC`.

use crate::directive::options::{Algorithm, ChecksumOptions, Encoding};
use base64::Engine;
use sha2::Digest;

pub fn digest(bytes: &[u8], options: &ChecksumOptions) -> String {
    let raw: Vec<u8> = match options.algorithm {
        Algorithm::Md5 => md5::Md5::digest(bytes).to_vec(),
        Algorithm::Sha1 => sha1::Sha1::digest(bytes).to_vec(),
        Algorithm::Sha256 => sha2::Sha256::digest(bytes).to_vec(),
        Algorithm::Sha512 => sha2::Sha512::digest(bytes).to_vec(),
    };
    match options.encoding {
        Encoding::Hex => hex::encode(raw),
        Encoding::Base64 => base64::engine::general_purpose::STANDARD.encode(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(algorithm: Algorithm, encoding: Encoding) -> ChecksumOptions {
        ChecksumOptions {
            algorithm,
            encoding,
        }
    }

    #[test]
    fn known_vectors() {
        let hello = b"hello";
        assert_eq!(
            digest(hello, &opts(Algorithm::Md5, Encoding::Hex)),
            "5d41402abc4b2a76b9719d911017c592"
        );
        assert_eq!(
            digest(hello, &opts(Algorithm::Sha1, Encoding::Hex)),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
        assert_eq!(
            digest(hello, &ChecksumOptions::default()),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(
            digest(hello, &opts(Algorithm::Sha256, Encoding::Base64)),
            "LPJNul+wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ="
        );
    }

    #[test]
    fn sha512_is_128_hex_chars() {
        assert_eq!(digest(b"", &opts(Algorithm::Sha512, Encoding::Hex)).len(), 128);
    }
}
