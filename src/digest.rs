use sha2::{Digest, Sha256};

/// Width of a SHA-256 digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Width of a digest rendered as lowercase hex. Also the fixed width of every
/// nonce, header and separator line in a chain file.
pub const HEX_LEN: usize = DIGEST_LEN * 2;

/// Raw SHA-256 output.
pub type Hash256 = [u8; DIGEST_LEN];

/// Compute the SHA-256 digest of some data.
pub fn digest(data: &[u8]) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Lowercase hex rendering, as stored in chain files.
pub fn to_hex(hash: &Hash256) -> String {
    hex::encode(hash)
}

/// Count the zero bits before the first one bit, most significant bit of the
/// first byte first. Returns `8 * len` for an all-zero input.
pub fn count_leading_zero_bits(bytes: &[u8]) -> u32 {
    let mut count = 0;
    for byte in bytes {
        if *byte == 0 {
            count += 8;
        } else {
            return count + byte.leading_zeros();
        }
    }
    count
}
