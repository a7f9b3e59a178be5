//! Content hashes attachable to a token: an IPFS multihash (34 raw bytes)
//! or, once messaging is active, a raw 32-byte txid-style hash. The display
//! form is Base58 for the multihash shapes and hex for the txid shape, and
//! must round-trip exactly with the raw form.

/// Multihash function code for SHA2-256.
pub const IPFS_SHA2_256: u8 = 0x12;

/// Multihash digest length byte for SHA2-256.
pub const IPFS_SHA2_256_LEN: u8 = 0x20;

/// Function code marking a txid notifier hash.
pub const TXID_NOTIFIER: u8 = 0x54;

const BASE58_ALPHABET: &[u8; 58] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ContentHashError {
    #[error("content hash must be 32 or 34 bytes, got {0}")]
    BadLength(usize),
    #[error("content hash display form is not valid")]
    BadDisplayForm,
}

/// A validated content hash.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ContentHash(Vec<u8>);

impl ContentHash {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ContentHashError> {
        match bytes.len() {
            32 | 34 => Ok(Self(bytes)),
            other => Err(ContentHashError::BadLength(other)),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// A 34-byte IPFS SHA2-256 multihash.
    pub fn is_ipfs(&self) -> bool {
        self.0.len() == 34 && self.0[0] == IPFS_SHA2_256 && self.0[1] == IPFS_SHA2_256_LEN
    }

    /// A 34-byte txid notifier hash.
    pub fn is_txid_notifier(&self) -> bool {
        self.0.len() == 34 && self.0[0] == TXID_NOTIFIER && self.0[1] == IPFS_SHA2_256_LEN
    }

    /// Human-displayed form: Base58 for the 34-byte shapes, hex for the
    /// 32-byte txid shape.
    pub fn display(&self) -> String {
        encode_token_data(&self.0)
    }

    /// Parse the display form back to the raw hash.
    pub fn parse_display(text: &str) -> Result<Self, ContentHashError> {
        let bytes = decode_token_data(text).ok_or(ContentHashError::BadDisplayForm)?;
        Self::from_bytes(bytes)
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

/// Display-encode raw token data bytes: 34-byte values are Base58, anything
/// else is hex.
pub fn encode_token_data(bytes: &[u8]) -> String {
    if bytes.len() == 34 {
        base58_encode(bytes)
    } else {
        hex::encode(bytes)
    }
}

/// Inverse of [`encode_token_data`]: a 46-character Base58 string decodes to
/// 34 raw bytes, a 64-character hex string to 32.
pub fn decode_token_data(text: &str) -> Option<Vec<u8>> {
    if text.len() == 64 {
        let bytes = hex::decode(text).ok()?;
        return Some(bytes);
    }
    let bytes = base58_decode(text)?;
    (bytes.len() == 34).then_some(bytes)
}

/// Consensus shape check on an attached hash: a Base58 "Qm..." IPFS hash of
/// display length 46 always passes; once messaging is active a raw 32-byte
/// hash or a txid-notifier multihash also passes.
pub fn check_encoded(bytes: &[u8], messaging_active: bool) -> bool {
    let encoded = encode_token_data(bytes);
    if encoded.starts_with("Qm") && encoded.len() == 46 {
        return true;
    }
    if messaging_active {
        return bytes.len() == 32
            || (bytes.len() == 34 && bytes[0] == TXID_NOTIFIER && bytes[1] == IPFS_SHA2_256_LEN);
    }
    false
}

/// Base58 with the Bitcoin alphabet. Leading zero bytes map to leading '1's.
pub fn base58_encode(bytes: &[u8]) -> String {
    let leading_zeros = bytes.iter().take_while(|&&b| b == 0).count();
    let mut digits: Vec<u8> = Vec::new();
    for &byte in bytes {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }
    let mut out = String::with_capacity(leading_zeros + digits.len());
    for _ in 0..leading_zeros {
        out.push('1');
    }
    for &digit in digits.iter().rev() {
        out.push(BASE58_ALPHABET[digit as usize] as char);
    }
    out
}

/// Inverse of [`base58_encode`]. `None` on characters outside the alphabet.
pub fn base58_decode(text: &str) -> Option<Vec<u8>> {
    let leading_ones = text.bytes().take_while(|&b| b == b'1').count();
    let mut bytes: Vec<u8> = Vec::new();
    for ch in text.bytes() {
        let value = BASE58_ALPHABET.iter().position(|&a| a == ch)? as u32;
        let mut carry = value;
        for byte in bytes.iter_mut() {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }
    let mut out = vec![0u8; leading_ones];
    out.extend(bytes.iter().rev());
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ipfs_bytes() -> Vec<u8> {
        let mut bytes = vec![IPFS_SHA2_256, IPFS_SHA2_256_LEN];
        bytes.extend(
            hex::decode("0e7071c59df3b9454d1d18a15270aa36d54f89606a576dc621757afd44ad1d2e")
                .unwrap(),
        );
        bytes
    }

    #[test]
    fn ipfs_display_round_trip() {
        let hash = ContentHash::from_bytes(sample_ipfs_bytes()).unwrap();
        assert!(hash.is_ipfs());
        let display = hash.display();
        assert!(display.starts_with("Qm"));
        assert_eq!(display.len(), 46);
        assert_eq!(ContentHash::parse_display(&display).unwrap(), hash);
    }

    #[test]
    fn txid_display_round_trip() {
        let raw = vec![0xabu8; 32];
        let hash = ContentHash::from_bytes(raw.clone()).unwrap();
        assert_eq!(hash.display(), hex::encode(&raw));
        assert_eq!(ContentHash::parse_display(&hash.display()).unwrap(), hash);
    }

    #[test]
    fn leading_zero_bytes_survive_base58() {
        let mut bytes = vec![0u8, 0u8];
        bytes.extend(vec![7u8; 32]);
        let encoded = base58_encode(&bytes);
        assert!(encoded.starts_with("11"));
        assert_eq!(base58_decode(&encoded).unwrap(), bytes);
    }

    #[test]
    fn shape_check() {
        assert!(check_encoded(&sample_ipfs_bytes(), false));
        assert!(!check_encoded(&[0xab; 32], false));
        assert!(check_encoded(&[0xab; 32], true));
        let mut notifier = vec![TXID_NOTIFIER, IPFS_SHA2_256_LEN];
        notifier.extend([0xcd; 32]);
        assert!(!check_encoded(&notifier, false));
        assert!(check_encoded(&notifier, true));
        assert!(!check_encoded(&[1, 2, 3], true));
    }

    #[test]
    fn bad_lengths_rejected() {
        assert!(ContentHash::from_bytes(vec![0; 33]).is_err());
        assert!(ContentHash::parse_display("not-base58-0OIl").is_err());
    }
}
