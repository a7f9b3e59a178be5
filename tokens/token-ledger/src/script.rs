//! Encoding and decoding of token data carried inside output scripts.
//!
//! A token payment script is an ordinary pay-to-pubkey-hash or
//! pay-to-script-hash script followed by a marked data section:
//!
//! ```text
//! <payment prefix> OP_TOKEN <push: "tkn" kind record> OP_DROP
//! ```
//!
//! where `kind` is `q` (new token), `o` (owner), `t` (transfer) or `r`
//! (reissue) and `record` is the record's binary serialization. Null data
//! scripts are unspendable and start with `OP_TOKEN` directly: a per-address
//! tag or freeze change pushes the 20-byte address hash and the change
//! record, a verifier declaration follows one `OP_RESERVED`, and a global
//! restriction change follows two.

use token_types::types::content_hash::{base58_decode, base58_encode};
use token_types::{
    Deserial, DeserialError, NewToken, NullTokenData, ReissueToken, Serial, TokenTransfer,
    VerifierStringData,
};

pub const OP_TOKEN: u8 = 0xc0;
pub const OP_DROP: u8 = 0x75;
pub const OP_RESERVED: u8 = 0x50;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;

const TOKEN_MARKER: &[u8; 3] = b"tkn";
const KIND_NEW: u8 = b'q';
const KIND_OWNER: u8 = b'o';
const KIND_TRANSFER: u8 = b't';
const KIND_REISSUE: u8 = b'r';

/// The payment template in front of the token section.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ScriptType {
    PubKeyHash,
    ScriptHash,
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("token section is truncated")]
    Truncated,
    #[error("token section push is malformed")]
    BadPush,
    #[error("token marker is missing or unknown")]
    BadMarker,
    #[error("token record failed to deserialize: {0}")]
    BadRecord(#[from] DeserialError),
    #[error("token section has trailing bytes")]
    TrailingBytes,
    #[error("null data address push must be 20 bytes")]
    BadNullDataAddress,
}

/// A decoded token-carrying script.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TokenScript {
    NewToken { script_type: ScriptType, address: String, token: NewToken },
    Owner { script_type: ScriptType, address: String, name: String },
    Transfer { script_type: ScriptType, address: String, transfer: TokenTransfer },
    Reissue { script_type: ScriptType, address: String, reissue: ReissueToken },
    NullData { address: String, data: NullTokenData },
    Verifier(VerifierStringData),
    GlobalRestriction(NullTokenData),
}

impl TokenScript {
    pub fn is_transfer(&self) -> bool {
        matches!(self, TokenScript::Transfer { .. })
    }

    pub fn is_new_token(&self) -> bool {
        matches!(self, TokenScript::NewToken { .. })
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, TokenScript::Owner { .. })
    }

    pub fn is_reissue(&self) -> bool {
        matches!(self, TokenScript::Reissue { .. })
    }

    /// The payment address the token lands on, if the script has one.
    pub fn address(&self) -> Option<&str> {
        match self {
            TokenScript::NewToken { address, .. }
            | TokenScript::Owner { address, .. }
            | TokenScript::Transfer { address, .. }
            | TokenScript::Reissue { address, .. }
            | TokenScript::NullData { address, .. } => Some(address),
            TokenScript::Verifier(_) | TokenScript::GlobalRestriction(_) => None,
        }
    }
}

/// Marker-level kind of a payment-form token section, determined without
/// deserializing the record.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PaymentTokenKind {
    New,
    Owner,
    Transfer,
    Reissue,
}

/// Whether the script is one of the unspendable null token forms.
pub fn has_null_token_prefix(script: &[u8]) -> bool {
    script.first() == Some(&OP_TOKEN)
}

/// A per-address tag or freeze change: `OP_TOKEN` followed directly by a
/// push.
pub fn is_null_data_form(script: &[u8]) -> bool {
    script.first() == Some(&OP_TOKEN) && script.get(1).is_some_and(|b| *b != OP_RESERVED)
}

/// A verifier declaration: `OP_TOKEN OP_RESERVED` followed by a push.
pub fn is_verifier_form(script: &[u8]) -> bool {
    script.first() == Some(&OP_TOKEN)
        && script.get(1) == Some(&OP_RESERVED)
        && script.get(2).is_some_and(|b| *b != OP_RESERVED)
}

/// A global restriction change: `OP_TOKEN OP_RESERVED OP_RESERVED`.
pub fn is_global_restriction_form(script: &[u8]) -> bool {
    script.first() == Some(&OP_TOKEN)
        && script.get(1) == Some(&OP_RESERVED)
        && script.get(2) == Some(&OP_RESERVED)
}

/// The kind byte of a payment-form token section, if the script has one
/// with an intact marker. The record itself may still fail to deserialize.
pub fn payment_token_kind(script: &[u8]) -> Option<PaymentTokenKind> {
    let (_, _, start) = payment_prefix(script)?;
    if script.get(start) != Some(&OP_TOKEN) {
        return None;
    }
    let (payload, pos) = read_push(script, start + 1).ok()?;
    if script.get(pos) != Some(&OP_DROP) || script.len() != pos + 1 {
        return None;
    }
    if payload.len() < 4 || &payload[..3] != TOKEN_MARKER {
        return None;
    }
    match payload[3] {
        KIND_NEW => Some(PaymentTokenKind::New),
        KIND_OWNER => Some(PaymentTokenKind::Owner),
        KIND_TRANSFER => Some(PaymentTokenKind::Transfer),
        KIND_REISSUE => Some(PaymentTokenKind::Reissue),
        _ => None,
    }
}

/// The payment destination of a script with a recognizable payment prefix.
pub fn destination_of(script: &[u8]) -> Option<String> {
    payment_prefix(script).map(|(_, hash, _)| hash_to_address(&hash))
}

/// Whether `OP_TOKEN` occurs anywhere in the script as an opcode, skipping
/// push data.
pub fn contains_op_token(script: &[u8]) -> bool {
    let mut pos = 0;
    while pos < script.len() {
        let op = script[pos];
        if op == OP_TOKEN {
            return true;
        }
        pos += 1;
        match op {
            1..=75 => pos += op as usize,
            OP_PUSHDATA1 => {
                let len = script.get(pos).copied().unwrap_or(0) as usize;
                pos += 1 + len;
            }
            OP_PUSHDATA2 => {
                let lo = script.get(pos).copied().unwrap_or(0) as usize;
                let hi = script.get(pos + 1).copied().unwrap_or(0) as usize;
                pos += 2 + (lo | (hi << 8));
            }
            _ => {}
        }
    }
    false
}

/// Render a 20-byte pubkey or script hash as an address string.
pub fn hash_to_address(hash: &[u8; 20]) -> String {
    base58_encode(hash)
}

/// Parse an address string back to its 20-byte hash.
pub fn address_to_hash(address: &str) -> Option<[u8; 20]> {
    let bytes = base58_decode(address)?;
    <[u8; 20]>::try_from(bytes.as_slice()).ok()
}

fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    match data.len() {
        len @ 0..=75 => script.push(len as u8),
        len @ 76..=255 => {
            script.push(OP_PUSHDATA1);
            script.push(len as u8);
        }
        len => {
            script.push(OP_PUSHDATA2);
            script.extend_from_slice(&(len as u16).to_le_bytes());
        }
    }
    script.extend_from_slice(data);
}

fn read_push(script: &[u8], pos: usize) -> Result<(&[u8], usize), ScriptError> {
    let opcode = *script.get(pos).ok_or(ScriptError::Truncated)?;
    let (len, start) = match opcode {
        1..=75 => (opcode as usize, pos + 1),
        OP_PUSHDATA1 => {
            let len = *script.get(pos + 1).ok_or(ScriptError::Truncated)? as usize;
            (len, pos + 2)
        }
        OP_PUSHDATA2 => {
            let lo = *script.get(pos + 1).ok_or(ScriptError::Truncated)? as usize;
            let hi = *script.get(pos + 2).ok_or(ScriptError::Truncated)? as usize;
            (lo | (hi << 8), pos + 3)
        }
        _ => return Err(ScriptError::BadPush),
    };
    let end = start + len;
    if end > script.len() {
        return Err(ScriptError::Truncated);
    }
    Ok((&script[start..end], end))
}

/// Build a pay-to-pubkey-hash script for the given hash.
pub fn pay_to_pubkey_hash(hash: &[u8; 20]) -> Vec<u8> {
    let mut script = vec![0x76, 0xa9, 0x14];
    script.extend_from_slice(hash);
    script.extend_from_slice(&[0x88, 0xac]);
    script
}

fn append_token_section(script: &mut Vec<u8>, kind: u8, record: &[u8]) {
    let mut payload = Vec::with_capacity(4 + record.len());
    payload.extend_from_slice(TOKEN_MARKER);
    payload.push(kind);
    payload.extend_from_slice(record);
    script.push(OP_TOKEN);
    push_data(script, &payload);
    script.push(OP_DROP);
}

pub fn new_token_script(hash: &[u8; 20], token: &NewToken) -> Vec<u8> {
    let mut script = pay_to_pubkey_hash(hash);
    append_token_section(&mut script, KIND_NEW, &token.serialize());
    script
}

pub fn owner_script(hash: &[u8; 20], owner_name: &str) -> Vec<u8> {
    let mut script = pay_to_pubkey_hash(hash);
    append_token_section(&mut script, KIND_OWNER, &owner_name.to_string().serialize());
    script
}

pub fn transfer_script(hash: &[u8; 20], transfer: &TokenTransfer) -> Vec<u8> {
    let mut script = pay_to_pubkey_hash(hash);
    append_token_section(&mut script, KIND_TRANSFER, &transfer.serialize());
    script
}

pub fn reissue_script(hash: &[u8; 20], reissue: &ReissueToken) -> Vec<u8> {
    let mut script = pay_to_pubkey_hash(hash);
    append_token_section(&mut script, KIND_REISSUE, &reissue.serialize());
    script
}

pub fn null_data_script(hash: &[u8; 20], data: &NullTokenData) -> Vec<u8> {
    let mut script = vec![OP_TOKEN];
    push_data(&mut script, hash);
    push_data(&mut script, &data.serialize());
    script
}

pub fn verifier_script(data: &VerifierStringData) -> Vec<u8> {
    let mut script = vec![OP_TOKEN, OP_RESERVED];
    push_data(&mut script, &data.serialize());
    script
}

pub fn global_restriction_script(data: &NullTokenData) -> Vec<u8> {
    let mut script = vec![OP_TOKEN, OP_RESERVED, OP_RESERVED];
    push_data(&mut script, &data.serialize());
    script
}

/// Decode a script's token content. `Ok(None)` means the script carries no
/// token data at all; an error means the script claims to carry token data
/// but is malformed.
pub fn decode_token_script(script: &[u8]) -> Result<Option<TokenScript>, ScriptError> {
    if let Some((script_type, hash, section_start)) = payment_prefix(script) {
        if script.len() == section_start {
            return Ok(None);
        }
        let address = hash_to_address(&hash);
        return decode_payment_section(script, section_start, script_type, address).map(Some);
    }

    if script.first() != Some(&OP_TOKEN) {
        return Ok(None);
    }
    if script.get(1) == Some(&OP_RESERVED) {
        if script.get(2) == Some(&OP_RESERVED) {
            let (payload, end) = read_push(script, 3)?;
            expect_end(script, end)?;
            let data = NullTokenData::deserialize(payload)?;
            return Ok(Some(TokenScript::GlobalRestriction(data)));
        }
        let (payload, end) = read_push(script, 2)?;
        expect_end(script, end)?;
        let data = VerifierStringData::deserialize(payload)?;
        return Ok(Some(TokenScript::Verifier(data)));
    }
    let (hash, pos) = read_push(script, 1)?;
    let hash: [u8; 20] =
        <[u8; 20]>::try_from(hash).map_err(|_| ScriptError::BadNullDataAddress)?;
    let (payload, end) = read_push(script, pos)?;
    expect_end(script, end)?;
    let data = NullTokenData::deserialize(payload)?;
    Ok(Some(TokenScript::NullData { address: hash_to_address(&hash), data }))
}

fn payment_prefix(script: &[u8]) -> Option<(ScriptType, [u8; 20], usize)> {
    if script.len() >= 25
        && script[0] == 0x76
        && script[1] == 0xa9
        && script[2] == 0x14
        && script[23] == 0x88
        && script[24] == 0xac
    {
        let hash = <[u8; 20]>::try_from(&script[3..23]).ok()?;
        return Some((ScriptType::PubKeyHash, hash, 25));
    }
    if script.len() >= 23 && script[0] == 0xa9 && script[1] == 0x14 && script[22] == 0x87 {
        let hash = <[u8; 20]>::try_from(&script[2..22]).ok()?;
        return Some((ScriptType::ScriptHash, hash, 23));
    }
    None
}

fn decode_payment_section(
    script: &[u8],
    start: usize,
    script_type: ScriptType,
    address: String,
) -> Result<TokenScript, ScriptError> {
    if script.get(start) != Some(&OP_TOKEN) {
        return Err(ScriptError::BadMarker);
    }
    let (payload, pos) = read_push(script, start + 1)?;
    if script.get(pos) != Some(&OP_DROP) {
        return Err(ScriptError::BadPush);
    }
    expect_end(script, pos + 1)?;
    if payload.len() < 4 || &payload[..3] != TOKEN_MARKER {
        return Err(ScriptError::BadMarker);
    }
    let record = &payload[4..];
    match payload[3] {
        KIND_NEW => {
            let token = NewToken::deserialize(record)?;
            Ok(TokenScript::NewToken { script_type, address, token })
        }
        KIND_OWNER => {
            let name = String::deserialize(record)?;
            Ok(TokenScript::Owner { script_type, address, name })
        }
        KIND_TRANSFER => {
            let transfer = TokenTransfer::deserialize(record)?;
            Ok(TokenScript::Transfer { script_type, address, transfer })
        }
        KIND_REISSUE => {
            let reissue = ReissueToken::deserialize(record)?;
            Ok(TokenScript::Reissue { script_type, address, reissue })
        }
        _ => Err(ScriptError::BadMarker),
    }
}

fn expect_end(script: &[u8], pos: usize) -> Result<(), ScriptError> {
    if script.len() == pos {
        Ok(())
    } else {
        Err(ScriptError::TrailingBytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use token_types::TokenAmount;

    const HASH: [u8; 20] = [0x11; 20];

    #[test]
    fn plain_p2pkh_is_not_a_token_script() {
        let script = pay_to_pubkey_hash(&HASH);
        assert_eq!(decode_token_script(&script).unwrap(), None);
    }

    #[test]
    fn transfer_round_trip() {
        let transfer = TokenTransfer {
            name: "TOKEN".to_string(),
            amount: TokenAmount(100),
            time_lock: 0,
            message: Vec::new(),
            expire_time: 0,
        };
        let script = transfer_script(&HASH, &transfer);
        match decode_token_script(&script).unwrap().unwrap() {
            TokenScript::Transfer { script_type, address, transfer: decoded } => {
                assert_eq!(script_type, ScriptType::PubKeyHash);
                assert_eq!(address, hash_to_address(&HASH));
                assert_eq!(decoded, transfer);
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn owner_round_trip() {
        let script = owner_script(&HASH, "TOKEN!");
        match decode_token_script(&script).unwrap().unwrap() {
            TokenScript::Owner { name, .. } => assert_eq!(name, "TOKEN!"),
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn new_token_round_trip() {
        let token = NewToken::new("TOKEN".to_string(), TokenAmount(1000), 2, true);
        let script = new_token_script(&HASH, &token);
        match decode_token_script(&script).unwrap().unwrap() {
            TokenScript::NewToken { token: decoded, .. } => assert_eq!(decoded, token),
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn null_data_forms_round_trip() {
        let data = NullTokenData { token_name: "#KYC".to_string(), flag: 1 };
        let script = null_data_script(&HASH, &data);
        match decode_token_script(&script).unwrap().unwrap() {
            TokenScript::NullData { address, data: decoded } => {
                assert_eq!(address, hash_to_address(&HASH));
                assert_eq!(decoded, data);
            }
            other => panic!("unexpected decode: {other:?}"),
        }

        let verifier = VerifierStringData { verifier_string: "KYC&!FROZEN".to_string() };
        let script = verifier_script(&verifier);
        assert_eq!(
            decode_token_script(&script).unwrap().unwrap(),
            TokenScript::Verifier(verifier)
        );

        let global = NullTokenData { token_name: "$TOKEN".to_string(), flag: 1 };
        let script = global_restriction_script(&global);
        assert_eq!(
            decode_token_script(&script).unwrap().unwrap(),
            TokenScript::GlobalRestriction(global)
        );
    }

    #[test]
    fn long_message_uses_pushdata() {
        let transfer = TokenTransfer {
            name: "TOKEN".to_string(),
            amount: TokenAmount(100),
            time_lock: 0,
            message: vec![0x12, 0x20]
                .into_iter()
                .chain(std::iter::repeat(0xaa).take(120))
                .collect(),
            expire_time: 500,
        };
        let script = transfer_script(&HASH, &transfer);
        assert_eq!(script[26], OP_PUSHDATA1);
        match decode_token_script(&script).unwrap().unwrap() {
            TokenScript::Transfer { transfer: decoded, .. } => assert_eq!(decoded, transfer),
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn malformed_sections_error() {
        // Marked as a token script but missing the marker bytes.
        let mut script = pay_to_pubkey_hash(&HASH);
        script.push(OP_TOKEN);
        push_data(&mut script, b"xyz!");
        script.push(OP_DROP);
        assert!(matches!(decode_token_script(&script), Err(ScriptError::BadMarker)));

        // Missing OP_DROP.
        let token = NewToken::new("TOKEN".to_string(), TokenAmount(1000), 0, false);
        let mut script = new_token_script(&HASH, &token);
        script.pop();
        assert!(decode_token_script(&script).is_err());

        // Truncated push.
        let script = vec![OP_TOKEN, OP_RESERVED, 30, 1, 2];
        assert!(matches!(decode_token_script(&script), Err(ScriptError::Truncated)));
    }

    quickcheck::quickcheck! {
        fn decode_fuzzed(script: Vec<u8>) -> bool {
            let _ = decode_token_script(&script);
            let _ = payment_token_kind(&script);
            let _ = contains_op_token(&script);
            true
        }
    }
}
