//! The token operation records carried inside output scripts, plus the
//! per-block undo record used to roll back reissues.

use crate::serial::{
    read_var_bytes, read_var_string, write_var_bytes, write_var_string, Deserial, DeserialResult,
    Serial,
};
use crate::types::amount::TokenAmount;
use std::io::{Read, Write};

/// Sentinel byte marking an undo record that carries the trailing verifier
/// fields. Older records end before it and still decode.
pub const TOKEN_UNDO_INCLUDES_VERIFIER_STRING: i8 = -1;

/// Royalty routing attached to a token at issuance.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Royalty {
    pub address: String,
    pub amount: TokenAmount,
}

/// A token issuance record.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct NewToken {
    pub name: String,
    pub amount: TokenAmount,
    /// Number of decimal places exposed, 0 to 8.
    pub units: i8,
    pub reissuable: bool,
    pub royalty: Option<Royalty>,
    /// Raw content hash bytes. Size and shape are contextual checks, not
    /// decode checks.
    pub content_hash: Option<Vec<u8>>,
}

impl NewToken {
    pub fn new(name: impl Into<String>, amount: TokenAmount, units: i8, reissuable: bool) -> Self {
        Self {
            name: name.into(),
            amount,
            units,
            reissuable,
            royalty: None,
            content_hash: None,
        }
    }
}

impl Serial for NewToken {
    fn serial<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write_var_string(out, &self.name)?;
        self.amount.serial(out)?;
        self.units.serial(out)?;
        self.reissuable.serial(out)?;
        match &self.royalty {
            Some(royalty) => {
                true.serial(out)?;
                write_var_string(out, &royalty.address)?;
                royalty.amount.serial(out)?;
            }
            None => false.serial(out)?,
        }
        match &self.content_hash {
            Some(hash) => {
                true.serial(out)?;
                write_var_bytes(out, hash)?;
            }
            None => false.serial(out)?,
        }
        Ok(())
    }
}

impl Deserial for NewToken {
    fn deserial<R: Read>(source: &mut R) -> DeserialResult<Self> {
        let name = read_var_string(source)?;
        let amount = TokenAmount::deserial(source)?;
        let units = i8::deserial(source)?;
        let reissuable = bool::deserial(source)?;
        let royalty = if bool::deserial(source)? {
            Some(Royalty {
                address: read_var_string(source)?,
                amount: TokenAmount::deserial(source)?,
            })
        } else {
            None
        };
        let content_hash = if bool::deserial(source)? {
            Some(read_var_bytes(source)?)
        } else {
            None
        };
        Ok(Self {
            name,
            amount,
            units,
            reissuable,
            royalty,
            content_hash,
        })
    }
}

/// A token transfer record. The expiry is only on the wire when a message
/// hash is attached.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct TokenTransfer {
    pub name: String,
    pub amount: TokenAmount,
    /// Lock height or timestamp before which the output may not be spent.
    /// Zero means unlocked.
    pub time_lock: u32,
    /// Raw message hash bytes; empty when no message is attached.
    pub message: Vec<u8>,
    pub expire_time: i64,
}

impl TokenTransfer {
    pub fn new(name: impl Into<String>, amount: TokenAmount) -> Self {
        Self {
            name: name.into(),
            amount,
            ..Default::default()
        }
    }
}

impl Serial for TokenTransfer {
    fn serial<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write_var_string(out, &self.name)?;
        self.amount.serial(out)?;
        self.time_lock.serial(out)?;
        write_var_bytes(out, &self.message)?;
        if !self.message.is_empty() {
            self.expire_time.serial(out)?;
        }
        Ok(())
    }
}

impl Deserial for TokenTransfer {
    fn deserial<R: Read>(source: &mut R) -> DeserialResult<Self> {
        let name = read_var_string(source)?;
        let amount = TokenAmount::deserial(source)?;
        let time_lock = u32::deserial(source)?;
        let message = read_var_bytes(source)?;
        let expire_time = if message.is_empty() {
            0
        } else {
            i64::deserial(source)?
        };
        Ok(Self {
            name,
            amount,
            time_lock,
            message,
            expire_time,
        })
    }
}

/// A token reissue record. Royalty fields are always on the wire; an empty
/// content hash means "unchanged".
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ReissueToken {
    pub name: String,
    /// Supply delta, zero or more.
    pub amount: TokenAmount,
    /// New unit selection; `-1` leaves the previous selection unchanged.
    pub units: i8,
    pub reissuable: bool,
    pub royalty_address: String,
    pub royalty_amount: TokenAmount,
    /// New raw content hash; empty leaves the previous hash unchanged.
    pub content_hash: Vec<u8>,
}

impl ReissueToken {
    pub fn new(name: impl Into<String>, amount: TokenAmount, units: i8, reissuable: bool) -> Self {
        Self {
            name: name.into(),
            amount,
            units,
            reissuable,
            ..Default::default()
        }
    }
}

impl Serial for ReissueToken {
    fn serial<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write_var_string(out, &self.name)?;
        self.amount.serial(out)?;
        self.units.serial(out)?;
        self.reissuable.serial(out)?;
        write_var_string(out, &self.royalty_address)?;
        self.royalty_amount.serial(out)?;
        write_var_bytes(out, &self.content_hash)
    }
}

impl Deserial for ReissueToken {
    fn deserial<R: Read>(source: &mut R) -> DeserialResult<Self> {
        Ok(Self {
            name: read_var_string(source)?,
            amount: TokenAmount::deserial(source)?,
            units: i8::deserial(source)?,
            reissuable: bool::deserial(source)?,
            royalty_address: read_var_string(source)?,
            royalty_amount: TokenAmount::deserial(source)?,
            content_hash: read_var_bytes(source)?,
        })
    }
}

/// A qualifier/restriction toggle for one token on one address, or a global
/// toggle when carried by the address-less script form.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct NullTokenData {
    pub token_name: String,
    /// 1 assigns/freezes, 0 removes/unfreezes. Any other value is a
    /// consensus violation, not a decode failure.
    pub flag: u8,
}

impl Serial for NullTokenData {
    fn serial<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write_var_string(out, &self.token_name)?;
        self.flag.serial(out)
    }
}

impl Deserial for NullTokenData {
    fn deserial<R: Read>(source: &mut R) -> DeserialResult<Self> {
        Ok(Self {
            token_name: read_var_string(source)?,
            flag: u8::deserial(source)?,
        })
    }
}

/// The boolean verifier expression attached to a restricted token.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct VerifierStringData {
    pub verifier_string: String,
}

impl VerifierStringData {
    pub fn new(verifier_string: impl Into<String>) -> Self {
        Self {
            verifier_string: verifier_string.into(),
        }
    }
}

impl Serial for VerifierStringData {
    fn serial<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write_var_string(out, &self.verifier_string)
    }
}

impl Deserial for VerifierStringData {
    fn deserial<R: Read>(source: &mut R) -> DeserialResult<Self> {
        Ok(Self {
            verifier_string: read_var_string(source)?,
        })
    }
}

/// Per-token undo data captured while connecting a block, replayed on
/// disconnect to restore the exact pre-reissue metadata.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct BlockTokenUndo {
    pub changed_content_hash: bool,
    pub changed_units: bool,
    /// Prior content hash; empty restores "no hash".
    pub content_hash: Vec<u8>,
    pub units: i32,
    pub changed_verifier: bool,
    pub verifier: String,
}

impl Serial for BlockTokenUndo {
    fn serial<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        self.changed_units.serial(out)?;
        self.changed_content_hash.serial(out)?;
        write_var_bytes(out, &self.content_hash)?;
        self.units.serial(out)?;
        TOKEN_UNDO_INCLUDES_VERIFIER_STRING.serial(out)?;
        self.changed_verifier.serial(out)?;
        write_var_string(out, &self.verifier)
    }
}

impl Deserial for BlockTokenUndo {
    fn deserial<R: Read>(source: &mut R) -> DeserialResult<Self> {
        let changed_units = bool::deserial(source)?;
        let changed_content_hash = bool::deserial(source)?;
        let content_hash = read_var_bytes(source)?;
        let units = i32::deserial(source)?;
        let mut changed_verifier = false;
        let mut verifier = String::new();
        // Records written before verifier tracking end here.
        let mut probe = [0u8; 1];
        if source.read(&mut probe)? == 1 && probe[0] as i8 == TOKEN_UNDO_INCLUDES_VERIFIER_STRING {
            changed_verifier = bool::deserial(source)?;
            verifier = read_var_string(source)?;
        }
        Ok(Self {
            changed_content_hash,
            changed_units,
            content_hash,
            units,
            changed_verifier,
            verifier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::amount::COIN;

    #[test]
    fn new_token_wire_layout() {
        let token = NewToken::new("TOKEN", TokenAmount(100 * COIN), 0, true);
        assert_eq!(
            hex::encode(token.serialize()),
            "05544f4b454e00e40b540200000000010000"
        );
        assert_eq!(NewToken::deserialize(&token.serialize()).unwrap(), token);
    }

    #[test]
    fn new_token_with_royalty_and_hash_round_trips() {
        let token = NewToken {
            name: "TOKEN/SUB".into(),
            amount: TokenAmount(42 * COIN),
            units: 2,
            reissuable: false,
            royalty: Some(Royalty {
                address: "mpCmwaZeFe6ZmbWYHM2Lsbp4tdwvMyfRLS".into(),
                amount: TokenAmount(COIN / 2),
            }),
            content_hash: Some(vec![0x12, 0x20, 0x01, 0x02]),
        };
        assert_eq!(NewToken::deserialize(&token.serialize()).unwrap(), token);
    }

    #[test]
    fn transfer_wire_layout_without_message() {
        let transfer = TokenTransfer::new("TOKEN", TokenAmount(COIN));
        assert_eq!(
            hex::encode(transfer.serialize()),
            "05544f4b454e00e1f505000000000000000000"
        );
        assert_eq!(
            TokenTransfer::deserialize(&transfer.serialize()).unwrap(),
            transfer
        );
    }

    #[test]
    fn transfer_with_message_carries_expiry() {
        let transfer = TokenTransfer {
            name: "TOKEN~chan".into(),
            amount: TokenAmount(COIN),
            time_lock: 0,
            message: vec![0xaa; 34],
            expire_time: 1_700_000_000,
        };
        let bytes = transfer.serialize();
        assert_eq!(TokenTransfer::deserialize(&bytes).unwrap(), transfer);

        // Without a message the expiry is not on the wire at all.
        let plain = TokenTransfer::new("TOKEN", TokenAmount(COIN));
        let with_expiry = TokenTransfer {
            expire_time: 99,
            ..plain.clone()
        };
        assert_eq!(plain.serialize().len(), with_expiry.serialize().len());
    }

    #[test]
    fn reissue_round_trips() {
        let reissue = ReissueToken {
            name: "TOKEN".into(),
            amount: TokenAmount(COIN),
            units: -1,
            reissuable: true,
            royalty_address: String::new(),
            royalty_amount: TokenAmount::ZERO,
            content_hash: vec![0x12, 0x20],
        };
        assert_eq!(
            ReissueToken::deserialize(&reissue.serialize()).unwrap(),
            reissue
        );
    }

    #[test]
    fn null_data_round_trips() {
        let data = NullTokenData {
            token_name: "#KYC".into(),
            flag: 1,
        };
        assert_eq!(hex::encode(data.serialize()), "04234b594301");
        assert_eq!(NullTokenData::deserialize(&data.serialize()).unwrap(), data);
        // Out-of-range flags decode fine; they are rejected contextually.
        assert_eq!(NullTokenData::deserialize(&[0x00, 0x07]).unwrap().flag, 7);
    }

    #[test]
    fn undo_record_round_trips() {
        let undo = BlockTokenUndo {
            changed_content_hash: true,
            changed_units: true,
            content_hash: vec![0x12, 0x20, 0xff],
            units: 4,
            changed_verifier: true,
            verifier: "KYC".into(),
        };
        assert_eq!(
            BlockTokenUndo::deserialize(&undo.serialize()).unwrap(),
            undo
        );
    }

    #[test]
    fn undo_record_without_verifier_fields_still_decodes() {
        // changed_units, changed_content_hash, empty hash, units = 4, then
        // nothing: the shape written before verifier tracking existed.
        let legacy = [0x01, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00];
        let undo = BlockTokenUndo::deserialize(&legacy).unwrap();
        assert!(undo.changed_units);
        assert!(!undo.changed_content_hash);
        assert_eq!(undo.units, 4);
        assert!(!undo.changed_verifier);
        assert!(undo.verifier.is_empty());
    }

    #[test]
    fn truncated_records_fail_cleanly() {
        let token = NewToken::new("TOKEN", TokenAmount(COIN), 0, true);
        let bytes = token.serialize();
        for cut in 1..bytes.len() {
            assert!(NewToken::deserialize(&bytes[..cut]).is_err());
        }
    }

    quickcheck::quickcheck! {
        fn deserial_fuzzed(bytes: Vec<u8>) -> bool {
            let _ = NewToken::deserialize(&bytes);
            let _ = TokenTransfer::deserialize(&bytes);
            let _ = ReissueToken::deserialize(&bytes);
            let _ = NullTokenData::deserialize(&bytes);
            let _ = VerifierStringData::deserialize(&bytes);
            let _ = BlockTokenUndo::deserialize(&bytes);
            true
        }
    }
}
