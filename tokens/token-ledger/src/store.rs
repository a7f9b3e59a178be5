//! The persistent store interface for token state, and an in-memory
//! implementation backing tests and light deployments.
//!
//! Each method covers one key space. Writers are granular rather than
//! batched: the ledger layer orders the writes and treats any failure as
//! fatal to the flush.

use std::collections::BTreeMap;
use token_types::{BlockTokenUndo, NewToken, TokenAmount};

pub type BlockHash = [u8; 32];

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[error("corrupted record for {0}")]
    Corrupt(String),
}

/// Token metadata as persisted: the issuance record plus where it landed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StoredToken {
    pub token: NewToken,
    pub height: i32,
    pub block_hash: BlockHash,
}

/// Persistent token state, keyed per concern.
pub trait TokenStore {
    fn read_token(&self, name: &str) -> StoreResult<Option<StoredToken>>;
    fn write_token(&mut self, name: &str, data: &StoredToken) -> StoreResult<()>;
    fn erase_token(&mut self, name: &str) -> StoreResult<()>;

    fn read_balance(&self, name: &str, address: &str) -> StoreResult<Option<TokenAmount>>;
    fn write_balance(&mut self, name: &str, address: &str, amount: TokenAmount)
        -> StoreResult<()>;
    fn erase_balance(&mut self, name: &str, address: &str) -> StoreResult<()>;
    /// All persisted balances of one token. Needed when the token itself is
    /// erased.
    fn balances_of(&self, name: &str) -> StoreResult<Vec<(String, TokenAmount)>>;

    fn read_verifier(&self, name: &str) -> StoreResult<Option<String>>;
    fn write_verifier(&mut self, name: &str, verifier: &str) -> StoreResult<()>;
    fn erase_verifier(&mut self, name: &str) -> StoreResult<()>;

    fn read_address_tag(&self, address: &str, qualifier: &str) -> StoreResult<bool>;
    fn write_address_tag(&mut self, address: &str, qualifier: &str) -> StoreResult<()>;
    fn erase_address_tag(&mut self, address: &str, qualifier: &str) -> StoreResult<()>;

    fn read_address_frozen(&self, address: &str, name: &str) -> StoreResult<bool>;
    fn write_address_frozen(&mut self, address: &str, name: &str) -> StoreResult<()>;
    fn erase_address_frozen(&mut self, address: &str, name: &str) -> StoreResult<()>;

    fn read_global_restriction(&self, name: &str) -> StoreResult<bool>;
    fn write_global_restriction(&mut self, name: &str) -> StoreResult<()>;
    fn erase_global_restriction(&mut self, name: &str) -> StoreResult<()>;

    fn read_block_undo(&self, block: &BlockHash) -> StoreResult<Vec<(String, BlockTokenUndo)>>;
    fn write_block_undo(
        &mut self,
        block: &BlockHash,
        undo: &[(String, BlockTokenUndo)],
    ) -> StoreResult<()>;

    /// Named boolean flags, e.g. whether the address index was built.
    fn read_flag(&self, name: &str) -> StoreResult<bool>;
    fn write_flag(&mut self, name: &str, value: bool) -> StoreResult<()>;
}

/// In-memory [`TokenStore`]. `fail_writes` makes every write fail, for
/// exercising flush failure handling.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: BTreeMap<String, StoredToken>,
    balances: BTreeMap<(String, String), TokenAmount>,
    verifiers: BTreeMap<String, String>,
    address_tags: BTreeMap<(String, String), ()>,
    address_frozen: BTreeMap<(String, String), ()>,
    global_restrictions: BTreeMap<String, ()>,
    block_undo: BTreeMap<BlockHash, Vec<(String, BlockTokenUndo)>>,
    flags: BTreeMap<String, bool>,
    pub fail_writes: bool,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes {
            Err(StoreError::Backend("write refused".to_string()))
        } else {
            Ok(())
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn read_token(&self, name: &str) -> StoreResult<Option<StoredToken>> {
        Ok(self.tokens.get(name).cloned())
    }

    fn write_token(&mut self, name: &str, data: &StoredToken) -> StoreResult<()> {
        self.check_writable()?;
        self.tokens.insert(name.to_string(), data.clone());
        Ok(())
    }

    fn erase_token(&mut self, name: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.tokens.remove(name);
        Ok(())
    }

    fn read_balance(&self, name: &str, address: &str) -> StoreResult<Option<TokenAmount>> {
        Ok(self.balances.get(&(name.to_string(), address.to_string())).copied())
    }

    fn write_balance(
        &mut self,
        name: &str,
        address: &str,
        amount: TokenAmount,
    ) -> StoreResult<()> {
        self.check_writable()?;
        self.balances.insert((name.to_string(), address.to_string()), amount);
        Ok(())
    }

    fn erase_balance(&mut self, name: &str, address: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.balances.remove(&(name.to_string(), address.to_string()));
        Ok(())
    }

    fn balances_of(&self, name: &str) -> StoreResult<Vec<(String, TokenAmount)>> {
        Ok(self
            .balances
            .range((name.to_string(), String::new())..)
            .take_while(|((token, _), _)| token == name)
            .map(|((_, address), amount)| (address.clone(), *amount))
            .collect())
    }

    fn read_verifier(&self, name: &str) -> StoreResult<Option<String>> {
        Ok(self.verifiers.get(name).cloned())
    }

    fn write_verifier(&mut self, name: &str, verifier: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.verifiers.insert(name.to_string(), verifier.to_string());
        Ok(())
    }

    fn erase_verifier(&mut self, name: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.verifiers.remove(name);
        Ok(())
    }

    fn read_address_tag(&self, address: &str, qualifier: &str) -> StoreResult<bool> {
        Ok(self.address_tags.contains_key(&(address.to_string(), qualifier.to_string())))
    }

    fn write_address_tag(&mut self, address: &str, qualifier: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.address_tags.insert((address.to_string(), qualifier.to_string()), ());
        Ok(())
    }

    fn erase_address_tag(&mut self, address: &str, qualifier: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.address_tags.remove(&(address.to_string(), qualifier.to_string()));
        Ok(())
    }

    fn read_address_frozen(&self, address: &str, name: &str) -> StoreResult<bool> {
        Ok(self.address_frozen.contains_key(&(address.to_string(), name.to_string())))
    }

    fn write_address_frozen(&mut self, address: &str, name: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.address_frozen.insert((address.to_string(), name.to_string()), ());
        Ok(())
    }

    fn erase_address_frozen(&mut self, address: &str, name: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.address_frozen.remove(&(address.to_string(), name.to_string()));
        Ok(())
    }

    fn read_global_restriction(&self, name: &str) -> StoreResult<bool> {
        Ok(self.global_restrictions.contains_key(name))
    }

    fn write_global_restriction(&mut self, name: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.global_restrictions.insert(name.to_string(), ());
        Ok(())
    }

    fn erase_global_restriction(&mut self, name: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.global_restrictions.remove(name);
        Ok(())
    }

    fn read_block_undo(&self, block: &BlockHash) -> StoreResult<Vec<(String, BlockTokenUndo)>> {
        Ok(self.block_undo.get(block).cloned().unwrap_or_default())
    }

    fn write_block_undo(
        &mut self,
        block: &BlockHash,
        undo: &[(String, BlockTokenUndo)],
    ) -> StoreResult<()> {
        self.check_writable()?;
        self.block_undo.insert(*block, undo.to_vec());
        Ok(())
    }

    fn read_flag(&self, name: &str) -> StoreResult<bool> {
        Ok(self.flags.get(name).copied().unwrap_or(false))
    }

    fn write_flag(&mut self, name: &str, value: bool) -> StoreResult<()> {
        self.check_writable()?;
        self.flags.insert(name.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balances_of_scans_one_token_only() {
        let mut store = MemoryTokenStore::new();
        store.write_balance("TOKEN", "addr1", TokenAmount(5)).unwrap();
        store.write_balance("TOKEN", "addr2", TokenAmount(7)).unwrap();
        store.write_balance("TOKEN2", "addr1", TokenAmount(9)).unwrap();
        let balances = store.balances_of("TOKEN").unwrap();
        assert_eq!(
            balances,
            vec![("addr1".to_string(), TokenAmount(5)), ("addr2".to_string(), TokenAmount(7))]
        );
    }

    #[test]
    fn fail_writes_refuses_all_writes() {
        let mut store = MemoryTokenStore::new();
        store.fail_writes = true;
        assert!(store.write_flag("tokenindex", true).is_err());
        assert!(store.write_verifier("$TOKEN", "true").is_err());
    }
}
