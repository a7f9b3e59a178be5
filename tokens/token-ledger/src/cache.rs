//! The layered token state cache.
//!
//! [`TokenLedger`] is the long-lived layer: pending deltas accumulated from
//! flushed blocks, read-through caches over the store, and the store itself.
//! [`TokenStateCache`] overlays it while one block (or one mempool view) is
//! being applied; its deltas either flush into the ledger or are dropped
//! wholesale on failure.
//!
//! Reads walk local removals, shared removals, local additions, shared
//! additions, then the read-through caches and the store. A removal hit
//! answers "gone" even when the store still has the record, which is what
//! makes disconnecting blocks safe before the next store write-out.

use log::{debug, error, warn};
use std::collections::{BTreeMap, BTreeSet};
use token_types::types::amount::OWNER_TOKEN_AMOUNT;
use token_types::types::names;
use token_types::{BlockTokenUndo, NewToken, ReissueToken, TokenAmount, TokenTransfer};

use crate::delta::DeltaLedger;
use crate::lru::LruCache;
use crate::store::{BlockHash, StoreError, StoredToken, TokenStore};
use crate::tx::OutPoint;

/// Entries kept in the token metadata read-through cache.
const TOKEN_CACHE_CAPACITY: usize = 65536;
/// Entries kept in the per-address balance read-through cache.
const BALANCE_CACHE_CAPACITY: usize = 65536;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("token {0} already exists")]
    AlreadyExists(String),
    #[error("token {0} does not exist")]
    DoesNotExist(String),
    #[error("balance of {name} at {address} cannot cover the change")]
    InsufficientBalance { name: String, address: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A pending token issuance.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TokenEntry {
    pub token: NewToken,
    pub address: String,
    pub height: i32,
    pub block_hash: BlockHash,
}

/// A pending transfer output.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransferEntry {
    pub transfer: TokenTransfer,
    pub address: String,
}

/// A pending reissue, kept for undo bookkeeping and chaining checks.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ReissueEntry {
    pub reissue: ReissueToken,
    pub address: String,
    pub outpoint: OutPoint,
}

/// A pending verifier change. On the removal side, `undoing_reissue` marks
/// a rollback that restores `verifier` instead of deleting the record.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VerifierChange {
    pub verifier: String,
    pub undoing_reissue: bool,
}

/// All dirty state for one layer.
#[derive(Default)]
struct TokenDeltas {
    tokens: DeltaLedger<String, TokenEntry>,
    transfers: DeltaLedger<OutPoint, TransferEntry>,
    reissues: DeltaLedger<String, ReissueEntry>,
    /// Keyed (address, qualifier name).
    tags: DeltaLedger<(String, String), ()>,
    /// Keyed (address, restricted name).
    freezes: DeltaLedger<(String, String), ()>,
    globals: DeltaLedger<String, ()>,
    verifiers: DeltaLedger<String, VerifierChange>,
    /// Absolute balances after the pending changes, keyed (name, address).
    balances: BTreeMap<(String, String), TokenAmount>,
    /// Sub-qualifier tags grouped under their root, keyed
    /// (root qualifier, address).
    root_tags_add: BTreeMap<(String, String), BTreeSet<String>>,
    root_tags_remove: BTreeMap<(String, String), BTreeSet<String>>,
}

impl TokenDeltas {
    fn record_root_tag_add(&mut self, root: &str, address: &str, sub: &str) {
        let key = (root.to_string(), address.to_string());
        if let Some(removed) = self.root_tags_remove.get_mut(&key) {
            removed.remove(sub);
            if removed.is_empty() {
                self.root_tags_remove.remove(&key);
            }
        }
        self.root_tags_add.entry(key).or_default().insert(sub.to_string());
    }

    fn record_root_tag_remove(&mut self, root: &str, address: &str, sub: &str) {
        let key = (root.to_string(), address.to_string());
        if let Some(added) = self.root_tags_add.get_mut(&key) {
            added.remove(sub);
            if added.is_empty() {
                self.root_tags_add.remove(&key);
            }
        }
        self.root_tags_remove.entry(key).or_default().insert(sub.to_string());
    }

    /// Whether any sub-qualifier under `root` currently tags `address` in
    /// this layer. `Some(false)` means every pending mention is a removal.
    fn root_tag_state(&self, root: &str, address: &str) -> Option<bool> {
        let key = (root.to_string(), address.to_string());
        if self.root_tags_add.get(&key).is_some_and(|subs| !subs.is_empty()) {
            return Some(true);
        }
        if self.root_tags_remove.get(&key).is_some_and(|subs| !subs.is_empty()) {
            return Some(false);
        }
        None
    }

    fn merge_into(&mut self, target: &mut TokenDeltas) {
        self.tokens.merge_into(&mut target.tokens);
        self.transfers.merge_into(&mut target.transfers);
        self.reissues.merge_into(&mut target.reissues);
        self.tags.merge_into(&mut target.tags);
        self.freezes.merge_into(&mut target.freezes);
        self.globals.merge_into(&mut target.globals);
        self.verifiers.merge_into(&mut target.verifiers);
        target.balances.append(&mut self.balances);
        for ((root, address), subs) in std::mem::take(&mut self.root_tags_remove) {
            for sub in subs {
                target.record_root_tag_remove(&root, &address, &sub);
            }
        }
        for ((root, address), subs) in std::mem::take(&mut self.root_tags_add) {
            for sub in subs {
                target.record_root_tag_add(&root, &address, &sub);
            }
        }
    }

    fn clear(&mut self) {
        self.tokens.clear();
        self.transfers.clear();
        self.reissues.clear();
        self.tags.clear();
        self.freezes.clear();
        self.globals.clear();
        self.verifiers.clear();
        self.balances.clear();
        self.root_tags_add.clear();
        self.root_tags_remove.clear();
    }
}

/// The shared token state layer over a store.
pub struct TokenLedger<S> {
    store: S,
    deltas: TokenDeltas,
    token_cache: LruCache<String, Option<StoredToken>>,
    balance_cache: LruCache<(String, String), TokenAmount>,
    /// Tokens with an unflushed reissue, mapped to the txid that reissued
    /// them. Used to refuse a second reissue of the same token before the
    /// first settles.
    reissued: BTreeMap<String, BlockHash>,
}

impl<S: TokenStore> TokenLedger<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            deltas: TokenDeltas::default(),
            token_cache: LruCache::new(TOKEN_CACHE_CAPACITY),
            balance_cache: LruCache::new(BALANCE_CACHE_CAPACITY),
            reissued: BTreeMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn pending_reissue_txid(&self, name: &str) -> Option<&BlockHash> {
        self.reissued.get(name)
    }

    /// Read token metadata through the LRU cache and the store, without
    /// consulting pending deltas.
    fn lookup_token(&mut self, name: &str) -> CacheResult<Option<StoredToken>> {
        if let Some(cached) = self.token_cache.get(&name.to_string()) {
            return Ok(cached.clone());
        }
        let stored = self.store.read_token(name)?;
        self.token_cache.put(name.to_string(), stored.clone());
        Ok(stored)
    }

    fn lookup_balance(&mut self, name: &str, address: &str) -> CacheResult<TokenAmount> {
        let key = (name.to_string(), address.to_string());
        if let Some(amount) = self.balance_cache.get(&key) {
            return Ok(*amount);
        }
        let amount = self.store.read_balance(name, address)?.unwrap_or(TokenAmount::ZERO);
        self.balance_cache.put(key, amount);
        Ok(amount)
    }

    /// Write every pending delta out to the store. Removals of a kind go
    /// before additions of the same kind so that a reorg that removed and
    /// re-added a key settles on the addition. Any store failure aborts the
    /// dump and leaves the deltas in place: the caller must treat this as
    /// unrecoverable for the store.
    pub fn dump_to_store(&mut self) -> CacheResult<()> {
        let result = self.dump_inner();
        if let Err(ref err) = result {
            error!("token state write-out failed, store is stale: {err}");
        }
        result
    }

    fn dump_inner(&mut self) -> CacheResult<()> {
        let removed_tokens: BTreeSet<String> =
            self.deltas.tokens.removes().map(|(name, _)| name.clone()).collect();

        for (name, _) in self.deltas.tokens.removes() {
            self.store.erase_token(name)?;
            self.store.erase_verifier(name)?;
            for (address, _) in self.store.balances_of(name)? {
                self.store.erase_balance(name, &address)?;
                self.balance_cache.erase(&(name.clone(), address));
            }
            self.token_cache.erase(name);
        }
        for (name, entry) in self.deltas.tokens.adds() {
            let stored = StoredToken {
                token: entry.token.clone(),
                height: entry.height,
                block_hash: entry.block_hash,
            };
            self.store.write_token(name, &stored)?;
            self.token_cache.put(name.clone(), Some(stored));
        }

        for (name, change) in self.deltas.verifiers.removes() {
            if change.undoing_reissue {
                // Rolling back a reissue restores the prior verifier,
                // unless the token itself is gone.
                if !removed_tokens.contains(name) {
                    self.store.write_verifier(name, &change.verifier)?;
                }
            } else {
                self.store.erase_verifier(name)?;
            }
        }
        for (name, change) in self.deltas.verifiers.adds() {
            self.store.write_verifier(name, &change.verifier)?;
        }

        for ((address, qualifier), _) in self.deltas.tags.removes() {
            self.store.erase_address_tag(address, qualifier)?;
        }
        for ((address, qualifier), _) in self.deltas.tags.adds() {
            self.store.write_address_tag(address, qualifier)?;
        }

        for ((address, name), _) in self.deltas.freezes.removes() {
            self.store.erase_address_frozen(address, name)?;
        }
        for ((address, name), _) in self.deltas.freezes.adds() {
            self.store.write_address_frozen(address, name)?;
        }

        for (name, _) in self.deltas.globals.removes() {
            self.store.erase_global_restriction(name)?;
        }
        for (name, _) in self.deltas.globals.adds() {
            self.store.write_global_restriction(name)?;
        }

        for ((name, address), amount) in &self.deltas.balances {
            if removed_tokens.contains(name) {
                continue;
            }
            if amount.is_positive() {
                self.store.write_balance(name, address, *amount)?;
                self.balance_cache.put((name.clone(), address.clone()), *amount);
            } else {
                self.store.erase_balance(name, address)?;
                self.balance_cache.erase(&(name.clone(), address.clone()));
            }
        }

        debug!(
            "token state write-out: {} token changes, {} balance changes",
            self.deltas.tokens.len(),
            self.deltas.balances.len()
        );
        self.deltas.clear();
        self.reissued.clear();
        Ok(())
    }

    pub fn write_block_undo(
        &mut self,
        block: &BlockHash,
        undo: &[(String, BlockTokenUndo)],
    ) -> CacheResult<()> {
        self.store.write_block_undo(block, undo)?;
        Ok(())
    }

    pub fn read_block_undo(
        &mut self,
        block: &BlockHash,
    ) -> CacheResult<Vec<(String, BlockTokenUndo)>> {
        Ok(self.store.read_block_undo(block)?)
    }
}

/// A block-local overlay on the shared [`TokenLedger`].
pub struct TokenStateCache<'a, S> {
    ledger: &'a mut TokenLedger<S>,
    deltas: TokenDeltas,
    undo: Vec<(String, BlockTokenUndo)>,
}

impl<'a, S: TokenStore> TokenStateCache<'a, S> {
    pub fn new(ledger: &'a mut TokenLedger<S>) -> Self {
        Self { ledger, deltas: TokenDeltas::default(), undo: Vec::new() }
    }

    // ------------------------------------------------------------------
    // Queries.

    /// Whether a token of this name exists. `skip_local` ignores this
    /// overlay's own changes and answers from the flushed state, which is
    /// what restricted transfer checks require.
    pub fn token_exists(&mut self, name: &str, skip_local: bool) -> CacheResult<bool> {
        if !skip_local {
            if self.deltas.tokens.pending_remove(&name.to_string()).is_some() {
                return Ok(false);
            }
            if self.deltas.tokens.pending_add(&name.to_string()).is_some() {
                return Ok(true);
            }
        }
        if self.ledger.deltas.tokens.pending_remove(&name.to_string()).is_some() {
            return Ok(false);
        }
        if self.ledger.deltas.tokens.pending_add(&name.to_string()).is_some() {
            return Ok(true);
        }
        Ok(self.ledger.lookup_token(name)?.is_some())
    }

    /// Current metadata of a token, pending changes included.
    pub fn token_metadata(&mut self, name: &str) -> CacheResult<Option<StoredToken>> {
        if self.deltas.tokens.pending_remove(&name.to_string()).is_some() {
            return Ok(None);
        }
        if let Some(entry) = self.deltas.tokens.pending_add(&name.to_string()) {
            return Ok(Some(StoredToken {
                token: entry.token.clone(),
                height: entry.height,
                block_hash: entry.block_hash,
            }));
        }
        if self.ledger.deltas.tokens.pending_remove(&name.to_string()).is_some() {
            return Ok(None);
        }
        if let Some(entry) = self.ledger.deltas.tokens.pending_add(&name.to_string()) {
            return Ok(Some(StoredToken {
                token: entry.token.clone(),
                height: entry.height,
                block_hash: entry.block_hash,
            }));
        }
        self.ledger.lookup_token(name)
    }

    /// Balance of `name` held at `address`, pending changes included.
    pub fn balance_of(&mut self, name: &str, address: &str) -> CacheResult<TokenAmount> {
        let key = (name.to_string(), address.to_string());
        if let Some(amount) = self.deltas.balances.get(&key) {
            return Ok(*amount);
        }
        if let Some(amount) = self.ledger.deltas.balances.get(&key) {
            return Ok(*amount);
        }
        self.ledger.lookup_balance(name, address)
    }

    /// The verifier string of a restricted token, or `None` when the token
    /// has none.
    pub fn verifier_of(&mut self, name: &str, skip_local: bool) -> CacheResult<Option<String>> {
        if !skip_local {
            if let Some(change) = self.deltas.verifiers.pending_remove(&name.to_string()) {
                return Ok(change.undoing_reissue.then(|| change.verifier.clone()));
            }
        }
        if let Some(change) = self.ledger.deltas.verifiers.pending_remove(&name.to_string()) {
            return Ok(change.undoing_reissue.then(|| change.verifier.clone()));
        }
        if !skip_local {
            if let Some(change) = self.deltas.verifiers.pending_add(&name.to_string()) {
                return Ok(Some(change.verifier.clone()));
            }
        }
        if let Some(change) = self.ledger.deltas.verifiers.pending_add(&name.to_string()) {
            return Ok(Some(change.verifier.clone()));
        }
        Ok(self.ledger.store.read_verifier(name)?)
    }

    /// Whether `address` carries the qualifier tag `qualifier`. A root
    /// qualifier is also satisfied by any of its sub-qualifiers.
    pub fn address_tagged(
        &mut self,
        address: &str,
        qualifier: &str,
        skip_local: bool,
    ) -> CacheResult<bool> {
        let key = (address.to_string(), qualifier.to_string());
        if !skip_local {
            if self.deltas.tags.pending_remove(&key).is_some() {
                return self.root_tag_fallback(address, qualifier, skip_local);
            }
            if self.deltas.tags.pending_add(&key).is_some() {
                return Ok(true);
            }
        }
        if self.ledger.deltas.tags.pending_remove(&key).is_some() {
            return self.root_tag_fallback(address, qualifier, skip_local);
        }
        if self.ledger.deltas.tags.pending_add(&key).is_some() {
            return Ok(true);
        }
        if let Some(state) = self.pending_root_tag_state(address, qualifier, skip_local) {
            return Ok(state);
        }
        if self.ledger.store.read_address_tag(address, qualifier)? {
            return Ok(true);
        }
        self.stored_sub_tag(address, qualifier)
    }

    fn pending_root_tag_state(
        &self,
        address: &str,
        qualifier: &str,
        skip_local: bool,
    ) -> Option<bool> {
        if !skip_local {
            if let Some(state) = self.deltas.root_tag_state(qualifier, address) {
                return Some(state);
            }
        }
        self.ledger.deltas.root_tag_state(qualifier, address)
    }

    fn root_tag_fallback(
        &mut self,
        address: &str,
        qualifier: &str,
        skip_local: bool,
    ) -> CacheResult<bool> {
        // A direct tag removal may still leave a sub-qualifier tag in place.
        if let Some(state) = self.pending_root_tag_state(address, qualifier, skip_local) {
            return Ok(state);
        }
        self.stored_sub_tag(address, qualifier)
    }

    fn stored_sub_tag(&mut self, _address: &str, _qualifier: &str) -> CacheResult<bool> {
        // Sub-qualifier tags are stored under their own full names; the
        // grouped view only exists in the delta layers.
        Ok(false)
    }

    pub fn address_frozen(
        &mut self,
        address: &str,
        name: &str,
        skip_local: bool,
    ) -> CacheResult<bool> {
        let key = (address.to_string(), name.to_string());
        if !skip_local {
            if self.deltas.freezes.pending_remove(&key).is_some() {
                return Ok(false);
            }
            if self.deltas.freezes.pending_add(&key).is_some() {
                return Ok(true);
            }
        }
        if self.ledger.deltas.freezes.pending_remove(&key).is_some() {
            return Ok(false);
        }
        if self.ledger.deltas.freezes.pending_add(&key).is_some() {
            return Ok(true);
        }
        Ok(self.ledger.store.read_address_frozen(address, name)?)
    }

    /// The txid of an unflushed reissue of `name`, if any. Consensus allows
    /// at most one pending reissue per token.
    pub fn pending_reissue_txid(&self, name: &str) -> Option<BlockHash> {
        self.ledger.reissued.get(name).copied()
    }

    pub fn globally_frozen(&mut self, name: &str, skip_local: bool) -> CacheResult<bool> {
        if !skip_local {
            if self.deltas.globals.pending_remove(&name.to_string()).is_some() {
                return Ok(false);
            }
            if self.deltas.globals.pending_add(&name.to_string()).is_some() {
                return Ok(true);
            }
        }
        if self.ledger.deltas.globals.pending_remove(&name.to_string()).is_some() {
            return Ok(false);
        }
        if self.ledger.deltas.globals.pending_add(&name.to_string()).is_some() {
            return Ok(true);
        }
        Ok(self.ledger.store.read_global_restriction(name)?)
    }

    // ------------------------------------------------------------------
    // Connect-side mutations.

    pub fn add_new_token(
        &mut self,
        token: NewToken,
        address: &str,
        height: i32,
        block_hash: BlockHash,
    ) -> CacheResult<()> {
        if self.token_exists(&token.name, false)? {
            return Err(CacheError::AlreadyExists(token.name));
        }
        let name = token.name.clone();
        let amount = token.amount;
        self.deltas.tokens.record_add(
            name.clone(),
            TokenEntry { token, address: address.to_string(), height, block_hash },
        );
        self.set_balance(&name, address, amount);
        Ok(())
    }

    /// Undo an issuance: the token and the issued balance disappear.
    pub fn remove_new_token(&mut self, token: NewToken, address: &str) -> CacheResult<()> {
        let name = token.name.clone();
        self.deltas.tokens.record_remove(
            name.clone(),
            TokenEntry { token, address: address.to_string(), height: 0, block_hash: [0; 32] },
        );
        self.set_balance(&name, address, TokenAmount::ZERO);
        Ok(())
    }

    /// Record the owner token minted alongside an issuance. Owner tokens
    /// always carry exactly [`OWNER_TOKEN_AMOUNT`] and are not reissuable.
    ///
    /// [`OWNER_TOKEN_AMOUNT`]: token_types::types::amount::OWNER_TOKEN_AMOUNT
    pub fn add_owner_token(
        &mut self,
        name: &str,
        address: &str,
        height: i32,
        block_hash: BlockHash,
    ) -> CacheResult<()> {
        let token = NewToken::new(name, OWNER_TOKEN_AMOUNT, 0, false);
        self.add_new_token(token, address, height, block_hash)
    }

    /// Undo an owner token issuance.
    pub fn remove_owner_token(&mut self, name: &str, address: &str) -> CacheResult<()> {
        let token = NewToken::new(name, OWNER_TOKEN_AMOUNT, 0, false);
        self.remove_new_token(token, address)
    }

    pub fn add_transfer(
        &mut self,
        transfer: TokenTransfer,
        address: &str,
        outpoint: OutPoint,
    ) -> CacheResult<()> {
        let balance = self.balance_of(&transfer.name, address)?;
        let updated = balance
            .checked_add(transfer.amount)
            .ok_or_else(|| CacheError::InsufficientBalance {
                name: transfer.name.clone(),
                address: address.to_string(),
            })?;
        self.set_balance(&transfer.name.clone(), address, updated);
        self.deltas
            .transfers
            .record_add(outpoint, TransferEntry { transfer, address: address.to_string() });
        Ok(())
    }

    /// Undo a transfer output. Unlike spending, undo paths never clamp: a
    /// shortfall here means the caches disagree with the chain.
    pub fn remove_transfer(
        &mut self,
        transfer: TokenTransfer,
        address: &str,
        outpoint: OutPoint,
    ) -> CacheResult<()> {
        let balance = self.balance_of(&transfer.name, address)?;
        let updated = balance.checked_sub(transfer.amount).filter(|a| !a.is_negative()).ok_or_else(
            || CacheError::InsufficientBalance {
                name: transfer.name.clone(),
                address: address.to_string(),
            },
        )?;
        self.set_balance(&transfer.name.clone(), address, updated);
        self.deltas
            .transfers
            .record_remove(outpoint, TransferEntry { transfer, address: address.to_string() });
        Ok(())
    }

    /// Spend a token-carrying input. A balance shortfall is clamped to zero
    /// rather than failing: the coin being spent is authoritative, the
    /// balance index is derived.
    pub fn spend_token_coin(
        &mut self,
        name: &str,
        address: &str,
        amount: TokenAmount,
    ) -> CacheResult<()> {
        let balance = self.balance_of(name, address)?;
        let updated = match balance.checked_sub(amount) {
            Some(value) if !value.is_negative() => value,
            _ => {
                warn!("spend of {amount} {name} at {address} exceeds tracked balance {balance}");
                TokenAmount::ZERO
            }
        };
        self.set_balance(name, address, updated);
        Ok(())
    }

    /// Undo a spend: restore the input's amount to its address.
    pub fn undo_token_coin(
        &mut self,
        name: &str,
        address: &str,
        amount: TokenAmount,
    ) -> CacheResult<()> {
        let balance = self.balance_of(name, address)?;
        let updated = balance.checked_add(amount).ok_or_else(|| {
            CacheError::InsufficientBalance { name: name.to_string(), address: address.to_string() }
        })?;
        self.set_balance(name, address, updated);
        Ok(())
    }

    /// Apply a reissue: supply grows, metadata fields change as requested,
    /// and an undo record capturing the prior values is retained.
    pub fn add_reissue(
        &mut self,
        reissue: ReissueToken,
        address: &str,
        outpoint: OutPoint,
    ) -> CacheResult<()> {
        let stored = self
            .token_metadata(&reissue.name)?
            .ok_or_else(|| CacheError::DoesNotExist(reissue.name.clone()))?;
        let mut token = stored.token.clone();

        let mut undo = BlockTokenUndo {
            units: token.units as i32,
            ..BlockTokenUndo::default()
        };
        if reissue.units >= 0 && reissue.units != token.units {
            undo.changed_units = true;
            token.units = reissue.units;
        }
        if !reissue.content_hash.is_empty() {
            undo.changed_content_hash = true;
            undo.content_hash = token.content_hash.clone().unwrap_or_default();
            token.content_hash = Some(reissue.content_hash.clone());
        }
        token.amount = token
            .amount
            .checked_add(reissue.amount)
            .ok_or_else(|| CacheError::DoesNotExist(reissue.name.clone()))?;
        token.reissuable = reissue.reissuable;
        if !reissue.royalty_address.is_empty() || reissue.royalty_amount.is_positive() {
            token.royalty = Some(token_types::types::records::Royalty {
                address: reissue.royalty_address.clone(),
                amount: reissue.royalty_amount,
            });
        }

        let name = reissue.name.clone();
        let amount = reissue.amount;
        self.deltas.tokens.record_add(
            name.clone(),
            TokenEntry {
                token,
                address: address.to_string(),
                height: stored.height,
                block_hash: stored.block_hash,
            },
        );
        self.deltas.reissues.record_add(
            name.clone(),
            ReissueEntry { reissue, address: address.to_string(), outpoint },
        );
        // The cached metadata is stale the moment the reissue lands.
        self.ledger.token_cache.erase(&name);
        self.ledger.reissued.insert(name.clone(), outpoint.txid);
        let balance = self.balance_of(&name, address)?;
        let updated = balance.checked_add(amount).ok_or_else(|| {
            CacheError::InsufficientBalance { name: name.clone(), address: address.to_string() }
        })?;
        self.set_balance(&name, address, updated);
        self.undo.push((name, undo));
        Ok(())
    }

    /// Roll a reissue back using its undo record.
    pub fn remove_reissue(
        &mut self,
        reissue: ReissueToken,
        address: &str,
        outpoint: OutPoint,
        undo: &BlockTokenUndo,
    ) -> CacheResult<()> {
        let stored = self
            .token_metadata(&reissue.name)?
            .ok_or_else(|| CacheError::DoesNotExist(reissue.name.clone()))?;
        let mut token = stored.token.clone();

        token.amount = token
            .amount
            .checked_sub(reissue.amount)
            .filter(|a| !a.is_negative())
            .ok_or_else(|| CacheError::InsufficientBalance {
                name: reissue.name.clone(),
                address: address.to_string(),
            })?;
        token.reissuable = true;
        if undo.changed_units {
            token.units = undo.units as i8;
        }
        if undo.changed_content_hash {
            token.content_hash =
                (!undo.content_hash.is_empty()).then(|| undo.content_hash.clone());
        }
        if undo.changed_verifier {
            self.deltas.verifiers.record_remove(
                reissue.name.clone(),
                VerifierChange { verifier: undo.verifier.clone(), undoing_reissue: true },
            );
        }

        let name = reissue.name.clone();
        let amount = reissue.amount;
        self.deltas.tokens.record_add(
            name.clone(),
            TokenEntry {
                token,
                address: address.to_string(),
                height: stored.height,
                block_hash: stored.block_hash,
            },
        );
        self.deltas.reissues.record_remove(
            name.clone(),
            ReissueEntry { reissue, address: address.to_string(), outpoint },
        );
        self.ledger.token_cache.erase(&name);
        self.ledger.reissued.remove(&name);
        let balance = self.balance_of(&name, address)?;
        let updated = balance.checked_sub(amount).filter(|a| !a.is_negative()).ok_or_else(
            || CacheError::InsufficientBalance { name: name.clone(), address: address.to_string() },
        )?;
        self.set_balance(&name, address, updated);
        Ok(())
    }

    pub fn add_qualifier_tag(&mut self, address: &str, qualifier: &str) -> CacheResult<()> {
        self.deltas.tags.record_add((address.to_string(), qualifier.to_string()), ());
        if let Some(root) = names::parent_qualifier(qualifier) {
            self.deltas.record_root_tag_add(&root, address, qualifier);
        }
        Ok(())
    }

    pub fn remove_qualifier_tag(&mut self, address: &str, qualifier: &str) -> CacheResult<()> {
        self.deltas.tags.record_remove((address.to_string(), qualifier.to_string()), ());
        if let Some(root) = names::parent_qualifier(qualifier) {
            self.deltas.record_root_tag_remove(&root, address, qualifier);
        }
        Ok(())
    }

    pub fn freeze_address(&mut self, address: &str, name: &str) -> CacheResult<()> {
        self.deltas.freezes.record_add((address.to_string(), name.to_string()), ());
        Ok(())
    }

    pub fn unfreeze_address(&mut self, address: &str, name: &str) -> CacheResult<()> {
        self.deltas.freezes.record_remove((address.to_string(), name.to_string()), ());
        Ok(())
    }

    pub fn freeze_globally(&mut self, name: &str) -> CacheResult<()> {
        self.deltas.globals.record_add(name.to_string(), ());
        Ok(())
    }

    pub fn unfreeze_globally(&mut self, name: &str) -> CacheResult<()> {
        self.deltas.globals.record_remove(name.to_string(), ());
        Ok(())
    }

    pub fn add_verifier(&mut self, name: &str, verifier: &str) -> CacheResult<()> {
        self.deltas.verifiers.record_add(
            name.to_string(),
            VerifierChange { verifier: verifier.to_string(), undoing_reissue: false },
        );
        Ok(())
    }

    pub fn remove_verifier(
        &mut self,
        name: &str,
        verifier: &str,
        undoing_reissue: bool,
    ) -> CacheResult<()> {
        self.deltas.verifiers.record_remove(
            name.to_string(),
            VerifierChange { verifier: verifier.to_string(), undoing_reissue },
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle.

    fn set_balance(&mut self, name: &str, address: &str, amount: TokenAmount) {
        self.deltas.balances.insert((name.to_string(), address.to_string()), amount);
    }

    /// Undo records accumulated by the reissues applied through this
    /// overlay, in application order.
    pub fn take_undo(&mut self) -> Vec<(String, BlockTokenUndo)> {
        std::mem::take(&mut self.undo)
    }

    /// Merge this overlay's deltas into the shared ledger. The overlay is
    /// left empty and can be dropped.
    pub fn flush(mut self) {
        self.deltas.merge_into(&mut self.ledger.deltas);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTokenStore;
    use assert_matches::assert_matches;
    use token_types::types::amount::COIN;

    fn outpoint(n: u8) -> OutPoint {
        OutPoint::new([n; 32], 0)
    }

    fn issue(cache: &mut TokenStateCache<'_, MemoryTokenStore>, name: &str, amount: i64) {
        let token = NewToken::new(name, TokenAmount(amount), 0, true);
        cache.add_new_token(token, "issuer", 10, [1; 32]).unwrap();
    }

    #[test]
    fn issue_then_query() {
        let mut ledger = TokenLedger::new(MemoryTokenStore::new());
        let mut cache = TokenStateCache::new(&mut ledger);
        issue(&mut cache, "TOKEN", 100 * COIN);
        assert!(cache.token_exists("TOKEN", false).unwrap());
        assert!(!cache.token_exists("TOKEN", true).unwrap());
        assert_eq!(cache.balance_of("TOKEN", "issuer").unwrap(), TokenAmount(100 * COIN));
    }

    #[test]
    fn duplicate_issue_rejected() {
        let mut ledger = TokenLedger::new(MemoryTokenStore::new());
        let mut cache = TokenStateCache::new(&mut ledger);
        issue(&mut cache, "TOKEN", COIN);
        let again = NewToken::new("TOKEN", TokenAmount(COIN), 0, true);
        assert_matches!(
            cache.add_new_token(again, "other", 11, [2; 32]),
            Err(CacheError::AlreadyExists(_))
        );
    }

    #[test]
    fn owner_token_pins_amount() {
        let mut ledger = TokenLedger::new(MemoryTokenStore::new());
        let mut cache = TokenStateCache::new(&mut ledger);
        cache.add_owner_token("TOKEN!", "issuer", 10, [1; 32]).unwrap();
        assert_eq!(cache.balance_of("TOKEN!", "issuer").unwrap(), OWNER_TOKEN_AMOUNT);

        cache.remove_owner_token("TOKEN!", "issuer").unwrap();
        assert!(!cache.token_exists("TOKEN!", false).unwrap());
    }

    #[test]
    fn transfer_moves_balance_and_spend_clamps() {
        let mut ledger = TokenLedger::new(MemoryTokenStore::new());
        let mut cache = TokenStateCache::new(&mut ledger);
        issue(&mut cache, "TOKEN", 100 * COIN);
        cache.spend_token_coin("TOKEN", "issuer", TokenAmount(40 * COIN)).unwrap();
        cache
            .add_transfer(TokenTransfer::new("TOKEN", TokenAmount(40 * COIN)), "alice", outpoint(2))
            .unwrap();
        assert_eq!(cache.balance_of("TOKEN", "issuer").unwrap(), TokenAmount(60 * COIN));
        assert_eq!(cache.balance_of("TOKEN", "alice").unwrap(), TokenAmount(40 * COIN));

        // Spending more than tracked clamps to zero instead of failing.
        cache.spend_token_coin("TOKEN", "alice", TokenAmount(500 * COIN)).unwrap();
        assert_eq!(cache.balance_of("TOKEN", "alice").unwrap(), TokenAmount::ZERO);

        // The undo direction has no clamp.
        assert_matches!(
            cache.remove_transfer(
                TokenTransfer::new("TOKEN", TokenAmount(10 * COIN)),
                "alice",
                outpoint(2)
            ),
            Err(CacheError::InsufficientBalance { .. })
        );
    }

    #[test]
    fn reissue_and_undo_restore_metadata() {
        let mut ledger = TokenLedger::new(MemoryTokenStore::new());
        let mut cache = TokenStateCache::new(&mut ledger);
        issue(&mut cache, "TOKEN", 100 * COIN);

        let mut reissue = ReissueToken::new("TOKEN", TokenAmount(COIN), 4, true);
        reissue.content_hash = vec![0x12, 0x20, 0x42];
        cache.add_reissue(reissue.clone(), "issuer", outpoint(3)).unwrap();

        let meta = cache.token_metadata("TOKEN").unwrap().unwrap();
        assert_eq!(meta.token.amount, TokenAmount(101 * COIN));
        assert_eq!(meta.token.units, 4);
        assert_eq!(meta.token.content_hash.as_deref(), Some(&[0x12u8, 0x20, 0x42][..]));

        let undo = cache.take_undo();
        assert_eq!(undo.len(), 1);
        assert!(undo[0].1.changed_units);
        assert_eq!(undo[0].1.units, 0);

        cache.remove_reissue(reissue, "issuer", outpoint(3), &undo[0].1).unwrap();
        let meta = cache.token_metadata("TOKEN").unwrap().unwrap();
        assert_eq!(meta.token.amount, TokenAmount(100 * COIN));
        assert_eq!(meta.token.units, 0);
        assert_eq!(meta.token.content_hash, None);
        assert_eq!(cache.balance_of("TOKEN", "issuer").unwrap(), TokenAmount(100 * COIN));
    }

    #[test]
    fn verifier_remove_hit_hides_stored_value() {
        let mut store = MemoryTokenStore::new();
        store.write_verifier("$TOKEN", "KYC").unwrap();
        let mut ledger = TokenLedger::new(store);
        let mut cache = TokenStateCache::new(&mut ledger);
        assert_eq!(cache.verifier_of("$TOKEN", false).unwrap().as_deref(), Some("KYC"));

        cache.remove_verifier("$TOKEN", "KYC", false).unwrap();
        assert_eq!(cache.verifier_of("$TOKEN", false).unwrap(), None);
        // The flushed view still sees the stored value.
        assert_eq!(cache.verifier_of("$TOKEN", true).unwrap().as_deref(), Some("KYC"));

        // A reissue rollback restores the prior string instead of hiding it.
        cache.remove_verifier("$TOKEN", "OLD", true).unwrap();
        assert_eq!(cache.verifier_of("$TOKEN", false).unwrap().as_deref(), Some("OLD"));
    }

    #[test]
    fn sub_qualifier_satisfies_root_tag() {
        let mut ledger = TokenLedger::new(MemoryTokenStore::new());
        let mut cache = TokenStateCache::new(&mut ledger);
        cache.add_qualifier_tag("alice", "#KYC/#EU").unwrap();
        assert!(cache.address_tagged("alice", "#KYC/#EU", false).unwrap());
        assert!(cache.address_tagged("alice", "#KYC", false).unwrap());
        assert!(!cache.address_tagged("alice", "#AML", false).unwrap());

        cache.remove_qualifier_tag("alice", "#KYC/#EU").unwrap();
        assert!(!cache.address_tagged("alice", "#KYC", false).unwrap());
    }

    #[test]
    fn flush_then_dump_persists_state() {
        let mut ledger = TokenLedger::new(MemoryTokenStore::new());
        let mut cache = TokenStateCache::new(&mut ledger);
        issue(&mut cache, "TOKEN", 100 * COIN);
        cache.add_verifier("$TOKEN", "true").unwrap();
        cache.freeze_globally("$TOKEN").unwrap();
        cache.flush();

        ledger.dump_to_store().unwrap();
        let stored = ledger.store().read_token("TOKEN").unwrap().unwrap();
        assert_eq!(stored.token.amount, TokenAmount(100 * COIN));
        assert_eq!(stored.height, 10);
        assert_eq!(
            ledger.store().read_balance("TOKEN", "issuer").unwrap(),
            Some(TokenAmount(100 * COIN))
        );
        assert_eq!(ledger.store().read_verifier("$TOKEN").unwrap().as_deref(), Some("true"));
        assert!(ledger.store().read_global_restriction("$TOKEN").unwrap());
    }

    #[test]
    fn token_removal_erases_balances_and_verifier_at_dump() {
        let mut ledger = TokenLedger::new(MemoryTokenStore::new());
        {
            let mut cache = TokenStateCache::new(&mut ledger);
            issue(&mut cache, "TOKEN", 100 * COIN);
            cache.add_verifier("TOKEN", "true").unwrap();
            cache.flush();
        }
        ledger.dump_to_store().unwrap();

        {
            let mut cache = TokenStateCache::new(&mut ledger);
            let token = NewToken::new("TOKEN", TokenAmount(100 * COIN), 0, true);
            cache.remove_new_token(token, "issuer").unwrap();
            cache.remove_verifier("TOKEN", "true", false).unwrap();
            cache.flush();
        }
        ledger.dump_to_store().unwrap();
        assert!(ledger.store().read_token("TOKEN").unwrap().is_none());
        assert!(ledger.store().read_balance("TOKEN", "issuer").unwrap().is_none());
        assert!(ledger.store().read_verifier("TOKEN").unwrap().is_none());
    }

    #[test]
    fn dump_failure_keeps_deltas() {
        let mut ledger = TokenLedger::new(MemoryTokenStore::new());
        {
            let mut cache = TokenStateCache::new(&mut ledger);
            issue(&mut cache, "TOKEN", COIN);
            cache.flush();
        }
        ledger.store.fail_writes = true;
        assert!(ledger.dump_to_store().is_err());

        ledger.store.fail_writes = false;
        ledger.dump_to_store().unwrap();
        assert!(ledger.store().read_token("TOKEN").unwrap().is_some());
    }

    #[test]
    fn cancellation_within_one_overlay() {
        let mut ledger = TokenLedger::new(MemoryTokenStore::new());
        let mut cache = TokenStateCache::new(&mut ledger);
        issue(&mut cache, "TOKEN", COIN);
        let token = NewToken::new("TOKEN", TokenAmount(COIN), 0, true);
        cache.remove_new_token(token, "issuer").unwrap();
        assert!(!cache.token_exists("TOKEN", false).unwrap());
        cache.flush();
        ledger.dump_to_store().unwrap();
        assert!(ledger.store().read_token("TOKEN").unwrap().is_none());
    }
}
