//! The token overlay state engine.
//!
//! Tokens live inside ordinary transaction outputs: a payment script may
//! carry an appended token record, and a handful of `OP_TOKEN`-prefixed
//! null forms carry administrative changes (tags, freezes, verifier
//! strings). This crate decodes those scripts ([`script`]), tracks the
//! resulting state in a layered dirty-set cache over a pluggable store
//! ([`cache`], [`store`]), evaluates restricted-token verifier expressions
//! ([`verifier`]) and enforces the consensus rules over whole transactions
//! ([`validation`]).
//!
//! The pure data types these modules operate on, together with the
//! rejection code catalogue, come from the `token_types` crate.

pub mod cache;
pub mod delta;
pub mod lru;
pub mod params;
pub mod script;
pub mod store;
pub mod tx;
pub mod validation;
pub mod verifier;

pub use cache::{CacheError, CacheResult, TokenLedger, TokenStateCache};
pub use params::{BurnRequirement, ChainParams, FeatureFlags};
pub use script::{decode_token_script, ScriptError, ScriptType, TokenScript};
pub use store::{BlockHash, MemoryTokenStore, StoreError, StoredToken, TokenStore};
pub use tx::{Coin, OutPoint, Transaction, TxOut};
pub use validation::{
    check_transaction_tokens, check_tx_tokens, CoinLookup, ValidationError, ValidationResult,
};
pub use verifier::{check_verifier_string, contextual_check_verifier_string, VerifierFailure};
