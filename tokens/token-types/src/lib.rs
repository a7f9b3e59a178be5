//! Core types for the token overlay carried by the chain's transaction
//! outputs: the name taxonomy, the operation records and their binary
//! serialization, token amounts, content hashes and the consensus
//! rejection codes.
//!
//! Everything in this crate is pure data with no access to chain state.
//! The state engine that consumes these types lives in the `token_ledger`
//! crate.

pub mod serial;
pub mod types;

pub use serial::{Deserial, DeserialError, DeserialResult, Serial};
pub use types::amount::TokenAmount;
pub use types::content_hash::ContentHash;
pub use types::error::{ParamError, TokenError};
pub use types::names::KnownTokenType;
pub use types::records::{
    BlockTokenUndo, NewToken, NullTokenData, ReissueToken, TokenTransfer, VerifierStringData,
};
