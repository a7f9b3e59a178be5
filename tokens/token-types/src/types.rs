//! The token data model: amounts, names, operation records, content hashes
//! and consensus rejection codes.

pub mod amount;
pub mod content_hash;
pub mod error;
pub mod names;
pub mod records;
