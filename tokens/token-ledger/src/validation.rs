//! Consensus validation of token transactions.
//!
//! Checks come in two layers, mirroring how the node schedules them. The
//! structural layer ([`check_transaction_tokens`]) looks only at the
//! transaction itself: script shapes, burn outputs, per-kind formatting and
//! the pairing rules between null data changes and transfers. The contextual
//! layer ([`check_tx_tokens`]) additionally consults the spent coins and the
//! token state cache: existence, balances, freezes, verifier strings and
//! token conservation across inputs and outputs.
//!
//! Rejection codes are stable strings rendered by [`TokenError`]; a failure
//! of an inner check inside a kind-specific path is embedded in that kind's
//! code rather than surfaced bare.

use log::error;
use std::collections::{BTreeMap, BTreeSet};
use token_types::types::amount::{
    MAX_UNIT, OWNER_TOKEN_AMOUNT, QUALIFIER_TOKEN_MAX_AMOUNT, QUALIFIER_TOKEN_MIN_AMOUNT,
    UNIQUE_TOKEN_AMOUNT,
};
use token_types::types::content_hash::check_encoded;
use token_types::types::names;
use token_types::{
    KnownTokenType, NewToken, NullTokenData, ParamError, ReissueToken, TokenAmount, TokenError,
    TokenTransfer, VerifierStringData,
};

use crate::cache::{CacheError, TokenStateCache};
use crate::params::{ChainParams, FeatureFlags};
use crate::script::{
    contains_op_token, decode_token_script, destination_of, has_null_token_prefix,
    is_global_restriction_form, is_null_data_form, is_verifier_form, payment_token_kind,
    PaymentTokenKind, ScriptError, TokenScript, OP_TOKEN,
};
use crate::store::{BlockHash, TokenStore};
use crate::tx::{Coin, OutPoint, Transaction, TxOut};
use crate::verifier::{
    check_verifier_string, check_wire_verifier, contextual_check_verifier_string,
    VerifierCheckError,
};

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Outcome of a validation step: either a consensus rejection with a stable
/// code, or an infrastructure failure from the state layer.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{0}")]
    Rejected(#[from] TokenError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<ParamError> for ValidationError {
    fn from(err: ParamError) -> Self {
        ValidationError::Rejected(err.into())
    }
}

/// Failure of a shared contextual check before the caller has decided which
/// rejection family it belongs to. Issuance paths embed it in their own
/// code; transfer paths surface it as-is.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("{0}")]
    Param(#[from] ParamError),
    #[error("{0}")]
    Rejected(TokenError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ContextError {
    /// Embed the failure in a kind-specific rejection code. Cache failures
    /// pass through untouched.
    fn wrap(self, wrap: fn(Box<TokenError>) -> TokenError) -> ValidationError {
        match self {
            ContextError::Param(param) => ValidationError::Rejected(wrap(Box::new(param.into()))),
            ContextError::Rejected(code) => ValidationError::Rejected(wrap(Box::new(code))),
            ContextError::Cache(err) => ValidationError::Cache(err),
        }
    }
}

impl From<ContextError> for ValidationError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Param(param) => ValidationError::Rejected(param.into()),
            ContextError::Rejected(code) => ValidationError::Rejected(code),
            ContextError::Cache(err) => ValidationError::Cache(err),
        }
    }
}

impl From<VerifierCheckError> for ContextError {
    fn from(err: VerifierCheckError) -> Self {
        match err {
            VerifierCheckError::Verifier(failure) => {
                ContextError::Rejected(failure.rejection(false))
            }
            VerifierCheckError::Cache(err) => ContextError::Cache(err),
        }
    }
}

/// Access to the unspent outputs a transaction spends.
pub trait CoinLookup {
    fn coin(&self, outpoint: &OutPoint) -> Option<&Coin>;
}

impl CoinLookup for BTreeMap<OutPoint, Coin> {
    fn coin(&self, outpoint: &OutPoint) -> Option<&Coin> {
        self.get(outpoint)
    }
}

// ----------------------------------------------------------------------
// Transaction shape classifiers.

fn last_new_token_kind(tx: &Transaction) -> Option<KnownTokenType> {
    let last = tx.outputs.last()?;
    match decode_token_script(&last.script) {
        Ok(Some(TokenScript::NewToken { token, .. })) => {
            names::token_name_kind(&token.name, &[]).ok()
        }
        _ => None,
    }
}

/// A root or sub token issuance: the last output carries the new token, the
/// one before it the owner token. The special kinds have their own shapes
/// and classifiers.
pub fn is_new_token_tx(tx: &Transaction) -> bool {
    if is_new_unique_token_tx(tx)
        || is_new_msg_channel_token_tx(tx)
        || is_new_qualifier_token_tx(tx)
        || is_new_restricted_token_tx(tx)
    {
        return false;
    }
    let n = tx.outputs.len();
    if n < 3 {
        return false;
    }
    payment_token_kind(&tx.outputs[n - 1].script) == Some(PaymentTokenKind::New)
        && payment_token_kind(&tx.outputs[n - 2].script) == Some(PaymentTokenKind::Owner)
}

pub fn is_new_unique_token_tx(tx: &Transaction) -> bool {
    last_new_token_kind(tx) == Some(KnownTokenType::Unique)
}

pub fn is_new_msg_channel_token_tx(tx: &Transaction) -> bool {
    last_new_token_kind(tx) == Some(KnownTokenType::MsgChannel)
}

pub fn is_new_qualifier_token_tx(tx: &Transaction) -> bool {
    matches!(
        last_new_token_kind(tx),
        Some(KnownTokenType::Qualifier) | Some(KnownTokenType::SubQualifier)
    )
}

pub fn is_new_restricted_token_tx(tx: &Transaction) -> bool {
    last_new_token_kind(tx) == Some(KnownTokenType::Restricted)
}

/// A reissue: the last output carries the reissue record. Classification is
/// marker-level so that a malformed record still lands in the reissue
/// checks and fails with the reissue serialization code.
pub fn is_reissue_token_tx(tx: &Transaction) -> bool {
    tx.outputs
        .last()
        .is_some_and(|out| payment_token_kind(&out.script) == Some(PaymentTokenKind::Reissue))
}

// ----------------------------------------------------------------------
// Extraction helpers.

/// The issued token and its landing address, from the last output.
pub fn new_token_from_tx(tx: &Transaction) -> Option<(NewToken, String)> {
    match decode_token_script(&tx.outputs.last()?.script) {
        Ok(Some(TokenScript::NewToken { token, address, .. })) => Some((token, address)),
        _ => None,
    }
}

/// The reissue record and its landing address, from the last output.
pub fn reissue_from_tx(tx: &Transaction) -> Option<(ReissueToken, String)> {
    match decode_token_script(&tx.outputs.last()?.script) {
        Ok(Some(TokenScript::Reissue { reissue, address, .. })) => Some((reissue, address)),
        _ => None,
    }
}

fn transfer_from_script(script: &[u8]) -> Option<(TokenTransfer, String)> {
    match decode_token_script(script) {
        Ok(Some(TokenScript::Transfer { transfer, address, .. })) => Some((transfer, address)),
        _ => None,
    }
}

fn has_transfer_of(tx: &Transaction, name: &str) -> bool {
    tx.outputs
        .iter()
        .filter_map(|out| transfer_from_script(&out.script))
        .any(|(transfer, _)| transfer.name == name)
}

fn has_issue_burn(tx: &Transaction, params: &ChainParams, kind: KnownTokenType, count: i64) -> bool {
    tx.outputs.iter().any(|out| {
        destination_of(&out.script)
            .is_some_and(|address| params.satisfies_issue_burn(kind, count, &address, out.value))
    })
}

fn has_reissue_burn(tx: &Transaction, params: &ChainParams) -> bool {
    tx.outputs.iter().any(|out| {
        destination_of(&out.script)
            .is_some_and(|address| params.satisfies_reissue_burn(&address, out.value))
    })
}

/// Whether some output pays the tag fee for `count` qualifier tag changes.
pub fn check_adding_tag_burn_fee(tx: &Transaction, params: &ChainParams, count: i64) -> bool {
    tx.outputs.iter().any(|out| {
        destination_of(&out.script)
            .is_some_and(|address| params.satisfies_tag_burn(count, &address, out.value))
    })
}

#[derive(Default)]
struct OutputCounts {
    issues: usize,
    owners: usize,
    reissues: usize,
}

fn count_output_kinds(tx: &Transaction) -> OutputCounts {
    let mut counts = OutputCounts::default();
    for out in &tx.outputs {
        match payment_token_kind(&out.script) {
            Some(PaymentTokenKind::New) => counts.issues += 1,
            Some(PaymentTokenKind::Owner) => counts.owners += 1,
            Some(PaymentTokenKind::Reissue) => counts.reissues += 1,
            Some(PaymentTokenKind::Transfer) | None => {}
        }
    }
    counts
}

fn txout_brief(out: &TxOut) -> String {
    let shown = out.script.len().min(30);
    format!("TxOut(value={}, script={})", out.value, hex::encode(&out.script[..shown]))
}

/// Why no verifier string could be taken from a transaction.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum VerifierSearchError {
    NotFound,
    Multiple,
    Undecodable { output: String },
}

impl VerifierSearchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn param(&self) -> ParamError {
        match self {
            Self::NotFound => ParamError::VerifierNotFound,
            Self::Multiple => ParamError::MultipleVerifiers,
            Self::Undecodable { output } => ParamError::VerifierDecodeFailed(output.clone()),
        }
    }
}

/// The single verifier declaration of a transaction, if it carries exactly
/// one and it decodes.
pub fn verifier_string_from_tx(
    tx: &Transaction,
) -> Result<VerifierStringData, VerifierSearchError> {
    let mut found = None;
    for out in &tx.outputs {
        if !is_verifier_form(&out.script) {
            continue;
        }
        if found.is_some() {
            return Err(VerifierSearchError::Multiple);
        }
        found = Some(out);
    }
    let out = found.ok_or(VerifierSearchError::NotFound)?;
    match decode_token_script(&out.script) {
        Ok(Some(TokenScript::Verifier(data))) => Ok(data),
        _ => Err(VerifierSearchError::Undecodable { output: txout_brief(out) }),
    }
}

// ----------------------------------------------------------------------
// Per-kind shape verification.

/// Shape of a root or sub issuance: new token and owner outputs in place,
/// names agreeing, burn paid, and for a sub token the parent owner token
/// moving in the same transaction.
pub fn verify_new_token(tx: &Transaction, params: &ChainParams) -> Result<(), TokenError> {
    let n = tx.outputs.len();
    if n < 3 {
        return Err(TokenError::IssueVoutSizeTooSmall);
    }
    let token = match decode_token_script(&tx.outputs[n - 1].script) {
        Ok(Some(TokenScript::NewToken { token, .. })) => token,
        Err(ScriptError::BadRecord(_)) => return Err(TokenError::IssueSerializationFailed),
        _ => return Err(TokenError::IssueDataNotFound),
    };
    let owner_name = match decode_token_script(&tx.outputs[n - 2].script) {
        Ok(Some(TokenScript::Owner { name, .. })) => name,
        Err(ScriptError::BadRecord(_)) => return Err(TokenError::IssueOwnerSerializationFailed),
        _ => return Err(TokenError::IssueOwnerDataNotFound),
    };
    if owner_name != names::owner_token_of(&token.name) {
        return Err(TokenError::IssueOwnerNameMismatch);
    }

    let kind = match names::token_name_kind(&token.name, &params.reserved_names) {
        Ok(kind) => kind,
        Err(_) => return Err(TokenError::IssueBurnNotFound),
    };
    if !has_issue_burn(tx, params, kind, 1) {
        return Err(TokenError::IssueBurnNotFound);
    }

    if kind == KnownTokenType::Sub {
        let parent = names::parent_name(&token.name).unwrap_or_default();
        if !has_transfer_of(tx, &names::owner_token_of(&parent)) {
            return Err(TokenError::IssueMissingOwnerToken);
        }
    }

    let counts = count_output_kinds(tx);
    if counts.owners != 1 || counts.issues != 1 || counts.reissues > 0 {
        return Err(TokenError::FailedIssueFormattingCheck);
    }
    Ok(())
}

/// Shape of a unique batch issuance: every new-token output a unique token
/// under one shared root, no duplicates, burn scaled by the batch size, and
/// the root owner token moving along.
pub fn verify_new_unique_token(tx: &Transaction, params: &ChainParams) -> Result<(), TokenError> {
    if tx.outputs.len() < 3 {
        return Err(TokenError::UniqueVoutSizeTooSmall);
    }

    let mut root: Option<String> = None;
    let mut seen = BTreeSet::new();
    let mut count: i64 = 0;
    for out in &tx.outputs {
        if payment_token_kind(&out.script) != Some(PaymentTokenKind::New) {
            continue;
        }
        let token = match decode_token_script(&out.script) {
            Ok(Some(TokenScript::NewToken { token, .. })) => token,
            _ => return Err(TokenError::UniqueTokenFromScript),
        };
        let parent = match names::parent_name(&token.name) {
            Some(parent) => parent,
            None => return Err(TokenError::UniqueTokenCompareFailed),
        };
        match &root {
            None => root = Some(parent),
            Some(existing) if *existing != parent => {
                return Err(TokenError::UniqueTokenCompareFailed)
            }
            Some(_) => {}
        }
        if !seen.insert(token.name.clone()) {
            return Err(TokenError::UniqueDuplicateNameInSameTx);
        }
        count += 1;
    }
    let root = match root {
        Some(root) if count > 0 => root,
        _ => return Err(TokenError::UniqueBadOutpointCount),
    };

    if !has_issue_burn(tx, params, KnownTokenType::Unique, count) {
        return Err(TokenError::UniqueBurnOutpointsNotFound);
    }
    if !has_transfer_of(tx, &names::owner_token_of(&root)) {
        return Err(TokenError::UniqueMissingOwnerToken);
    }

    let counts = count_output_kinds(tx);
    if counts.owners > 0 || counts.reissues > 0 || counts.issues as i64 != count {
        return Err(TokenError::FailedUniqueFormattingCheck);
    }
    Ok(())
}

pub fn verify_new_msg_channel_token(
    tx: &Transaction,
    params: &ChainParams,
) -> Result<(), TokenError> {
    let n = tx.outputs.len();
    if n < 3 {
        return Err(TokenError::MsgChannelVoutSizeTooSmall);
    }
    let token = match decode_token_script(&tx.outputs[n - 1].script) {
        Ok(Some(TokenScript::NewToken { token, .. })) => token,
        Err(ScriptError::BadRecord(_)) => return Err(TokenError::MsgChannelSerializationFailed),
        _ => return Err(TokenError::IssueDataNotFound),
    };
    if !has_issue_burn(tx, params, KnownTokenType::MsgChannel, 1) {
        return Err(TokenError::MsgChannelBurnNotFound);
    }
    let parent = names::parent_name(&token.name).unwrap_or_default();
    if !has_transfer_of(tx, &names::owner_token_of(&parent)) {
        return Err(TokenError::MsgChannelBadOwnerToken);
    }

    let counts = count_output_kinds(tx);
    if counts.owners != 0 || counts.issues != 1 || counts.reissues > 0 {
        return Err(TokenError::FailedMsgChannelFormattingCheck);
    }
    Ok(())
}

/// Shape of a qualifier issuance. A sub-qualifier additionally requires its
/// parent qualifier token moving in the same transaction.
pub fn verify_new_qualifier_token(
    tx: &Transaction,
    params: &ChainParams,
) -> Result<(), TokenError> {
    let n = tx.outputs.len();
    if n < 2 {
        return Err(TokenError::QualifierVoutSizeTooSmall);
    }
    let token = match decode_token_script(&tx.outputs[n - 1].script) {
        Ok(Some(TokenScript::NewToken { token, .. })) => token,
        Err(ScriptError::BadRecord(_)) => return Err(TokenError::QualifierSerializationFailed),
        _ => return Err(TokenError::QualifierDataNotFound),
    };
    let kind = match names::token_name_kind(&token.name, &params.reserved_names) {
        Ok(kind) => kind,
        Err(_) => return Err(TokenError::QualifierBurnNotFound),
    };
    if !has_issue_burn(tx, params, kind, 1) {
        return Err(TokenError::QualifierBurnNotFound);
    }
    if kind == KnownTokenType::SubQualifier {
        let parent = names::parent_name(&token.name).unwrap_or_default();
        if !has_transfer_of(tx, &parent) {
            return Err(TokenError::SubQualifierParentOutpointNotFound);
        }
    }

    let counts = count_output_kinds(tx);
    if counts.owners > 0 || counts.issues != 1 || counts.reissues > 0 {
        return Err(TokenError::FailedIssueFormattingCheck);
    }
    Ok(())
}

/// Shape of a restricted issuance: burn, the root owner token moving, and
/// exactly one decodable verifier declaration.
pub fn verify_new_restricted_token(
    tx: &Transaction,
    params: &ChainParams,
) -> Result<(), TokenError> {
    let n = tx.outputs.len();
    if n < 4 {
        return Err(TokenError::RestrictedVoutSizeTooSmall);
    }
    let token = match decode_token_script(&tx.outputs[n - 1].script) {
        Ok(Some(TokenScript::NewToken { token, .. })) => token,
        Err(ScriptError::BadRecord(_)) => return Err(TokenError::RestrictedSerializationFailed),
        _ => return Err(TokenError::RestrictedDataNotFound),
    };
    if !has_issue_burn(tx, params, KnownTokenType::Restricted, 1) {
        return Err(TokenError::RestrictedBurnNotFound);
    }
    let root = names::strip_restricted_sigil(&token.name);
    if !has_transfer_of(tx, &names::owner_token_of(root)) {
        return Err(TokenError::RestrictedRootOwnerTokenOutpointNotFound);
    }
    if let Err(err) = verifier_string_from_tx(tx) {
        return Err(TokenError::Param(err.param()));
    }

    let counts = count_output_kinds(tx);
    if counts.owners > 0 || counts.issues != 1 || counts.reissues > 0 {
        return Err(TokenError::FailedIssueFormattingCheck);
    }
    Ok(())
}

/// Shape of a reissue: reissue record in the last output, the owner token
/// moving, and the reissue burn paid.
pub fn verify_reissue_token(tx: &Transaction, params: &ChainParams) -> Result<(), TokenError> {
    let n = tx.outputs.len();
    if n < 3 {
        return Err(TokenError::VoutSizeTooSmall);
    }
    let reissue = match decode_token_script(&tx.outputs[n - 1].script) {
        Ok(Some(TokenScript::Reissue { reissue, .. })) => reissue,
        Err(ScriptError::BadRecord(_)) => return Err(TokenError::ReissueSerializationFailed),
        _ => return Err(TokenError::ReissueDataNotFound),
    };
    let owner = names::owner_token_of(names::strip_restricted_sigil(&reissue.name));
    if !has_transfer_of(tx, &owner) {
        return Err(TokenError::ReissueOwnerOutpointNotFound);
    }
    if !has_reissue_burn(tx, params) {
        return Err(TokenError::ReissueBurnOutpointNotFound);
    }

    let counts = count_output_kinds(tx);
    if counts.owners > 0 || counts.reissues != 1 || counts.issues > 0 {
        return Err(TokenError::FailedReissueFormattingCheck);
    }
    Ok(())
}

/// The owner output of an issuance must land on the issuer's address and
/// carry the issued token's owner name.
pub fn is_new_owner_valid(
    tx: &Transaction,
    token_name: &str,
    issue_address: &str,
) -> Result<(), TokenError> {
    let n = tx.outputs.len();
    if n < 2 {
        return Err(TokenError::BadOwner);
    }
    let (owner_name, owner_address) = match decode_token_script(&tx.outputs[n - 2].script) {
        Ok(Some(TokenScript::Owner { name, address, .. })) => (name, address),
        _ => return Err(TokenError::BadOwner),
    };
    if owner_address != issue_address {
        return Err(TokenError::OwnerAddressMismatch);
    }
    if owner_name.len() < names::MIN_TOKEN_LENGTH + 1 {
        return Err(TokenError::OwnerTokenLength);
    }
    if owner_name != names::owner_token_of(token_name) {
        return Err(TokenError::OwnerNameMismatch);
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Record-level checks.

/// Context-free validity of a new token record.
pub fn check_new_token(token: &NewToken) -> Result<(), ParamError> {
    let kind = names::token_name_kind(&token.name, &[]).map_err(|_| ParamError::NameInvalid)?;

    match kind {
        KnownTokenType::Unique | KnownTokenType::MsgChannel => {
            if token.units != 0 {
                return Err(ParamError::UnitsMustBe(0));
            }
            if token.amount != UNIQUE_TOKEN_AMOUNT {
                return Err(ParamError::AmountMustBe(UNIQUE_TOKEN_AMOUNT.0));
            }
            if token.reissuable {
                return Err(ParamError::ReissuableMustBeZero);
            }
        }
        KnownTokenType::Qualifier | KnownTokenType::SubQualifier => {
            if token.units != 0 {
                return Err(ParamError::UnitsMustBe(0));
            }
            if token.amount.0 < QUALIFIER_TOKEN_MIN_AMOUNT.0
                || token.amount.0 > QUALIFIER_TOKEN_MAX_AMOUNT.0
            {
                return Err(ParamError::AmountOutOfBounds(
                    QUALIFIER_TOKEN_MIN_AMOUNT.0,
                    QUALIFIER_TOKEN_MAX_AMOUNT.0,
                ));
            }
            if token.reissuable {
                return Err(ParamError::ReissuableMustBeZero);
            }
        }
        KnownTokenType::Owner => return Err(ParamError::OwnerSuffixForbidden),
        _ => {}
    }

    if !token.amount.is_positive() {
        return Err(ParamError::AmountNonPositive);
    }
    if token.amount.0 > TokenAmount::MAX_MONEY.0 {
        return Err(ParamError::AmountOverMaxMoney(
            TokenAmount::MAX_MONEY.0 / token_types::types::amount::COIN,
        ));
    }
    if !(0..=MAX_UNIT).contains(&token.units) {
        return Err(ParamError::UnitsOutOfRange);
    }
    if !token.amount.matches_units(token.units) {
        return Err(ParamError::AmountNotDivisible);
    }
    Ok(())
}

/// A new token record against chain state: activation, the name being
/// unused, and the content hash well-formed under the active features.
pub fn contextual_check_new_token<S: TokenStore>(
    cache: &mut TokenStateCache<'_, S>,
    token: &NewToken,
    flags: FeatureFlags,
) -> Result<(), ContextError> {
    if !flags.tokens {
        return Err(ParamError::TokensNotActive.into());
    }
    check_new_token(token)?;

    if cache.token_exists(&token.name, false)? {
        return Err(ParamError::NameAlreadyUsed(token.name.clone()).into());
    }

    if let Some(hash) = &token.content_hash {
        if hash.len() != 34 && (!flags.messaging || hash.len() != 32) {
            return Err(ParamError::BadHashDisplayLength.into());
        }
        if !check_encoded(hash, flags.messaging) {
            return Err(ParamError::BadHashEncoding.into());
        }
    }
    Ok(())
}

/// Context-free validity of a reissue record.
pub fn check_reissue_token(reissue: &ReissueToken) -> Result<(), ParamError> {
    if reissue.amount.is_negative() || reissue.amount.0 >= TokenAmount::MAX_MONEY.0 {
        return Err(ParamError::ReissueAmountNegative);
    }
    if reissue.units > MAX_UNIT || reissue.units < -1 {
        return Err(ParamError::ReissueUnitsOutOfRange);
    }
    Ok(())
}

/// A reissue record against chain state: the token exists and is
/// reissuable, supply stays under the cap, unit changes only grow, the
/// content hash decodes, and for restricted tokens the acting address
/// passes the verifier string in force.
pub fn contextual_check_reissue_token<S: TokenStore>(
    cache: &mut TokenStateCache<'_, S>,
    reissue: &ReissueToken,
    address: &str,
    tx: &Transaction,
    flags: FeatureFlags,
) -> Result<(), ContextError> {
    check_reissue_token(reissue)?;

    let prev = cache
        .token_metadata(&reissue.name)?
        .ok_or_else(|| ParamError::ReissueTokenNotFound(reissue.name.clone()))?;
    if !prev.token.reissuable {
        return Err(ParamError::ReissueNotReissuable.into());
    }
    match prev.token.amount.checked_add(reissue.amount) {
        Some(total) if total.0 <= TokenAmount::MAX_MONEY.0 => {}
        _ => return Err(ParamError::ReissueAmountTooLarge(reissue.name.clone()).into()),
    }
    if !reissue.amount.matches_units(prev.token.units) {
        return Err(ParamError::ReissueAmountNotDivisible.into());
    }
    if reissue.units < prev.token.units && reissue.units != -1 {
        return Err(ParamError::ReissueUnitsSmaller.into());
    }

    if !reissue.content_hash.is_empty() {
        if reissue.content_hash.len() != 34
            && (flags.messaging && reissue.content_hash.len() != 32)
        {
            return Err(ParamError::BadHashByteLength.into());
        }
        if !check_encoded(&reissue.content_hash, flags.messaging) {
            return Err(ParamError::BadHashEncoding.into());
        }
    }

    if names::is_token_name_a_restricted(&reissue.name) {
        match verifier_string_from_tx(tx) {
            Err(err) if !err.is_not_found() => return Err(err.param().into()),
            Err(_) => {
                // No new verifier declared. If supply is actually growing,
                // the acting address must still pass the one in force.
                if reissue.amount.is_positive() {
                    match cache.verifier_of(&reissue.name, false)? {
                        Some(current) => {
                            contextual_check_verifier_string(cache, &current, address)?
                        }
                        None => {
                            error!(
                                "no verifier string on record for restricted token {}",
                                reissue.name
                            );
                            return Err(ParamError::VerifierOutOfSync.into());
                        }
                    }
                }
            }
            Ok(new_verifier) => {
                contextual_check_verifier_string(cache, &new_verifier.verifier_string, address)?
            }
        }
    }
    Ok(())
}

/// A transfer record against chain state: name and amount validity, message
/// rules under messaging, and the restricted-token gates (global freeze and
/// verifier) for the receiving address.
pub fn contextual_check_transfer_token<S: TokenStore>(
    cache: &mut TokenStateCache<'_, S>,
    transfer: &TokenTransfer,
    address: &str,
    flags: FeatureFlags,
) -> Result<(), ContextError> {
    let kind = names::token_name_kind(&transfer.name, &[]).map_err(|_| ParamError::NameInvalid)?;
    if !transfer.amount.is_positive() {
        return Err(ParamError::AmountNonPositive.into());
    }

    if flags.messaging {
        if transfer.message.is_empty() && transfer.expire_time > 0 {
            return Err(ParamError::ExpiryWithoutMessage.into());
        }
        if transfer.expire_time < 0 {
            return Err(ParamError::NegativeExpiry.into());
        }
        if !transfer.message.is_empty() && !check_encoded(&transfer.message, true) {
            return Err(ParamError::BadHashEncoding.into());
        }
    }

    match kind {
        KnownTokenType::MsgChannel if !flags.messaging => {
            return Err(ContextError::Rejected(
                TokenError::TransferMsgChannelBeforeMessagingActive,
            ));
        }
        KnownTokenType::Restricted => {
            if !flags.restricted {
                return Err(ContextError::Rejected(TokenError::TransferRestrictedBeforeActive));
            }
            if cache.globally_frozen(&transfer.name, true)? {
                return Err(ContextError::Rejected(
                    TokenError::TransferRestrictedGloballyFrozen,
                ));
            }
            match cache.verifier_of(&transfer.name, true)? {
                Some(verifier) => contextual_check_verifier_string(cache, &verifier, address)?,
                None => {
                    return Err(ParamError::VerifierMissingForToken(transfer.name.clone()).into())
                }
            }
        }
        KnownTokenType::Qualifier | KnownTokenType::SubQualifier if !flags.restricted => {
            return Err(ContextError::Rejected(TokenError::TransferQualifierBeforeActive));
        }
        _ => {}
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Null data changes.

fn check_null_data_flag(data: &NullTokenData) -> Result<(), TokenError> {
    if data.flag > 1 {
        return Err(TokenError::NullDataFlagMustBeZeroOrOne);
    }
    Ok(())
}

/// A tag or freeze change against chain state. Reads skip the block-local
/// overlay: a change must flip the flushed state, not one made earlier in
/// the same block.
pub fn contextual_check_null_token_data<S: TokenStore>(
    cache: &mut TokenStateCache<'_, S>,
    address: &str,
    data: &NullTokenData,
) -> Result<(), ContextError> {
    check_null_data_flag(data).map_err(ContextError::Rejected)?;
    if names::is_token_name_a_qualifier(&data.token_name, false) {
        let tagged = cache.address_tagged(address, &data.token_name, true)?;
        if data.flag == 1 && tagged {
            return Err(ContextError::Rejected(TokenError::AddQualifierAlreadyAssigned));
        }
        if data.flag == 0 && !tagged {
            return Err(ContextError::Rejected(TokenError::RemoveQualifierNotAssigned));
        }
    } else if names::is_token_name_a_restricted(&data.token_name) {
        let frozen = cache.address_frozen(address, &data.token_name, true)?;
        if data.flag == 1 && frozen {
            return Err(ContextError::Rejected(TokenError::FreezeAddressAlreadyFrozen));
        }
        if data.flag == 0 && !frozen {
            return Err(ContextError::Rejected(TokenError::UnfreezeAddressNotFrozen));
        }
    } else {
        return Err(ContextError::Rejected(TokenError::NullDataOnNonRestrictedOrQualifier));
    }
    Ok(())
}

/// A global restriction change against chain state.
pub fn contextual_check_global_restriction<S: TokenStore>(
    cache: &mut TokenStateCache<'_, S>,
    data: &NullTokenData,
) -> Result<(), ContextError> {
    check_null_data_flag(data).map_err(ContextError::Rejected)?;
    let frozen = cache.globally_frozen(&data.token_name, true)?;
    if data.flag == 1 && frozen {
        return Err(ContextError::Rejected(TokenError::GlobalFreezeAlreadyFrozen));
    }
    if data.flag == 0 && !frozen {
        return Err(ContextError::Rejected(TokenError::GlobalUnfreezeNotFrozen));
    }
    Ok(())
}

/// Structural check of a verifier declaration output: decodable, wire form
/// stripped, expression parseable.
pub fn check_verifier_token_out(out: &TxOut) -> Result<(), TokenError> {
    let data = match decode_token_script(&out.script) {
        Ok(Some(TokenScript::Verifier(data))) => data,
        _ => return Err(TokenError::NullVerifierDataSerialization),
    };
    check_wire_verifier(&data.verifier_string)?;
    check_verifier_string(&data.verifier_string).map_err(|failure| failure.rejection(false))?;
    Ok(())
}

// ----------------------------------------------------------------------
// Whole-transaction checks.

/// All structural token rules of a transaction: per-output script and
/// record validity, burn and formatting rules per issuance kind, pairing of
/// null data changes with transfers, and the verifier/restricted coupling.
/// Consults no chain state.
pub fn check_transaction_tokens(tx: &Transaction, params: &ChainParams) -> Result<(), TokenError> {
    let mut null_changes: Vec<String> = Vec::new();
    let mut change_keys: BTreeSet<(String, String)> = BTreeSet::new();
    let mut global_names: BTreeSet<String> = BTreeSet::new();
    let mut globals: Vec<String> = Vec::new();
    let mut tag_adds: i64 = 0;
    let mut has_verifier = false;
    let mut transfer_names: BTreeSet<String> = BTreeSet::new();
    let mut has_token_out = false;

    for out in &tx.outputs {
        if has_null_token_prefix(&out.script) {
            has_token_out = true;
            if is_null_data_form(&out.script) {
                let (address, data) = match decode_token_script(&out.script) {
                    Ok(Some(TokenScript::NullData { address, data })) => (address, data),
                    _ => return Err(TokenError::NullTokenDataSerialization),
                };
                check_null_data_flag(&data)?;
                if !change_keys.insert((data.token_name.clone(), address)) {
                    return Err(TokenError::NullDataOneChangePerTokenAddress);
                }
                if names::is_token_name_a_qualifier(&data.token_name, false) && data.flag == 1 {
                    tag_adds += 1;
                }
                null_changes.push(data.token_name);
            } else if is_global_restriction_form(&out.script) {
                let data = match decode_token_script(&out.script) {
                    Ok(Some(TokenScript::GlobalRestriction(data))) => data,
                    _ => return Err(TokenError::NullGlobalTokenDataSerialization),
                };
                check_null_data_flag(&data)?;
                if !global_names.insert(data.token_name.clone()) {
                    return Err(TokenError::NullDataOneGlobalChangePerName);
                }
                globals.push(data.token_name);
            } else if is_verifier_form(&out.script) {
                check_verifier_token_out(out)?;
                if has_verifier {
                    return Err(TokenError::NullDataOneVerifierPerTx);
                }
                has_verifier = true;
            }
            continue;
        }

        match payment_token_kind(&out.script) {
            Some(PaymentTokenKind::Transfer) => {
                has_token_out = true;
                let (transfer, _) = transfer_from_script(&out.script)
                    .ok_or(TokenError::TransferBadDeserialize)?;
                let kind = names::token_name_kind(&transfer.name, &[])
                    .map_err(|_| TokenError::TransferTokenNameInvalid)?;
                match kind {
                    KnownTokenType::Owner if transfer.amount != OWNER_TOKEN_AMOUNT => {
                        return Err(TokenError::TransferOwnerAmountWasNotOne);
                    }
                    KnownTokenType::Unique if transfer.amount != UNIQUE_TOKEN_AMOUNT => {
                        return Err(TokenError::TransferUniqueAmountWasNotOne);
                    }
                    KnownTokenType::Qualifier | KnownTokenType::SubQualifier
                        if transfer.amount.0 < QUALIFIER_TOKEN_MIN_AMOUNT.0
                            || transfer.amount.0 > QUALIFIER_TOKEN_MAX_AMOUNT.0 =>
                    {
                        return Err(TokenError::TransferQualifierAmountOutOfRange);
                    }
                    _ => {}
                }
                transfer_names.insert(transfer.name);
                if out.value != 0 {
                    return Err(TokenError::TokenTransferAmountNotZero);
                }
            }
            Some(PaymentTokenKind::New) | Some(PaymentTokenKind::Owner) => {
                has_token_out = true;
                if out.value != 0 {
                    return Err(TokenError::TokenIssuedAmountNotZero);
                }
            }
            Some(PaymentTokenKind::Reissue) => {
                has_token_out = true;
                if out.value != 0 {
                    return Err(TokenError::TokenReissuedAmountNotZero);
                }
            }
            None => {}
        }
    }

    if tag_adds > 0 && !check_adding_tag_burn_fee(tx, params, tag_adds) {
        return Err(TokenError::MissingTagBurnFee);
    }

    // A tag or freeze change must ride with proof of authority: the token's
    // owner token (restricted) or the qualifier itself moving in this tx.
    for name in &null_changes {
        if names::is_token_name_a_restricted(name) {
            let owner = names::owner_token_of(names::strip_restricted_sigil(name));
            if !transfer_names.contains(&owner) {
                return Err(TokenError::RestrictedNullTxWithoutTransfer);
            }
        } else if !transfer_names.contains(name) {
            return Err(TokenError::QualifierNullTxWithoutTransfer);
        }
    }
    for name in &globals {
        if name.is_empty() {
            return Err(TokenError::GlobalNullTxWithNullName);
        }
        let owner = names::owner_token_of(names::strip_restricted_sigil(name));
        if !transfer_names.contains(&owner) {
            return Err(TokenError::GlobalNullTxWithoutTransfer);
        }
    }

    if tx.is_coinbase() && has_token_out {
        return Err(TokenError::CoinbaseContainsTokenTxes);
    }

    let mut reissue_restricted = false;
    let mut new_restricted = false;

    if is_new_token_tx(tx) {
        verify_new_token(tx, params)?;
        let (token, address) =
            new_token_from_tx(tx).ok_or(TokenError::IssueTokenFromTransaction)?;
        is_new_owner_valid(tx, &token.name, &address)?;
        check_new_token(&token)?;
    } else if is_reissue_token_tx(tx) {
        verify_reissue_token(tx, params)?;
        let (reissue, _) = reissue_from_tx(tx).ok_or(TokenError::ReissueTokenFromTransaction)?;
        check_reissue_token(&reissue)?;
        if names::is_token_name_a_restricted(&reissue.name) {
            if let Err(err) = verifier_string_from_tx(tx) {
                if !err.is_not_found() {
                    return Err(TokenError::ReissueRestrictedVerifier(Box::new(
                        err.param().into(),
                    )));
                }
            }
            reissue_restricted = true;
        }
    } else if is_new_unique_token_tx(tx) {
        verify_new_unique_token(tx, params)?;
        for out in &tx.outputs {
            if payment_token_kind(&out.script) != Some(PaymentTokenKind::New) {
                continue;
            }
            let token = match decode_token_script(&out.script) {
                Ok(Some(TokenScript::NewToken { token, .. })) => token,
                _ => return Err(TokenError::CheckTransactionUniqueSerialization),
            };
            check_new_token(&token)
                .map_err(|err| TokenError::IssueUnique(Box::new(err.into())))?;
        }
    } else if is_new_msg_channel_token_tx(tx) {
        verify_new_msg_channel_token(tx, params)?;
        let (token, _) = new_token_from_tx(tx).ok_or(TokenError::MsgChannelFromTransaction)?;
        check_new_token(&token)
            .map_err(|err| TokenError::IssueMsgChannel(Box::new(err.into())))?;
    } else if is_new_qualifier_token_tx(tx) {
        verify_new_qualifier_token(tx, params)?;
        let (token, _) = new_token_from_tx(tx).ok_or(TokenError::QualifierFromTransaction)?;
        check_new_token(&token)
            .map_err(|err| TokenError::IssueQualifier(Box::new(err.into())))?;
    } else if is_new_restricted_token_tx(tx) {
        verify_new_restricted_token(tx, params)?;
        let (token, _) = new_token_from_tx(tx).ok_or(TokenError::RestrictedFromTransaction)?;
        check_new_token(&token)
            .map_err(|err| TokenError::IssueRestricted(Box::new(err.into())))?;
        if let Err(err) = verifier_string_from_tx(tx) {
            return Err(TokenError::RestrictedVerifierSearch(Box::new(err.param().into())));
        }
        new_restricted = true;
    } else {
        for out in &tx.outputs {
            if let Some(kind) = payment_token_kind(&out.script) {
                if kind != PaymentTokenKind::Transfer {
                    return Err(TokenError::BadTokenTransaction);
                }
            } else if contains_op_token(&out.script) && out.script.first() != Some(&OP_TOKEN) {
                return Err(TokenError::TokenOpNotInRightScriptLocation);
            }
        }
    }

    if has_verifier && !reissue_restricted && !new_restricted {
        return Err(TokenError::VerifierWithoutRestrictedIssuance);
    }
    if new_restricted && !has_verifier {
        return Err(TokenError::RestrictedIssuanceWithoutVerifier);
    }
    Ok(())
}

/// All contextual token rules of a transaction: the spent coins resolve and
/// respect freezes and time locks, every output passes its contextual
/// check, reissues don't chain on an unsettled reissue, royalties are paid,
/// and token amounts are conserved between inputs and outputs.
///
/// Names paired with this transaction's txid for reissues it performs are
/// appended to `reissue_pairs`; the caller records them once the
/// transaction is accepted.
#[allow(clippy::too_many_arguments)]
pub fn check_tx_tokens<S: TokenStore, C: CoinLookup>(
    tx: &Transaction,
    cache: &mut TokenStateCache<'_, S>,
    coins: &C,
    spend_height: i32,
    spend_time: i64,
    flags: FeatureFlags,
    params: &ChainParams,
    reissue_pairs: &mut Vec<(String, BlockHash)>,
) -> ValidationResult<()> {
    let mut total_inputs: BTreeMap<String, TokenAmount> = BTreeMap::new();

    for input in &tx.inputs {
        let coin = coins.coin(input).ok_or(TokenError::InputsMissingOrSpent)?;
        if payment_token_kind(&coin.out.script).is_none() {
            continue;
        }
        let script = decode_token_script(&coin.out.script)
            .ok()
            .flatten()
            .ok_or(TokenError::FailedToGetTokenFromScript)?;
        let (name, amount, address) = match &script {
            TokenScript::Transfer { transfer, address, .. } => {
                if transfer.time_lock != 0 {
                    let lock = transfer.time_lock as i64;
                    let reference = if lock < params.lock_time_threshold as i64 {
                        spend_height as i64
                    } else {
                        spend_time
                    };
                    if lock > reference {
                        return Err(
                            TokenError::PrematureSpendTimelock(transfer.time_lock).into()
                        );
                    }
                }
                (transfer.name.clone(), transfer.amount, address.clone())
            }
            TokenScript::NewToken { token, address, .. } => {
                (token.name.clone(), token.amount, address.clone())
            }
            TokenScript::Owner { name, address, .. } => {
                (name.clone(), OWNER_TOKEN_AMOUNT, address.clone())
            }
            TokenScript::Reissue { reissue, address, .. } => {
                (reissue.name.clone(), reissue.amount, address.clone())
            }
            _ => continue,
        };
        if names::is_token_name_a_restricted(&name)
            && cache.address_frozen(&address, &name, true)?
        {
            return Err(TokenError::RestrictedTransferFromFrozenAddress.into());
        }
        let entry = total_inputs.entry(name).or_insert(TokenAmount::ZERO);
        *entry = TokenAmount(entry.0.saturating_add(amount.0));
    }

    let mut total_outputs: BTreeMap<String, TokenAmount> = BTreeMap::new();
    let mut royalty_paid: BTreeMap<String, bool> = BTreeMap::new();

    for out in &tx.outputs {
        if payment_token_kind(&out.script).is_some() && !flags.tokens {
            return Err(TokenError::IsTokenAndTokenNotActive.into());
        }
        if has_null_token_prefix(&out.script) {
            if !flags.restricted {
                return Err(TokenError::NullDataBeforeRestrictedActive.into());
            }
            if is_null_data_form(&out.script) {
                let (address, data) = match decode_token_script(&out.script) {
                    Ok(Some(TokenScript::NullData { address, data })) => (address, data),
                    _ => return Err(TokenError::NullTokenDataSerialization.into()),
                };
                contextual_check_null_token_data(cache, &address, &data)?;
            } else if is_global_restriction_form(&out.script) {
                let data = match decode_token_script(&out.script) {
                    Ok(Some(TokenScript::GlobalRestriction(data))) => data,
                    _ => return Err(TokenError::NullGlobalTokenDataSerialization.into()),
                };
                contextual_check_global_restriction(cache, &data)?;
            } else if is_verifier_form(&out.script) {
                let data = match decode_token_script(&out.script) {
                    Ok(Some(TokenScript::Verifier(data))) => data,
                    _ => return Err(TokenError::NullVerifierDataSerialization.into()),
                };
                contextual_check_verifier_string(cache, &data.verifier_string, "")
                    .map_err(ContextError::from)?;
            } else {
                return Err(TokenError::NullDataUnknownType.into());
            }
            continue;
        }

        match payment_token_kind(&out.script) {
            Some(PaymentTokenKind::Transfer) => {
                let (transfer, address) = transfer_from_script(&out.script)
                    .ok_or(TokenError::TxTransferBadDeserialize)?;
                contextual_check_transfer_token(cache, &transfer, &address, flags)?;

                let entry =
                    total_outputs.entry(transfer.name.clone()).or_insert(TokenAmount::ZERO);
                *entry = TokenAmount(entry.0.saturating_add(transfer.amount.0));

                if names::is_token_name_an_owner(&transfer.name) {
                    if transfer.amount != OWNER_TOKEN_AMOUNT {
                        return Err(TokenError::TransferOwnerAmountWasNotOne.into());
                    }
                } else {
                    let meta = cache
                        .token_metadata(&transfer.name)?
                        .ok_or(TokenError::TransferTokenNotExist)?;
                    if meta.token.name != transfer.name {
                        return Err(TokenError::TokenDatabaseCorrupted.into());
                    }
                    if !transfer.amount.matches_units(meta.token.units) {
                        return Err(TokenError::TransferAmountNotMatchUnits.into());
                    }
                    if let Some(royalty) = &meta.token.royalty {
                        let paid =
                            royalty_paid.entry(transfer.name.clone()).or_insert(false);
                        if address == royalty.address
                            && transfer.amount.0 >= royalty.amount.0
                            && transfer.time_lock == 0
                        {
                            *paid = true;
                        }
                    }
                }
            }
            Some(PaymentTokenKind::Reissue) => {
                let reissue = match decode_token_script(&out.script) {
                    Ok(Some(TokenScript::Reissue { reissue, .. })) => reissue,
                    _ => return Err(TokenError::TokenReissueBadDeserialize.into()),
                };
                match cache.pending_reissue_txid(&reissue.name) {
                    Some(txid) if txid != tx.txid => {
                        return Err(TokenError::ReissueChainingNotAllowed.into());
                    }
                    Some(_) => {}
                    None => reissue_pairs.push((reissue.name.clone(), tx.txid)),
                }
            }
            _ => {}
        }
    }

    if royalty_paid.values().any(|paid| !paid) {
        return Err(TokenError::RoyaltyMissing.into());
    }

    if is_new_token_tx(tx) {
        let (token, _) = new_token_from_tx(tx).ok_or(TokenError::IssueSerializationFailed)?;
        contextual_check_new_token(cache, &token, flags)?;
    } else if is_reissue_token_tx(tx) {
        let (reissue, address) =
            reissue_from_tx(tx).ok_or(TokenError::ReissueSerializationFailedContextual)?;
        contextual_check_reissue_token(cache, &reissue, &address, tx, flags)
            .map_err(|err| err.wrap(TokenError::ReissueContextual))?;
    } else if is_new_unique_token_tx(tx) {
        for out in &tx.outputs {
            if payment_token_kind(&out.script) != Some(PaymentTokenKind::New) {
                continue;
            }
            let token = match decode_token_script(&out.script) {
                Ok(Some(TokenScript::NewToken { token, .. })) => token,
                _ => {
                    return Err(TokenError::IssueUniqueContextual(Box::new(
                        TokenError::UniqueSerializationFailed,
                    ))
                    .into());
                }
            };
            contextual_check_new_token(cache, &token, flags)
                .map_err(|err| err.wrap(TokenError::IssueUniqueContextual))?;
        }
    } else if is_new_msg_channel_token_tx(tx) {
        if !flags.messaging {
            return Err(TokenError::IssueMsgChannelBeforeMessagingActive.into());
        }
        let (token, _) =
            new_token_from_tx(tx).ok_or(TokenError::MsgChannelSerializationFailed)?;
        contextual_check_new_token(cache, &token, flags)
            .map_err(|err| err.wrap(TokenError::IssueMsgChannelContextual))?;
    } else if is_new_qualifier_token_tx(tx) {
        if !flags.restricted {
            return Err(TokenError::IssueQualifierBeforeActive.into());
        }
        let (token, _) = new_token_from_tx(tx).ok_or(TokenError::QualifierSerializationFailed)?;
        contextual_check_new_token(cache, &token, flags)
            .map_err(|err| err.wrap(TokenError::IssueQualifierContextual))?;
    } else if is_new_restricted_token_tx(tx) {
        if !flags.restricted {
            return Err(TokenError::IssueRestrictedBeforeActive.into());
        }
        let (token, address) =
            new_token_from_tx(tx).ok_or(TokenError::RestrictedSerializationFailedContextual)?;
        contextual_check_new_token(cache, &token, flags)
            .map_err(|err| err.wrap(TokenError::IssueRestrictedContextual))?;
        match verifier_string_from_tx(tx) {
            Ok(verifier) => {
                contextual_check_verifier_string(cache, &verifier.verifier_string, &address)
                    .map_err(ContextError::from)?;
            }
            Err(err) => {
                return Err(
                    TokenError::RestrictedVerifierSearch(Box::new(err.param().into())).into()
                );
            }
        }
    } else {
        for out in &tx.outputs {
            if let Some(kind) = payment_token_kind(&out.script) {
                if kind != PaymentTokenKind::Transfer {
                    return Err(TokenError::BadTokenTransaction.into());
                }
            } else if contains_op_token(&out.script) {
                if !flags.restricted {
                    return Err(TokenError::BadTokenScript.into());
                }
                if out.script.first() != Some(&OP_TOKEN) {
                    return Err(TokenError::TokenOpNotInRightScriptLocation.into());
                }
            }
        }
    }

    for (name, out_amount) in &total_outputs {
        match total_inputs.get(name) {
            None => return Err(TokenError::OutputsWithoutInputs(name.clone()).into()),
            Some(in_amount) if in_amount != out_amount => {
                return Err(TokenError::TokensWouldBeBurnt(name.clone()).into());
            }
            Some(_) => {}
        }
    }
    if total_inputs.len() != total_outputs.len() {
        return Err(TokenError::TokenInputsSizeMismatch.into());
    }
    Ok(())
}
