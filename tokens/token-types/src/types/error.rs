//! Consensus rejection reasons for token transactions.
//!
//! The rendered strings are the node's observable rejection contract: peers
//! and log consumers match on them, so they are reproduced here verbatim,
//! historical spelling included. Internal code matches on the enum instead.

/// A parameter-level check failure. Rendered either on its own or embedded
/// in a kind-specific [`TokenError`] rejection code.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error(
        "Invalid parameter: token_name must only consist of valid characters and have a size \
         between 3 and 30 characters. See help for more details."
    )]
    NameInvalid,
    #[error("Invalid parameter: units must be {0}")]
    UnitsMustBe(i8),
    #[error("Invalid parameter: amount must be {0}")]
    AmountMustBe(i64),
    #[error("Invalid parameter: reissuable must be 0")]
    ReissuableMustBeZero,
    #[error("Invalid parameter: amount must be between {0} - {1}")]
    AmountOutOfBounds(i64, i64),
    #[error(
        "Invalid parameters: token_name can't have a '!' at the end of it. See help for more \
         details."
    )]
    OwnerSuffixForbidden,
    #[error("Invalid parameter: token amount can't be equal to or less than zero.")]
    AmountNonPositive,
    #[error("Invalid parameter: token amount greater than max money: {0}")]
    AmountOverMaxMoney(i64),
    #[error("Invalid parameter: units must be between 0-8.")]
    UnitsOutOfRange,
    #[error("Invalid parameter: amount must be divisible by the smaller unit assigned to the token")]
    AmountNotDivisible,
    #[error("Invalid parameter: token_name '{0}' has already been used")]
    NameAlreadyUsed(String),
    #[error(
        "Invalid parameter: ipfs_hash must be 46 characters. Txid must be valid 64 character hash"
    )]
    BadHashDisplayLength,
    #[error("Invalid parameter: ipfs_hash must be 34 bytes, Txid must be 32 bytes")]
    BadHashByteLength,
    #[error("Invalid parameter: ipfs_hash is not valid, or txid hash is not the right length")]
    BadHashEncoding,
    #[error(
        "Invalid parameter: token transfer expiration time requires a message to be attached to \
         the transfer"
    )]
    ExpiryWithoutMessage,
    #[error("Invalid parameter: expiration time must be a positive value")]
    NegativeExpiry,
    #[error("bad-txns-new-token-when-tokens-is-not-active")]
    TokensNotActive,
    #[error("Unable to reissue token: amount must be 0 or larger")]
    ReissueAmountNegative,
    #[error("Unable to reissue token: unit must be between 8 and -1")]
    ReissueUnitsOutOfRange,
    #[error("Unable to reissue token: token_name '{0}' doesn't exist in the database")]
    ReissueTokenNotFound(String),
    #[error("Unable to reissue token: reissuable is set to false")]
    ReissueNotReissuable,
    #[error("Unable to reissue token: token_name '{0}' the amount trying to reissue is to large")]
    ReissueAmountTooLarge(String),
    #[error(
        "Unable to reissue token: amount must be divisible by the smaller unit assigned to the \
         token"
    )]
    ReissueAmountNotDivisible,
    #[error("Unable to reissue token: unit must be larger than current unit selection")]
    ReissueUnitsSmaller,
    #[error("Verifier string not found")]
    VerifierNotFound,
    #[error("Verifier String doesn't exist for token: {0}")]
    VerifierMissingForToken(String),
    #[error("Multiple verifier strings found in transaction")]
    MultipleVerifiers,
    #[error("Failed to get verifier string from output: {0}")]
    VerifierDecodeFailed(String),
    #[error(
        "failed to get verifier string from a restricted token, database is out of sync. Reindex \
         required. Please report this is to development team"
    )]
    VerifierOutOfSync,
}

/// The closed set of token consensus rejections. [`std::fmt::Display`]
/// renders the stable rejection code.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum TokenError {
    /// Parameter failures whose message is the rejection string itself.
    #[error("{0}")]
    Param(ParamError),

    // Root/sub issuance shape.
    #[error("bad-txns-issue-vout-size-to-small")]
    IssueVoutSizeTooSmall,
    #[error("bad-txns-issue-data-not-found")]
    IssueDataNotFound,
    #[error("bad-txns-issue-owner-data-not-found")]
    IssueOwnerDataNotFound,
    #[error("bad-txns-issue-serialzation-failed")]
    IssueSerializationFailed,
    #[error("bad-txns-issue-owner-serialzation-failed")]
    IssueOwnerSerializationFailed,
    #[error("bad-txns-issue-owner-name-doesn't-match")]
    IssueOwnerNameMismatch,
    #[error("bad-txns-issue-burn-not-found")]
    IssueBurnNotFound,
    #[error("bad-txns-issue-new-token-missing-owner-token")]
    IssueMissingOwnerToken,
    #[error("bad-txns-failed-issue-token-formatting-check")]
    FailedIssueFormattingCheck,
    #[error("bad-txns-issue-token-from-transaction")]
    IssueTokenFromTransaction,
    #[error("bad-txns-bad-owner")]
    BadOwner,
    #[error("bad-txns-owner-name-mismatch")]
    OwnerNameMismatch,
    #[error("bad-txns-owner-address-mismatch")]
    OwnerAddressMismatch,
    #[error("bad-txns-owner-token-length")]
    OwnerTokenLength,

    // Unique batch issuance shape.
    #[error("bad-txns-unique-vout-size-to-small")]
    UniqueVoutSizeTooSmall,
    #[error("bad-txns-failed-unique-token-formatting-check")]
    FailedUniqueFormattingCheck,
    #[error("bad-txns-issue-unique-token-from-script")]
    UniqueTokenFromScript,
    #[error("bad-txns-issue-unique-token-compare-failed")]
    UniqueTokenCompareFailed,
    #[error("bad-txns-issue-unique-duplicate-name-in-same-tx")]
    UniqueDuplicateNameInSameTx,
    #[error("bad-txns-issue-unique-token-bad-outpoint-count")]
    UniqueBadOutpointCount,
    #[error("bad-txns-issue-unique-token-burn-outpoints-not-found")]
    UniqueBurnOutpointsNotFound,
    #[error("bad-txns-issue-unique-token-missing-owner-token")]
    UniqueMissingOwnerToken,
    #[error("bad-txns-issue-unique-serialization-failed")]
    UniqueSerializationFailed,
    #[error("bad-txns-check-transaction-issue-unique-token-serialization")]
    CheckTransactionUniqueSerialization,

    // Message channel issuance shape.
    #[error("bad-txns-issue-msgchannel-vout-size-to-small")]
    MsgChannelVoutSizeTooSmall,
    #[error("bad-txns-failed-issue-msgchannel-token-formatting-check")]
    FailedMsgChannelFormattingCheck,
    #[error("bad-txns-issue-msgchannel-serialzation-failed")]
    MsgChannelSerializationFailed,
    #[error("bad-txns-issue-msgchannel-burn-not-found")]
    MsgChannelBurnNotFound,
    #[error("bad-txns-issue-msg-channel-token-bad-owner-token")]
    MsgChannelBadOwnerToken,
    #[error("bad-txns-issue-msgchannel-from-transaction")]
    MsgChannelFromTransaction,
    #[error("bad-txns-issue-msgchannel-before-messaging-is-active")]
    IssueMsgChannelBeforeMessagingActive,

    // Qualifier issuance shape.
    #[error("bad-txns-issue-qualifier-vout-size-to-small")]
    QualifierVoutSizeTooSmall,
    #[error("bad-txns-issue-qualifider-data-not-found")]
    QualifierDataNotFound,
    #[error("bad-txns-issue-qualifier-serialzation-failed")]
    QualifierSerializationFailed,
    #[error("bad-txns-issue-qualifier-burn-not-found")]
    QualifierBurnNotFound,
    #[error("bad-txns-issue-sub-qualifier-parent-outpoint-not-found")]
    SubQualifierParentOutpointNotFound,
    #[error("bad-txns-issue-qualifier-from-transaction")]
    QualifierFromTransaction,
    #[error("bad-txns-issue-qualifier-before-it-is-active")]
    IssueQualifierBeforeActive,

    // Restricted issuance shape.
    #[error("bad-txns-issue-restricted-vout-size-to-small")]
    RestrictedVoutSizeTooSmall,
    #[error("bad-txns-issue-restricted-data-not-found")]
    RestrictedDataNotFound,
    #[error("bad-txns-issue-restricted-serialization-failed")]
    RestrictedSerializationFailed,
    #[error("bad-txns-issue-restricted-serialzation-failed")]
    RestrictedSerializationFailedContextual,
    #[error("bad-txns-issue-restricted-burn-not-found")]
    RestrictedBurnNotFound,
    #[error("bad-txns-issue-restricted-root-owner-token-outpoint-not-found")]
    RestrictedRootOwnerTokenOutpointNotFound,
    #[error("bad-txns-issue-restricted-from-transaction")]
    RestrictedFromTransaction,
    #[error("bad-txns-issue-restricted-before-it-is-active")]
    IssueRestrictedBeforeActive,

    // Reissue shape and context.
    #[error("bad-txns-vout-size-to-small")]
    VoutSizeTooSmall,
    #[error("bad-txns-failed-reissue-token-formatting-check")]
    FailedReissueFormattingCheck,
    #[error("bad-txns-reissue-data-not-found")]
    ReissueDataNotFound,
    #[error("bad-txns-reissue-serialization-failed")]
    ReissueSerializationFailed,
    #[error("bad-txns-reissue-serialzation-failed")]
    ReissueSerializationFailedContextual,
    #[error("bad-txns-reissue-owner-outpoint-not-found")]
    ReissueOwnerOutpointNotFound,
    #[error("bad-txns-reissue-burn-outpoint-not-found")]
    ReissueBurnOutpointNotFound,
    #[error("bad-txns-reissue-token")]
    ReissueTokenFromTransaction,
    #[error("bad-txns-reissue-token-contextual-check")]
    ReissueContextualCheck,
    #[error("bad-tx-reissue-chaining-not-allowed")]
    ReissueChainingNotAllowed,
    #[error("bad-tx-token-reissue-bad-deserialize")]
    TokenReissueBadDeserialize,

    // Transfers.
    #[error("bad-txns-transfer-token-bad-deserialize")]
    TransferBadDeserialize,
    #[error("bad-tx-token-transfer-bad-deserialize")]
    TxTransferBadDeserialize,
    #[error("bad-txns-transfer-token-name-invalid")]
    TransferTokenNameInvalid,
    #[error("bad-txns-transfer-owner-amount-was-not-1")]
    TransferOwnerAmountWasNotOne,
    #[error("bad-txns-transfer-unique-amount-was-not-1")]
    TransferUniqueAmountWasNotOne,
    #[error("bad-txns-transfer-qualifier-amount-must be between 1 - 100")]
    TransferQualifierAmountOutOfRange,
    #[error("bad-txns-transfer-token-not-exist")]
    TransferTokenNotExist,
    #[error("bad-txns-token-database-corrupted")]
    TokenDatabaseCorrupted,
    #[error("bad-txns-transfer-token-amount-not-match-units")]
    TransferAmountNotMatchUnits,
    #[error("bad-txns-transfer-msgchannel-before-messaging-is-active")]
    TransferMsgChannelBeforeMessagingActive,
    #[error("bad-txns-transfer-restricted-before-it-is-active")]
    TransferRestrictedBeforeActive,
    #[error("bad-txns-transfer-restricted-token-that-is-globally-restricted")]
    TransferRestrictedGloballyFrozen,
    #[error("bad-txns-transfer-qualifier-before-it-is-active")]
    TransferQualifierBeforeActive,
    #[error("bad-txns-restricted-token-transfer-from-frozen-address")]
    RestrictedTransferFromFrozenAddress,
    #[error("bad-txns-premature-spend-timelockTried to spend token before {0}")]
    PrematureSpendTimelock(u32),
    #[error("bad-txns-token-transfer-amount-isn't-zero")]
    TokenTransferAmountNotZero,
    #[error("bad-txns-token-issued-amount-isn't-zero")]
    TokenIssuedAmountNotZero,
    #[error("bad-txns-token-reissued-amount-isn't-zero")]
    TokenReissuedAmountNotZero,
    #[error("bad-tx-token-royalty-missing")]
    RoyaltyMissing,

    // Null data scripts.
    #[error("bad-txns-null-token-data-serialization")]
    NullTokenDataSerialization,
    #[error("bad-txns-null-global-token-data-serialization")]
    NullGlobalTokenDataSerialization,
    #[error("bad-txns-null-data-flag-must-be-0-or-1")]
    NullDataFlagMustBeZeroOrOne,
    #[error("bad-txns-null-data-only-one-change-per-token-address")]
    NullDataOneChangePerTokenAddress,
    #[error("bad-txns-null-data-only-one-global-change-per-token-name")]
    NullDataOneGlobalChangePerName,
    #[error("bad-txns-null-data-only-one-verifier-per-tx")]
    NullDataOneVerifierPerTx,
    #[error("bad-txns-null-token-data-on-non-restricted-or-qualifier-token")]
    NullDataOnNonRestrictedOrQualifier,
    #[error("bad-txns-null-data-add-qualifier-when-already-assigned")]
    AddQualifierAlreadyAssigned,
    #[error("bad-txns-null-data-removing-qualifier-when-not-assigned")]
    RemoveQualifierNotAssigned,
    #[error("bad-txns-null-data-freeze-address-when-already-frozen")]
    FreezeAddressAlreadyFrozen,
    #[error("bad-txns-null-data-unfreeze-address-when-not-frozen")]
    UnfreezeAddressNotFrozen,
    #[error("bad-txns-null-data-global-freeze-when-already-frozen")]
    GlobalFreezeAlreadyFrozen,
    #[error("bad-txns-null-data-global-unfreeze-when-not-frozen")]
    GlobalUnfreezeNotFrozen,
    #[error("bad-tx-null-token-data-before-restricted-tokens-activated")]
    NullDataBeforeRestrictedActive,
    #[error("bad-tx-null-token-data-unknown-type")]
    NullDataUnknownType,
    #[error("bad-txns-tx-contains-restricted-token-null-tx-without-token-transfer")]
    RestrictedNullTxWithoutTransfer,
    #[error("bad-txns-tx-contains-qualifier-token-null-tx-without-token-transfer")]
    QualifierNullTxWithoutTransfer,
    #[error("bad-txns-tx-contains-global-token-null-tx-with-null-token-name")]
    GlobalNullTxWithNullName,
    #[error("bad-txns-tx-contains-global-token-null-tx-without-token-transfer")]
    GlobalNullTxWithoutTransfer,
    #[error("bad-txns-tx-doesn't-contain-required-burn-fee-for-adding-tags")]
    MissingTagBurnFee,

    // Verifier strings.
    #[error("bad-txns-null-verifier-data-serialization")]
    NullVerifierDataSerialization,
    #[error("bad-txns-null-verifier-data-contained-whitespaces")]
    VerifierStringWhitespace,
    #[error("bad-txns-null-verifier-data-contained-qualifier-character-#")]
    VerifierStringQualifierChar,
    #[error("bad-txns-null-verifier-empty")]
    NullVerifierEmpty,
    #[error("bad-txns-null-verifier-length-greater-than-max-length")]
    NullVerifierTooLong,
    #[error("bad-txns-null-verifier-invalid-token-name-{0}")]
    NullVerifierInvalidTokenName(String),
    #[error("bad-txns-null-verifier-failed-syntax-check")]
    NullVerifierFailedSyntaxCheck,
    #[error("bad-txns-null-verifier-contains-non-issued-qualifier")]
    NullVerifierNonIssuedQualifier,
    #[error("bad-txns-null-verifier-address-failed-verification")]
    NullVerifierAddressFailedVerification,
    #[error("bad-txns-null-verifier-failed-contexual-syntax-check")]
    NullVerifierFailedContextualSyntaxCheck,
    #[error(
        "bad-txns-tx-cointains-verifier-string-without-restricted-token-issuance-or-reissuance"
    )]
    VerifierWithoutRestrictedIssuance,
    #[error("bad-txns-tx-cointains-restricted-token-issuance-without-verifier")]
    RestrictedIssuanceWithoutVerifier,

    // Whole-transaction checks.
    #[error("bad-txns-is-token-and-token-not-active")]
    IsTokenAndTokenNotActive,
    #[error("bad-txns-bad-token-transaction")]
    BadTokenTransaction,
    #[error("bad-txns-bad-token-script")]
    BadTokenScript,
    #[error("bad-txns-op-token-not-in-right-script-location")]
    TokenOpNotInRightScriptLocation,
    #[error("bad-txns-coinbase-contains-token-txes")]
    CoinbaseContainsTokenTxes,
    #[error("bad-txns-inputs-missing-or-spent")]
    InputsMissingOrSpent,
    #[error("bad-txns-failed-to-get-token-from-script")]
    FailedToGetTokenFromScript,
    #[error(
        "bad-tx-inputs-outputs-mismatch Bad Transaction - Trying to create outpoint for token \
         that you don't have: {0}"
    )]
    OutputsWithoutInputs(String),
    #[error("bad-tx-inputs-outputs-mismatch Bad Transaction - Tokens would be burnt {0}")]
    TokensWouldBeBurnt(String),
    #[error("bad-tx-token-inputs-size-does-not-match-outputs-size")]
    TokenInputsSizeMismatch,
    #[error("bad-token-type-not-any-of-the-main-three")]
    BadTokenTypeNotAnyOfMainThree,

    // Failures of an inner check embedded in a kind-specific code. The
    // payload is usually a `Param` message but can itself be a rejection
    // code, matching how the historical strings concatenate.
    #[error("bad-txns-issue-unique{0}")]
    IssueUnique(Box<TokenError>),
    #[error("bad-txns-issue-msgchannel{0}")]
    IssueMsgChannel(Box<TokenError>),
    #[error("bad-txns-issue-qualfier{0}")]
    IssueQualifier(Box<TokenError>),
    #[error("bad-txns-issue-restricted{0}")]
    IssueRestricted(Box<TokenError>),
    #[error("bad-txns-issue-unique-contextual-{0}")]
    IssueUniqueContextual(Box<TokenError>),
    #[error("bad-txns-issue-msgchannel-contextual-{0}")]
    IssueMsgChannelContextual(Box<TokenError>),
    #[error("bad-txns-issue-qualfier-contextual{0}")]
    IssueQualifierContextual(Box<TokenError>),
    #[error("bad-txns-issue-restricted-contextual{0}")]
    IssueRestrictedContextual(Box<TokenError>),
    #[error("bad-txns-reissue-contextual-{0}")]
    ReissueContextual(Box<TokenError>),
    #[error("bad-txns-issue-restricted-verifier-search-{0}")]
    RestrictedVerifierSearch(Box<TokenError>),
    #[error("bad-txns-reissue-restricted-verifier-{0}")]
    ReissueRestrictedVerifier(Box<TokenError>),
}

impl TokenError {
    /// The stable rejection code string.
    pub fn code(&self) -> String {
        self.to_string()
    }
}

impl From<ParamError> for TokenError {
    fn from(err: ParamError) -> Self {
        TokenError::Param(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render_verbatim() {
        assert_eq!(
            TokenError::RestrictedRootOwnerTokenOutpointNotFound.code(),
            "bad-txns-issue-restricted-root-owner-token-outpoint-not-found"
        );
        assert_eq!(
            TokenError::NullVerifierInvalidTokenName("KYC".into()).code(),
            "bad-txns-null-verifier-invalid-token-name-KYC"
        );
        assert_eq!(
            TokenError::OutputsWithoutInputs("TOKEN".into()).code(),
            "bad-tx-inputs-outputs-mismatch Bad Transaction - Trying to create outpoint for \
             token that you don't have: TOKEN"
        );
        // Historical spellings are part of the contract.
        assert_eq!(
            TokenError::IssueSerializationFailed.code(),
            "bad-txns-issue-serialzation-failed"
        );
        assert_eq!(
            TokenError::RestrictedIssuanceWithoutVerifier.code(),
            "bad-txns-tx-cointains-restricted-token-issuance-without-verifier"
        );
    }

    #[test]
    fn contextual_codes_embed_the_detail() {
        let err = TokenError::ReissueContextual(Box::new(ParamError::ReissueNotReissuable.into()));
        assert_eq!(
            err.code(),
            "bad-txns-reissue-contextual-Unable to reissue token: reissuable is set to false"
        );
        let err =
            TokenError::IssueRestrictedContextual(Box::new(ParamError::TokensNotActive.into()));
        assert_eq!(
            err.code(),
            "bad-txns-issue-restricted-contextualbad-txns-new-token-when-tokens-is-not-active"
        );
        // A rejection code can also be the embedded detail.
        let err = TokenError::ReissueContextual(Box::new(
            TokenError::NullVerifierAddressFailedVerification,
        ));
        assert_eq!(
            err.code(),
            "bad-txns-reissue-contextual-bad-txns-null-verifier-address-failed-verification"
        );
    }
}
