//! Chain-level configuration for the token overlay: burn requirements per
//! issuance kind, feature activation, reserved root names and optional
//! per-address indexing.

use serde::{Deserialize, Serialize};
use token_types::types::amount::COIN;
use token_types::{KnownTokenType, TokenAmount};

/// Which token features are active at the point of validation. In the full
/// node these are derived from deployment state at a given height; here the
/// caller resolves them before validating.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Base token issuance and transfer.
    pub tokens: bool,
    /// Message channels and txid content hashes.
    pub messaging: bool,
    /// Restricted tokens, qualifiers and freezing.
    pub restricted: bool,
}

impl FeatureFlags {
    pub fn all() -> Self {
        Self { tokens: true, messaging: true, restricted: true }
    }
}

/// Burn requirement for one issuance kind: the exact amount that must be
/// paid to the designated address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnRequirement {
    pub address: String,
    pub amount: i64,
}

/// Static parameters of the chain the ledger runs on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainParams {
    pub issue_burn: BurnRequirement,
    pub issue_sub_burn: BurnRequirement,
    pub issue_unique_burn: BurnRequirement,
    pub issue_msg_channel_burn: BurnRequirement,
    pub issue_qualifier_burn: BurnRequirement,
    pub issue_sub_qualifier_burn: BurnRequirement,
    pub issue_restricted_burn: BurnRequirement,
    pub reissue_burn: BurnRequirement,
    /// Fee for tagging an address with a qualifier through a null data
    /// output.
    pub add_qualifier_tag_burn: BurnRequirement,
    /// Address whose balance records globally burnt tokens.
    pub global_burn_address: String,
    /// Root names that may not be issued.
    pub reserved_names: Vec<String>,
    /// Maintain the per-address balance index.
    pub token_index: bool,
    /// Seconds-vs-height threshold when interpreting transfer time locks.
    pub lock_time_threshold: u32,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            issue_burn: BurnRequirement { address: String::new(), amount: 500 * COIN },
            issue_sub_burn: BurnRequirement { address: String::new(), amount: 100 * COIN },
            issue_unique_burn: BurnRequirement { address: String::new(), amount: 5 * COIN },
            issue_msg_channel_burn: BurnRequirement { address: String::new(), amount: 100 * COIN },
            issue_qualifier_burn: BurnRequirement { address: String::new(), amount: 1000 * COIN },
            issue_sub_qualifier_burn: BurnRequirement {
                address: String::new(),
                amount: 100 * COIN,
            },
            issue_restricted_burn: BurnRequirement { address: String::new(), amount: 1500 * COIN },
            reissue_burn: BurnRequirement { address: String::new(), amount: 100 * COIN },
            add_qualifier_tag_burn: BurnRequirement { address: String::new(), amount: COIN / 10 },
            global_burn_address: String::new(),
            reserved_names: Vec::new(),
            token_index: false,
            lock_time_threshold: 500_000_000,
        }
    }
}

impl ChainParams {
    /// Burn requirement for issuing one token of the given kind. Owner and
    /// vote outputs ride along with their root issuance and burn nothing.
    pub fn burn_requirement(&self, kind: KnownTokenType) -> Option<&BurnRequirement> {
        match kind {
            KnownTokenType::Root => Some(&self.issue_burn),
            KnownTokenType::Sub => Some(&self.issue_sub_burn),
            KnownTokenType::Unique => Some(&self.issue_unique_burn),
            KnownTokenType::MsgChannel => Some(&self.issue_msg_channel_burn),
            KnownTokenType::Qualifier => Some(&self.issue_qualifier_burn),
            KnownTokenType::SubQualifier => Some(&self.issue_sub_qualifier_burn),
            KnownTokenType::Restricted => Some(&self.issue_restricted_burn),
            KnownTokenType::Owner | KnownTokenType::Vote => None,
        }
    }

    /// Whether an output pays exactly the burn required for `count` issuances
    /// of the given kind to the right address.
    pub fn satisfies_issue_burn(
        &self,
        kind: KnownTokenType,
        count: i64,
        address: &str,
        value: i64,
    ) -> bool {
        match self.burn_requirement(kind) {
            Some(req) => value == req.amount * count && address == req.address,
            None => false,
        }
    }

    /// Whether an output pays exactly the reissue burn to the reissue burn
    /// address.
    pub fn satisfies_reissue_burn(&self, address: &str, value: i64) -> bool {
        value == self.reissue_burn.amount && address == self.reissue_burn.address
    }

    /// Whether an output pays the tag fee for `count` qualifier tag
    /// additions.
    pub fn satisfies_tag_burn(&self, count: i64, address: &str, value: i64) -> bool {
        value >= self.add_qualifier_tag_burn.amount * count
            && address == self.add_qualifier_tag_burn.address
    }

    pub fn is_burn_address(&self, address: &str) -> bool {
        !address.is_empty()
            && (address == self.issue_burn.address
                || address == self.issue_sub_burn.address
                || address == self.issue_unique_burn.address
                || address == self.issue_msg_channel_burn.address
                || address == self.issue_qualifier_burn.address
                || address == self.issue_sub_qualifier_burn.address
                || address == self.issue_restricted_burn.address
                || address == self.reissue_burn.address
                || address == self.add_qualifier_tag_burn.address
                || address == self.global_burn_address)
    }

    pub fn amount_of(&self, kind: KnownTokenType) -> TokenAmount {
        self.burn_requirement(kind).map(|r| TokenAmount(r.amount)).unwrap_or(TokenAmount::ZERO)
    }
}
