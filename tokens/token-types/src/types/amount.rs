//! Token amounts in the chain's smallest indivisible unit.

use crate::serial::{Deserial, DeserialResult, Serial};
use std::io::{Read, Write};

/// Number of base units in one whole coin.
pub const COIN: i64 = 100_000_000;

/// A token amount in base units. Signed because the wire format is signed;
/// consensus rules reject negative amounts everywhere they can appear.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub struct TokenAmount(pub i64);

/// Fixed amount held by every owner token.
pub const OWNER_TOKEN_AMOUNT: TokenAmount = TokenAmount(COIN);

/// Fixed amount carried by every unique token.
pub const UNIQUE_TOKEN_AMOUNT: TokenAmount = TokenAmount(COIN);

/// Unique and message-channel tokens are indivisible.
pub const UNIQUE_TOKEN_UNITS: i8 = 0;

/// Qualifier tokens are indivisible.
pub const QUALIFIER_TOKEN_UNITS: i8 = 0;

/// Smallest allowed qualifier issuance amount.
pub const QUALIFIER_TOKEN_MIN_AMOUNT: TokenAmount = TokenAmount(COIN);

/// Largest allowed qualifier issuance amount.
pub const QUALIFIER_TOKEN_MAX_AMOUNT: TokenAmount = TokenAmount(10 * COIN);

/// Largest unit selection a token can have.
pub const MAX_UNIT: i8 = 8;

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    /// Upper bound on any token supply.
    pub const MAX_MONEY: Self = Self(21_000_000_000 * COIN);

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Whether the amount respects the divisibility implied by the unit
    /// selection: with `units` decimal places exposed, the amount must be a
    /// multiple of `10^(8 - units)` base units.
    pub fn matches_units(self, units: i8) -> bool {
        if !(0..=MAX_UNIT).contains(&units) {
            return false;
        }
        let divisor = 10_i64.pow((MAX_UNIT - units) as u32);
        self.0 % divisor == 0
    }
}

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Serial for TokenAmount {
    fn serial<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        self.0.serial(out)
    }
}

impl Deserial for TokenAmount {
    fn deserial<R: Read>(source: &mut R) -> DeserialResult<Self> {
        Ok(Self(i64::deserial(source)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_divisibility() {
        // 8 units: every amount is fine.
        assert!(TokenAmount(1).matches_units(8));
        // 0 units: whole coins only.
        assert!(TokenAmount(COIN).matches_units(0));
        assert!(!TokenAmount(COIN + 1).matches_units(0));
        // 2 units: multiples of 10^6.
        assert!(TokenAmount(25_000_000).matches_units(2));
        assert!(!TokenAmount(25_000_001).matches_units(2));
        // Out-of-range unit selections never match.
        assert!(!TokenAmount(COIN).matches_units(9));
        assert!(!TokenAmount(COIN).matches_units(-1));
    }

    #[test]
    fn max_money_fits_i64() {
        assert!(TokenAmount::MAX_MONEY.0 > 0);
        assert!(TokenAmount::MAX_MONEY.checked_add(TokenAmount(1)).is_some());
    }
}
