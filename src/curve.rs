//! Constant-product bonding-curve pricing
//!
//! The curve keeps `sol_reserve * token_reserve` invariant across a trade.
//! All arithmetic is done in `u128` so the invariant never overflows for
//! real reserve sizes. The post-trade token reserve is truncated toward
//! zero, so a quote can exceed the exact real-valued output by less than one
//! base unit.
//!
//! Pricing is pure. Chaining several buys against one curve requires the
//! caller to advance the reserves between quotes, which
//! [`BondingCurveState::estimated_advance`] does explicitly. That advance is
//! an estimate derived locally, not a fresh on-chain read.

use borsh::BorshDeserialize;
use solana_sdk::pubkey::Pubkey;

use crate::constants::{
    BONDING_CURVE_DISCRIMINATOR, INITIAL_VIRTUAL_SOL_RESERVES, INITIAL_VIRTUAL_TOKEN_RESERVES,
};

/// Tokens received for `sol_in` lamports against the given virtual reserves.
///
/// Returns 0 when `sol_in` is 0 or either reserve is 0. The result is always
/// strictly below `token_reserve` when the reserve is non-zero.
pub fn token_out(sol_reserve: u64, token_reserve: u64, sol_in: u64) -> u64 {
    if sol_in == 0 || sol_reserve == 0 || token_reserve == 0 {
        return 0;
    }

    let invariant = sol_reserve as u128 * token_reserve as u128;
    let new_sol_reserve = sol_reserve as u128 + sol_in as u128;
    // Floor division can reach zero for dust reserves; keep one unit on the curve.
    let new_token_reserve = (invariant / new_sol_reserve).max(1);

    (token_reserve as u128 - new_token_reserve) as u64
}

/// Lamports needed to receive at least `tokens` from the given reserves.
///
/// Rounds up so the returned amount is always sufficient. Returns `None` when
/// the request cannot be satisfied (zero reserve or `tokens >= token_reserve`).
pub fn sol_in_for_tokens(sol_reserve: u64, token_reserve: u64, tokens: u64) -> Option<u64> {
    if sol_reserve == 0 || token_reserve == 0 || tokens >= token_reserve {
        return None;
    }
    if tokens == 0 {
        return Some(0);
    }

    let invariant = sol_reserve as u128 * token_reserve as u128;
    let new_token_reserve = (token_reserve - tokens) as u128;
    let new_sol_reserve = invariant.div_ceil(new_token_reserve);
    let sol_in = new_sol_reserve - sol_reserve as u128;

    u64::try_from(sol_in).ok()
}

/// Virtual reserves of one bonding curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondingCurveState {
    pub virtual_sol_reserves: u64,
    pub virtual_token_reserves: u64,
}

/// A priced buy: what goes in, what is expected out, and the reserves after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyQuote {
    pub sol_in: u64,
    pub token_out: u64,
    pub after: BondingCurveState,
}

impl BondingCurveState {
    pub fn new(virtual_sol_reserves: u64, virtual_token_reserves: u64) -> Self {
        Self {
            virtual_sol_reserves,
            virtual_token_reserves,
        }
    }

    /// Reserves of a freshly created curve, before any trade.
    pub fn initial() -> Self {
        Self::new(INITIAL_VIRTUAL_SOL_RESERVES, INITIAL_VIRTUAL_TOKEN_RESERVES)
    }

    pub fn token_out(&self, sol_in: u64) -> u64 {
        token_out(self.virtual_sol_reserves, self.virtual_token_reserves, sol_in)
    }

    /// Locally estimated reserves after a buy of `sol_in` that yielded `tokens_out`.
    ///
    /// This does not consult the chain; it only compounds the previous estimate.
    pub fn estimated_advance(&self, sol_in: u64, tokens_out: u64) -> Self {
        Self {
            virtual_sol_reserves: self.virtual_sol_reserves.saturating_add(sol_in),
            virtual_token_reserves: self.virtual_token_reserves.saturating_sub(tokens_out),
        }
    }

    /// Prices a buy and returns the estimated post-trade state alongside it.
    pub fn quote_buy(&self, sol_in: u64) -> BuyQuote {
        let token_out = self.token_out(sol_in);
        BuyQuote {
            sol_in,
            token_out,
            after: self.estimated_advance(sol_in, token_out),
        }
    }
}

impl Default for BondingCurveState {
    fn default() -> Self {
        Self::initial()
    }
}

/// On-chain bonding-curve account, after the 8-byte discriminator.
#[derive(Debug, Clone, PartialEq, Eq, BorshDeserialize)]
pub struct BondingCurveAccount {
    pub virtual_token_reserves: u64,
    pub virtual_sol_reserves: u64,
    pub real_token_reserves: u64,
    pub real_sol_reserves: u64,
    pub token_total_supply: u64,
    pub complete: bool,
    creator: [u8; 32],
}

impl BondingCurveAccount {
    /// Decodes raw account data. Trailing bytes beyond the known layout are ignored.
    pub fn from_account_data(data: &[u8]) -> Result<Self, std::io::Error> {
        if data.len() < 8 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "account shorter than discriminator",
            ));
        }
        let (discriminator, mut body) = data.split_at(8);
        if discriminator != BONDING_CURVE_DISCRIMINATOR {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "not a bonding curve account",
            ));
        }
        Self::deserialize(&mut body)
    }

    pub fn creator(&self) -> Pubkey {
        Pubkey::new_from_array(self.creator)
    }

    pub fn state(&self) -> BondingCurveState {
        BondingCurveState::new(self.virtual_sol_reserves, self.virtual_token_reserves)
    }
}

/// Upper bound on lamports spent for a buy of `sol_in` under `slippage_bps`.
pub fn max_sol_cost(sol_in: u64, slippage_bps: u16) -> u64 {
    let extra = sol_in as u128 * slippage_bps as u128 / 10_000;
    sol_in.saturating_add(extra.min(u64::MAX as u128) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_vector() {
        // invariant 1_000_000_000, new sol 1100, new token 909090
        assert_eq!(token_out(1000, 1_000_000, 100), 90_910);
    }

    #[test]
    fn test_zero_inputs() {
        assert_eq!(token_out(1000, 1_000_000, 0), 0);
        assert_eq!(token_out(0, 1_000_000, 100), 0);
        assert_eq!(token_out(1000, 0, 100), 0);
        assert_eq!(token_out(0, 0, 0), 0);
    }

    #[test]
    fn test_huge_input_never_drains_curve() {
        let out = token_out(1, 1_000, u64::MAX);
        assert!(out < 1_000);
        assert_eq!(out, 999);

        let out = token_out(u64::MAX, u64::MAX, u64::MAX);
        assert!(out < u64::MAX);
    }

    #[test]
    fn test_initial_curve_small_buy() {
        let state = BondingCurveState::initial();
        let out = state.token_out(100_000);
        assert!(out > 0);
        assert!(out < state.virtual_token_reserves);
    }

    #[test]
    fn test_estimated_advance_compounds() {
        let state = BondingCurveState::new(1000, 1_000_000);
        let quote = state.quote_buy(100);
        assert_eq!(quote.after, BondingCurveState::new(1100, 909_090));

        // second buy of the same size gets fewer tokens
        let second = quote.after.quote_buy(100);
        assert!(second.token_out < quote.token_out);
    }

    #[test]
    fn test_sol_in_for_tokens_is_sufficient() {
        let sol = sol_in_for_tokens(1000, 1_000_000, 90_910).unwrap();
        assert!(token_out(1000, 1_000_000, sol) >= 90_910);
        assert_eq!(sol_in_for_tokens(1000, 1_000_000, 1_000_000), None);
        assert_eq!(sol_in_for_tokens(1000, 1_000_000, 0), Some(0));
    }

    #[test]
    fn test_bonding_curve_account_decode() {
        let creator = Pubkey::new_unique();
        let mut data = BONDING_CURVE_DISCRIMINATOR.to_vec();
        for v in [1_000u64, 30, 800, 0, 1_000_000] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.push(0);
        data.extend_from_slice(creator.as_ref());
        data.extend_from_slice(&[0u8; 16]);

        let account = BondingCurveAccount::from_account_data(&data).unwrap();
        assert_eq!(account.creator(), creator);
        assert!(!account.complete);
        assert_eq!(account.state(), BondingCurveState::new(30, 1_000));

        data[0] ^= 0xff;
        assert!(BondingCurveAccount::from_account_data(&data).is_err());
        assert!(BondingCurveAccount::from_account_data(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_max_sol_cost() {
        assert_eq!(max_sol_cost(10_000, 500), 10_500);
        assert_eq!(max_sol_cost(10_000, 0), 10_000);
        assert_eq!(max_sol_cost(u64::MAX, 10_000), u64::MAX);
    }
}
