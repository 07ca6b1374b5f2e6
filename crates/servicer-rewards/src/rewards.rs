// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Servicer reward formula.

use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};

use crate::error::RewardError;
use crate::types::RewardParams;

/// Root taken of the stake bin before raising it to the scaled exponent.
const EXPONENT_DENOMINATOR: i64 = 100;
/// Decimal places kept for a preweight that is not an exact power (chain `Dec` precision).
const PREWEIGHT_SCALE: u32 = 18;
const MAX_ROOT_ITERATIONS: usize = 200;

/// Parsed reward parameters.
struct Params {
    relays_to_tokens: Decimal,
    floor_multiplier: Decimal,
    exponent: Decimal,
    weight_ceiling: Decimal,
    weight_multiplier: Decimal,
    dao_allocation: Decimal,
    proposer_allocation: Decimal,
}

impl Params {
    fn parse(params: &RewardParams) -> Result<Self, RewardError> {
        let floor_multiplier = parse_param(
            "servicer_stake_floor_multipler",
            params.servicer_stake_floor_multiplier.as_deref(),
        )?;
        if floor_multiplier.is_zero() {
            return Err(RewardError::Zero("servicer_stake_floor_multipler"));
        }
        let weight_multiplier = parse_param(
            "servicer_stake_weight_multipler",
            params.servicer_stake_weight_multiplier.as_deref(),
        )?;
        if weight_multiplier.is_zero() {
            return Err(RewardError::Zero("servicer_stake_weight_multipler"));
        }

        Ok(Self {
            relays_to_tokens: parse_param(
                "relays_to_tokens_multiplier",
                params.relays_to_tokens_multiplier.as_deref(),
            )?,
            floor_multiplier,
            exponent: parse_param(
                "servicer_stake_floor_multiplier_exponent",
                params.servicer_stake_floor_multiplier_exponent.as_deref(),
            )?,
            weight_ceiling: parse_param(
                "servicer_stake_weight_ceiling",
                params.servicer_stake_weight_ceiling.as_deref(),
            )?,
            weight_multiplier,
            dao_allocation: parse_param("dao_allocation", params.dao_allocation.as_deref())?,
            proposer_allocation: parse_param(
                "proposer_allocation",
                params.proposer_allocation.as_deref(),
            )?,
        })
    }
}

fn parse_param(name: &'static str, value: Option<&str>) -> Result<Decimal, RewardError> {
    let value = value.ok_or(RewardError::MissingParam(name))?;
    parse_decimal(name, value)
}

fn parse_decimal(name: &'static str, value: &str) -> Result<Decimal, RewardError> {
    Decimal::from_str(value.trim())
        .or_else(|_| Decimal::from_scientific(value.trim()))
        .map_err(|_| RewardError::InvalidDecimal { name, value: value.to_string() })
}

/// Compute the reward of a session with `relay_count` relays served by a node staking
/// `staked_tokens`.
///
/// The stake is floored to a multiple of the floor multiplier and capped at the weight
/// ceiling, then binned and weighted by `bin^(round(exponent * 100) / 100)`. The minted coins
/// are floored, and the DAO and proposer cuts are taken out of them (floored together).
/// Returns the reward as an integer decimal string.
pub fn calculate_reward(
    relay_count: u64,
    staked_tokens: &str,
    params: &RewardParams,
) -> Result<String, RewardError> {
    let p = Params::parse(params)?;
    let stake = parse_decimal("tokens", staked_tokens)?;

    let floored_stake = (stake - stake % p.floor_multiplier)
        .min(p.weight_ceiling - p.weight_ceiling % p.floor_multiplier);
    let bin = floored_stake.checked_div(p.floor_multiplier).ok_or(RewardError::Overflow("bin"))?;

    let b = (p.exponent * Decimal::from(EXPONENT_DENOMINATOR))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(RewardError::Overflow("exponent"))?;
    let preweight = preweight(bin, b)?;

    // Multiply before dividing by the weight multiplier so integral products stay exact.
    let minted = p
        .relays_to_tokens
        .checked_mul(Decimal::from(relay_count))
        .and_then(|v| v.checked_mul(preweight))
        .ok_or(RewardError::Overflow("coins"))?;
    let coins = minted
        .checked_div(p.weight_multiplier)
        .ok_or(RewardError::Overflow("coins"))?
        .floor();

    let hundred = Decimal::ONE_HUNDRED;
    let dao_cut = coins
        .checked_mul(p.dao_allocation / hundred)
        .ok_or(RewardError::Overflow("dao allocation"))?;
    let proposer_cut = coins
        .checked_mul(p.proposer_allocation / hundred)
        .ok_or(RewardError::Overflow("proposer allocation"))?;
    let fees = (dao_cut + proposer_cut).floor();

    Ok((coins - fees).normalize().to_string())
}

/// `bin^(b / 100)`.
///
/// Whole exponents are computed as exact integer powers. Otherwise the 100th root of the bin
/// is raised to `b` and the result is kept to [PREWEIGHT_SCALE] decimal places.
fn preweight(bin: Decimal, b: i64) -> Result<Decimal, RewardError> {
    if b == 0 {
        return Ok(Decimal::ONE);
    }
    if bin.is_zero() {
        return if b > 0 { Ok(Decimal::ZERO) } else { Err(RewardError::Zero("stake bin")) };
    }
    if b % EXPONENT_DENOMINATOR == 0 {
        return bin.checked_powi(b / EXPONENT_DENOMINATOR).ok_or(RewardError::Overflow("preweight"));
    }

    let root = nth_root(bin, EXPONENT_DENOMINATOR)?;
    let weight = root.checked_powi(b).ok_or(RewardError::Overflow("preweight"))?;
    Ok(weight.round_dp(PREWEIGHT_SCALE))
}

/// Newton iteration for the positive `n`th root of a positive decimal.
fn nth_root(value: Decimal, n: i64) -> Result<Decimal, RewardError> {
    if value == Decimal::ONE {
        return Ok(Decimal::ONE);
    }
    let n_dec = Decimal::from(n);
    let n_minus_one = Decimal::from(n - 1);

    let mut x = value
        .to_f64()
        .map(|v| v.powf(1.0 / n as f64))
        .and_then(Decimal::from_f64)
        .filter(|x| x.is_sign_positive() && !x.is_zero())
        .unwrap_or(Decimal::ONE);

    for _ in 0..MAX_ROOT_ITERATIONS {
        let pow = x.checked_powi(n - 1).ok_or(RewardError::Overflow("stake root"))?;
        let quotient = value.checked_div(pow).ok_or(RewardError::Overflow("stake root"))?;
        let next = (n_minus_one * x + quotient) / n_dec;
        if next == x {
            break;
        }
        x = next;
    }
    Ok(x)
}
