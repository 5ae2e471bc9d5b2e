//! Weighted product invariant math, following Balancer's `WeightedMath`
//! library. Original contract code:
//! https://github.com/balancer-labs/balancer-v2-monorepo/blob/master/pkg/pool-weighted/contracts/WeightedMath.sol
//!
//! All balances and amounts are upscaled 18 decimal values. Every rounding
//! choice favors the pool.

use {
    super::{
        error::Error,
        fixed_point::{Bfp, MIN_POW_BASE_FREE_EXPONENT},
    },
    primitive_types::U256,
    std::sync::LazyLock,
};

// https://github.com/balancer-labs/balancer-v2-monorepo/blob/6c9e24e22d0c46cca6dd15861d3d33da61a60b98/pkg/pool-weighted/contracts/WeightedMath.sol#L36-L37
static MAX_IN_RATIO: LazyLock<Bfp> =
    LazyLock::new(|| Bfp::from_wei(U256::exp10(17).saturating_mul(3_u32.into())));
static MAX_OUT_RATIO: LazyLock<Bfp> =
    LazyLock::new(|| Bfp::from_wei(U256::exp10(17).saturating_mul(3_u32.into())));

/// Bounds on how much a single token join or exit may move the invariant.
static MAX_INVARIANT_RATIO: LazyLock<Bfp> =
    LazyLock::new(|| Bfp::from_wei(U256::exp10(18).saturating_mul(3_u32.into())));
static MIN_INVARIANT_RATIO: LazyLock<Bfp> =
    LazyLock::new(|| Bfp::from_wei(U256::exp10(17).saturating_mul(7_u32.into())));

/// Smallest normalized weight a token may have, 1%.
pub static MIN_WEIGHT: LazyLock<Bfp> = LazyLock::new(|| Bfp::from_wei(U256::exp10(16)));

/// Product of `balance_i ^ weight_i`, rounded down.
pub fn calculate_invariant(normalized_weights: &[Bfp], balances: &[Bfp]) -> Result<Bfp, Error> {
    if normalized_weights.len() != balances.len() {
        return Err(Error::InputLengthMismatch);
    }

    let mut invariant = Bfp::one();
    for (weight, balance) in normalized_weights.iter().zip(balances) {
        invariant = invariant.mul_down(balance.pow_down(*weight)?)?;
    }

    if invariant.is_zero() {
        return Err(Error::ZeroInvariant);
    }
    Ok(invariant)
}

/// Amount of the out token a swap of `amount_in` yields. Rounds down.
pub fn calc_out_given_in(
    balance_in: Bfp,
    weight_in: Bfp,
    balance_out: Bfp,
    weight_out: Bfp,
    amount_in: Bfp,
) -> Result<Bfp, Error> {
    if amount_in > balance_in.mul_down(*MAX_IN_RATIO)? {
        return Err(Error::MaxInRatio);
    }

    // The base is rounded up so the power, and with it the complement, errs
    // towards a smaller output.
    let denominator = balance_in.add(amount_in)?;
    let base = balance_in.div_up(denominator)?;
    let exponent = weight_in.div_down(weight_out)?;
    let power = base.pow_up(exponent)?;

    balance_out.mul_down(power.complement())
}

/// Amount of the in token required to receive `amount_out`. Rounds up.
pub fn calc_in_given_out(
    balance_in: Bfp,
    weight_in: Bfp,
    balance_out: Bfp,
    weight_out: Bfp,
    amount_out: Bfp,
) -> Result<Bfp, Error> {
    if amount_out >= balance_out {
        return Err(Error::OutOfBounds);
    }
    if amount_out > balance_out.mul_down(*MAX_OUT_RATIO)? {
        return Err(Error::MaxOutRatio);
    }

    let base = balance_out.div_up(balance_out.sub(amount_out)?)?;
    let exponent = weight_out.div_up(weight_in)?;
    let power = base.pow_up(exponent)?;

    let ratio = power.sub(Bfp::one())?;
    balance_in.mul_up(ratio)
}

/// BPT minted for depositing `amounts_in`. Tokens deposited above the
/// weighted average ratio pay the swap fee on the excess.
pub fn calc_bpt_out_given_exact_tokens_in(
    balances: &[Bfp],
    normalized_weights: &[Bfp],
    amounts_in: &[Bfp],
    bpt_total_supply: Bfp,
    swap_fee_percentage: Bfp,
) -> Result<Bfp, Error> {
    check_lengths(balances, normalized_weights, amounts_in)?;

    let mut balance_ratios_with_fee = Vec::with_capacity(amounts_in.len());
    let mut invariant_ratio_with_fees = Bfp::zero();
    for ((balance, weight), amount_in) in balances.iter().zip(normalized_weights).zip(amounts_in) {
        let ratio = balance.add(*amount_in)?.div_down(*balance)?;
        invariant_ratio_with_fees = invariant_ratio_with_fees.add(ratio.mul_down(*weight)?)?;
        balance_ratios_with_fee.push(ratio);
    }

    let mut invariant_ratio = Bfp::one();
    for (i, ((balance, weight), amount_in)) in balances
        .iter()
        .zip(normalized_weights)
        .zip(amounts_in)
        .enumerate()
    {
        let amount_in_without_fee = if balance_ratios_with_fee[i] > invariant_ratio_with_fees {
            let non_taxable_amount =
                balance.mul_down(invariant_ratio_with_fees.sub(Bfp::one())?)?;
            let taxable_amount = amount_in.sub(non_taxable_amount)?;
            let swap_fee = taxable_amount.mul_up(swap_fee_percentage)?;
            non_taxable_amount.add(taxable_amount.sub(swap_fee)?)?
        } else {
            *amount_in
        };

        let balance_ratio = balance.add(amount_in_without_fee)?.div_down(*balance)?;
        invariant_ratio = invariant_ratio.mul_down(balance_ratio.pow_down(*weight)?)?;
    }

    if invariant_ratio > Bfp::one() {
        bpt_total_supply.mul_down(invariant_ratio.sub(Bfp::one())?)
    } else {
        Ok(Bfp::zero())
    }
}

/// Amount of a single token required to mint exactly `bpt_amount_out`.
/// Rounds up.
pub fn calc_token_in_given_exact_bpt_out(
    balance: Bfp,
    normalized_weight: Bfp,
    bpt_amount_out: Bfp,
    bpt_total_supply: Bfp,
    swap_fee_percentage: Bfp,
) -> Result<Bfp, Error> {
    let invariant_ratio = bpt_total_supply
        .add(bpt_amount_out)?
        .div_up(bpt_total_supply)?;
    if invariant_ratio > *MAX_INVARIANT_RATIO {
        return Err(Error::MaxOutBptForTokenIn);
    }

    let balance_ratio = invariant_ratio.pow_up(Bfp::one().div_up(normalized_weight)?)?;
    let amount_in_without_fee = balance.mul_up(balance_ratio.sub(Bfp::one())?)?;

    // Only the part of the deposit that is not proportional to the pool pays
    // the swap fee.
    let taxable_amount = amount_in_without_fee.mul_up(normalized_weight.complement())?;
    let non_taxable_amount = amount_in_without_fee.sub(taxable_amount)?;
    let taxable_amount_plus_fees = taxable_amount.div_up(swap_fee_percentage.complement())?;

    non_taxable_amount.add(taxable_amount_plus_fees)
}

/// Amounts of every token required to mint exactly `bpt_amount_out`
/// proportionally. Rounds up.
pub fn calc_all_tokens_in_given_exact_bpt_out(
    balances: &[Bfp],
    bpt_amount_out: Bfp,
    total_bpt: Bfp,
) -> Result<Vec<Bfp>, Error> {
    let bpt_ratio = bpt_amount_out.div_up(total_bpt)?;
    balances
        .iter()
        .map(|balance| balance.mul_up(bpt_ratio))
        .collect()
}

/// BPT burnt to withdraw `amounts_out`. Tokens withdrawn above the weighted
/// average ratio pay the swap fee on the excess. Rounds up.
pub fn calc_bpt_in_given_exact_tokens_out(
    balances: &[Bfp],
    normalized_weights: &[Bfp],
    amounts_out: &[Bfp],
    bpt_total_supply: Bfp,
    swap_fee_percentage: Bfp,
) -> Result<Bfp, Error> {
    check_lengths(balances, normalized_weights, amounts_out)?;
    if balances
        .iter()
        .zip(amounts_out)
        .any(|(balance, amount_out)| amount_out >= balance)
    {
        return Err(Error::OutOfBounds);
    }

    let mut balance_ratios_without_fee = Vec::with_capacity(amounts_out.len());
    let mut invariant_ratio_without_fees = Bfp::zero();
    for ((balance, weight), amount_out) in
        balances.iter().zip(normalized_weights).zip(amounts_out)
    {
        let ratio = balance.sub(*amount_out)?.div_up(*balance)?;
        invariant_ratio_without_fees = invariant_ratio_without_fees.add(ratio.mul_up(*weight)?)?;
        balance_ratios_without_fee.push(ratio);
    }

    let mut invariant_ratio = Bfp::one();
    for (i, ((balance, weight), amount_out)) in balances
        .iter()
        .zip(normalized_weights)
        .zip(amounts_out)
        .enumerate()
    {
        let amount_out_with_fee = if invariant_ratio_without_fees > balance_ratios_without_fee[i]
        {
            let non_taxable_amount = balance.mul_down(invariant_ratio_without_fees.complement())?;
            let taxable_amount = amount_out.sub(non_taxable_amount)?;
            let taxable_amount_plus_fees =
                taxable_amount.div_up(swap_fee_percentage.complement())?;
            non_taxable_amount.add(taxable_amount_plus_fees)?
        } else {
            *amount_out
        };

        let balance_ratio = balance.sub(amount_out_with_fee)?.div_down(*balance)?;
        invariant_ratio = invariant_ratio.mul_down(balance_ratio.pow_down(*weight)?)?;
    }

    bpt_total_supply.mul_up(invariant_ratio.complement())
}

/// Amount of a single token paid out for burning exactly `bpt_amount_in`.
/// Rounds down.
pub fn calc_token_out_given_exact_bpt_in(
    balance: Bfp,
    normalized_weight: Bfp,
    bpt_amount_in: Bfp,
    bpt_total_supply: Bfp,
    swap_fee_percentage: Bfp,
) -> Result<Bfp, Error> {
    if bpt_amount_in > bpt_total_supply {
        return Err(Error::OutOfBounds);
    }
    let invariant_ratio = bpt_total_supply
        .sub(bpt_amount_in)?
        .div_up(bpt_total_supply)?;
    if invariant_ratio < *MIN_INVARIANT_RATIO {
        return Err(Error::MinBptInForTokenOut);
    }

    let balance_ratio = invariant_ratio.pow_up(Bfp::one().div_down(normalized_weight)?)?;
    let amount_out_without_fee = balance.mul_down(balance_ratio.complement())?;

    let taxable_amount = amount_out_without_fee.mul_up(normalized_weight.complement())?;
    let non_taxable_amount = amount_out_without_fee.sub(taxable_amount)?;
    let taxable_amount_minus_fees = taxable_amount.mul_down(swap_fee_percentage.complement())?;

    non_taxable_amount.add(taxable_amount_minus_fees)
}

/// Amounts of every token paid out for burning exactly `bpt_amount_in`
/// proportionally. Rounds down.
pub fn calc_tokens_out_given_exact_bpt_in(
    balances: &[Bfp],
    bpt_amount_in: Bfp,
    total_bpt: Bfp,
) -> Result<Vec<Bfp>, Error> {
    let bpt_ratio = bpt_amount_in.div_down(total_bpt)?;
    balances
        .iter()
        .map(|balance| balance.mul_down(bpt_ratio))
        .collect()
}

/// Protocol fee owed in a single token for the invariant growth from
/// `previous_invariant` to `current_invariant`. Rounds down.
pub fn calc_due_token_protocol_swap_fee_amount(
    balance: Bfp,
    normalized_weight: Bfp,
    previous_invariant: Bfp,
    current_invariant: Bfp,
    protocol_swap_fee_percentage: Bfp,
) -> Result<Bfp, Error> {
    if current_invariant <= previous_invariant {
        return Ok(Bfp::zero());
    }

    // The base is clamped so that `pow_up` stays accurate. Growth this large
    // only happens in pathological states, where undercharging is acceptable.
    let base = previous_invariant
        .div_up(current_invariant)?
        .max(*MIN_POW_BASE_FREE_EXPONENT);
    let exponent = Bfp::one().div_down(normalized_weight)?;

    let power = base.pow_up(exponent)?;
    let token_accrued_fees = balance.mul_down(power.complement())?;

    token_accrued_fees.mul_down(protocol_swap_fee_percentage)
}

fn check_lengths(balances: &[Bfp], weights: &[Bfp], amounts: &[Bfp]) -> Result<(), Error> {
    if balances.len() != weights.len() || balances.len() != amounts.len() {
        return Err(Error::InputLengthMismatch);
    }
    Ok(())
}
