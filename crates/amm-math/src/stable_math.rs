//! Amplified StableSwap invariant math, following Balancer's `StableMath`
//! library. Original contract code:
//! https://github.com/balancer-labs/balancer-v2-monorepo/blob/master/pkg/pool-stable/contracts/StableMath.sol
//!
//! Amplification parameters are precision scaled by `AMP_PRECISION`. The
//! Newton iterations run on raw integers; fee handling uses fixed point.

use {
    super::{error::Error, fixed_point::Bfp, math::BalU256},
    primitive_types::U256,
    std::sync::LazyLock,
};

pub const MIN_AMP: u64 = 1;
pub const MAX_AMP: u64 = 5000;
pub const AMP_PRECISION: u64 = 1000;
pub const MAX_STABLE_TOKENS: usize = 5;

/// Newton iterations attempted before giving up.
const MAX_ITERATIONS: usize = 255;

static AMP_PRECISION_U256: LazyLock<U256> = LazyLock::new(|| U256::from(AMP_PRECISION));

fn converged(current: U256, previous: U256) -> bool {
    if current > previous {
        current - previous <= U256::one()
    } else {
        previous - current <= U256::one()
    }
}

/// Computes the invariant `D` by Newton iteration starting from the sum of
/// balances. Rounds down. Empty pools have a zero invariant.
pub fn calculate_invariant(amplification_parameter: U256, balances: &[Bfp]) -> Result<Bfp, Error> {
    let mut sum = U256::zero();
    for balance in balances {
        sum = sum.badd(balance.as_uint256())?;
    }
    if sum.is_zero() {
        return Ok(Bfp::zero());
    }

    let num_tokens = U256::from(balances.len());
    let amp_times_total = amplification_parameter.bmul(num_tokens)?;

    let mut invariant = sum;
    for iteration in 0..MAX_ITERATIONS {
        let mut d_p = invariant;
        for balance in balances {
            d_p = d_p
                .bmul(invariant)?
                .bdiv_down(balance.as_uint256().bmul(num_tokens)?)?;
        }

        let previous_invariant = invariant;
        let numerator = amp_times_total
            .bmul(sum)?
            .bdiv_down(*AMP_PRECISION_U256)?
            .badd(d_p.bmul(num_tokens)?)?
            .bmul(invariant)?;
        let denominator = amp_times_total
            .bsub(*AMP_PRECISION_U256)?
            .bmul(invariant)?
            .bdiv_down(*AMP_PRECISION_U256)?
            .badd(num_tokens.badd(U256::one())?.bmul(d_p)?)?;
        invariant = numerator.bdiv_down(denominator)?;

        if converged(invariant, previous_invariant) {
            tracing::trace!(iterations = iteration + 1, %invariant, "stable invariant converged");
            return Ok(Bfp::from_wei(invariant));
        }
    }

    Err(Error::StableInvariantDidNotConverge)
}

/// Balance of `token_index` that, together with all other balances, yields
/// `invariant`. Rounds up.
pub fn get_token_balance_given_invariant_and_all_other_balances(
    amplification_parameter: U256,
    balances: &[Bfp],
    invariant: Bfp,
    token_index: usize,
) -> Result<Bfp, Error> {
    if token_index >= balances.len() {
        return Err(Error::OutOfBounds);
    }

    let num_tokens = U256::from(balances.len());
    let amp_times_total = amplification_parameter.bmul(num_tokens)?;
    let invariant = invariant.as_uint256();

    let mut sum = balances[0].as_uint256();
    let mut p_d = sum.bmul(num_tokens)?;
    for balance in &balances[1..] {
        p_d = p_d
            .bmul(balance.as_uint256())?
            .bmul(num_tokens)?
            .bdiv_down(invariant)?;
        sum = sum.badd(balance.as_uint256())?;
    }
    let token_balance = balances[token_index].as_uint256();
    sum = sum.bsub(token_balance)?;

    let invariant_squared = invariant.bmul(invariant)?;
    // The constant terms of the quadratic in the unknown balance.
    let c = invariant_squared
        .bdiv_up(amp_times_total.bmul(p_d)?)?
        .bmul(*AMP_PRECISION_U256)?
        .bmul(token_balance)?;
    let b = sum.badd(
        invariant
            .bdiv_down(amp_times_total)?
            .bmul(*AMP_PRECISION_U256)?,
    )?;

    let mut token_balance = invariant_squared
        .badd(c)?
        .bdiv_up(invariant.badd(b)?)?;
    for iteration in 0..MAX_ITERATIONS {
        let previous_token_balance = token_balance;
        token_balance = token_balance
            .bmul(token_balance)?
            .badd(c)?
            .bdiv_up(token_balance.bmul(U256::from(2))?.badd(b)?.bsub(invariant)?)?;

        if converged(token_balance, previous_token_balance) {
            tracing::trace!(iterations = iteration + 1, %token_balance, "stable balance converged");
            return Ok(Bfp::from_wei(token_balance));
        }
    }

    Err(Error::StableGetBalanceDidNotConverge)
}

/// Amount of the out token a swap of `token_amount_in` yields. Rounds down.
pub fn calc_out_given_in(
    amplification_parameter: U256,
    balances: &[Bfp],
    token_index_in: usize,
    token_index_out: usize,
    token_amount_in: Bfp,
    invariant: Bfp,
) -> Result<Bfp, Error> {
    check_indices(balances, token_index_in, token_index_out)?;

    let mut balances = balances.to_vec();
    balances[token_index_in] = balances[token_index_in].add(token_amount_in)?;
    let final_balance_out = get_token_balance_given_invariant_and_all_other_balances(
        amplification_parameter,
        &balances,
        invariant,
        token_index_out,
    )?;

    // One wei less than the exact delta, in favor of the pool.
    balances[token_index_out]
        .sub(final_balance_out)?
        .sub(Bfp::epsilon())
}

/// Amount of the in token required to receive `token_amount_out`. Rounds up.
pub fn calc_in_given_out(
    amplification_parameter: U256,
    balances: &[Bfp],
    token_index_in: usize,
    token_index_out: usize,
    token_amount_out: Bfp,
    invariant: Bfp,
) -> Result<Bfp, Error> {
    check_indices(balances, token_index_in, token_index_out)?;
    if token_amount_out >= balances[token_index_out] {
        return Err(Error::OutOfBounds);
    }

    let mut balances = balances.to_vec();
    balances[token_index_out] = balances[token_index_out].sub(token_amount_out)?;
    let final_balance_in = get_token_balance_given_invariant_and_all_other_balances(
        amplification_parameter,
        &balances,
        invariant,
        token_index_in,
    )?;

    final_balance_in
        .sub(balances[token_index_in])?
        .add(Bfp::epsilon())
}

/// BPT minted for depositing `amounts_in`. Tokens deposited above the
/// balance weighted average ratio pay the swap fee on the excess.
pub fn calc_bpt_out_given_exact_tokens_in(
    amplification_parameter: U256,
    balances: &[Bfp],
    amounts_in: &[Bfp],
    bpt_total_supply: Bfp,
    current_invariant: Bfp,
    swap_fee_percentage: Bfp,
) -> Result<Bfp, Error> {
    if balances.len() != amounts_in.len() {
        return Err(Error::InputLengthMismatch);
    }
    let sum_balances = sum(balances)?;

    // Stable pools have no fixed weights; each token's share of the total
    // balance takes their place.
    let mut balance_ratios_with_fee = Vec::with_capacity(balances.len());
    let mut invariant_ratio_with_fees = Bfp::zero();
    for (balance, amount_in) in balances.iter().zip(amounts_in) {
        let current_weight = balance.div_down(sum_balances)?;
        let ratio = balance.add(*amount_in)?.div_down(*balance)?;
        invariant_ratio_with_fees =
            invariant_ratio_with_fees.add(ratio.mul_down(current_weight)?)?;
        balance_ratios_with_fee.push(ratio);
    }

    let mut new_balances = Vec::with_capacity(balances.len());
    for (i, (balance, amount_in)) in balances.iter().zip(amounts_in).enumerate() {
        let amount_in_without_fee = if balance_ratios_with_fee[i] > invariant_ratio_with_fees {
            let non_taxable_amount =
                balance.mul_down(invariant_ratio_with_fees.sub(Bfp::one())?)?;
            let taxable_amount = amount_in.sub(non_taxable_amount)?;
            non_taxable_amount.add(taxable_amount.mul_down(swap_fee_percentage.complement())?)?
        } else {
            *amount_in
        };
        new_balances.push(balance.add(amount_in_without_fee)?);
    }

    let new_invariant = calculate_invariant(amplification_parameter, &new_balances)?;
    let invariant_ratio = new_invariant.div_down(current_invariant)?;
    if invariant_ratio > Bfp::one() {
        bpt_total_supply.mul_down(invariant_ratio.sub(Bfp::one())?)
    } else {
        Ok(Bfp::zero())
    }
}

/// Amount of a single token required to mint exactly `bpt_amount_out`.
/// Rounds up.
pub fn calc_token_in_given_exact_bpt_out(
    amplification_parameter: U256,
    balances: &[Bfp],
    token_index: usize,
    bpt_amount_out: Bfp,
    bpt_total_supply: Bfp,
    current_invariant: Bfp,
    swap_fee_percentage: Bfp,
) -> Result<Bfp, Error> {
    let new_invariant = bpt_total_supply
        .add(bpt_amount_out)?
        .div_up(bpt_total_supply)?
        .mul_up(current_invariant)?;
    let new_balance = get_token_balance_given_invariant_and_all_other_balances(
        amplification_parameter,
        balances,
        new_invariant,
        token_index,
    )?;
    let amount_in_without_fee = new_balance.sub(balances[token_index])?;

    let current_weight = balances[token_index].div_down(sum(balances)?)?;
    let taxable_amount = amount_in_without_fee.mul_up(current_weight.complement())?;
    let non_taxable_amount = amount_in_without_fee.sub(taxable_amount)?;

    non_taxable_amount.add(taxable_amount.div_up(swap_fee_percentage.complement())?)
}

/// Amounts of every token required to mint exactly `bpt_amount_out`
/// proportionally. Rounds up.
pub fn calc_all_tokens_in_given_exact_bpt_out(
    balances: &[Bfp],
    bpt_amount_out: Bfp,
    bpt_total_supply: Bfp,
) -> Result<Vec<Bfp>, Error> {
    let bpt_ratio = bpt_amount_out.div_up(bpt_total_supply)?;
    balances
        .iter()
        .map(|balance| balance.mul_up(bpt_ratio))
        .collect()
}

/// BPT burnt to withdraw `amounts_out`. Tokens withdrawn above the balance
/// weighted average ratio pay the swap fee on the excess. Rounds up.
pub fn calc_bpt_in_given_exact_tokens_out(
    amplification_parameter: U256,
    balances: &[Bfp],
    amounts_out: &[Bfp],
    bpt_total_supply: Bfp,
    current_invariant: Bfp,
    swap_fee_percentage: Bfp,
) -> Result<Bfp, Error> {
    if balances.len() != amounts_out.len() {
        return Err(Error::InputLengthMismatch);
    }
    if balances
        .iter()
        .zip(amounts_out)
        .any(|(balance, amount_out)| amount_out >= balance)
    {
        return Err(Error::OutOfBounds);
    }
    let sum_balances = sum(balances)?;

    let mut balance_ratios_without_fee = Vec::with_capacity(balances.len());
    let mut invariant_ratio_without_fees = Bfp::zero();
    for (balance, amount_out) in balances.iter().zip(amounts_out) {
        let current_weight = balance.div_up(sum_balances)?;
        let ratio = balance.sub(*amount_out)?.div_up(*balance)?;
        invariant_ratio_without_fees =
            invariant_ratio_without_fees.add(ratio.mul_up(current_weight)?)?;
        balance_ratios_without_fee.push(ratio);
    }

    let mut new_balances = Vec::with_capacity(balances.len());
    for (i, (balance, amount_out)) in balances.iter().zip(amounts_out).enumerate() {
        let amount_out_with_fee = if invariant_ratio_without_fees > balance_ratios_without_fee[i]
        {
            let non_taxable_amount = balance.mul_down(invariant_ratio_without_fees.complement())?;
            let taxable_amount = amount_out.sub(non_taxable_amount)?;
            non_taxable_amount.add(taxable_amount.div_up(swap_fee_percentage.complement())?)?
        } else {
            *amount_out
        };
        new_balances.push(balance.sub(amount_out_with_fee)?);
    }

    let new_invariant = calculate_invariant(amplification_parameter, &new_balances)?;
    let invariant_ratio = new_invariant.div_down(current_invariant)?;
    bpt_total_supply.mul_up(invariant_ratio.complement())
}

/// Amount of a single token paid out for burning exactly `bpt_amount_in`.
/// Rounds down.
pub fn calc_token_out_given_exact_bpt_in(
    amplification_parameter: U256,
    balances: &[Bfp],
    token_index: usize,
    bpt_amount_in: Bfp,
    bpt_total_supply: Bfp,
    current_invariant: Bfp,
    swap_fee_percentage: Bfp,
) -> Result<Bfp, Error> {
    // Burning the whole supply would require draining the token entirely.
    if bpt_amount_in >= bpt_total_supply {
        return Err(Error::OutOfBounds);
    }

    let new_invariant = bpt_total_supply
        .sub(bpt_amount_in)?
        .div_up(bpt_total_supply)?
        .mul_up(current_invariant)?;
    let new_balance = get_token_balance_given_invariant_and_all_other_balances(
        amplification_parameter,
        balances,
        new_invariant,
        token_index,
    )?;
    let amount_out_without_fee = balances[token_index]
        .sub(new_balance)
        .map_err(|_| Error::OutOfBounds)?;

    let current_weight = balances[token_index].div_down(sum(balances)?)?;
    let taxable_amount = amount_out_without_fee.mul_up(current_weight.complement())?;
    let non_taxable_amount = amount_out_without_fee.sub(taxable_amount)?;

    non_taxable_amount.add(taxable_amount.mul_down(swap_fee_percentage.complement())?)
}

/// Amounts of every token paid out for burning exactly `bpt_amount_in`
/// proportionally. Rounds down.
pub fn calc_tokens_out_given_exact_bpt_in(
    balances: &[Bfp],
    bpt_amount_in: Bfp,
    bpt_total_supply: Bfp,
) -> Result<Vec<Bfp>, Error> {
    let bpt_ratio = bpt_amount_in.div_down(bpt_total_supply)?;
    balances
        .iter()
        .map(|balance| balance.mul_down(bpt_ratio))
        .collect()
}

/// Protocol fee owed in `token_index` for the invariant growth since
/// `last_invariant`: the part of the token balance above what restores
/// `last_invariant`, times the protocol percentage. Rounds down.
pub fn calc_due_token_protocol_swap_fee_amount(
    amplification_parameter: U256,
    balances: &[Bfp],
    last_invariant: Bfp,
    token_index: usize,
    protocol_swap_fee_percentage: Bfp,
) -> Result<Bfp, Error> {
    let final_balance_fee_token = get_token_balance_given_invariant_and_all_other_balances(
        amplification_parameter,
        balances,
        last_invariant,
        token_index,
    )?;

    if balances[token_index] <= final_balance_fee_token {
        return Ok(Bfp::zero());
    }

    let accumulated_token_swap_fees = balances[token_index].sub(final_balance_fee_token)?;
    accumulated_token_swap_fees.mul_down(protocol_swap_fee_percentage)
}

fn sum(balances: &[Bfp]) -> Result<Bfp, Error> {
    balances
        .iter()
        .try_fold(Bfp::zero(), |sum, balance| sum.add(*balance))
}

fn check_indices(balances: &[Bfp], index_in: usize, index_out: usize) -> Result<(), Error> {
    if index_in >= balances.len() || index_out >= balances.len() || index_in == index_out {
        return Err(Error::OutOfBounds);
    }
    Ok(())
}
