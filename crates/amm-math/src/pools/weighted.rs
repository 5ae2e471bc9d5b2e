use {
    super::PoolMath,
    crate::{
        error::Error,
        fixed_point::Bfp,
        weighted_math::{self, MIN_WEIGHT},
    },
};

/// Checks that every token has a weight of at least `MIN_WEIGHT` and that the
/// weights sum to exactly one.
pub(super) fn check_weights(token_count: usize, normalized_weights: &[Bfp]) -> Result<(), Error> {
    if normalized_weights.len() != token_count {
        return Err(Error::InputLengthMismatch);
    }
    let mut sum = Bfp::zero();
    for weight in normalized_weights {
        if *weight < *MIN_WEIGHT {
            return Err(Error::MinWeight);
        }
        sum = sum.add(*weight)?;
    }
    if sum != Bfp::one() {
        return Err(Error::NormalizedWeightInvariant);
    }
    Ok(())
}

pub(super) struct Weighted<'a> {
    normalized_weights: &'a [Bfp],
}

impl<'a> Weighted<'a> {
    pub(super) fn new(normalized_weights: &'a [Bfp]) -> Self {
        Self { normalized_weights }
    }

    fn weight(&self, index: usize) -> Result<Bfp, Error> {
        self.normalized_weights
            .get(index)
            .copied()
            .ok_or(Error::OutOfBounds)
    }

    fn balance(balances: &[Bfp], index: usize) -> Result<Bfp, Error> {
        balances.get(index).copied().ok_or(Error::OutOfBounds)
    }
}

impl PoolMath for Weighted<'_> {
    fn invariant(&self, balances: &[Bfp]) -> Result<Bfp, Error> {
        weighted_math::calculate_invariant(self.normalized_weights, balances)
    }

    fn initial_bpt(&self, invariant: Bfp, token_count: usize) -> Result<Bfp, Error> {
        invariant.mul_down(token_count.into())
    }

    fn out_given_in(
        &self,
        balances: &[Bfp],
        index_in: usize,
        index_out: usize,
        amount_in: Bfp,
    ) -> Result<Bfp, Error> {
        weighted_math::calc_out_given_in(
            Self::balance(balances, index_in)?,
            self.weight(index_in)?,
            Self::balance(balances, index_out)?,
            self.weight(index_out)?,
            amount_in,
        )
    }

    fn in_given_out(
        &self,
        balances: &[Bfp],
        index_in: usize,
        index_out: usize,
        amount_out: Bfp,
    ) -> Result<Bfp, Error> {
        weighted_math::calc_in_given_out(
            Self::balance(balances, index_in)?,
            self.weight(index_in)?,
            Self::balance(balances, index_out)?,
            self.weight(index_out)?,
            amount_out,
        )
    }

    fn bpt_out_given_exact_tokens_in(
        &self,
        balances: &[Bfp],
        amounts_in: &[Bfp],
        bpt_total_supply: Bfp,
        swap_fee: Bfp,
    ) -> Result<Bfp, Error> {
        weighted_math::calc_bpt_out_given_exact_tokens_in(
            balances,
            self.normalized_weights,
            amounts_in,
            bpt_total_supply,
            swap_fee,
        )
    }

    fn token_in_given_exact_bpt_out(
        &self,
        balances: &[Bfp],
        token_index: usize,
        bpt_out: Bfp,
        bpt_total_supply: Bfp,
        swap_fee: Bfp,
    ) -> Result<Bfp, Error> {
        weighted_math::calc_token_in_given_exact_bpt_out(
            Self::balance(balances, token_index)?,
            self.weight(token_index)?,
            bpt_out,
            bpt_total_supply,
            swap_fee,
        )
    }

    fn all_tokens_in_given_exact_bpt_out(
        &self,
        balances: &[Bfp],
        bpt_out: Bfp,
        bpt_total_supply: Bfp,
    ) -> Result<Vec<Bfp>, Error> {
        weighted_math::calc_all_tokens_in_given_exact_bpt_out(balances, bpt_out, bpt_total_supply)
    }

    fn bpt_in_given_exact_tokens_out(
        &self,
        balances: &[Bfp],
        amounts_out: &[Bfp],
        bpt_total_supply: Bfp,
        swap_fee: Bfp,
    ) -> Result<Bfp, Error> {
        weighted_math::calc_bpt_in_given_exact_tokens_out(
            balances,
            self.normalized_weights,
            amounts_out,
            bpt_total_supply,
            swap_fee,
        )
    }

    fn token_out_given_exact_bpt_in(
        &self,
        balances: &[Bfp],
        token_index: usize,
        bpt_in: Bfp,
        bpt_total_supply: Bfp,
        swap_fee: Bfp,
    ) -> Result<Bfp, Error> {
        weighted_math::calc_token_out_given_exact_bpt_in(
            Self::balance(balances, token_index)?,
            self.weight(token_index)?,
            bpt_in,
            bpt_total_supply,
            swap_fee,
        )
    }

    fn tokens_out_given_exact_bpt_in(
        &self,
        balances: &[Bfp],
        bpt_in: Bfp,
        bpt_total_supply: Bfp,
    ) -> Result<Vec<Bfp>, Error> {
        weighted_math::calc_tokens_out_given_exact_bpt_in(balances, bpt_in, bpt_total_supply)
    }

    fn due_token_protocol_fee(
        &self,
        balances: &[Bfp],
        token_index: usize,
        last_invariant: Bfp,
        protocol_swap_fee_percentage: Bfp,
    ) -> Result<Bfp, Error> {
        let current_invariant = self.invariant(balances)?;
        weighted_math::calc_due_token_protocol_swap_fee_amount(
            Self::balance(balances, token_index)?,
            self.weight(token_index)?,
            last_invariant,
            current_invariant,
            protocol_swap_fee_percentage,
        )
    }
}
