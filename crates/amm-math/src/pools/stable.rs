use {
    super::PoolMath,
    crate::{error::Error, fixed_point::Bfp, stable_math},
    primitive_types::U256,
};

/// Stable math at a fixed amplification parameter, read once per hook call.
pub(super) struct Stable {
    amplification_parameter: U256,
}

impl Stable {
    pub(super) fn new(amplification_parameter: U256) -> Self {
        Self {
            amplification_parameter,
        }
    }
}

impl PoolMath for Stable {
    fn invariant(&self, balances: &[Bfp]) -> Result<Bfp, Error> {
        stable_math::calculate_invariant(self.amplification_parameter, balances)
    }

    fn initial_bpt(&self, invariant: Bfp, _: usize) -> Result<Bfp, Error> {
        Ok(invariant)
    }

    fn out_given_in(
        &self,
        balances: &[Bfp],
        index_in: usize,
        index_out: usize,
        amount_in: Bfp,
    ) -> Result<Bfp, Error> {
        let invariant = self.invariant(balances)?;
        stable_math::calc_out_given_in(
            self.amplification_parameter,
            balances,
            index_in,
            index_out,
            amount_in,
            invariant,
        )
    }

    fn in_given_out(
        &self,
        balances: &[Bfp],
        index_in: usize,
        index_out: usize,
        amount_out: Bfp,
    ) -> Result<Bfp, Error> {
        let invariant = self.invariant(balances)?;
        stable_math::calc_in_given_out(
            self.amplification_parameter,
            balances,
            index_in,
            index_out,
            amount_out,
            invariant,
        )
    }

    fn bpt_out_given_exact_tokens_in(
        &self,
        balances: &[Bfp],
        amounts_in: &[Bfp],
        bpt_total_supply: Bfp,
        swap_fee: Bfp,
    ) -> Result<Bfp, Error> {
        let invariant = self.invariant(balances)?;
        stable_math::calc_bpt_out_given_exact_tokens_in(
            self.amplification_parameter,
            balances,
            amounts_in,
            bpt_total_supply,
            invariant,
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
        let invariant = self.invariant(balances)?;
        stable_math::calc_token_in_given_exact_bpt_out(
            self.amplification_parameter,
            balances,
            token_index,
            bpt_out,
            bpt_total_supply,
            invariant,
            swap_fee,
        )
    }

    fn all_tokens_in_given_exact_bpt_out(
        &self,
        balances: &[Bfp],
        bpt_out: Bfp,
        bpt_total_supply: Bfp,
    ) -> Result<Vec<Bfp>, Error> {
        stable_math::calc_all_tokens_in_given_exact_bpt_out(balances, bpt_out, bpt_total_supply)
    }

    fn bpt_in_given_exact_tokens_out(
        &self,
        balances: &[Bfp],
        amounts_out: &[Bfp],
        bpt_total_supply: Bfp,
        swap_fee: Bfp,
    ) -> Result<Bfp, Error> {
        let invariant = self.invariant(balances)?;
        stable_math::calc_bpt_in_given_exact_tokens_out(
            self.amplification_parameter,
            balances,
            amounts_out,
            bpt_total_supply,
            invariant,
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
        let invariant = self.invariant(balances)?;
        stable_math::calc_token_out_given_exact_bpt_in(
            self.amplification_parameter,
            balances,
            token_index,
            bpt_in,
            bpt_total_supply,
            invariant,
            swap_fee,
        )
    }

    fn tokens_out_given_exact_bpt_in(
        &self,
        balances: &[Bfp],
        bpt_in: Bfp,
        bpt_total_supply: Bfp,
    ) -> Result<Vec<Bfp>, Error> {
        stable_math::calc_tokens_out_given_exact_bpt_in(balances, bpt_in, bpt_total_supply)
    }

    fn due_token_protocol_fee(
        &self,
        balances: &[Bfp],
        token_index: usize,
        last_invariant: Bfp,
        protocol_swap_fee_percentage: Bfp,
    ) -> Result<Bfp, Error> {
        stable_math::calc_due_token_protocol_swap_fee_amount(
            self.amplification_parameter,
            balances,
            last_invariant,
            token_index,
            protocol_swap_fee_percentage,
        )
    }
}
