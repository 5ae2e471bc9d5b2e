//! Swap, join and exit hooks. A `Pool` holds the immutable per token data and
//! the pool kind specific parameters; balances, BPT supply and protocol fee
//! state are supplied by the caller on every call and never mutated.
//!
//! Every hook upscales the native balances once, runs the kind specific math
//! and downscales the results: amounts entering the pool round up, amounts
//! leaving it round down. Hooks have no side effects, so a query is an
//! ordinary call.

use {
    crate::{
        amplification::{AmplificationParameter, AmplificationState},
        error::Error,
        fixed_point::Bfp,
        protocol_fees,
        scaling::{self, ScalingFactor},
        serialization::DecimalU256,
    },
    primitive_types::U256,
    serde::{Deserialize, Serialize},
    serde_with::serde_as,
    std::sync::LazyLock,
};

mod stable;
mod weighted;

pub const MIN_TOKENS: usize = 2;
pub const MAX_WEIGHTED_TOKENS: usize = 16;

/// BPT permanently locked on initialization, so the supply can never return
/// to zero.
pub static MINIMUM_BPT: LazyLock<U256> = LazyLock::new(|| U256::from(1_000_000));

/// Swap fee bounds, 0.0001% and 10%.
pub static MIN_SWAP_FEE_PERCENTAGE: LazyLock<Bfp> =
    LazyLock::new(|| Bfp::from_wei(U256::exp10(12)));
pub static MAX_SWAP_FEE_PERCENTAGE: LazyLock<Bfp> =
    LazyLock::new(|| Bfp::from_wei(U256::exp10(17)));

/// Invariant math of a pool kind, evaluated on upscaled balances.
trait PoolMath {
    fn invariant(&self, balances: &[Bfp]) -> Result<Bfp, Error>;

    /// BPT minted for the first deposit, given its invariant.
    fn initial_bpt(&self, invariant: Bfp, token_count: usize) -> Result<Bfp, Error>;

    fn out_given_in(
        &self,
        balances: &[Bfp],
        index_in: usize,
        index_out: usize,
        amount_in: Bfp,
    ) -> Result<Bfp, Error>;

    fn in_given_out(
        &self,
        balances: &[Bfp],
        index_in: usize,
        index_out: usize,
        amount_out: Bfp,
    ) -> Result<Bfp, Error>;

    fn bpt_out_given_exact_tokens_in(
        &self,
        balances: &[Bfp],
        amounts_in: &[Bfp],
        bpt_total_supply: Bfp,
        swap_fee: Bfp,
    ) -> Result<Bfp, Error>;

    fn token_in_given_exact_bpt_out(
        &self,
        balances: &[Bfp],
        token_index: usize,
        bpt_out: Bfp,
        bpt_total_supply: Bfp,
        swap_fee: Bfp,
    ) -> Result<Bfp, Error>;

    fn all_tokens_in_given_exact_bpt_out(
        &self,
        balances: &[Bfp],
        bpt_out: Bfp,
        bpt_total_supply: Bfp,
    ) -> Result<Vec<Bfp>, Error>;

    fn bpt_in_given_exact_tokens_out(
        &self,
        balances: &[Bfp],
        amounts_out: &[Bfp],
        bpt_total_supply: Bfp,
        swap_fee: Bfp,
    ) -> Result<Bfp, Error>;

    fn token_out_given_exact_bpt_in(
        &self,
        balances: &[Bfp],
        token_index: usize,
        bpt_in: Bfp,
        bpt_total_supply: Bfp,
        swap_fee: Bfp,
    ) -> Result<Bfp, Error>;

    fn tokens_out_given_exact_bpt_in(
        &self,
        balances: &[Bfp],
        bpt_in: Bfp,
        bpt_total_supply: Bfp,
    ) -> Result<Vec<Bfp>, Error>;

    /// Protocol fee owed in `token_index` for the invariant growth since
    /// `last_invariant`.
    fn due_token_protocol_fee(
        &self,
        balances: &[Bfp],
        token_index: usize,
        last_invariant: Bfp,
        protocol_swap_fee_percentage: Bfp,
    ) -> Result<Bfp, Error>;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TokenState {
    pub decimals: u8,
    pub scaling_factor: ScalingFactor,
}

impl TokenState {
    pub fn new(decimals: u8) -> Result<Self, Error> {
        Ok(Self {
            decimals,
            scaling_factor: ScalingFactor::from_decimals(decimals)?,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PoolKind {
    Weighted { normalized_weights: Vec<Bfp> },
    Stable { amplification: AmplificationState },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pool {
    tokens: Vec<TokenState>,
    swap_fee: Bfp,
    kind: PoolKind,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SwapKind {
    GivenIn,
    GivenOut,
}

#[serde_as]
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub kind: SwapKind,
    pub index_in: usize,
    pub index_out: usize,
    /// The fixed side of the swap, in native token units.
    #[serde_as(as = "DecimalU256")]
    pub amount: U256,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum JoinKind {
    Init {
        #[serde_as(as = "Vec<DecimalU256>")]
        amounts_in: Vec<U256>,
    },
    ExactTokensInForBptOut {
        #[serde_as(as = "Vec<DecimalU256>")]
        amounts_in: Vec<U256>,
        #[serde_as(as = "DecimalU256")]
        min_bpt_out: U256,
    },
    TokenInForExactBptOut {
        #[serde_as(as = "DecimalU256")]
        bpt_out: U256,
        token_index: usize,
    },
    AllTokensInForExactBptOut {
        #[serde_as(as = "DecimalU256")]
        bpt_out: U256,
    },
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum ExitKind {
    ExactBptInForOneTokenOut {
        #[serde_as(as = "DecimalU256")]
        bpt_in: U256,
        token_index: usize,
    },
    ExactBptInForTokensOut {
        #[serde_as(as = "DecimalU256")]
        bpt_in: U256,
    },
    BptInForExactTokensOut {
        #[serde_as(as = "Vec<DecimalU256>")]
        amounts_out: Vec<U256>,
        #[serde_as(as = "DecimalU256")]
        max_bpt_in: U256,
    },
}

/// Caller owned pool state a join or exit is evaluated against.
#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolBalances {
    /// Native token balances, in token order.
    #[serde_as(as = "Vec<DecimalU256>")]
    pub balances: Vec<U256>,
    #[serde_as(as = "DecimalU256")]
    pub bpt_total_supply: U256,
    /// Invariant after the previous join or exit, as returned by it.
    pub last_invariant: Bfp,
    pub protocol_swap_fee_percentage: Bfp,
}

#[serde_as]
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResult {
    /// BPT minted to the joining account.
    #[serde_as(as = "DecimalU256")]
    pub bpt_out: U256,
    /// BPT minted to nobody on initialization.
    #[serde_as(as = "DecimalU256")]
    pub locked_bpt: U256,
    #[serde_as(as = "Vec<DecimalU256>")]
    pub amounts_in: Vec<U256>,
    #[serde_as(as = "Vec<DecimalU256>")]
    pub due_protocol_fees: Vec<U256>,
    /// Invariant after the join, to be stored by the caller.
    pub last_invariant: Bfp,
}

#[serde_as]
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitResult {
    #[serde_as(as = "DecimalU256")]
    pub bpt_in: U256,
    #[serde_as(as = "Vec<DecimalU256>")]
    pub amounts_out: Vec<U256>,
    #[serde_as(as = "Vec<DecimalU256>")]
    pub due_protocol_fees: Vec<U256>,
    /// Invariant after the exit, to be stored by the caller. Not evaluated
    /// for proportional exits without protocol fees.
    pub last_invariant: Option<Bfp>,
}

impl Pool {
    pub fn weighted(
        tokens: Vec<TokenState>,
        normalized_weights: Vec<Bfp>,
        swap_fee: Bfp,
    ) -> Result<Self, Error> {
        check_token_count(tokens.len(), MAX_WEIGHTED_TOKENS)?;
        weighted::check_weights(tokens.len(), &normalized_weights)?;
        check_swap_fee(swap_fee)?;
        Ok(Self {
            tokens,
            swap_fee,
            kind: PoolKind::Weighted { normalized_weights },
        })
    }

    pub fn stable(
        tokens: Vec<TokenState>,
        amplification: AmplificationState,
        swap_fee: Bfp,
    ) -> Result<Self, Error> {
        check_token_count(tokens.len(), crate::stable_math::MAX_STABLE_TOKENS)?;
        check_swap_fee(swap_fee)?;
        Ok(Self {
            tokens,
            swap_fee,
            kind: PoolKind::Stable { amplification },
        })
    }

    pub fn tokens(&self) -> &[TokenState] {
        &self.tokens
    }

    pub fn swap_fee(&self) -> Bfp {
        self.swap_fee
    }

    pub fn kind(&self) -> &PoolKind {
        &self.kind
    }

    fn math(&self, now: u64) -> Box<dyn PoolMath + '_> {
        match &self.kind {
            PoolKind::Weighted { normalized_weights } => {
                Box::new(weighted::Weighted::new(normalized_weights))
            }
            PoolKind::Stable { amplification } => {
                Box::new(stable::Stable::new(amplification.value(now)))
            }
        }
    }

    fn upscale_all(&self, amounts: &[U256]) -> Result<Vec<Bfp>, Error> {
        if amounts.len() != self.tokens.len() {
            return Err(Error::InputLengthMismatch);
        }
        self.tokens
            .iter()
            .zip(amounts)
            .map(|(token, amount)| token.scaling_factor.upscale(*amount))
            .collect()
    }

    fn downscale_all(
        &self,
        amounts: &[Bfp],
        downscale: fn(ScalingFactor, Bfp) -> Result<U256, Error>,
    ) -> Result<Vec<U256>, Error> {
        self.tokens
            .iter()
            .zip(amounts)
            .map(|(token, amount)| downscale(token.scaling_factor, *amount))
            .collect()
    }

    fn token(&self, index: usize) -> Result<&TokenState, Error> {
        self.tokens.get(index).ok_or(Error::OutOfBounds)
    }

    /// The invariant of the given native balances.
    pub fn invariant(&self, balances: &[U256], now: u64) -> Result<Bfp, Error> {
        let balances = self.upscale_all(balances)?;
        self.math(now).invariant(&balances)
    }

    /// Computes the calculated side of a swap in native token units: the
    /// amount out for given in swaps, the amount in for given out swaps.
    pub fn swap(
        &self,
        request: &SwapRequest,
        balances: &[U256],
        now: u64,
    ) -> Result<U256, Error> {
        if request.index_in == request.index_out {
            return Err(Error::OutOfBounds);
        }
        let token_in = self.token(request.index_in)?;
        let token_out = self.token(request.index_out)?;
        let upscaled_balances = self.upscale_all(balances)?;
        let math = self.math(now);

        match request.kind {
            SwapKind::GivenIn => {
                // Fees are taken in native units before scaling.
                let amount_in =
                    scaling::subtract_swap_fee_amount(request.amount, self.swap_fee)?;
                let amount_in = token_in.scaling_factor.upscale(amount_in)?;
                let amount_out = math.out_given_in(
                    &upscaled_balances,
                    request.index_in,
                    request.index_out,
                    amount_in,
                )?;
                tracing::debug!(?request, %amount_in, %amount_out, "swap given in");
                token_out.scaling_factor.downscale_down(amount_out)
            }
            SwapKind::GivenOut => {
                let amount_out = token_out.scaling_factor.upscale(request.amount)?;
                let amount_in = math.in_given_out(
                    &upscaled_balances,
                    request.index_in,
                    request.index_out,
                    amount_out,
                )?;
                tracing::debug!(?request, %amount_out, %amount_in, "swap given out");
                let amount_in = token_in.scaling_factor.downscale_up(amount_in)?;
                scaling::add_swap_fee_amount(amount_in, self.swap_fee)
            }
        }
    }

    pub fn query_swap(
        &self,
        request: &SwapRequest,
        balances: &[U256],
        now: u64,
    ) -> Result<U256, Error> {
        self.swap(request, balances, now)
    }

    pub fn join(
        &self,
        state: &PoolBalances,
        kind: &JoinKind,
        now: u64,
    ) -> Result<JoinResult, Error> {
        let math = self.math(now);
        let supply = state.bpt_total_supply;

        if let JoinKind::Init { amounts_in } = kind {
            if !supply.is_zero() {
                return Err(Error::AlreadyInitialized);
            }
            return self.initialize(math.as_ref(), amounts_in);
        }
        if supply.is_zero() {
            return Err(Error::Uninitialized);
        }

        let balances = self.upscale_all(&state.balances)?;
        let (balances, due_protocol_fees) =
            self.pay_protocol_fees(math.as_ref(), balances, state)?;
        let supply = Bfp::from_wei(supply);

        let (bpt_out, amounts_in) = match kind {
            JoinKind::Init { .. } => return Err(Error::AlreadyInitialized),
            JoinKind::ExactTokensInForBptOut {
                amounts_in,
                min_bpt_out,
            } => {
                let amounts_in = self.upscale_all(amounts_in)?;
                let bpt_out = math.bpt_out_given_exact_tokens_in(
                    &balances,
                    &amounts_in,
                    supply,
                    self.swap_fee,
                )?;
                if bpt_out.as_uint256() < *min_bpt_out {
                    return Err(Error::BptOutMinAmount);
                }
                (bpt_out, amounts_in)
            }
            JoinKind::TokenInForExactBptOut {
                bpt_out,
                token_index,
            } => {
                self.token(*token_index)?;
                let bpt_out = Bfp::from_wei(*bpt_out);
                let amount_in = math.token_in_given_exact_bpt_out(
                    &balances,
                    *token_index,
                    bpt_out,
                    supply,
                    self.swap_fee,
                )?;
                let mut amounts_in = vec![Bfp::zero(); balances.len()];
                amounts_in[*token_index] = amount_in;
                (bpt_out, amounts_in)
            }
            JoinKind::AllTokensInForExactBptOut { bpt_out } => {
                let bpt_out = Bfp::from_wei(*bpt_out);
                let amounts_in =
                    math.all_tokens_in_given_exact_bpt_out(&balances, bpt_out, supply)?;
                (bpt_out, amounts_in)
            }
        };

        let balances_after = balances
            .iter()
            .zip(&amounts_in)
            .map(|(balance, amount)| balance.add(*amount))
            .collect::<Result<Vec<_>, _>>()?;
        let last_invariant = math.invariant(&balances_after)?;
        tracing::debug!(?kind, %bpt_out, %last_invariant, "join");

        Ok(JoinResult {
            bpt_out: bpt_out.as_uint256(),
            locked_bpt: U256::zero(),
            amounts_in: self.downscale_all(&amounts_in, ScalingFactor::downscale_up)?,
            due_protocol_fees: self
                .downscale_all(&due_protocol_fees, ScalingFactor::downscale_down)?,
            last_invariant,
        })
    }

    pub fn query_join(
        &self,
        state: &PoolBalances,
        kind: &JoinKind,
        now: u64,
    ) -> Result<JoinResult, Error> {
        self.join(state, kind, now)
    }

    fn initialize(&self, math: &dyn PoolMath, amounts_in: &[U256]) -> Result<JoinResult, Error> {
        let upscaled = self.upscale_all(amounts_in)?;
        let invariant = math.invariant(&upscaled)?;
        let bpt = math.initial_bpt(invariant, self.tokens.len())?.as_uint256();
        if bpt < *MINIMUM_BPT {
            return Err(Error::MinimumBpt);
        }
        tracing::debug!(%invariant, %bpt, "pool initialized");

        Ok(JoinResult {
            bpt_out: bpt - *MINIMUM_BPT,
            locked_bpt: *MINIMUM_BPT,
            amounts_in: amounts_in.to_vec(),
            due_protocol_fees: vec![U256::zero(); amounts_in.len()],
            last_invariant: invariant,
        })
    }

    pub fn exit(
        &self,
        state: &PoolBalances,
        kind: &ExitKind,
        now: u64,
    ) -> Result<ExitResult, Error> {
        let math = self.math(now);
        if state.bpt_total_supply.is_zero() {
            return Err(Error::Uninitialized);
        }

        let balances = self.upscale_all(&state.balances)?;
        let (balances, due_protocol_fees) =
            self.pay_protocol_fees(math.as_ref(), balances, state)?;
        let supply = Bfp::from_wei(state.bpt_total_supply);

        let (bpt_in, amounts_out) = match kind {
            ExitKind::ExactBptInForOneTokenOut {
                bpt_in,
                token_index,
            } => {
                self.token(*token_index)?;
                let bpt_in = checked_bpt_in(*bpt_in, supply)?;
                let amount_out = math.token_out_given_exact_bpt_in(
                    &balances,
                    *token_index,
                    bpt_in,
                    supply,
                    self.swap_fee,
                )?;
                let mut amounts_out = vec![Bfp::zero(); balances.len()];
                amounts_out[*token_index] = amount_out;
                (bpt_in, amounts_out)
            }
            ExitKind::ExactBptInForTokensOut { bpt_in } => {
                let bpt_in = checked_bpt_in(*bpt_in, supply)?;
                let amounts_out =
                    math.tokens_out_given_exact_bpt_in(&balances, bpt_in, supply)?;
                (bpt_in, amounts_out)
            }
            ExitKind::BptInForExactTokensOut {
                amounts_out,
                max_bpt_in,
            } => {
                let amounts_out = self.upscale_all(amounts_out)?;
                let bpt_in = math.bpt_in_given_exact_tokens_out(
                    &balances,
                    &amounts_out,
                    supply,
                    self.swap_fee,
                )?;
                if bpt_in.as_uint256() > *max_bpt_in {
                    return Err(Error::BptInMaxAmount);
                }
                (bpt_in, amounts_out)
            }
        };

        let last_invariant = match kind {
            ExitKind::ExactBptInForTokensOut { .. }
                if state.protocol_swap_fee_percentage.is_zero() =>
            {
                None
            }
            _ => {
                let balances_after = balances
                    .iter()
                    .zip(&amounts_out)
                    .map(|(balance, amount)| balance.sub(*amount))
                    .collect::<Result<Vec<_>, _>>()?;
                Some(math.invariant(&balances_after)?)
            }
        };
        tracing::debug!(?kind, %bpt_in, ?last_invariant, "exit");

        Ok(ExitResult {
            bpt_in: bpt_in.as_uint256(),
            amounts_out: self.downscale_all(&amounts_out, ScalingFactor::downscale_down)?,
            due_protocol_fees: self
                .downscale_all(&due_protocol_fees, ScalingFactor::downscale_down)?,
            last_invariant,
        })
    }

    pub fn query_exit(
        &self,
        state: &PoolBalances,
        kind: &ExitKind,
        now: u64,
    ) -> Result<ExitResult, Error> {
        self.exit(state, kind, now)
    }

    /// Computes the protocol fees accrued since the last join or exit and
    /// returns the balances net of them.
    fn pay_protocol_fees(
        &self,
        math: &dyn PoolMath,
        mut balances: Vec<Bfp>,
        state: &PoolBalances,
    ) -> Result<(Vec<Bfp>, Vec<Bfp>), Error> {
        let due = protocol_fees::due_protocol_fee_amounts(
            &balances,
            state.protocol_swap_fee_percentage,
            |index| {
                math.due_token_protocol_fee(
                    &balances,
                    index,
                    state.last_invariant,
                    state.protocol_swap_fee_percentage,
                )
            },
        )?;
        for (balance, fee) in balances.iter_mut().zip(&due) {
            *balance = balance.sub(*fee)?;
        }
        Ok((balances, due))
    }

    fn amplification_state(&mut self) -> Result<&mut AmplificationState, Error> {
        match &mut self.kind {
            PoolKind::Stable { amplification } => Ok(amplification),
            // Weighted pools have no amplification, the closest policy error.
            PoolKind::Weighted { .. } => Err(Error::MinAmp),
        }
    }

    /// The amplification parameter at `now`, for stable pools.
    pub fn amplification_parameter(&self, now: u64) -> Option<AmplificationParameter> {
        match &self.kind {
            PoolKind::Stable { amplification } => Some(amplification.get(now)),
            PoolKind::Weighted { .. } => None,
        }
    }

    pub fn start_amplification_parameter_update(
        &mut self,
        raw_end_value: u64,
        end_time: u64,
        now: u64,
    ) -> Result<(), Error> {
        self.amplification_state()?.start(raw_end_value, end_time, now)
    }

    pub fn stop_amplification_parameter_update(&mut self, now: u64) -> Result<(), Error> {
        self.amplification_state()?.stop(now)
    }
}

fn checked_bpt_in(bpt_in: U256, supply: Bfp) -> Result<Bfp, Error> {
    let bpt_in = Bfp::from_wei(bpt_in);
    if bpt_in > supply {
        return Err(Error::OutOfBounds);
    }
    Ok(bpt_in)
}

fn check_token_count(count: usize, max: usize) -> Result<(), Error> {
    if count < MIN_TOKENS {
        return Err(Error::MinTokens);
    }
    if count > max {
        return Err(Error::MaxTokens);
    }
    Ok(())
}

fn check_swap_fee(swap_fee: Bfp) -> Result<(), Error> {
    if swap_fee < *MIN_SWAP_FEE_PERCENTAGE {
        return Err(Error::MinSwapFeePercentage);
    }
    if swap_fee > *MAX_SWAP_FEE_PERCENTAGE {
        return Err(Error::MaxSwapFeePercentage);
    }
    Ok(())
}
