//! Pricing and invariant math of weighted and amplified stable pools, with the
//! scaling, swap fee and protocol fee pipeline wrapped around it. Rounding
//! always favors the pool.

pub mod amplification;
pub mod error;
pub mod fixed_point;
pub mod log_exp_math;
pub mod pools;
pub mod protocol_fees;
pub mod scaling;
pub mod serialization;
pub mod stable_math;
pub mod weighted_math;

mod conversions;
mod math;

pub use {
    amplification::{AmplificationParameter, AmplificationState},
    error::Error,
    fixed_point::Bfp,
    pools::{
        ExitKind,
        ExitResult,
        JoinKind,
        JoinResult,
        Pool,
        PoolBalances,
        PoolKind,
        SwapKind,
        SwapRequest,
        TokenState,
    },
    scaling::ScalingFactor,
};
