//! Errors raised by the pool math. Codes use the `BAL#` format of the
//! Balancer error registry, grouped as math (0xx), input (1xx), shared pool
//! (2xx) and pool specific (3xx) failures. A failure the registry defines
//! keeps its registry number. `UnsupportedDecimals` has no registry
//! counterpart and is numbered past the registry's shared pool codes.

use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum Error {
    // Math
    #[error("BAL#000: add overflow")]
    AddOverflow,
    #[error("BAL#001: sub overflow")]
    SubOverflow,
    #[error("BAL#003: mul overflow")]
    MulOverflow,
    #[error("BAL#004: zero division")]
    ZeroDivision,
    #[error("BAL#005: div internal")]
    DivInternal,
    #[error("BAL#006: x out of bounds")]
    XOutOfBounds,
    #[error("BAL#007: y out of bounds")]
    YOutOfBounds,
    #[error("BAL#008: product out of bounds")]
    ProductOutOfBounds,
    #[error("BAL#009: invalid exponent")]
    InvalidExponent,

    // Input
    #[error("BAL#100: out of bounds")]
    OutOfBounds,
    #[error("BAL#103: input length mismatch")]
    InputLengthMismatch,

    // Shared pools
    #[error("BAL#200: min tokens")]
    MinTokens,
    #[error("BAL#201: max tokens")]
    MaxTokens,
    #[error("BAL#202: max swap fee percentage")]
    MaxSwapFeePercentage,
    #[error("BAL#203: min swap fee percentage")]
    MinSwapFeePercentage,
    #[error("BAL#204: minimum BPT")]
    MinimumBpt,
    #[error("BAL#206: pool is not initialized")]
    Uninitialized,
    #[error("BAL#207: BPT in above maximum amount")]
    BptInMaxAmount,
    #[error("BAL#208: BPT out below minimum amount")]
    BptOutMinAmount,
    #[error("BAL#299: unsupported token decimals")]
    UnsupportedDecimals,

    // Pools
    #[error("BAL#300: min amp")]
    MinAmp,
    #[error("BAL#301: max amp")]
    MaxAmp,
    #[error("BAL#302: min weight")]
    MinWeight,
    #[error("BAL#304: max in ratio")]
    MaxInRatio,
    #[error("BAL#305: max out ratio")]
    MaxOutRatio,
    #[error("BAL#306: min BPT in for token out")]
    MinBptInForTokenOut,
    #[error("BAL#307: max out BPT for token in")]
    MaxOutBptForTokenIn,
    #[error("BAL#308: normalized weight invariant")]
    NormalizedWeightInvariant,
    #[error("BAL#310: unhandled join kind, pool is already initialized")]
    AlreadyInitialized,
    #[error("BAL#311: zero invariant")]
    ZeroInvariant,
    #[error("BAL#317: amp end time too close")]
    AmpEndTimeTooClose,
    #[error("BAL#318: amp ongoing update")]
    AmpOngoingUpdate,
    #[error("BAL#319: amp rate too high")]
    AmpRateTooHigh,
    #[error("BAL#320: amp no ongoing update")]
    AmpNoOngoingUpdate,
    #[error("BAL#321: stable invariant didn't converge")]
    StableInvariantDidNotConverge,
    #[error("BAL#322: stable get balance didn't converge")]
    StableGetBalanceDidNotConverge,
}

impl Error {
    /// The numeric `BAL#` error code.
    pub fn code(self) -> u16 {
        match self {
            Self::AddOverflow => 0,
            Self::SubOverflow => 1,
            Self::MulOverflow => 3,
            Self::ZeroDivision => 4,
            Self::DivInternal => 5,
            Self::XOutOfBounds => 6,
            Self::YOutOfBounds => 7,
            Self::ProductOutOfBounds => 8,
            Self::InvalidExponent => 9,
            Self::OutOfBounds => 100,
            Self::InputLengthMismatch => 103,
            Self::MinTokens => 200,
            Self::MaxTokens => 201,
            Self::MaxSwapFeePercentage => 202,
            Self::MinSwapFeePercentage => 203,
            Self::MinimumBpt => 204,
            Self::Uninitialized => 206,
            Self::BptInMaxAmount => 207,
            Self::BptOutMinAmount => 208,
            Self::UnsupportedDecimals => 299,
            Self::MinAmp => 300,
            Self::MaxAmp => 301,
            Self::MinWeight => 302,
            Self::MaxInRatio => 304,
            Self::MaxOutRatio => 305,
            Self::MinBptInForTokenOut => 306,
            Self::MaxOutBptForTokenIn => 307,
            Self::NormalizedWeightInvariant => 308,
            Self::AlreadyInitialized => 310,
            Self::ZeroInvariant => 311,
            Self::AmpEndTimeTooClose => 317,
            Self::AmpOngoingUpdate => 318,
            Self::AmpRateTooHigh => 319,
            Self::AmpNoOngoingUpdate => 320,
            Self::StableInvariantDidNotConverge => 321,
            Self::StableGetBalanceDidNotConverge => 322,
        }
    }

    /// Whether the error comes from misuse of an arithmetic primitive, as
    /// opposed to a pool policy violation.
    pub fn is_arithmetic(self) -> bool {
        self.code() < 100
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashSet};

    const ALL: [Error; 36] = [
        Error::AddOverflow,
        Error::SubOverflow,
        Error::MulOverflow,
        Error::ZeroDivision,
        Error::DivInternal,
        Error::XOutOfBounds,
        Error::YOutOfBounds,
        Error::ProductOutOfBounds,
        Error::InvalidExponent,
        Error::OutOfBounds,
        Error::InputLengthMismatch,
        Error::MinTokens,
        Error::MaxTokens,
        Error::MaxSwapFeePercentage,
        Error::MinSwapFeePercentage,
        Error::MinimumBpt,
        Error::Uninitialized,
        Error::BptInMaxAmount,
        Error::BptOutMinAmount,
        Error::UnsupportedDecimals,
        Error::MinAmp,
        Error::MaxAmp,
        Error::MinWeight,
        Error::MaxInRatio,
        Error::MaxOutRatio,
        Error::MinBptInForTokenOut,
        Error::MaxOutBptForTokenIn,
        Error::NormalizedWeightInvariant,
        Error::AlreadyInitialized,
        Error::ZeroInvariant,
        Error::AmpEndTimeTooClose,
        Error::AmpOngoingUpdate,
        Error::AmpRateTooHigh,
        Error::AmpNoOngoingUpdate,
        Error::StableInvariantDidNotConverge,
        Error::StableGetBalanceDidNotConverge,
    ];

    #[test]
    fn display_contains_code() {
        for error in ALL {
            assert!(
                error
                    .to_string()
                    .starts_with(&format!("BAL#{:03}", error.code()))
            );
        }
    }

    #[test]
    fn codes_follow_registry() {
        assert_eq!(Error::Uninitialized.code(), 206);
        assert_eq!(Error::BptInMaxAmount.code(), 207);
        assert_eq!(Error::BptOutMinAmount.code(), 208);
        assert_eq!(Error::AlreadyInitialized.code(), 310);
        assert_eq!(Error::StableGetBalanceDidNotConverge.code(), 322);

        let codes: HashSet<u16> = ALL.iter().map(|error| error.code()).collect();
        assert_eq!(codes.len(), ALL.len());
        let codes: Vec<u16> = ALL.iter().map(|error| error.code()).collect();
        assert!(codes.is_sorted());
    }

    #[test]
    fn arithmetic_classification() {
        assert!(Error::ZeroDivision.is_arithmetic());
        assert!(Error::InvalidExponent.is_arithmetic());
        assert!(!Error::OutOfBounds.is_arithmetic());
        assert!(!Error::ZeroInvariant.is_arithmetic());
    }
}
