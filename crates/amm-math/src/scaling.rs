//! Conversion between native token amounts and the 18 decimal space the pool
//! math works in, and swap fee application at that boundary.

use {
    super::{error::Error, fixed_point::Bfp},
    primitive_types::U256,
};

/// Decimals of the internal representation. Tokens with more decimals are
/// not supported.
pub const MAX_DECIMALS: u8 = 18;

/// Multiplier from native token amounts to 18 decimal amounts,
/// `10^(18 - decimals)` as a fixed point number.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScalingFactor(Bfp);

impl ScalingFactor {
    pub fn from_decimals(decimals: u8) -> Result<Self, Error> {
        let exp = MAX_DECIMALS
            .checked_sub(decimals)
            .ok_or(Error::UnsupportedDecimals)?;
        Ok(Self(Bfp::exp10(exp.into())))
    }

    pub fn as_bfp(self) -> Bfp {
        self.0
    }

    /// Scales the input token amount to the value that is used by the pool
    /// math. Exact, as the factor is an integer.
    pub fn upscale(self, amount: U256) -> Result<Bfp, Error> {
        Bfp::from_wei(amount).mul_down(self.0)
    }

    /// Returns the token amount corresponding to the internal representation,
    /// rounded up. Used for amounts entering the pool.
    pub fn downscale_up(self, amount: Bfp) -> Result<U256, Error> {
        Ok(amount.div_up(self.0)?.as_uint256())
    }

    /// Similar to `downscale_up`, but rounded down. Used for amounts leaving
    /// the pool.
    pub fn downscale_down(self, amount: Bfp) -> Result<U256, Error> {
        Ok(amount.div_down(self.0)?.as_uint256())
    }
}

/// Grosses up an amount computed without fees so that the fee is paid on top.
pub fn add_swap_fee_amount(amount: U256, swap_fee: Bfp) -> Result<U256, Error> {
    // https://github.com/balancer-labs/balancer-v2-monorepo/blob/6c9e24e22d0c46cca6dd15861d3d33da61a60b98/pkg/core/contracts/pools/BasePool.sol#L454-L457
    let amount_with_fees = Bfp::from_wei(amount).div_up(swap_fee.complement())?;
    Ok(amount_with_fees.as_uint256())
}

/// Removes the fee, rounded up, from an amount paid in.
pub fn subtract_swap_fee_amount(amount: U256, swap_fee: Bfp) -> Result<U256, Error> {
    // https://github.com/balancer-labs/balancer-v2-monorepo/blob/6c9e24e22d0c46cca6dd15861d3d33da61a60b98/pkg/core/contracts/pools/BasePool.sol#L462-L466
    let amount = Bfp::from_wei(amount);
    let fee_amount = amount.mul_up(swap_fee)?;
    let amount_without_fees = amount.sub(fee_amount)?;
    Ok(amount_without_fees.as_uint256())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        rand::{Rng, SeedableRng, rngs::StdRng},
    };

    #[test]
    fn factor_from_decimals() {
        assert_eq!(ScalingFactor::from_decimals(18).unwrap().as_bfp(), Bfp::one());
        assert_eq!(
            ScalingFactor::from_decimals(6).unwrap().as_bfp(),
            Bfp::exp10(12)
        );
        assert_eq!(
            ScalingFactor::from_decimals(0).unwrap().as_bfp(),
            Bfp::exp10(18)
        );
        assert_eq!(
            ScalingFactor::from_decimals(19).unwrap_err(),
            Error::UnsupportedDecimals
        );
    }

    #[test]
    fn upscale() {
        let factor = ScalingFactor::from_decimals(6).unwrap();
        assert_eq!(
            factor.upscale(1_500_000.into()).unwrap(),
            "1.5".parse().unwrap()
        );
        assert_eq!(
            factor.upscale(U256::MAX).unwrap_err(),
            Error::MulOverflow
        );
    }

    #[test]
    fn downscale() {
        let factor = ScalingFactor::from_decimals(6).unwrap();
        let input = Bfp::from_wei(900_546_079_866_630_330_575_i128.into());
        assert_eq!(
            factor.downscale_up(input).unwrap(),
            U256::from(900_546_080_u128)
        );
        assert_eq!(
            factor.downscale_down(input).unwrap(),
            U256::from(900_546_079_u128)
        );
    }

    #[test]
    fn scaling_round_trip() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..1_000 {
            let factor = ScalingFactor::from_decimals(rng.gen_range(0..=18)).unwrap();
            let amount = U256::from(rng.gen_range(0..=u128::MAX));
            let upscaled = factor.upscale(amount).unwrap();
            assert_eq!(factor.downscale_down(upscaled).unwrap(), amount);
            assert_eq!(factor.downscale_up(upscaled).unwrap(), amount);
        }
    }

    #[test]
    fn swap_fees() {
        let fee: Bfp = "0.003".parse().unwrap();
        assert_eq!(
            subtract_swap_fee_amount(1_000_000.into(), fee).unwrap(),
            997_000.into()
        );
        // The fee is rounded up, so tiny amounts lose a full unit.
        assert_eq!(subtract_swap_fee_amount(10.into(), fee).unwrap(), 9.into());
        assert_eq!(
            add_swap_fee_amount(997_000.into(), fee).unwrap(),
            1_000_000.into()
        );
        assert_eq!(add_swap_fee_amount(9.into(), fee).unwrap(), 10.into());
        assert_eq!(
            add_swap_fee_amount(0.into(), fee).unwrap(),
            U256::zero()
        );
    }
}
