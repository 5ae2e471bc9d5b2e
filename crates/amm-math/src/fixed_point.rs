//! Module emulating the operations on fixed points with exactly 18 decimals as
//! used in the Balancer smart contracts. Original contract code:
//! https://github.com/balancer-labs/balancer-v2-monorepo/blob/master/pkg/solidity-utils/contracts/math/FixedPoint.sol

use {
    super::{
        error::Error,
        log_exp_math,
        math::BalU256,
    },
    anyhow::{Context, Result, bail, ensure},
    primitive_types::U256,
    std::{
        fmt::{self, Debug, Display, Formatter},
        str::FromStr,
        sync::LazyLock,
    },
};

/// Fixed point numbers that represent exactly any rational number that can be
/// represented with up to 18 decimals as long as it can be stored in 256 bits.
/// It corresponds to Solidity's `ufixed256x18`.
/// Operations on this type are implemented as in Balancer's FixedPoint library.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Bfp(U256);

static ONE_18: LazyLock<U256> = LazyLock::new(|| U256::exp10(18));
static ZERO: LazyLock<Bfp> = LazyLock::new(|| Bfp(U256::zero()));
static EPSILON: LazyLock<Bfp> = LazyLock::new(|| Bfp(U256::one()));
static ONE: LazyLock<Bfp> = LazyLock::new(|| Bfp(*ONE_18));
static TWO: LazyLock<Bfp> = LazyLock::new(|| Bfp(*ONE_18 * 2));
static FOUR: LazyLock<Bfp> = LazyLock::new(|| Bfp(*ONE_18 * 4));

/// Relative error bound of `log_exp_math::pow`, 10^-14.
static MAX_POW_RELATIVE_ERROR: LazyLock<Bfp> = LazyLock::new(|| Bfp(U256::from(10_000)));

/// Bases at or above this value keep `pow_up` accurate for any exponent a
/// pool can produce.
pub static MIN_POW_BASE_FREE_EXPONENT: LazyLock<Bfp> =
    LazyLock::new(|| Bfp(U256::from(700_000_000_000_000_000_u128)));

impl From<usize> for Bfp {
    fn from(num: usize) -> Self {
        Self(
            U256::from(num)
                .checked_mul(*ONE_18)
                .expect("usize times 10^18 fits in 256 bits"),
        )
    }
}

impl FromStr for Bfp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut split_dot = s.splitn(2, '.');
        let units = split_dot
            .next()
            .expect("Splitting a string slice yields at least one element");
        let decimals = split_dot.next().unwrap_or("0");
        if units.is_empty() || decimals.is_empty() || decimals.len() > 18 {
            bail!("Invalid decimal representation {s:?}");
        }
        ensure!(
            units.bytes().chain(decimals.bytes()).all(|b| b.is_ascii_digit()),
            "Invalid decimal representation {s:?}"
        );
        let units = U256::from_dec_str(units)?
            .checked_mul(*ONE_18)
            .context("Too large number")?;
        let decimals = U256::from_dec_str(&format!("{decimals:0<18}"))?;
        Ok(Bfp(units.checked_add(decimals).context("Too large number")?))
    }
}

impl Display for Bfp {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "{}.{:0>18}",
            self.0 / *ONE_18,
            (self.0 % *ONE_18).as_u128()
        )
    }
}

impl Debug for Bfp {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl serde::Serialize for Bfp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Bfp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Bfp {
    pub fn as_uint256(self) -> U256 {
        self.0
    }

    pub fn zero() -> Self {
        *ZERO
    }

    pub fn one() -> Self {
        *ONE
    }

    pub fn epsilon() -> Self {
        *EPSILON
    }

    pub fn from_wei(num: U256) -> Self {
        Self(num)
    }

    /// The fixed point value `10^exp`.
    pub fn exp10(exp: usize) -> Self {
        Self(U256::exp10(exp + 18))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(self, other: Self) -> Result<Self, Error> {
        Ok(Self(self.0.badd(other.0)?))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, other: Self) -> Result<Self, Error> {
        Ok(Self(self.0.bsub(other.0)?))
    }

    pub fn mul_down(self, other: Self) -> Result<Self, Error> {
        Ok(Self(self.0.bmul(other.0)?.bdiv_down(*ONE_18)?))
    }

    pub fn mul_up(self, other: Self) -> Result<Self, Error> {
        let product = self.0.bmul(other.0)?;
        Ok(if product.is_zero() {
            Bfp::zero()
        } else {
            Bfp(((product - 1) / *ONE_18) + 1)
        })
    }

    pub fn div_down(self, other: Self) -> Result<Self, Error> {
        if other.is_zero() {
            return Err(Error::ZeroDivision);
        }
        if self.is_zero() {
            return Ok(Bfp::zero());
        }
        let a_inflated = self.0.checked_mul(*ONE_18).ok_or(Error::DivInternal)?;
        Ok(Self(a_inflated / other.0))
    }

    pub fn div_up(self, other: Self) -> Result<Self, Error> {
        if other.is_zero() {
            return Err(Error::ZeroDivision);
        }
        if self.is_zero() {
            return Ok(Bfp::zero());
        }
        let a_inflated = self.0.checked_mul(*ONE_18).ok_or(Error::DivInternal)?;
        Ok(Self(((a_inflated - 1) / other.0) + 1))
    }

    /// `ONE - self`, or zero when `self` exceeds one.
    pub fn complement(self) -> Self {
        if self.0 < *ONE_18 {
            Self(*ONE_18 - self.0)
        } else {
            Bfp::zero()
        }
    }

    /// `self^exp` rounded down to a value that is guaranteed not to exceed the
    /// exact result.
    pub fn pow_down(self, exp: Self) -> Result<Self, Error> {
        // Exact fast paths for the exponents weighted pools use most.
        if exp == *ONE {
            return Ok(self);
        }
        if exp == *TWO {
            return self.mul_down(self);
        }
        if exp == *FOUR {
            let square = self.mul_down(self)?;
            return square.mul_down(square);
        }

        let raw = Bfp(log_exp_math::pow(self.0, exp.0)?);
        let max_error = raw.mul_up(*MAX_POW_RELATIVE_ERROR)?.add(*EPSILON)?;

        if raw < max_error {
            Ok(Bfp::zero())
        } else {
            raw.sub(max_error)
        }
    }

    /// `self^exp` rounded up to a value that is guaranteed not to fall below
    /// the exact result.
    pub fn pow_up(self, exp: Self) -> Result<Self, Error> {
        if exp == *ONE {
            return Ok(self);
        }
        if exp == *TWO {
            return self.mul_up(self);
        }
        if exp == *FOUR {
            let square = self.mul_up(self)?;
            return square.mul_up(square);
        }

        let raw = Bfp(log_exp_math::pow(self.0, exp.0)?);
        let max_error = raw.mul_up(*MAX_POW_RELATIVE_ERROR)?.add(*EPSILON)?;

        raw.add(max_error)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        rand::{Rng, SeedableRng, rngs::StdRng},
    };

    #[test]
    fn parsing() {
        assert_eq!("1".parse::<Bfp>().unwrap(), Bfp::one());
        assert_eq!(
            "0.1".parse::<Bfp>().unwrap(),
            Bfp::from_wei(U256::exp10(17))
        );
        assert_eq!(
            "1.01".parse::<Bfp>().unwrap(),
            Bfp::from_wei(U256::exp10(16) * 101)
        );
        assert_eq!(
            "10.000000000000000001".parse::<Bfp>().unwrap(),
            Bfp::from_wei(U256::exp10(19) + 1)
        );
        assert_eq!("0.8".parse::<Bfp>().unwrap().to_string(), "0.800000000000000000");
    }

    #[test]
    fn parsing_rejects_garbage() {
        assert!("".parse::<Bfp>().is_err());
        assert!(".1".parse::<Bfp>().is_err());
        assert!("1.".parse::<Bfp>().is_err());
        assert!("-1".parse::<Bfp>().is_err());
        assert!("0x10".parse::<Bfp>().is_err());
        assert!("1.0000000000000000001".parse::<Bfp>().is_err());
        assert!(
            "115792089237316195423570985008687907853269984665640564039458"
                .parse::<Bfp>()
                .is_err()
        );
    }

    #[test]
    fn serde_uses_decimal_strings() {
        let value: Bfp = serde_json::from_value(serde_json::json!("0.003")).unwrap();
        assert_eq!(value, Bfp::from_wei(U256::from(3_000_000_000_000_000_u128)));
        assert_eq!(
            serde_json::to_value(value).unwrap(),
            serde_json::json!("0.003000000000000000")
        );
    }

    #[test]
    fn from_usize_is_exact() {
        assert_eq!(Bfp::from(3).as_uint256(), U256::from(3) * U256::exp10(18));
        assert_eq!(
            Bfp::from(usize::MAX).as_uint256(),
            U256::from(usize::MAX) * U256::exp10(18)
        );
        assert_eq!(
            Bfp::from(usize::MAX).to_string(),
            format!("{}.000000000000000000", usize::MAX)
        );
    }

    #[test]
    fn add() {
        assert_eq!(Bfp::from(40).add(2.into()).unwrap(), 42.into());
        assert_eq!(
            Bfp(U256::MAX).add(Bfp::epsilon()).unwrap_err(),
            Error::AddOverflow
        );
    }

    #[test]
    fn sub() {
        assert_eq!(Bfp::from(50).sub(8.into()).unwrap(), 42.into());
        assert_eq!(
            Bfp::one().sub(Bfp(*ONE_18 + 1)).unwrap_err(),
            Error::SubOverflow
        );
    }

    macro_rules! test_mul {
        ($fn_name:ident) => {
            assert_eq!(Bfp::from(6).$fn_name(7.into()).unwrap(), 42.into());
            assert_eq!(Bfp::zero().$fn_name(Bfp::one()).unwrap(), Bfp::zero());
            assert_eq!(Bfp::one().$fn_name(Bfp::zero()).unwrap(), Bfp::zero());
            assert_eq!(
                Bfp::one().$fn_name(Bfp(U256::MAX)).unwrap_err(),
                Error::MulOverflow
            );
        };
    }

    #[test]
    fn mul() {
        test_mul!(mul_down);
        test_mul!(mul_up);

        let one_half = Bfp((5 * 10_u128.pow(17)).into());
        assert_eq!(Bfp::epsilon().mul_down(one_half).unwrap(), Bfp::zero());
        assert_eq!(Bfp::epsilon().mul_up(one_half).unwrap(), Bfp::epsilon());

        let max_in_ratio = Bfp::from_wei(U256::exp10(17).checked_mul(3_u32.into()).unwrap());
        let balances = [
            Bfp::from_wei(333_333_333_333_333_333_333_u128.into()),
            Bfp::from_wei(U256::exp10(27)),
        ];
        assert_eq!(
            balances[0].mul_down(max_in_ratio).unwrap(),
            Bfp::from_wei(99_999_999_999_999_999_999_u128.into())
        );
        assert_eq!(
            balances[1].mul_up(max_in_ratio).unwrap(),
            Bfp::from_wei(300_000_000_000_000_000_000_000_000_u128.into())
        );
    }

    #[test]
    fn mul_up_bounds_mul_down() {
        // Tiny operands, where the rounding direction matters the most.
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..1_000 {
            let a = Bfp::from_wei(U256::from(rng.gen_range(0_u64..1_000_000)));
            let b = Bfp::from_wei(U256::from(rng.r#gen::<u64>()));
            let down = a.mul_down(b).unwrap();
            let up = a.mul_up(b).unwrap();
            assert!(up >= down);
            assert!(up.sub(down).unwrap() <= Bfp::epsilon());
        }
        let two = Bfp::from_wei(2.into());
        let three = Bfp::from_wei(3.into());
        assert_eq!(two.mul_down(three).unwrap(), Bfp::zero());
        assert_eq!(two.mul_up(three).unwrap(), Bfp::epsilon());
    }

    macro_rules! test_div {
        ($fn_name:ident) => {
            assert_eq!(Bfp::from(42).$fn_name(7.into()).unwrap(), 6.into());
            assert_eq!(Bfp::zero().$fn_name(Bfp::one()).unwrap(), Bfp::zero());
            assert_eq!(
                Bfp::one().$fn_name(Bfp::zero()).unwrap_err(),
                Error::ZeroDivision
            );
            assert_eq!(
                Bfp(U256::MAX).$fn_name(Bfp::one()).unwrap_err(),
                Error::DivInternal
            );
        };
    }

    #[test]
    fn div() {
        test_div!(div_down);
        test_div!(div_up);

        assert_eq!(
            Bfp::epsilon().div_down(Bfp::from(2)).unwrap(),
            Bfp::zero()
        );
        assert_eq!(Bfp::epsilon().div_up(Bfp::from(2)).unwrap(), Bfp::epsilon());
        assert_eq!(Bfp::from(3).div_down(Bfp::from(2)).unwrap(), "1.5".parse().unwrap());
    }

    #[test]
    fn complement() {
        assert_eq!(Bfp::zero().complement(), Bfp::one());
        assert_eq!("0.2".parse::<Bfp>().unwrap().complement(), "0.8".parse().unwrap());
        assert_eq!(Bfp::one().complement(), Bfp::zero());
        assert_eq!(Bfp::from(2).complement(), Bfp::zero());
    }

    #[test]
    fn pow_fast_paths_are_exact() {
        let x: Bfp = "1.5".parse().unwrap();
        assert_eq!(x.pow_down(Bfp::one()).unwrap(), x);
        assert_eq!(x.pow_up(Bfp::one()).unwrap(), x);
        assert_eq!(x.pow_down(2.into()).unwrap(), "2.25".parse().unwrap());
        assert_eq!(x.pow_up(2.into()).unwrap(), "2.25".parse().unwrap());
        assert_eq!(x.pow_down(4.into()).unwrap(), "5.0625".parse().unwrap());
        assert_eq!(x.pow_up(4.into()).unwrap(), "5.0625".parse().unwrap());
    }

    #[test]
    fn pow_down_and_up_bracket_the_raw_result() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let x = Bfp::from_wei(U256::from(rng.gen_range(10_u128.pow(16)..10_u128.pow(21))));
            let y = Bfp::from_wei(U256::from(rng.gen_range(10_u128.pow(16)..3 * 10_u128.pow(18))));
            let raw = Bfp(log_exp_math::pow(x.0, y.0).unwrap());
            let down = x.pow_down(y).unwrap();
            let up = x.pow_up(y).unwrap();
            assert!(down < raw && raw < up, "{down} < {raw} < {up}");
        }
    }

    #[test]
    fn exp10() {
        assert_eq!(Bfp::exp10(0), Bfp::one());
        assert_eq!(Bfp::exp10(12), Bfp::from_wei(U256::exp10(30)));
    }

    #[test]
    fn display() {
        assert_eq!(Bfp::zero().to_string(), "0.000000000000000000");
        assert_eq!(Bfp::epsilon().to_string(), "0.000000000000000001");
        assert_eq!(format!("{:?}", Bfp::from(1337)), "1337.000000000000000000");
    }
}
