//! Exponentiation and logarithm for 18 decimal fixed point numbers, following
//! Balancer's `LogExpMath` library.
//!
//! `x^y` is computed as `exp(y * ln(x))`. Both `exp` and `ln` decompose their
//! argument against a table of precomputed powers `a_n = e^(x_n)` with
//! `x_n = 2^(7 - n)` and approximate the remainder with a Taylor series.
//! Intermediate values carry 20 decimals, and arguments close to one go
//! through a 36 decimal logarithm, which keeps the relative error of `pow`
//! well below `MAX_POW_RELATIVE_ERROR` (10^-14) over the domain pools use.
//!
//! Signed intermediates are `BigInt`s. Every entry point bounds its inputs to
//! what a signed 256 bit implementation accepts, so results are identical to
//! the on-chain library.

use {
    super::{
        conversions::{big_int_to_u256, u256_to_big_int},
        error::Error,
    },
    num::{BigInt, One as _, Signed as _, Zero as _},
    primitive_types::U256,
    std::sync::LazyLock,
};

fn constant(digits: &str) -> BigInt {
    BigInt::parse_bytes(digits.as_bytes(), 10).expect("constant is a decimal literal")
}

static ONE_18: LazyLock<BigInt> = LazyLock::new(|| BigInt::from(10).pow(18));
static ONE_20: LazyLock<BigInt> = LazyLock::new(|| BigInt::from(10).pow(20));
static ONE_36: LazyLock<BigInt> = LazyLock::new(|| BigInt::from(10).pow(36));

/// Upper bound (exclusive) of values representable as signed 256 bit
/// integers.
static INT256_BOUND: LazyLock<BigInt> = LazyLock::new(|| BigInt::one() << 255);

// The largest result `exp` can hold with 20 internal decimals is
// (2^255 - 1) / 10^20, so the largest exponent is ln of that, about 130.7.
// The smallest representable result is 10^-18, so the smallest exponent is
// about -41.45. Both are rounded towards zero.
static MAX_NATURAL_EXPONENT: LazyLock<BigInt> = LazyLock::new(|| BigInt::from(130) * &*ONE_18);
static MIN_NATURAL_EXPONENT: LazyLock<BigInt> = LazyLock::new(|| BigInt::from(-41) * &*ONE_18);

// ln(0.9) and ln(1.1) fit with 36 decimals in 256 bits.
static LN_36_LOWER_BOUND: LazyLock<BigInt> =
    LazyLock::new(|| &*ONE_18 - BigInt::from(10).pow(17));
static LN_36_UPPER_BOUND: LazyLock<BigInt> =
    LazyLock::new(|| &*ONE_18 + BigInt::from(10).pow(17));

/// Bound on `y` that keeps `y * ln(x)` inside 256 bits.
static MILD_EXPONENT_BOUND: LazyLock<BigInt> =
    LazyLock::new(|| (BigInt::one() << 254) / &*ONE_20);

// 18 decimal x_n, with a_n stored as plain integers (no decimals) since they
// would overflow as fixed point numbers.
static X0: LazyLock<BigInt> = LazyLock::new(|| constant("128000000000000000000"));
static A0: LazyLock<BigInt> =
    LazyLock::new(|| constant("38877084059945950922200000000000000000000000000000000000"));
static X1: LazyLock<BigInt> = LazyLock::new(|| constant("64000000000000000000"));
static A1: LazyLock<BigInt> = LazyLock::new(|| constant("6235149080811616882910000000"));

/// 20 decimal `(x_n, a_n)` pairs for n in 2..=11.
static TERMS: LazyLock<[(BigInt, BigInt); 10]> = LazyLock::new(|| {
    [
        ("3200000000000000000000", "7896296018268069516100000000000000"),
        ("1600000000000000000000", "888611052050787263676000000"),
        ("800000000000000000000", "298095798704172827474000"),
        ("400000000000000000000", "5459815003314423907810"),
        ("200000000000000000000", "738905609893065022723"),
        ("100000000000000000000", "271828182845904523536"),
        ("50000000000000000000", "164872127070012814685"),
        ("25000000000000000000", "128402541668774148407"),
        ("12500000000000000000", "113314845306682631683"),
        ("6250000000000000000", "106449445891785942956"),
    ]
    .map(|(x, a)| (constant(x), constant(a)))
});

/// Number of `TERMS` used by `exp`; the last two add nothing at 20 decimals.
const EXP_TERMS: usize = 8;

/// Exponentiation `x^y` with unsigned 18 decimal fixed point base and
/// exponent. `0^0` is defined as one.
pub fn pow(x: U256, y: U256) -> Result<U256, Error> {
    if y.is_zero() {
        return Ok(U256::exp10(18));
    }
    if x.is_zero() {
        return Ok(U256::zero());
    }

    let x = u256_to_big_int(&x);
    if x >= *INT256_BOUND {
        return Err(Error::XOutOfBounds);
    }
    let y = u256_to_big_int(&y);
    if y >= *MILD_EXPONENT_BOUND {
        return Err(Error::YOutOfBounds);
    }

    let logx_times_y = if *LN_36_LOWER_BOUND < x && x < *LN_36_UPPER_BOUND {
        let ln_36_x = ln_36(&x);
        // Split the 36 decimal logarithm into two 18 decimal halves so that
        // multiplying by `y` cannot overflow.
        (&ln_36_x / &*ONE_18) * &y + ((&ln_36_x % &*ONE_18) * &y) / &*ONE_18
    } else {
        ln_internal(&x) * &y
    };
    let logx_times_y = logx_times_y / &*ONE_18;

    if logx_times_y < *MIN_NATURAL_EXPONENT || logx_times_y > *MAX_NATURAL_EXPONENT {
        return Err(Error::ProductOutOfBounds);
    }

    big_int_to_u256(&exp(&logx_times_y)?)
}

/// Natural exponentiation `e^x` with a signed 18 decimal fixed point
/// exponent in `[-41, 130]`.
pub fn exp(x: &BigInt) -> Result<BigInt, Error> {
    if *x < *MIN_NATURAL_EXPONENT || *x > *MAX_NATURAL_EXPONENT {
        return Err(Error::InvalidExponent);
    }

    if x.is_negative() {
        // e^(-x) = 1 / e^x
        return Ok((&*ONE_18 * &*ONE_18) / exp(&-x)?);
    }

    let mut x = x.clone();
    let first_an = if x >= *X0 {
        x -= &*X0;
        A0.clone()
    } else if x >= *X1 {
        x -= &*X1;
        A1.clone()
    } else {
        BigInt::one()
    };

    x *= 100;

    let mut product = ONE_20.clone();
    for (x_n, a_n) in TERMS.iter().take(EXP_TERMS) {
        if x >= *x_n {
            x -= x_n;
            product = (product * a_n) / &*ONE_20;
        }
    }

    // Taylor series of e^x for the remainder, which is now below x_9. Twelve
    // terms suffice for 18 decimals.
    let mut series_sum = &*ONE_20 + &x;
    let mut term = x.clone();
    for n in 2..=12 {
        term = ((term * &x) / &*ONE_20) / n;
        series_sum += &term;
    }

    Ok((((product * series_sum) / &*ONE_20) * first_an) / 100)
}

/// Natural logarithm with a signed 18 decimal fixed point argument, which
/// must be strictly positive.
pub fn ln(a: &BigInt) -> Result<BigInt, Error> {
    check_log_argument(a)?;
    if *LN_36_LOWER_BOUND < *a && *a < *LN_36_UPPER_BOUND {
        Ok(ln_36(a) / &*ONE_18)
    } else {
        Ok(ln_internal(a))
    }
}

/// Logarithm of `arg` in base `base`, both signed 18 decimal fixed point.
pub fn log(arg: &BigInt, base: &BigInt) -> Result<BigInt, Error> {
    check_log_argument(arg)?;
    check_log_argument(base)?;

    // Both logarithms are taken with 36 decimals.
    let ln_36_or_upscaled = |value: &BigInt| {
        if *LN_36_LOWER_BOUND < *value && *value < *LN_36_UPPER_BOUND {
            ln_36(value)
        } else {
            ln_internal(value) * &*ONE_18
        }
    };
    let log_base = ln_36_or_upscaled(base);
    if log_base.is_zero() {
        return Err(Error::ZeroDivision);
    }
    let log_arg = ln_36_or_upscaled(arg);

    Ok((log_arg * &*ONE_18) / log_base)
}

fn check_log_argument(a: &BigInt) -> Result<(), Error> {
    if !a.is_positive() {
        return Err(Error::OutOfBounds);
    }
    if *a >= *INT256_BOUND {
        return Err(Error::XOutOfBounds);
    }
    Ok(())
}

fn ln_internal(a: &BigInt) -> BigInt {
    if *a < *ONE_18 {
        // ln(a) = -ln(1/a), and 1/a is larger than one.
        return -ln_internal(&((&*ONE_18 * &*ONE_18) / a));
    }

    let mut a = a.clone();
    let mut sum = BigInt::zero();

    // a_0 and a_1 have no decimals, so they are compared against `a` scaled
    // by 18 decimals and divided out as plain integers.
    if a >= &*A0 * &*ONE_18 {
        a /= &*A0;
        sum += &*X0;
    }
    if a >= &*A1 * &*ONE_18 {
        a /= &*A1;
        sum += &*X1;
    }

    sum *= 100;
    a *= 100;

    for (x_n, a_n) in TERMS.iter() {
        if a >= *a_n {
            a = (a * &*ONE_20) / a_n;
            sum += x_n;
        }
    }

    // `a` is now below a_11 (about 1.06). With z = (a - 1) / (a + 1):
    // ln(a) = 2 * (z + z^3 / 3 + z^5 / 5 + ...)
    let z = ((&a - &*ONE_20) * &*ONE_20) / (&a + &*ONE_20);
    let z_squared = (&z * &z) / &*ONE_20;

    let mut num = z.clone();
    let mut series_sum = z;
    for denominator in [3, 5, 7, 9, 11] {
        num = (num * &z_squared) / &*ONE_20;
        series_sum += &num / denominator;
    }
    series_sum *= 2;

    (sum + series_sum) / 100
}

/// 36 decimal natural logarithm for arguments in
/// `(LN_36_LOWER_BOUND, LN_36_UPPER_BOUND)`. Returns a 36 decimal value.
fn ln_36(x: &BigInt) -> BigInt {
    let x = x * &*ONE_18;

    let z = ((&x - &*ONE_36) * &*ONE_36) / (&x + &*ONE_36);
    let z_squared = (&z * &z) / &*ONE_36;

    let mut num = z.clone();
    let mut series_sum = z;
    for denominator in [3, 5, 7, 9, 11, 13, 15] {
        num = (num * &z_squared) / &*ONE_36;
        series_sum += &num / denominator;
    }

    series_sum * 2
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        rand::{Rng, SeedableRng, rngs::StdRng},
    };

    fn fp(value: f64) -> BigInt {
        BigInt::from((value * 1e18) as i128)
    }

    fn to_f64(value: &BigInt) -> f64 {
        value.to_string().parse::<f64>().unwrap() / 1e18
    }

    fn assert_relative(actual: f64, expected: f64, tolerance: f64) {
        let error = ((actual - expected) / expected).abs();
        assert!(
            error <= tolerance,
            "actual {actual}, expected {expected}, relative error {error}"
        );
    }

    #[test]
    fn exp_of_zero_is_one() {
        assert_eq!(exp(&BigInt::zero()).unwrap(), *ONE_18);
    }

    #[test]
    fn exp_known_values() {
        assert_relative(to_f64(&exp(&fp(1.)).unwrap()), std::f64::consts::E, 1e-15);
        assert_relative(to_f64(&exp(&fp(-1.)).unwrap()), 1. / std::f64::consts::E, 1e-15);
        assert_relative(to_f64(&exp(&fp(10.)).unwrap()), 10f64.exp(), 1e-15);
        assert_relative(to_f64(&exp(&fp(70.5)).unwrap()), 70.5f64.exp(), 1e-14);
    }

    #[test]
    fn exp_domain() {
        assert!(exp(&MAX_NATURAL_EXPONENT).is_ok());
        assert!(exp(&MIN_NATURAL_EXPONENT).is_ok());
        assert_eq!(
            exp(&(&*MAX_NATURAL_EXPONENT + 1)).unwrap_err(),
            Error::InvalidExponent
        );
        assert_eq!(
            exp(&(&*MIN_NATURAL_EXPONENT - 1)).unwrap_err(),
            Error::InvalidExponent
        );
    }

    #[test]
    fn ln_known_values() {
        assert_eq!(ln(&ONE_18).unwrap(), BigInt::zero());
        assert_relative(to_f64(&ln(&fp(std::f64::consts::E)).unwrap()), 1., 1e-15);
        assert_relative(to_f64(&ln(&fp(100.)).unwrap()), 100f64.ln(), 1e-15);
        assert_relative(to_f64(&ln(&fp(0.5)).unwrap()), 0.5f64.ln(), 1e-15);
        // The 36 decimal path.
        assert_relative(to_f64(&ln(&fp(0.95)).unwrap()), 0.95f64.ln(), 1e-14);
        assert_relative(to_f64(&ln(&fp(1.05)).unwrap()), 1.05f64.ln(), 1e-14);
    }

    #[test]
    fn ln_rejects_non_positive() {
        assert_eq!(ln(&BigInt::zero()).unwrap_err(), Error::OutOfBounds);
        assert_eq!(ln(&-&*ONE_18).unwrap_err(), Error::OutOfBounds);
        assert_eq!(ln(&INT256_BOUND).unwrap_err(), Error::XOutOfBounds);
    }

    #[test]
    fn log_base_change() {
        assert_relative(to_f64(&log(&fp(100.), &fp(10.)).unwrap()), 2., 1e-15);
        assert_relative(to_f64(&log(&fp(8.), &fp(2.)).unwrap()), 3., 1e-15);
        assert_eq!(log(&fp(8.), &ONE_18).unwrap_err(), Error::ZeroDivision);
    }

    #[test]
    fn pow_edge_cases() {
        let one = U256::exp10(18);
        assert_eq!(pow(U256::zero(), U256::zero()).unwrap(), one);
        assert_eq!(pow(U256::from(5), U256::zero()).unwrap(), one);
        assert_eq!(pow(U256::zero(), one).unwrap(), U256::zero());
        assert_eq!(pow(U256::one() << 255, one).unwrap_err(), Error::XOutOfBounds);
        assert_eq!(pow(one, U256::one() << 250).unwrap_err(), Error::YOutOfBounds);
        // 1e30^10 = 1e300 which is far beyond e^130.
        assert_eq!(
            pow(U256::exp10(48), U256::exp10(19)).unwrap_err(),
            Error::ProductOutOfBounds
        );
    }

    #[test]
    fn pow_known_values() {
        let sqrt = pow(U256::exp10(18) * 4, U256::exp10(17) * 5).unwrap();
        assert!(sqrt.as_u128().abs_diff(2_000_000_000_000_000_000) <= 100);

        let square = pow(U256::exp10(18) * 2, U256::exp10(18) * 2).unwrap();
        assert!(square.as_u128().abs_diff(4_000_000_000_000_000_000) <= 100);
    }

    #[test]
    fn pow_relative_error_is_bounded() {
        // Ranges that weighted pools hit: bases from 0.001 to 1000 and weight
        // ratio exponents from 0.01 to 100, with results kept well above the
        // 1 wei resolution.
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let base: f64 = 10f64.powf(rng.gen_range(-3.0..3.0));
            let exponent: f64 = 10f64.powf(rng.gen_range(-2.0..1.0));
            let expected = base.powf(exponent);
            if !(1e-4..1e20).contains(&expected) {
                continue;
            }

            let x = U256::from((base * 1e18) as u128);
            let y = U256::from((exponent * 1e18) as u128);
            let x_exact = x.as_u128() as f64 / 1e18;
            let y_exact = y.as_u128() as f64 / 1e18;

            let actual = pow(x, y).unwrap().as_u128() as f64 / 1e18;
            assert_relative(actual, x_exact.powf(y_exact), 1e-13);
        }
    }
}
