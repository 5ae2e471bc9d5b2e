//! Protocol swap fees accrue between joins and exits as invariant growth and
//! are realized on the next join or exit. They are paid in a single token,
//! the one with the largest upscaled balance.

use super::{error::Error, fixed_point::Bfp};

/// Index of the token protocol fees are paid in. Ties go to the lowest index.
pub fn fee_token_index(balances: &[Bfp]) -> usize {
    balances
        .iter()
        .enumerate()
        .fold((0, Bfp::zero()), |(max_index, max_balance), (index, balance)| {
            if *balance > max_balance {
                (index, *balance)
            } else {
                (max_index, max_balance)
            }
        })
        .0
}

/// Due protocol fee per token. Only the fee token is non-zero; its amount is
/// computed by `token_fee` from the fee token index. A zero percentage
/// charges nothing and evaluates nothing.
pub fn due_protocol_fee_amounts(
    balances: &[Bfp],
    protocol_swap_fee_percentage: Bfp,
    token_fee: impl FnOnce(usize) -> Result<Bfp, Error>,
) -> Result<Vec<Bfp>, Error> {
    let mut due = vec![Bfp::zero(); balances.len()];
    if protocol_swap_fee_percentage.is_zero() || balances.is_empty() {
        return Ok(due);
    }

    let index = fee_token_index(balances);
    due[index] = token_fee(index)?;
    tracing::debug!(token_index = index, amount = %due[index], "due protocol fee");
    Ok(due)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bfp(s: &str) -> Bfp {
        s.parse().unwrap()
    }

    #[test]
    fn largest_balance_pays() {
        assert_eq!(fee_token_index(&[bfp("1"), bfp("3"), bfp("2")]), 1);
        assert_eq!(fee_token_index(&[bfp("3"), bfp("1"), bfp("3")]), 0);
        assert_eq!(fee_token_index(&[]), 0);
    }

    #[test]
    fn zero_percentage_skips_evaluation() {
        let due = due_protocol_fee_amounts(&[bfp("1"), bfp("2")], Bfp::zero(), |_| {
            panic!("fee evaluated")
        })
        .unwrap();
        assert_eq!(due, vec![Bfp::zero(); 2]);
    }

    #[test]
    fn only_fee_token_is_charged() {
        let due = due_protocol_fee_amounts(&[bfp("1"), bfp("2"), bfp("1.5")], bfp("0.5"), |index| {
            assert_eq!(index, 1);
            Ok(bfp("0.25"))
        })
        .unwrap();
        assert_eq!(due, vec![Bfp::zero(), bfp("0.25"), Bfp::zero()]);
    }

    #[test]
    fn errors_propagate() {
        assert_eq!(
            due_protocol_fee_amounts(&[bfp("1")], bfp("0.5"), |_| Err(Error::ZeroInvariant))
                .unwrap_err(),
            Error::ZeroInvariant
        );
    }
}
