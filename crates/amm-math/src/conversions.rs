use {
    super::error::Error,
    num::{BigInt, Signed as _, bigint::Sign},
    primitive_types::U256,
};

pub fn u256_to_big_int(input: &U256) -> BigInt {
    let mut bytes = [0; 32];
    input.to_big_endian(&mut bytes);
    BigInt::from_bytes_be(Sign::Plus, &bytes)
}

/// Converts a non-negative `BigInt` back into a `U256`, failing if the value
/// is negative or does not fit in 256 bits.
pub fn big_int_to_u256(input: &BigInt) -> Result<U256, Error> {
    if input.is_negative() {
        return Err(Error::OutOfBounds);
    }
    let (_, bytes) = input.to_bytes_be();
    if bytes.len() > 32 {
        return Err(Error::MulOverflow);
    }
    Ok(U256::from_big_endian(&bytes))
}
