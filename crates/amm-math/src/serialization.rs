//! Serde adapters for `U256` amounts. Amounts cross the query boundary as
//! base-10 strings so that JSON and TOML consumers never lose precision.

use {
    primitive_types::U256,
    serde::{Deserialize, Deserializer, Serializer, de},
    serde_with::{DeserializeAs, SerializeAs},
    std::borrow::Cow,
};

pub struct DecimalU256;

impl SerializeAs<U256> for DecimalU256 {
    fn serialize_as<S>(source: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(source)
    }
}

impl<'de> DeserializeAs<'de, U256> for DecimalU256 {
    fn deserialize_as<D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Cow::<str>::deserialize(deserializer)?;
        U256::from_dec_str(s.trim())
            .map_err(|err| de::Error::custom(format!("failed to decode {s:?} as U256: {err:?}")))
    }
}
