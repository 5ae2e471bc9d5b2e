//! TOML pool definitions.
//!
//! ```toml
//! kind = "weighted"
//! swap-fee = "0.003"
//!
//! [[tokens]]
//! decimals = 18
//! weight = "0.8"
//!
//! [[tokens]]
//! decimals = 6
//! weight = "0.2"
//! ```
//!
//! Stable pools omit the weights and carry an `[amplification]` table, either
//! `value = <A>` or a ramp of precision scaled `start-value`, `end-value`,
//! `start-time` and `end-time`.

use {
    amm_math::{AmplificationState, Bfp, Pool, TokenState},
    anyhow::{Context, Result, ensure},
    serde::Deserialize,
    std::path::Path,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PoolConfig {
    kind: PoolKind,
    swap_fee: Bfp,
    tokens: Vec<TokenConfig>,
    amplification: Option<AmplificationConfig>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum PoolKind {
    Weighted,
    Stable,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct TokenConfig {
    decimals: u8,
    weight: Option<Bfp>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AmplificationConfig {
    Constant(ConstantAmplification),
    Ramp(AmplificationRamp),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ConstantAmplification {
    value: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct AmplificationRamp {
    start_value: u64,
    end_value: u64,
    start_time: u64,
    end_time: u64,
}

/// Loads and validates the pool definition at `path`.
pub fn load(path: &Path) -> Result<Pool> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read pool definition {}", path.display()))?;
    parse(&data).with_context(|| format!("invalid pool definition {}", path.display()))
}

pub fn parse(data: &str) -> Result<Pool> {
    let config: PoolConfig = toml::from_str(data).context("failed to parse pool definition")?;
    config.into_pool()
}

impl PoolConfig {
    fn into_pool(self) -> Result<Pool> {
        let tokens = self
            .tokens
            .iter()
            .enumerate()
            .map(|(index, token)| {
                TokenState::new(token.decimals)
                    .with_context(|| format!("tokens[{index}].decimals"))
            })
            .collect::<Result<Vec<_>>>()?;

        match self.kind {
            PoolKind::Weighted => {
                ensure!(
                    self.amplification.is_none(),
                    "amplification is not supported by weighted pools"
                );
                let weights = self
                    .tokens
                    .iter()
                    .enumerate()
                    .map(|(index, token)| {
                        token
                            .weight
                            .with_context(|| format!("tokens[{index}].weight is missing"))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Pool::weighted(tokens, weights, self.swap_fee).context("invalid weighted pool")
            }
            PoolKind::Stable => {
                ensure!(
                    self.tokens.iter().all(|token| token.weight.is_none()),
                    "weights are not supported by stable pools"
                );
                let amplification = match self.amplification.context("amplification is missing")? {
                    AmplificationConfig::Constant(constant) => {
                        AmplificationState::new(constant.value)
                    }
                    AmplificationConfig::Ramp(ramp) => AmplificationState::from_ramp(
                        ramp.start_value,
                        ramp.end_value,
                        ramp.start_time,
                        ramp.end_time,
                    ),
                }
                .context("amplification")?;
                Pool::stable(tokens, amplification, self.swap_fee).context("invalid stable pool")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        amm_math::{Error, PoolKind as Kind},
        std::io::Write,
    };

    fn root_cause(err: &anyhow::Error) -> Option<Error> {
        err.root_cause().downcast_ref::<Error>().copied()
    }

    #[test]
    fn weighted_pool() {
        let pool = parse(
            r#"
            kind = "weighted"
            swap-fee = "0.003"

            [[tokens]]
            decimals = 18
            weight = "0.8"

            [[tokens]]
            decimals = 6
            weight = "0.2"
            "#,
        )
        .unwrap();
        assert_eq!(pool.swap_fee(), "0.003".parse().unwrap());
        assert_eq!(pool.tokens()[1].decimals, 6);
        assert_eq!(
            pool.kind(),
            &Kind::Weighted {
                normalized_weights: vec!["0.8".parse().unwrap(), "0.2".parse().unwrap()],
            }
        );
    }

    #[test]
    fn stable_pools() {
        let pool = parse(
            r#"
            kind = "stable"
            swap-fee = "0.0004"
            tokens = [{ decimals = 18 }, { decimals = 6 }, { decimals = 18 }]
            amplification = { value = 100 }
            "#,
        )
        .unwrap();
        assert_eq!(
            pool.amplification_parameter(0).unwrap().value,
            100_000.into()
        );

        let pool = parse(
            r#"
            kind = "stable"
            swap-fee = "0.0004"
            tokens = [{ decimals = 18 }, { decimals = 18 }]

            [amplification]
            start-value = 100000
            end-value = 200000
            start-time = 0
            end-time = 172800
            "#,
        )
        .unwrap();
        let parameter = pool.amplification_parameter(86_400).unwrap();
        assert_eq!(parameter.value, 150_000.into());
        assert!(parameter.is_updating);
    }

    #[test]
    fn invalid_definitions() {
        let err = parse(
            r#"
            kind = "weighted"
            swap-fee = "0.003"
            tokens = [{ decimals = 18, weight = "0.5" }, { decimals = 18, weight = "0.4" }]
            "#,
        )
        .unwrap_err();
        assert_eq!(root_cause(&err), Some(Error::NormalizedWeightInvariant));

        let err = parse(
            r#"
            kind = "weighted"
            swap-fee = "0.003"
            tokens = [{ decimals = 18, weight = "0.5" }, { decimals = 18 }]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("tokens[1].weight"));

        let err = parse(
            r#"
            kind = "stable"
            swap-fee = "0.0004"
            tokens = [{ decimals = 24 }, { decimals = 18 }]
            amplification = { value = 100 }
            "#,
        )
        .unwrap_err();
        assert_eq!(root_cause(&err), Some(Error::UnsupportedDecimals));

        let err = parse(
            r#"
            kind = "stable"
            swap-fee = "0.0004"
            tokens = [{ decimals = 18 }, { decimals = 18 }]
            amplification = { value = 6000 }
            "#,
        )
        .unwrap_err();
        assert_eq!(root_cause(&err), Some(Error::MaxAmp));

        assert!(
            parse(
                r#"
                kind = "stable"
                swap-fee = "0.0004"
                fee = "0.1"
                tokens = [{ decimals = 18 }, { decimals = 18 }]
                amplification = { value = 100 }
                "#,
            )
            .is_err()
        );
        assert!(
            parse(
                r#"
                kind = "stable"
                swap-fee = "0.0004"
                tokens = [{ decimals = 18 }, { decimals = 18 }]
                "#,
            )
            .is_err()
        );
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            kind = "stable"
            swap-fee = "0.0004"
            tokens = [{{ decimals = 18 }}, {{ decimals = 18 }}]
            amplification = {{ value = 100 }}
            "#
        )
        .unwrap();
        assert!(load(file.path()).is_ok());
        assert!(load(Path::new("/does/not/exist.toml")).is_err());
    }
}
