use {
    crate::{
        arguments::{Arguments, Command, StateArgs},
        config,
        observe,
    },
    amm_math::{Bfp, ExitKind, JoinKind, PoolBalances, SwapRequest, serialization::DecimalU256},
    anyhow::{Context, Result},
    clap::Parser,
    primitive_types::U256,
    serde::Serialize,
    serde_with::serde_as,
};

#[serde_as]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapOutput {
    #[serde_as(as = "DecimalU256")]
    amount: U256,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InvariantOutput {
    invariant: Bfp,
}

pub fn start(args: impl IntoIterator<Item = String>) {
    let args = Arguments::parse_from(args);
    observe::initialize(&args.log_filter);
    tracing::info!("running amm-query with validated arguments:\n{}", args);

    match run(&args) {
        Ok(output) => println!("{output}"),
        Err(err) => {
            tracing::error!(?err, "query failed");
            std::process::exit(1);
        }
    }
}

/// Evaluates the query and returns its result as pretty printed JSON.
pub fn run(args: &Arguments) -> Result<String> {
    let pool = config::load(&args.config)?;
    // The clock is read once, so every step of the query sees the same
    // amplification parameter.
    let now = match args.now {
        Some(now) => now,
        None => u64::try_from(chrono::Utc::now().timestamp()).context("clock before epoch")?,
    };
    tracing::debug!(now, "evaluating query");

    let output = match &args.command {
        Command::Invariant { balances } => {
            let invariant = pool.invariant(balances, now).context("invariant")?;
            serde_json::to_value(InvariantOutput { invariant })?
        }
        Command::Swap {
            kind,
            index_in,
            index_out,
            amount,
            balances,
        } => {
            let request = SwapRequest {
                kind: kind.kind(),
                index_in: *index_in,
                index_out: *index_out,
                amount: *amount,
            };
            let amount = pool.query_swap(&request, balances, now).context("swap")?;
            serde_json::to_value(SwapOutput { amount })?
        }
        Command::Join { user_data, state } => {
            let kind: JoinKind = serde_json::from_str(user_data).context("invalid join data")?;
            let result = pool
                .query_join(&pool_balances(state), &kind, now)
                .context("join")?;
            serde_json::to_value(result)?
        }
        Command::Exit { user_data, state } => {
            let kind: ExitKind = serde_json::from_str(user_data).context("invalid exit data")?;
            let result = pool
                .query_exit(&pool_balances(state), &kind, now)
                .context("exit")?;
            serde_json::to_value(result)?
        }
        Command::Amplification => {
            let parameter = pool
                .amplification_parameter(now)
                .context("pool has no amplification parameter")?;
            serde_json::to_value(parameter)?
        }
    };

    Ok(serde_json::to_string_pretty(&output)?)
}

fn pool_balances(state: &StateArgs) -> PoolBalances {
    PoolBalances {
        balances: state.balances.clone(),
        bpt_total_supply: state.total_supply,
        last_invariant: state.last_invariant,
        protocol_swap_fee_percentage: state.protocol_fee,
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        serde_json::{Value, json},
        std::io::Write,
        tempfile::NamedTempFile,
    };

    fn weighted_config() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"
            kind = "weighted"
            swap-fee = "0.003"
            tokens = [{ decimals = 18, weight = "0.8" }, { decimals = 6, weight = "0.2" }]
            "#,
        )
        .unwrap();
        file
    }

    fn query(config: &NamedTempFile, command: &[&str]) -> Result<Value> {
        let path = config.path().to_str().unwrap();
        let mut args = vec!["amm-query", "--config", path, "--now", "1700000000"];
        args.extend_from_slice(command);
        let output = run(&Arguments::try_parse_from(args)?)?;
        Ok(serde_json::from_str(&output)?)
    }

    #[test]
    fn swap_query() {
        let config = weighted_config();
        let output = query(
            &config,
            &[
                "swap",
                "--given-in",
                "--index-in",
                "0",
                "--index-out",
                "1",
                "--amount",
                "1000000000000000000",
                "--balances",
                "100000000000000000000,400000000",
            ],
        )
        .unwrap();
        assert_eq!(output, json!({ "amount": "15562188" }));
    }

    #[test]
    fn join_query() {
        let config = weighted_config();
        let output = query(
            &config,
            &[
                "join",
                r#"{"kind":"init","amountsIn":["100000000000000000000","400000000"]}"#,
                "--balances",
                "0,0",
            ],
        )
        .unwrap();
        assert_eq!(
            output,
            json!({
                "bptOut": "263901582154572573112",
                "lockedBpt": "1000000",
                "amountsIn": ["100000000000000000000", "400000000"],
                "dueProtocolFees": ["0", "0"],
                "lastInvariant": "131.950791077286786556",
            })
        );
    }

    #[test]
    fn failing_queries() {
        let config = weighted_config();
        let err = query(&config, &["amplification"]).unwrap_err();
        assert!(err.to_string().contains("no amplification parameter"));

        let err = query(
            &config,
            &[
                "exit",
                r#"{"kind":"exactBptInForTokensOut","bptIn":"1"}"#,
                "--balances",
                "0,0",
            ],
        )
        .unwrap_err();
        assert_eq!(
            err.root_cause().downcast_ref::<amm_math::Error>(),
            Some(&amm_math::Error::Uninitialized)
        );

        let err = query(&config, &["join", "{}", "--balances", "0,0"]).unwrap_err();
        assert!(err.to_string().contains("invalid join data"));
    }
}
