use {
    amm_math::{Bfp, SwapKind},
    primitive_types::U256,
    std::{
        fmt::{self, Display, Formatter},
        path::PathBuf,
    },
};

#[derive(clap::Parser, Debug)]
#[clap(name = "amm-query", about = "Dry-run queries against a pool definition")]
pub struct Arguments {
    /// Path to the TOML pool definition.
    #[clap(long, env)]
    pub config: PathBuf,

    /// The log filter.
    #[clap(long, env, default_value = "warn,amm_query=info,amm_math=info")]
    pub log_filter: String,

    /// Unix timestamp in seconds the query is evaluated at. Defaults to the
    /// current time.
    #[clap(long, env)]
    pub now: Option<u64>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Computes the invariant of the given balances.
    Invariant {
        /// Native token balances, comma separated.
        #[clap(long, value_delimiter = ',', value_parser = parse_u256, required = true)]
        balances: Vec<U256>,
    },
    /// Computes the calculated side of a swap.
    Swap {
        #[clap(flatten)]
        kind: SwapKindArgs,
        #[clap(long)]
        index_in: usize,
        #[clap(long)]
        index_out: usize,
        /// The fixed side of the swap, in native token units.
        #[clap(long, value_parser = parse_u256)]
        amount: U256,
        /// Native token balances, comma separated.
        #[clap(long, value_delimiter = ',', value_parser = parse_u256, required = true)]
        balances: Vec<U256>,
    },
    /// Evaluates a join given as JSON user data, for example
    /// `{"kind":"allTokensInForExactBptOut","bptOut":"1000"}`.
    Join {
        user_data: String,
        #[clap(flatten)]
        state: StateArgs,
    },
    /// Evaluates an exit given as JSON user data, for example
    /// `{"kind":"exactBptInForTokensOut","bptIn":"1000"}`.
    Exit {
        user_data: String,
        #[clap(flatten)]
        state: StateArgs,
    },
    /// Shows the amplification parameter of a stable pool.
    Amplification,
}

#[derive(clap::Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SwapKindArgs {
    /// The amount is the exact amount in.
    #[clap(long)]
    pub given_in: bool,
    /// The amount is the exact amount out.
    #[clap(long)]
    pub given_out: bool,
}

impl SwapKindArgs {
    pub fn kind(&self) -> SwapKind {
        if self.given_out {
            SwapKind::GivenOut
        } else {
            SwapKind::GivenIn
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct StateArgs {
    /// Native token balances, comma separated.
    #[clap(long, value_delimiter = ',', value_parser = parse_u256, required = true)]
    pub balances: Vec<U256>,

    /// Total BPT supply, zero for an uninitialized pool.
    #[clap(long, value_parser = parse_u256, default_value = "0")]
    pub total_supply: U256,

    /// Invariant stored after the previous join or exit.
    #[clap(long, default_value = "0")]
    pub last_invariant: Bfp,

    /// Protocol swap fee percentage.
    #[clap(long, default_value = "0")]
    pub protocol_fee: Bfp,
}

fn parse_u256(s: &str) -> Result<U256, String> {
    U256::from_dec_str(s).map_err(|err| format!("invalid amount {s:?}: {err:?}"))
}

impl Display for Arguments {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let Self {
            config,
            log_filter,
            now,
            command,
        } = self;

        writeln!(f, "config: {}", config.display())?;
        writeln!(f, "log_filter: {log_filter}")?;
        writeln!(f, "now: {now:?}")?;
        write!(f, "command: {command:?}")
    }
}

#[cfg(test)]
mod tests {
    use {super::*, clap::Parser};

    #[test]
    fn parses_swap() {
        let args = Arguments::try_parse_from([
            "amm-query",
            "--config",
            "pool.toml",
            "--now",
            "1700000000",
            "swap",
            "--given-out",
            "--index-in",
            "0",
            "--index-out",
            "1",
            "--amount",
            "1000",
            "--balances",
            "10,20",
        ])
        .unwrap();
        assert_eq!(args.now, Some(1_700_000_000));
        let Command::Swap {
            kind,
            amount,
            balances,
            ..
        } = args.command
        else {
            panic!("unexpected command");
        };
        assert_eq!(kind.kind(), SwapKind::GivenOut);
        assert_eq!(amount, U256::from(1000));
        assert_eq!(balances, vec![U256::from(10), U256::from(20)]);
    }

    #[test]
    fn swap_kind_is_exclusive_and_required() {
        let swap = |flags: &[&str]| {
            let mut args = vec!["amm-query", "--config", "pool.toml", "swap"];
            args.extend_from_slice(flags);
            args.extend(["--index-in", "0", "--index-out", "1"]);
            args.extend(["--amount", "1", "--balances", "1,1"]);
            Arguments::try_parse_from(args)
        };
        assert!(swap(&[]).is_err());
        assert!(swap(&["--given-in", "--given-out"]).is_err());
        assert!(swap(&["--given-in"]).is_ok());
    }

    #[test]
    fn join_state_defaults() {
        let args = Arguments::try_parse_from([
            "amm-query",
            "--config",
            "pool.toml",
            "join",
            r#"{"kind":"init","amountsIn":["1","1"]}"#,
            "--balances",
            "0,0",
        ])
        .unwrap();
        let Command::Join { state, .. } = args.command else {
            panic!("unexpected command");
        };
        assert!(state.total_supply.is_zero());
        assert!(state.last_invariant.is_zero());
        assert!(state.protocol_fee.is_zero());
    }

    #[test]
    fn amounts_are_decimal() {
        assert!(parse_u256("0x10").is_err());
        assert_eq!(parse_u256("10").unwrap(), U256::from(10));
    }
}
