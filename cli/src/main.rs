//! ChainFeed CLI: watch a ledger node's event feed and query its REST API.
//!
//! # Commands
//! ```text
//! chainfeed watch   --url <ws> [--retry-interval-ms N] [--max-attempts N]
//!                   [--connect-timeout-ms N] [--json] [--state <file>]
//! chainfeed send    --url <ws> --type <t> [--payload <json>]
//! chainfeed info    [--api <base>]
//! chainfeed block   --index <n> [--api <base>]
//! chainfeed tx      --txid <id> [--api <base>]
//! chainfeed balance --address <a> [--api <base>]
//! chainfeed peers   [--api <base>]
//! chainfeed submit  --tx <json> [--api <base>]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use chainfeed_core::FeedConfig;
use chainfeed_http::{HttpClientConfig, LedgerApiClient};

mod cmd_feed;
mod logging;

use logging::{init_tracing, LogConfig};

#[derive(Parser)]
#[command(
    name = "chainfeed",
    about = "Real-time ledger event feed and node API client",
    long_about = "
ChainFeed CLI: follow new blocks, transactions and peer updates pushed by a
ledger node over WebSocket, and query the node's REST API.

ENVIRONMENT VARIABLES:
  RUST_LOG    Overrides --verbose with a full tracing filter
",
    version
)]
struct Cli {
    /// Debug logging for chainfeed crates
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FeedArgs {
    /// WebSocket endpoint, e.g. ws://localhost:8080/ws
    #[arg(long)]
    url: String,
    /// Fixed delay between reconnection attempts
    #[arg(long, default_value_t = 5_000)]
    retry_interval_ms: u64,
    /// Consecutive failed attempts before giving up
    #[arg(long, default_value_t = 5)]
    max_attempts: u32,
    /// Bound on each open attempt (default: unbounded)
    #[arg(long)]
    connect_timeout_ms: Option<u64>,
}

impl FeedArgs {
    fn into_config(self) -> Result<FeedConfig> {
        let mut config = FeedConfig::new(self.url)
            .with_retry_interval(Duration::from_millis(self.retry_interval_ms))
            .with_max_attempts(self.max_attempts);
        if let Some(ms) = self.connect_timeout_ms {
            config = config.with_connect_timeout(Duration::from_millis(ms));
        }
        config.validate().context("invalid feed options")?;
        Ok(config)
    }
}

#[derive(Args)]
struct ApiArgs {
    /// Node REST API root
    #[arg(long, default_value = "http://localhost:8080/api/v1")]
    api: String,
}

impl ApiArgs {
    fn client(&self) -> Result<LedgerApiClient> {
        LedgerApiClient::new(HttpClientConfig {
            base_url: self.api.clone(),
            ..HttpClientConfig::default()
        })
        .context("build API client")
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print feed events until Ctrl-C or reconnection gives up
    Watch {
        #[command(flatten)]
        feed: FeedArgs,
        /// Output one JSON object per event
        #[arg(long)]
        json: bool,
        /// File recording the last block seen across runs
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Connect and send a single {type, payload} envelope
    Send {
        #[command(flatten)]
        feed: FeedArgs,
        /// Envelope type
        #[arg(long = "type")]
        kind: String,
        /// Envelope payload as JSON
        #[arg(long)]
        payload: Option<String>,
    },

    /// Chain length and latest block index
    Info {
        #[command(flatten)]
        api: ApiArgs,
    },

    /// Fetch a block by index
    Block {
        #[arg(long)]
        index: u64,
        #[command(flatten)]
        api: ApiArgs,
    },

    /// Fetch a transaction by id
    Tx {
        #[arg(long)]
        txid: String,
        #[command(flatten)]
        api: ApiArgs,
    },

    /// Balance of an address
    Balance {
        #[arg(long)]
        address: String,
        #[command(flatten)]
        api: ApiArgs,
    },

    /// Connected peers
    Peers {
        #[command(flatten)]
        api: ApiArgs,
    },

    /// Submit a transaction (JSON body)
    Submit {
        #[arg(long)]
        tx: String,
        #[command(flatten)]
        api: ApiArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&LogConfig::from_flags(cli.verbose, cli.log_json));

    match cli.command {
        Commands::Watch { feed, json, state } => {
            cmd_feed::watch(feed.into_config()?, json, state.as_deref()).await
        }

        Commands::Send { feed, kind, payload } => {
            let payload = payload.as_deref().map(parse_json).transpose()?;
            cmd_feed::send(feed.into_config()?, &kind, payload).await
        }

        Commands::Info { api } => {
            let info = api.client()?.blockchain_info().await.context("GET /info")?;
            println!("length: {}", info.length);
            println!("latest: {}", info.latest);
            Ok(())
        }

        Commands::Block { index, api } => {
            let block = api.client()?.block(index).await.context("GET /block")?;
            print_json(&block)
        }

        Commands::Tx { txid, api } => {
            let tx = api.client()?.transaction(&txid).await.context("GET /transaction")?;
            print_json(&tx)
        }

        Commands::Balance { address, api } => {
            let balance = api.client()?.balance(&address).await.context("GET /balance")?;
            println!("{}: {}", balance.address, balance.balance);
            Ok(())
        }

        Commands::Peers { api } => {
            let peers = api.client()?.peers().await.context("GET /peers")?;
            if peers.is_empty() {
                println!("no peers");
            }
            for peer in &peers {
                println!("{peer}");
            }
            Ok(())
        }

        Commands::Submit { tx, api } => {
            let body = parse_json(&tx)?;
            let receipt = api.client()?.send_transaction(&body).await.context("POST /send")?;
            println!("{}: {}", receipt.status, receipt.txid);
            Ok(())
        }
    }
}

fn parse_json(text: &str) -> Result<Value> {
    serde_json::from_str(text).with_context(|| format!("invalid JSON: {text}"))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn watch_flags_build_config() {
        let cli = Cli::parse_from([
            "chainfeed",
            "watch",
            "--url",
            "ws://localhost:8080/ws",
            "--retry-interval-ms",
            "100",
            "--max-attempts",
            "3",
            "--connect-timeout-ms",
            "2000",
        ]);
        let Commands::Watch { feed, json, .. } = cli.command else {
            panic!("expected watch");
        };
        assert!(!json);
        let config = feed.into_config().unwrap();
        assert_eq!(config.retry_interval_ms, 100);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn zero_attempts_rejected() {
        let cli = Cli::parse_from(["chainfeed", "send", "--url", "ws://x", "--type", "ping", "--max-attempts", "0"]);
        let Commands::Send { feed, .. } = cli.command else {
            panic!("expected send");
        };
        assert!(feed.into_config().is_err());
    }

    #[test]
    fn bad_payload_reports_context() {
        let err = parse_json("{oops").unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }
}
