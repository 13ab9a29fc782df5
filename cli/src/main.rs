//! ledgerrpc CLI — query, stream and submit against a ledger node.
//!
//! Usage:
//! ```bash
//! # Node status and height
//! ledgerrpc status --url http://localhost:8080
//! ledgerrpc height --url http://localhost:8080 --seed <hex>
//!
//! # Paginated queries (signed)
//! ledgerrpc query accounts --url http://localhost:8080 --seed <hex>
//!
//! # Follow blocks / events
//! ledgerrpc blocks --ws-url ws://localhost:8081 --from 100 --count 10
//! ledgerrpc watch --ws-url ws://localhost:8081
//!
//! # Submit a transaction and wait for its terminal status
//! ledgerrpc submit --url http://localhost:8080 --ws-url ws://localhost:8081 \
//!     --chain-id mainnet --seed <hex> --instructions '[{"mint": 1}]'
//! ```
//!
//! Set `RUST_LOG=ledgerrpc=debug` for wire-level tracing.

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use ledgerrpc_client::{LedgerClient, LedgerClientConfig, SubmitError, SubmitOptions};
use ledgerrpc_core::event::{Event, EventFilter};
use ledgerrpc_core::signer::Ed25519Signer;
use ledgerrpc_core::wire::{Query, QueryParams, SingularQuery};
use ledgerrpc_http::{HttpTransport, LedgerApi, QueryClient};
use ledgerrpc_ws::{BlockStream, EventStream, WsConnector};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "status" => cmd_status(&args[2..]).await,
        "height" => cmd_height(&args[2..]).await,
        "query" => cmd_query(&args[2..]).await,
        "blocks" => cmd_blocks(&args[2..]).await,
        "watch" => cmd_watch(&args[2..]).await,
        "submit" => cmd_submit(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("ledgerrpc {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("ledgerrpc {}", env!("CARGO_PKG_VERSION"));
    println!("Query, stream and submit against a ledger node\n");
    println!("USAGE:");
    println!("    ledgerrpc <COMMAND>\n");
    println!("COMMANDS:");
    println!("    status   Print node status (height, peers, uptime)");
    println!("    height   Print the current chain height (signed query)");
    println!("    query    Run a paginated query: blocks, transactions or accounts");
    println!("    blocks   Follow the block stream from a height");
    println!("    watch    Follow the event stream (transactions and blocks)");
    println!("    submit   Submit a transaction and await its terminal status");
    println!("    version  Print version");
    println!("    help     Print this help\n");
    println!("COMMON FLAGS:");
    println!("    --url <URL>       HTTP base URL         [status, height, query, submit]");
    println!("    --ws-url <URL>    Duplex-channel URL    [blocks, watch, submit]");
    println!("    --seed <HEX>      32-byte signing seed  [height, query, submit]");
    println!("QUERY FLAGS:");
    println!("    --fetch <N>       Batch size hint");
    println!("    --account <ID>    Scope 'transactions' to one account");
    println!("    --domain <ID>     Scope 'accounts' to one domain");
    println!("    --from <HEIGHT>   Start height for 'blocks'");
    println!("BLOCKS FLAGS:");
    println!("    --from <HEIGHT>   Subscription start height  [required]");
    println!("    --count <N>       Stop after N blocks (default: follow forever)");
    println!("SUBMIT FLAGS:");
    println!("    --chain-id <ID>        Chain the transaction is addressed to  [required]");
    println!("    --instructions <JSON>  Instruction array                      [required]");
    println!("    --ttl <MS>             Time-to-live in milliseconds");
    println!("    --fire-and-forget      Do not wait for confirmation");
}

async fn cmd_status(args: &[String]) -> Result<()> {
    let url = parse_flag(args, "--url").ok_or_else(|| anyhow!("--url is required"))?;
    let api = LedgerApi::new(Arc::new(HttpTransport::default_for(&url)));

    let status = api.status().await.context("status request failed")?;
    println!("  Height:  {}", status.height);
    println!("  Peers:   {}", status.peers);
    println!("  Uptime:  {}ms", status.uptime_ms);
    Ok(())
}

async fn cmd_height(args: &[String]) -> Result<()> {
    let url = parse_flag(args, "--url").ok_or_else(|| anyhow!("--url is required"))?;
    let queries = query_client(args, &url)?;

    let height = queries.singular(SingularQuery::ChainHeight).await?;
    println!("{height}");
    Ok(())
}

async fn cmd_query(args: &[String]) -> Result<()> {
    let what = args
        .first()
        .filter(|a| !a.starts_with("--"))
        .ok_or_else(|| anyhow!("usage: ledgerrpc query <blocks|transactions|accounts>"))?;
    let url = parse_flag(args, "--url").ok_or_else(|| anyhow!("--url is required"))?;

    let query = match what.as_str() {
        "blocks" => Query::ListBlocks {
            from_height: parse_num(args, "--from")?,
        },
        "transactions" => Query::ListTransactions {
            account: parse_flag(args, "--account"),
        },
        "accounts" => Query::ListAccounts {
            domain: parse_flag(args, "--domain"),
        },
        other => return Err(anyhow!("unknown query: {other}")),
    };
    let params = QueryParams {
        fetch_size: parse_num(args, "--fetch")?,
    };

    let mut cursor = query_client(args, &url)?.start(query, params);
    let mut total = 0usize;
    while let Some(output) = cursor.next_batch().await? {
        for item in &output.batch {
            println!("{}", serde_json::to_string(item)?);
        }
        total += output.batch.len();
        tracing::debug!(total, remaining = output.remaining_items, "batch printed");
    }
    eprintln!("{total} item(s)");
    Ok(())
}

async fn cmd_blocks(args: &[String]) -> Result<()> {
    let ws_url = parse_flag(args, "--ws-url").ok_or_else(|| anyhow!("--ws-url is required"))?;
    let from = parse_num(args, "--from")?.ok_or_else(|| anyhow!("--from is required"))?;
    let count: Option<u64> = parse_num(args, "--count")?;

    let connector = WsConnector::new(ws_url);
    let mut stream = BlockStream::subscribe(&connector, from).await?;

    let mut seen = 0u64;
    while let Some(block) = stream.next_block().await? {
        println!(
            "block {} {} ({} tx)",
            block.height,
            block.hash,
            block.transactions.len()
        );
        seen += 1;
        if count.is_some_and(|n| seen >= n) {
            stream.stop();
            break;
        }
    }
    Ok(())
}

async fn cmd_watch(args: &[String]) -> Result<()> {
    let ws_url = parse_flag(args, "--ws-url").ok_or_else(|| anyhow!("--ws-url is required"))?;

    let filters = EventFilter {
        transactions: true,
        blocks: true,
        hash: None,
    };
    let connector = WsConnector::new(ws_url);
    let stream = EventStream::open(&connector, filters).await?;
    let mut events = stream.listen();

    eprintln!("watching (Ctrl-C to stop)");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            item = events.recv() => match item {
                None => {
                    eprintln!("server closed the event channel");
                    break;
                }
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(Event::Transaction(tx))) => {
                    println!("tx    {} {:?}", tx.hash, tx.status);
                }
                Some(Ok(Event::Block(block))) => {
                    println!("block {} {}", block.height, block.hash);
                }
            },
        }
    }
    stream.stop().await;
    Ok(())
}

async fn cmd_submit(args: &[String]) -> Result<()> {
    let url = parse_flag(args, "--url").ok_or_else(|| anyhow!("--url is required"))?;
    let ws_url = parse_flag(args, "--ws-url").ok_or_else(|| anyhow!("--ws-url is required"))?;
    let chain_id =
        parse_flag(args, "--chain-id").ok_or_else(|| anyhow!("--chain-id is required"))?;
    let instructions = parse_flag(args, "--instructions")
        .ok_or_else(|| anyhow!("--instructions is required"))?;

    let instructions: Vec<serde_json::Value> =
        serde_json::from_str(&instructions).context("--instructions must be a JSON array")?;
    let ttl = parse_num(args, "--ttl")?;

    let client = LedgerClient::new(
        LedgerClientConfig {
            http_url: url,
            ws_url,
            chain_id,
            http: Default::default(),
        },
        Arc::new(signer(args)?),
    );

    let tx = client.build_transaction(instructions, ttl)?;
    println!("submitting {}", tx.hash);

    let options = SubmitOptions {
        fire_and_forget: args.iter().any(|a| a == "--fire-and-forget"),
        abort: None,
    };
    match client.submit(&tx, options).await {
        Ok(Some(height)) => println!("approved at block {height}"),
        Ok(None) => println!("accepted"),
        Err(SubmitError::Rejected { reason }) => return Err(anyhow!("rejected: {reason}")),
        Err(SubmitError::Expired) => return Err(anyhow!("expired before commitment")),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn query_client(args: &[String], url: &str) -> Result<QueryClient> {
    Ok(QueryClient::new(
        Arc::new(HttpTransport::default_for(url)),
        Arc::new(signer(args)?),
    ))
}

fn signer(args: &[String]) -> Result<Ed25519Signer> {
    let seed = parse_flag(args, "--seed").ok_or_else(|| anyhow!("--seed is required"))?;
    Ed25519Signer::from_hex_seed(&seed).context("invalid --seed")
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn parse_num<N: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<N>> {
    match parse_flag(args, flag) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{flag} must be a number, got {raw:?}")),
    }
}
