//! CLI for interacting with a proxy-bid node.
//!
//! One subcommand per node method: admin (clock, items, workflow), bidding
//! (bids, buy-now, proxies) and queries.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;

use proxybid_client::{format, ClientError, NodeClient};
use proxybid_node::types::{PlaceBidParams, RegisterItemParams, SetProxyParams};
use proxybid_types::{BidKind, ItemId, Round, Workflow};

#[derive(Parser)]
#[command(name = "proxybid-cli")]
#[command(about = "CLI for proxy-bid auctions")]
struct Cli {
    /// Node RPC endpoint
    #[arg(long, default_value = "http://127.0.0.1:9944")]
    rpc: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the node clock (RFC 3339)
    SetTimestamp {
        #[arg(long)]
        now: DateTime<Utc>,
    },

    /// Move the node clock by a number of seconds
    AdvanceClock {
        #[arg(long)]
        seconds: i64,
    },

    /// Register an auction item
    RegisterItem {
        #[arg(long)]
        name: String,

        /// Owner user ID
        #[arg(long)]
        owner: u64,

        #[arg(long)]
        starting_price: Decimal,

        /// Buy-now price (omit to disable)
        #[arg(long)]
        buy_now_price: Option<Decimal>,

        /// Bid increment (omit for the suggested increment)
        #[arg(long)]
        bid_step: Option<Decimal>,

        /// Buy-now threshold in percent
        #[arg(long, default_value = "80")]
        threshold_percent: Decimal,

        #[arg(long)]
        instant_only: bool,

        #[arg(long, default_value = "USD")]
        currency: String,

        /// Window start (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// Window end (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,
    },

    /// Open the next round of an item
    Relist {
        #[arg(long)]
        item_id: ItemId,
    },

    /// Force an item's workflow (not_started, active, relisted, finished, closed, deleted)
    SetWorkflow {
        #[arg(long)]
        item_id: ItemId,

        #[arg(long)]
        workflow: String,
    },

    /// Place a bid
    Bid {
        #[arg(long)]
        sender: u64,

        #[arg(long)]
        item_id: ItemId,

        #[arg(long, default_value = "0")]
        round: Round,

        #[arg(long)]
        amount: Decimal,

        /// Place as an instant bid
        #[arg(long)]
        instant: bool,
    },

    /// Buy an item at its buy-now price
    BuyNow {
        #[arg(long)]
        sender: u64,

        #[arg(long)]
        item_id: ItemId,
    },

    /// Set or raise a proxy ceiling
    SetProxy {
        #[arg(long)]
        sender: u64,

        #[arg(long)]
        item_id: ItemId,

        #[arg(long, default_value = "0")]
        round: Round,

        #[arg(long)]
        ceiling: Decimal,
    },

    /// Remove a proxy
    RemoveProxy {
        #[arg(long)]
        sender: u64,

        #[arg(long)]
        item_id: ItemId,

        #[arg(long, default_value = "0")]
        round: Round,
    },

    /// Show phase, price and buy-now visibility
    State {
        #[arg(long)]
        item_id: ItemId,

        #[arg(long, default_value = "0")]
        round: Round,
    },

    /// List the highest bids
    HighestBids {
        #[arg(long)]
        item_id: ItemId,

        #[arg(long, default_value = "0")]
        round: Round,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show a user's proxy
    ProxyStatus {
        #[arg(long)]
        item_id: ItemId,

        #[arg(long, default_value = "0")]
        round: Round,

        #[arg(long)]
        user_id: u64,
    },

    /// Compute the fee on a sale
    Fee {
        #[arg(long)]
        sale_price: Decimal,

        #[arg(long, default_value = "USD")]
        currency: String,
    },

    /// Show item details
    GetItem {
        #[arg(long)]
        item_id: ItemId,
    },

    /// Show the top bid of a round
    Winner {
        #[arg(long)]
        item_id: ItemId,

        #[arg(long, default_value = "0")]
        round: Round,
    },
}

fn parse_workflow(s: &str) -> Result<Workflow> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| anyhow!("Unknown workflow: {}", s))
}

async fn currency_of(client: &NodeClient, item_id: ItemId) -> Result<String> {
    Ok(client
        .item(item_id)
        .await?
        .map(|item| item.currency)
        .unwrap_or_else(|| "USD".to_string()))
}

fn report_rejection(err: ClientError) -> anyhow::Error {
    if let ClientError::Rejected { violations, .. } = &err {
        println!("Rejected:");
        for v in violations {
            println!("  [{}] {}", v.field, v.message);
        }
    }
    err.into()
}

async fn run(client: &NodeClient, command: Commands) -> Result<()> {
    match command {
        Commands::SetTimestamp { now } => {
            let clock = client.set_timestamp(now).await?;
            println!("Clock set to {}", clock.now);
        }

        Commands::AdvanceClock { seconds } => {
            let clock = client.advance_clock(seconds).await?;
            println!("Clock now {}", clock.now);
        }

        Commands::RegisterItem {
            name,
            owner,
            starting_price,
            buy_now_price,
            bid_step,
            threshold_percent,
            instant_only,
            currency,
            start,
            end,
        } => {
            let item_id = client
                .register_item(RegisterItemParams {
                    name,
                    owner,
                    starting_price,
                    buy_now_price,
                    bid_step,
                    threshold_percent,
                    instant_only,
                    currency,
                    start,
                    end,
                })
                .await?;
            info!("Registered item {}", item_id);
            println!("Item ID: {}", item_id);
        }

        Commands::Relist { item_id } => {
            let round = client.relist_item(item_id).await?;
            println!("Item {} relisted, round {}", item_id, round);
        }

        Commands::SetWorkflow { item_id, workflow } => {
            let workflow = parse_workflow(&workflow)?;
            client.set_workflow(item_id, workflow).await?;
            println!("Item {} workflow set to {:?}", item_id, workflow);
        }

        Commands::Bid {
            sender,
            item_id,
            round,
            amount,
            instant,
        } => {
            let kind = if instant {
                BidKind::Instant
            } else {
                BidKind::Standard
            };
            let receipt = client
                .place_bid(PlaceBidParams {
                    sender,
                    item_id,
                    round,
                    amount,
                    kind,
                })
                .await
                .map_err(report_rejection)?;

            let currency = currency_of(client, item_id).await?;
            println!("Bid accepted: {}", format::bid_line(&receipt.bid, &currency));
            if let Some(counter) = &receipt.counter {
                println!("Outbid by proxy: {}", format::bid_line(counter, &currency));
            }
        }

        Commands::BuyNow { sender, item_id } => {
            let bid = client
                .place_buy_now(sender, item_id)
                .await
                .map_err(report_rejection)?;
            let currency = currency_of(client, item_id).await?;
            println!("Purchased: {}", format::bid_line(&bid, &currency));
        }

        Commands::SetProxy {
            sender,
            item_id,
            round,
            ceiling,
        } => {
            let proxy = client
                .set_proxy(SetProxyParams {
                    sender,
                    item_id,
                    round,
                    ceiling,
                })
                .await
                .map_err(report_rejection)?;
            let currency = currency_of(client, item_id).await?;
            println!(
                "Proxy #{} set with ceiling {}",
                proxy.id,
                format::money(proxy.ceiling, &currency)
            );
        }

        Commands::RemoveProxy {
            sender,
            item_id,
            round,
        } => {
            if client.remove_proxy(sender, item_id, round).await? {
                println!("Proxy removed");
            } else {
                println!("No active proxy");
            }
        }

        Commands::State { item_id, round } => {
            let view = client.auction_state(item_id, round).await?;
            let currency = currency_of(client, item_id).await?;
            for line in format::auction_state(&view, &currency) {
                println!("{}", line);
            }
        }

        Commands::HighestBids {
            item_id,
            round,
            limit,
        } => {
            let bids = client.highest_bids(item_id, round, limit).await?;
            if bids.is_empty() {
                println!("No bids");
            } else {
                let currency = currency_of(client, item_id).await?;
                for bid in &bids {
                    println!("  {}", format::bid_line(bid, &currency));
                }
            }
        }

        Commands::ProxyStatus {
            item_id,
            round,
            user_id,
        } => {
            let status = client.proxy_status(item_id, round, user_id).await?;
            let currency = currency_of(client, item_id).await?;
            println!("{}", format::proxy_status(&status, &currency));
        }

        Commands::Fee {
            sale_price,
            currency,
        } => {
            let quote = client.fee_for(sale_price, &currency).await?;
            println!("{}", format::fee_quote(&quote));
        }

        Commands::GetItem { item_id } => match client.item(item_id).await? {
            Some(item) => {
                println!("Item {}: {}", item.id, item.name);
                println!("  Owner: {}", item.owner);
                println!("  Workflow: {:?}", item.workflow);
                println!("  Round: {}", item.relist_count);
                println!("  Starting price: {}", format::money(item.starting_price, &item.currency));
                println!("  Bid step: {}", format::money(item.bid_step, &item.currency));
                if let Some(buy_now) = item.buy_now() {
                    println!("  Buy now: {}", format::money(buy_now, &item.currency));
                }
                println!("  Window: {} .. {}", item.window.start, item.window.end);
            }
            None => println!("Item {} not found", item_id),
        },

        Commands::Winner { item_id, round } => match client.winner(item_id, round).await? {
            Some(bid) => {
                let currency = currency_of(client, item_id).await?;
                println!("Winner: {}", format::bid_line(&bid, &currency));
            }
            None => println!("No bids in round {}", round),
        },
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("proxybid_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let client = NodeClient::new(&cli.rpc)?;

    run(&client, cli.command).await
}
