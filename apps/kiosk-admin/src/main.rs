//! # Kiosk Admin CLI
//!
//! Admin tasks from the terminal. Every subcommand prints its result as
//! JSON on stdout; failures print the `ApiError` as JSON on stderr and
//! exit with status 1.
//!
//! ```text
//! kiosk-admin [--config kiosk.toml] <command>
//!
//!   balances                        customers by balance, with total
//!   invoice <customer-id>           invoice one customer
//!   invoice-all                     invoice everyone with a balance
//!   settle <customer-id>            mark pending invoices paid
//!   settle-all                      mark every pending invoice paid
//!   sales                           sales report
//!   dashboard                       headline figures, last 7 days
//!   restock <product> <qty> [cost]  book a delivery (--dry-run to preview)
//!   requests [--clear]              out-of-stock requests
//!   transactions [--customer ID]    transaction log, newest first
//!   correct <tx> --total/--state    fix a transaction's total or state
//!   outbox [--purge-days N]         queued notifications
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use kiosk_admin::commands::{balance, dashboard, inventory, request, transaction};
use kiosk_admin::{init_tracing, ApiError, ConfigState, DbState};
use kiosk_core::{Money, PaymentState};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "kiosk-admin", version, about = "Admin tools for the self-service kiosk")]
struct Cli {
    /// Config file (defaults to kiosk.toml in the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List customers by balance, largest first
    Balances,
    /// Invoice everything a customer has not paid
    Invoice { customer_id: String },
    /// Invoice every customer with an outstanding balance
    InvoiceAll,
    /// Mark a customer's pending invoices as paid
    Settle { customer_id: String },
    /// Mark every pending invoice as paid
    SettleAll,
    /// Sales per product, unlisted sales and inventory value
    Sales,
    /// Revenue, counts and the last week's revenue per day
    Dashboard,
    /// Book a delivery and reprice the item
    Restock {
        product_id: String,
        quantity: i64,
        /// Unit cost of the delivery
        cost: Option<Decimal>,
        #[arg(long)]
        variant: Option<String>,
        /// Markup factor, e.g. 1.25 (defaults to the configured markup)
        #[arg(long)]
        markup: Option<Decimal>,
        /// Show the new stock and price without writing them
        #[arg(long)]
        dry_run: bool,
    },
    /// List out-of-stock requests
    Requests {
        /// Remove every request instead
        #[arg(long)]
        clear: bool,
    },
    /// List transactions, newest first
    Transactions {
        #[arg(long)]
        customer: Option<String>,
    },
    /// Correct a transaction's total or payment state
    Correct {
        transaction_id: String,
        /// New total in major units, e.g. 12.50
        #[arg(long)]
        total: Option<Decimal>,
        /// unbilled, pending or paid
        #[arg(long)]
        state: Option<PaymentState>,
    },
    /// Show queued notifications
    Outbox {
        #[arg(long, default_value_t = 50)]
        limit: u32,
        /// Delete delivered entries older than this many days first
        #[arg(long)]
        purge_days: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match serde_json::to_string_pretty(&err) {
                Ok(json) => eprintln!("{}", json),
                Err(_) => eprintln!("{}", err),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ApiError> {
    let config = ConfigState::load(cli.config)?;
    let db = DbState::open(&config).await?;
    info!(currency = %config.currency_code, "Kiosk admin started");

    let result = dispatch(&db, &config, cli.command).await;
    db.inner().close().await;
    result
}

async fn dispatch(db: &DbState, config: &ConfigState, command: Command) -> Result<(), ApiError> {
    match command {
        Command::Balances => print(&balance::list_balances(db).await?),
        Command::Invoice { customer_id } => {
            print(&balance::send_invoice(db, config, &customer_id).await?)
        }
        Command::InvoiceAll => print(&balance::send_all_invoices(db, config).await?),
        Command::Settle { customer_id } => {
            print(&balance::settle_customer(db, config, &customer_id).await?)
        }
        Command::SettleAll => print(&balance::settle_all(db).await?),
        Command::Sales => print(&inventory::sales_report(db).await?),
        Command::Dashboard => print(&dashboard::dashboard(db).await?),
        Command::Restock {
            product_id,
            quantity,
            cost,
            variant,
            markup,
            dry_run,
        } => {
            let input = inventory::RestockInput {
                product_id,
                variant_id: variant,
                incoming_stock: quantity,
                incoming_purchase_price: cost,
                markup,
            };
            if dry_run {
                print(&inventory::reprice_preview(db, config, input).await?)
            } else {
                print(&inventory::restock(db, config, input).await?)
            }
        }
        Command::Requests { clear: true } => print(&request::clear_requests(db).await?),
        Command::Requests { clear: false } => print(&request::list_requests(db).await?),
        Command::Transactions { customer } => {
            print(&transaction::list_transactions(db, customer.as_deref()).await?)
        }
        Command::Correct {
            transaction_id,
            total,
            state,
        } => {
            if total.is_none() && state.is_none() {
                return Err(ApiError::validation("Nothing to correct: pass --total or --state"));
            }
            let mut updated = None;
            if let Some(total) = total {
                let total = Money::from_decimal(total)
                    .ok_or_else(|| ApiError::validation("Total is out of range"))?;
                updated = Some(transaction::update_transaction_total(db, &transaction_id, total).await?);
            }
            if let Some(state) = state {
                updated = Some(transaction::set_transaction_state(db, &transaction_id, state).await?);
            }
            print(&updated)
        }
        Command::Outbox { limit, purge_days } => {
            let outbox = db.inner().outbox();
            if let Some(days) = purge_days {
                let removed = outbox.cleanup_old_entries(days).await?;
                info!(removed, days, "Old outbox entries removed");
            }
            print(&outbox.get_pending(limit).await?)
        }
    }
}

fn print<T: Serialize>(value: &T) -> Result<(), ApiError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::internal(format!("Failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}
