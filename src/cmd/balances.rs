//! Balances command - final per-(exchange, holder) holdings per asset

use crate::decimal::format_amount;
use crate::engine::compute_all;
use clap::Args;
use std::io;
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct BalancesCommand {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Transactions file (JSON). Reads from stdin if not specified.
    #[arg(default_value = "-")]
    file: PathBuf,

    /// Filter by asset (e.g., BTC, ETH)
    #[arg(short, long)]
    asset: Option<String>,

    /// Output as CSV instead of a formatted table
    #[arg(long)]
    csv: bool,
}

impl BalancesCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let config = super::load_config(&self.config)?;
        let transactions = super::read_transactions(&self.file, &config)?;
        let computed = compute_all(&config, transactions)?;

        let mut rows = Vec::new();
        for (asset, data) in &computed {
            if let Some(filter) = &self.asset {
                if !asset.eq_ignore_ascii_case(filter) {
                    continue;
                }
            }
            for balance in data.balances().iter() {
                rows.push(BalanceRow {
                    asset: asset.clone(),
                    exchange: balance.exchange.clone(),
                    holder: balance.holder.clone(),
                    acquired: format_amount(balance.acquired_balance, 8),
                    sent: format_amount(balance.sent_balance, 8),
                    received: format_amount(balance.received_balance, 8),
                    balance: format_amount(balance.final_balance(), 8),
                });
            }
        }

        if self.csv {
            let mut wtr = csv::Writer::from_writer(io::stdout());
            for row in &rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
            return Ok(());
        }

        if rows.is_empty() {
            println!("No balances to report");
            return Ok(());
        }
        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{table}");
        Ok(())
    }
}

/// Row for the balances table
#[derive(Debug, Clone, Tabled, serde::Serialize)]
struct BalanceRow {
    #[tabled(rename = "Asset")]
    asset: String,

    #[tabled(rename = "Exchange")]
    exchange: String,

    #[tabled(rename = "Holder")]
    holder: String,

    #[tabled(rename = "Acquired")]
    acquired: String,

    #[tabled(rename = "Sent")]
    sent: String,

    #[tabled(rename = "Received")]
    received: String,

    #[tabled(rename = "Balance")]
    balance: String,
}
