//! Report command - per-fraction gain/loss detail and yearly summaries

use crate::computed::ComputedData;
use crate::decimal::format_amount;
use crate::engine::{compute_all, GainLoss};
use clap::Args;
use rust_decimal::Decimal;
use std::io;
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct ReportCommand {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Transactions file (JSON). Reads from stdin if not specified.
    #[arg(default_value = "-")]
    file: PathBuf,

    /// Filter by asset (e.g., BTC, ETH)
    #[arg(short, long)]
    asset: Option<String>,

    /// Filter by calendar year of the taxable event
    #[arg(short, long)]
    year: Option<i32>,

    /// Output as CSV instead of formatted tables
    #[arg(long)]
    csv: bool,
}

impl ReportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let config = super::load_config(&self.config)?;
        let transactions = super::read_transactions(&self.file, &config)?;
        let computed = compute_all(&config, transactions)?;

        let mut gain_rows = Vec::new();
        let mut summary_rows = Vec::new();
        for (asset, data) in &computed {
            if let Some(filter) = &self.asset {
                if !asset.eq_ignore_ascii_case(filter) {
                    continue;
                }
            }
            gain_rows.extend(
                data.gains_in_window()
                    .filter(|g| self.year.is_none_or(|y| g.year() == y))
                    .map(GainRow::new),
            );
            summary_rows.extend(
                data.summaries_in_window()
                    .filter(|s| self.year.is_none_or(|y| s.year == y))
                    .map(|s| SummaryRow::new(asset, s, data)),
            );
        }

        if self.csv {
            write_csv(&gain_rows)
        } else {
            print_table("Gains and losses", &gain_rows);
            print_table("Yearly summary", &summary_rows);
            Ok(())
        }
    }
}

fn print_table<T: Tabled>(title: &str, rows: &[T]) {
    if rows.is_empty() {
        println!("{title}: nothing in the reporting window");
        return;
    }
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{title}");
    println!("{table}");
}

fn write_csv<T: serde::Serialize>(rows: &[T]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(io::stdout());
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Row for the gain/loss detail table
#[derive(Debug, Clone, Tabled, serde::Serialize)]
struct GainRow {
    #[tabled(rename = "Line")]
    line: String,

    #[tabled(rename = "Date")]
    date: String,

    #[tabled(rename = "Asset")]
    asset: String,

    #[tabled(rename = "Kind")]
    kind: String,

    #[tabled(rename = "Amount")]
    amount: String,

    #[tabled(rename = "Proceeds")]
    proceeds: String,

    #[tabled(rename = "Cost Basis")]
    cost_basis: String,

    #[tabled(rename = "Gain/Loss")]
    gain_loss: String,

    #[tabled(rename = "Term")]
    term: String,

    #[tabled(rename = "Lot")]
    lot: String,

    #[tabled(rename = "Lot %")]
    lot_percent: String,
}

impl GainRow {
    fn new(gain: &GainLoss) -> Self {
        GainRow {
            line: format!("#{}", gain.event_line_id),
            date: gain.event_timestamp.format("%Y-%m-%d").to_string(),
            asset: gain.asset.clone(),
            kind: gain.event_kind.to_string(),
            amount: format_amount(gain.crypto_amount, 8),
            proceeds: format_fiat(gain.fiat_proceeds),
            cost_basis: format_fiat(gain.fiat_cost_basis),
            gain_loss: format_fiat_signed(gain.fiat_gain_loss),
            term: gain.gain_type.to_string(),
            lot: gain
                .lot_line_id
                .map(|line| format!("#{line}"))
                .unwrap_or_else(|| "-".to_string()),
            lot_percent: format_amount(gain.lot_fraction_percent, 4),
        }
    }
}

/// Row for the yearly summary table
#[derive(Debug, Clone, Tabled, serde::Serialize)]
struct SummaryRow {
    #[tabled(rename = "Year")]
    year: String,

    #[tabled(rename = "Asset")]
    asset: String,

    #[tabled(rename = "Term")]
    term: String,

    #[tabled(rename = "Amount")]
    amount: String,

    #[tabled(rename = "Proceeds")]
    proceeds: String,

    #[tabled(rename = "Cost Basis")]
    cost_basis: String,

    #[tabled(rename = "Gain/Loss")]
    gain_loss: String,

    #[tabled(rename = "Avg. Price")]
    average_price: String,
}

impl SummaryRow {
    fn new(asset: &str, summary: &crate::balance::YearlySummary, data: &ComputedData) -> Self {
        SummaryRow {
            year: summary.year.to_string(),
            asset: asset.to_string(),
            term: summary.gain_type.to_string(),
            amount: format_amount(summary.crypto_amount, 8),
            proceeds: format_fiat(summary.fiat_proceeds),
            cost_basis: format_fiat(summary.fiat_cost_basis),
            gain_loss: format_fiat_signed(summary.fiat_gain_loss),
            average_price: format_fiat(data.average_acquisition_price()),
        }
    }
}

fn format_fiat(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

fn format_fiat_signed(amount: Decimal) -> String {
    if amount < Decimal::ZERO {
        format!("-{:.2}", amount.abs())
    } else {
        format!("{:.2}", amount)
    }
}
