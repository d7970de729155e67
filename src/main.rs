use clap::{Parser, Subcommand};
use taxlot::cmd::{balances::BalancesCommand, report::ReportCommand};

/// Cryptocurrency capital gains calculator
#[derive(Parser, Debug)]
#[command(version, about)]
struct Taxlot {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Gain/loss detail and yearly summaries
    Report(ReportCommand),
    /// Final balances per (exchange, holder) account
    Balances(BalancesCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let taxlot = Taxlot::parse();

    match taxlot.command {
        Command::Report(report) => report.exec(),
        Command::Balances(balances) => balances.exec(),
    }
}
