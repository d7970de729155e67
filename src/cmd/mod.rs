pub mod balances;
pub mod report;

use crate::config::{Configuration, RawConfig};
use crate::error::TaxlotError;
use crate::input;
use crate::transaction::Transaction;
use anyhow::Context;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Load and validate the TOML configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<Configuration> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read configuration {}", path.display()))?;
    let raw: RawConfig = toml::from_str(&text)
        .map_err(|e| TaxlotError::Configuration(format!("invalid configuration: {e}")))?;
    Ok(Configuration::new(raw)?)
}

/// Read transaction JSON from a file, or stdin with "-".
pub fn read_transactions(
    path: &Path,
    config: &Configuration,
) -> anyhow::Result<Vec<Transaction>> {
    if path.as_os_str() == "-" {
        read_from_stdin(config)
    } else {
        let file = File::open(path)
            .with_context(|| format!("cannot open transactions {}", path.display()))?;
        Ok(input::read_transactions_json(BufReader::new(file), config)?)
    }
}

fn read_from_stdin(config: &Configuration) -> anyhow::Result<Vec<Transaction>> {
    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());

    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    if buffer.is_empty() {
        anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
    }

    let cursor = io::Cursor::new(buffer);
    Ok(input::read_transactions_json(cursor, config)?)
}
