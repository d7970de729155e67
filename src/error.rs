use rust_decimal::Decimal;

/// Line identifier assigned to each input row at parse time.
///
/// Dense in insertion order; synthetic rows created by the input transformer
/// are allocated above the highest parsed id.
pub type LineId = u32;

/// Failures produced by configuration validation, transaction construction
/// and the gain/loss engine.
///
/// Every transaction-scoped variant carries the `line` of the offending input
/// row so callers can point back at the source data.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TaxlotError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("malformed input at line {line}: {message}")]
    MalformedInput { line: LineId, message: String },

    #[error("unknown {kind} '{value}' at line {line}")]
    UnknownReference {
        line: LineId,
        kind: ReferenceKind,
        value: String,
    },

    #[error("ordering conflict at line {line}: {message}")]
    Ordering { line: LineId, message: String },

    #[error("acquired lots exhausted at line {line}: {shortfall} {asset} not covered by any lot")]
    AcquiredLotsExhausted {
        line: LineId,
        asset: String,
        shortfall: Decimal,
    },

    #[error("balance underflow at line {line}: ({exchange}, {holder}) would hold {balance} {asset}")]
    BalanceUnderflow {
        line: LineId,
        asset: String,
        exchange: String,
        holder: String,
        balance: Decimal,
    },

    #[error("inconsistent amount at line {line}: {field} given as {supplied}, derived {derived}")]
    InconsistentAmount {
        line: LineId,
        field: &'static str,
        supplied: Decimal,
        derived: Decimal,
    },
}

/// Which configuration set an unknown reference failed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Asset,
    Exchange,
    Holder,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReferenceKind::Asset => "asset",
            ReferenceKind::Exchange => "exchange",
            ReferenceKind::Holder => "holder",
        };
        f.write_str(s)
    }
}

impl TaxlotError {
    /// The input line the error points at, when the failure is tied to a row.
    pub fn line(&self) -> Option<LineId> {
        match self {
            TaxlotError::Configuration(_) => None,
            TaxlotError::MalformedInput { line, .. }
            | TaxlotError::UnknownReference { line, .. }
            | TaxlotError::Ordering { line, .. }
            | TaxlotError::AcquiredLotsExhausted { line, .. }
            | TaxlotError::BalanceUnderflow { line, .. }
            | TaxlotError::InconsistentAmount { line, .. } => Some(*line),
        }
    }
}

pub type Result<T> = std::result::Result<T, TaxlotError>;
