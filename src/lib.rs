pub mod balance;
pub mod cmd;
pub mod computed;
pub mod config;
pub mod decimal;
pub mod engine;
pub mod entry_set;
pub mod error;
pub mod input;
pub mod methods;
pub mod transaction;
pub mod transform;

pub use computed::ComputedData;
pub use config::{Configuration, RawConfig};
pub use engine::{compute_all, compute_all_with, CapitalGainType, GainLoss};
pub use error::{LineId, TaxlotError};
pub use methods::{AccountingMethod, MethodRegistry};
pub use transaction::{Acquisition, Disposal, Transaction, TransactionKind, Transfer};
