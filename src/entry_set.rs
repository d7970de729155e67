//! Per-asset ordered containers for one transaction variant.

use crate::error::{LineId, Result, TaxlotError};
use crate::transaction::Entry;
use std::collections::BTreeSet;

/// Ordered sequence of entries for a single asset.
///
/// Insertion keeps the `(timestamp, line_id)` key strictly increasing and
/// rejects duplicate line ids. Once sealed the set is read-only.
#[derive(Debug, Clone)]
pub struct EntrySet<T: Entry> {
    asset: String,
    entries: Vec<T>,
    line_ids: BTreeSet<LineId>,
    sealed: bool,
}

impl<T: Entry> EntrySet<T> {
    pub fn new(asset: impl Into<String>) -> Self {
        EntrySet {
            asset: asset.into(),
            entries: Vec::new(),
            line_ids: BTreeSet::new(),
            sealed: false,
        }
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn push(&mut self, entry: T) -> Result<()> {
        let line = entry.line_id();
        if self.sealed {
            return Err(TaxlotError::Ordering {
                line,
                message: "entry set is sealed".to_string(),
            });
        }
        if entry.asset() != self.asset {
            return Err(TaxlotError::MalformedInput {
                line,
                message: format!(
                    "asset '{}' does not belong in the {} entry set",
                    entry.asset(),
                    self.asset
                ),
            });
        }
        if !self.line_ids.insert(line) {
            return Err(TaxlotError::Ordering {
                line,
                message: format!("duplicate line id {line}"),
            });
        }

        let key = (entry.timestamp(), line);
        let position = self
            .entries
            .partition_point(|e| (e.timestamp(), e.line_id()) < key);
        // Same instant with the same line id would make the order ambiguous.
        if let Some(existing) = self.entries.get(position) {
            if (existing.timestamp(), existing.line_id()) == key {
                return Err(TaxlotError::Ordering {
                    line,
                    message: format!("two entries at {} with line id {line}", entry.timestamp()),
                });
            }
        }
        self.entries.insert(position, entry);
        Ok(())
    }

    /// Freeze the set; further pushes fail.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }
}

impl<'a, T: Entry> IntoIterator for &'a EntrySet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::tests::{config, new_acquisition};
    use crate::transaction::{Acquisition, TransactionKind};
    use rust_decimal_macros::dec;

    fn acq(time: &str, line: u32) -> Acquisition {
        Acquisition::new(
            new_acquisition(time, TransactionKind::Buy, dec!(100), dec!(1), line),
            &config(),
        )
        .unwrap()
    }

    #[test]
    fn entries_are_kept_in_timestamp_order() {
        let mut set = EntrySet::new("BTC");
        set.push(acq("2020-03-01T00:00:00Z", 3)).unwrap();
        set.push(acq("2020-01-01T00:00:00Z", 1)).unwrap();
        set.push(acq("2020-02-01T00:00:00Z", 2)).unwrap();

        let lines: Vec<u32> = set.iter().map(|a| a.line_id).collect();
        assert_eq!(lines, vec![1, 2, 3]);
    }

    #[test]
    fn equal_timestamps_are_ordered_by_line_id() {
        let mut set = EntrySet::new("BTC");
        set.push(acq("2020-01-01T00:00:00Z", 9)).unwrap();
        set.push(acq("2020-01-01T00:00:00Z", 2)).unwrap();

        let lines: Vec<u32> = set.iter().map(|a| a.line_id).collect();
        assert_eq!(lines, vec![2, 9]);
    }

    #[test]
    fn duplicate_line_id_is_rejected() {
        let mut set = EntrySet::new("BTC");
        set.push(acq("2020-01-01T00:00:00Z", 1)).unwrap();
        let err = set.push(acq("2020-02-01T00:00:00Z", 1)).unwrap_err();
        assert!(matches!(err, TaxlotError::Ordering { line: 1, .. }));
    }

    #[test]
    fn wrong_asset_is_rejected() {
        let mut set = EntrySet::new("ETH");
        let err = set.push(acq("2020-01-01T00:00:00Z", 1)).unwrap_err();
        assert!(matches!(err, TaxlotError::MalformedInput { .. }));
    }

    #[test]
    fn sealed_set_rejects_pushes() {
        let mut set = EntrySet::new("BTC");
        set.push(acq("2020-01-01T00:00:00Z", 1)).unwrap();
        set.seal();
        assert!(set.is_sealed());
        let err = set.push(acq("2020-02-01T00:00:00Z", 2)).unwrap_err();
        assert!(err.to_string().contains("sealed"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn indexed_access() {
        let mut set = EntrySet::new("BTC");
        set.push(acq("2020-01-01T00:00:00Z", 1)).unwrap();
        assert_eq!(set.get(0).unwrap().line_id, 1);
        assert!(set.get(1).is_none());
    }
}
