//! End-of-run reconciliation: which insurance records were never claimed.

use std::io::Write;
use std::sync::Mutex;

use crate::error::LinkError;
use crate::insurance::InsuranceIndex;
use crate::model::InsuranceRecord;
use crate::output::UnmatchedWriter;

/// Claimed flags, one per loaded insurance record.
///
/// The only structure in the pipeline sized to a whole input, and it is
/// sized to the insurance feed. Workers share it behind one mutex, taken
/// once per successful match and never across I/O.
#[derive(Debug)]
pub struct ClaimLedger {
    claimed: Mutex<Vec<bool>>,
}

impl ClaimLedger {
    pub fn new(records: usize) -> Self {
        Self { claimed: Mutex::new(vec![false; records]) }
    }

    /// Mark `index` claimed. Returns true the first time it is claimed.
    pub fn claim(&self, index: usize) -> bool {
        let mut claimed = self.lock();
        match claimed.get_mut(index) {
            Some(slot) if !*slot => {
                *slot = true;
                true
            }
            _ => false,
        }
    }

    pub fn claimed_count(&self) -> usize {
        self.lock().iter().filter(|c| **c).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unclaimed positions, ascending.
    pub fn unclaimed(&self) -> Vec<usize> {
        self.lock()
            .iter()
            .enumerate()
            .filter(|(_, c)| !**c)
            .map(|(i, _)| i)
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<bool>> {
        // a poisoned ledger still holds valid flags; the panic surfaces elsewhere
        self.claimed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Records the ledger never saw claimed, in file order.
pub fn unclaimed_records<'a>(index: &'a InsuranceIndex, ledger: &ClaimLedger) -> Vec<&'a InsuranceRecord> {
    let records = index.records();
    ledger.unclaimed().into_iter().filter_map(|i| records.get(i)).collect()
}

/// Write every unclaimed record to the unmatched stream. Returns the row count.
pub fn export_unmatched<W: Write>(
    index: &InsuranceIndex,
    ledger: &ClaimLedger,
    writer: &mut UnmatchedWriter<W>,
) -> Result<u64, LinkError> {
    let mut rows = 0;
    for record in unclaimed_records(index, ledger) {
        writer.write(record)?;
        rows += 1;
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;

    #[test]
    fn first_claim_only() {
        let ledger = ClaimLedger::new(3);
        assert!(ledger.claim(1));
        assert!(!ledger.claim(1));
        assert!(!ledger.claim(7));
        assert_eq!(ledger.claimed_count(), 1);
        assert_eq!(ledger.unclaimed(), vec![0, 2]);
    }

    #[test]
    fn empty_ledger() {
        let ledger = ClaimLedger::new(0);
        assert!(ledger.is_empty());
        assert!(ledger.unclaimed().is_empty());
    }

    #[test]
    fn shared_across_threads() {
        let ledger = ClaimLedger::new(100);
        let firsts = std::sync::atomic::AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for i in 0..100 {
                        if ledger.claim(i) {
                            firsts.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        }
                    }
                });
            }
        });
        assert_eq!(firsts.into_inner(), 100);
        assert_eq!(ledger.claimed_count(), 100);
    }

    #[test]
    fn export_writes_unclaimed_in_file_order() {
        let index = InsuranceIndex::from_text("MC1,1\nMC2\nMC3,3,BIPD\n", &LinkConfig::default()).unwrap();
        let ledger = ClaimLedger::new(index.len());
        ledger.claim(0);

        let mut buf = Vec::new();
        {
            let mut writer = UnmatchedWriter::new(&mut buf, b',').unwrap();
            assert_eq!(export_unmatched(&index, &ledger, &mut writer).unwrap(), 2);
            writer.finish().unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "mc,dot,insurance_record\nMC2,,MC2\nMC3,3,MC3|3|BIPD\n");
    }
}
