//! Run orchestration.
//!
//! Order of work: both inputs are checked, the insurance feed is loaded and
//! indexed in full (nothing is matched before this completes), then the
//! registry is streamed through the scanner and matcher into the matched
//! stream, and finally the unclaimed insurance records are exported.
//!
//! With `workers > 1` the scanner runs on its own thread and deals records
//! round-robin to matcher threads over bounded channels. All matched rows
//! funnel back to a single writer on the calling thread. Row order is not
//! preserved in that mode; row content and counts are identical.

use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use log::{debug, info};

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::insurance::InsuranceIndex;
use crate::matcher::Matcher;
use crate::model::{CarrierRecord, MatchType};
use crate::output::{project, MatchedWriter, UnmatchedWriter};
use crate::reconcile::{export_unmatched, ClaimLedger};
use crate::scanner::{RecoveryScanner, ScanStats};
use crate::summary::{compute_summary, CarrierCounts, InsuranceCounts, LinkSummary, MatchTally, RunMeta};

pub const DEFAULT_MATCHED_OUTPUT: &str = "hyper_detailed_insurance_carriers.csv";
pub const DEFAULT_UNMATCHED_OUTPUT: &str = "unmatched_insurance_records.csv";

/// Input and output locations for one run.
#[derive(Debug, Clone)]
pub struct LinkPaths {
    pub carriers: PathBuf,
    pub insurance: PathBuf,
    pub matched: PathBuf,
    pub unmatched: PathBuf,
}

impl LinkPaths {
    /// Inputs as given; outputs under their default names in the working directory.
    pub fn new(carriers: impl Into<PathBuf>, insurance: impl Into<PathBuf>) -> Self {
        Self {
            carriers: carriers.into(),
            insurance: insurance.into(),
            matched: PathBuf::from(DEFAULT_MATCHED_OUTPUT),
            unmatched: PathBuf::from(DEFAULT_UNMATCHED_OUTPUT),
        }
    }
}

/// Run the whole linkage over files on disk.
pub fn run(config: &LinkConfig, paths: &LinkPaths) -> Result<LinkSummary, LinkError> {
    config.validate()?;
    check_input(&paths.carriers)?;
    check_input(&paths.insurance)?;

    info!("loading insurance feed {}", paths.insurance.display());
    let index = InsuranceIndex::load(&paths.insurance, config)?;

    info!("streaming carrier registry {}", paths.carriers.display());
    let scanner = RecoveryScanner::open(&paths.carriers, config)?;

    let matched = create_output(&paths.matched, "matched")?;
    let unmatched = create_output(&paths.unmatched, "unmatched")?;
    let summary = link_streams(config, &index, scanner, matched, unmatched)?;

    info!(
        "wrote {} matched rows to {} and {} unmatched records to {}",
        summary.decisions,
        paths.matched.display(),
        summary.unmatched,
        paths.unmatched.display()
    );
    Ok(summary)
}

/// Link an already loaded index against a scanner, writing both outputs.
pub fn link_streams<R, M, U>(
    config: &LinkConfig,
    index: &InsuranceIndex,
    scanner: RecoveryScanner<R>,
    matched: M,
    unmatched: U,
) -> Result<LinkSummary, LinkError>
where
    R: BufRead + Send,
    M: Write,
    U: Write,
{
    let delimiter = config.output_delimiter();
    let workers = config.pipeline.workers.max(1);
    let limit = config.carriers.limit;

    let mut out = MatchedWriter::new(matched, delimiter)?;
    let ledger = ClaimLedger::new(index.len());
    let matcher = Matcher::new(index, config);
    let mut tally = MatchTally::default();

    let (scan, processed) = if workers == 1 {
        link_sequential(scanner, matcher, &ledger, limit, &mut out, &mut tally)?
    } else {
        info!("matching with {workers} workers");
        let capacity = config.pipeline.channel_capacity;
        link_parallel(scanner, matcher, &ledger, limit, workers, capacity, &mut out, &mut tally)?
    };
    if limit.is_some_and(|l| processed >= l) {
        info!("sample limit reached after {processed} carriers");
    }
    out.finish()?;

    let mut residue = UnmatchedWriter::new(unmatched, delimiter)?;
    let unmatched_rows = export_unmatched(index, &ledger, &mut residue)?;
    residue.finish()?;

    Ok(compute_summary(
        RunMeta::now(workers, limit),
        CarrierCounts::new(scan, processed),
        InsuranceCounts::of(index),
        tally,
        ledger.claimed_count(),
        unmatched_rows as usize,
    ))
}

fn under_limit(processed: u64, limit: Option<u64>) -> bool {
    limit.map_or(true, |l| processed < l)
}

fn link_sequential<R: BufRead, M: Write>(
    mut scanner: RecoveryScanner<R>,
    matcher: Matcher<'_>,
    ledger: &ClaimLedger,
    limit: Option<u64>,
    out: &mut MatchedWriter<M>,
    tally: &mut MatchTally,
) -> Result<(ScanStats, u64), LinkError> {
    let mut processed = 0;
    while under_limit(processed, limit) {
        let Some(record) = scanner.next() else { break };
        let carrier = record?;
        processed += 1;
        if let Some(decision) = matcher.link(carrier) {
            ledger.claim(decision.insurance.index);
            let row = project(&decision);
            out.write_row(&row)?;
            tally.record(decision.match_type, &row);
        }
    }
    Ok((scanner.stats(), processed))
}

#[allow(clippy::too_many_arguments)]
fn link_parallel<R: BufRead + Send, M: Write>(
    scanner: RecoveryScanner<R>,
    matcher: Matcher<'_>,
    ledger: &ClaimLedger,
    limit: Option<u64>,
    workers: usize,
    capacity: usize,
    out: &mut MatchedWriter<M>,
    tally: &mut MatchTally,
) -> Result<(ScanStats, u64), LinkError> {
    let (row_tx, row_rx) = mpsc::sync_channel::<(MatchType, Vec<String>)>(capacity);

    thread::scope(|s| {
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let (tx, rx) = mpsc::sync_channel::<CarrierRecord>(capacity);
            senders.push(tx);
            let row_tx = row_tx.clone();
            handles.push(s.spawn(move || {
                let mut linked = 0u64;
                for carrier in rx {
                    let Some(decision) = matcher.link(carrier) else { continue };
                    ledger.claim(decision.insurance.index);
                    let row = project(&decision);
                    if row_tx.send((decision.match_type, row)).is_err() {
                        // writer stopped; dropping rx stops the scanner too
                        break;
                    }
                    linked += 1;
                }
                debug!("matcher worker {id} done, {linked} matches");
            }));
        }
        drop(row_tx);

        let producer = s.spawn(move || -> Result<(ScanStats, u64), LinkError> {
            let mut scanner = scanner;
            let mut processed = 0u64;
            let mut next = 0;
            while under_limit(processed, limit) {
                let Some(record) = scanner.next() else { break };
                let carrier = record?;
                processed += 1;
                if senders[next].send(carrier).is_err() {
                    return Err(LinkError::Worker(format!("matcher worker {next} exited early")));
                }
                next = (next + 1) % senders.len();
            }
            Ok((scanner.stats(), processed))
        });

        let mut written = Ok(());
        for (match_type, row) in &row_rx {
            if let Err(e) = out.write_row(&row) {
                written = Err(e);
                break;
            }
            tally.record(match_type, &row);
        }
        drop(row_rx);

        let produced = producer
            .join()
            .map_err(|_| LinkError::Worker("carrier scanner thread panicked".into()))?;
        for handle in handles {
            handle
                .join()
                .map_err(|_| LinkError::Worker("matcher worker panicked".into()))?;
        }
        written?;
        produced
    })
}

fn check_input(path: &Path) -> Result<(), LinkError> {
    let meta = std::fs::metadata(path).map_err(|e| LinkError::missing(path, e))?;
    if meta.is_dir() {
        return Err(LinkError::missing(path, "is a directory"));
    }
    File::open(path).map_err(|e| LinkError::missing(path, e))?;
    Ok(())
}

fn create_output(path: &Path, stream: &'static str) -> Result<BufWriter<File>, LinkError> {
    let file = File::create(path)
        .map_err(|e| LinkError::output(stream, format!("{}: {e}", path.display())))?;
    Ok(BufWriter::new(file))
}
