use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::insurance::InsuranceIndex;
use crate::model::MatchType;
use crate::output::carrier_column;
use crate::scanner::ScanStats;

/// How many matches are kept as samples for the end-of-run report.
pub const SAMPLE_LIMIT: usize = 5;

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct LinkSummary {
    pub meta: RunMeta,
    pub carriers: CarrierCounts,
    pub insurance: InsuranceCounts,
    /// Emitted match decisions, keyed by match type label.
    pub matches_by_type: BTreeMap<String, u64>,
    pub decisions: u64,
    /// Distinct insurance records claimed by at least one decision.
    pub claimed: usize,
    pub unmatched: usize,
    pub match_rate: f64,
    pub samples: Vec<MatchSample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub engine_version: String,
    pub run_at: String,
    pub workers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl RunMeta {
    pub fn now(workers: usize, limit: Option<u64>) -> Self {
        Self {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            workers,
            limit,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CarrierCounts {
    pub lines: u64,
    pub recovered: u64,
    pub skipped: u64,
    /// Records handed to the matcher; below `recovered` only under a limit.
    pub processed: u64,
}

impl CarrierCounts {
    pub fn new(scan: ScanStats, processed: u64) -> Self {
        Self { lines: scan.lines, recovered: scan.recovered, skipped: scan.skipped, processed }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct InsuranceCounts {
    pub records: usize,
    pub short_rows: usize,
    pub collisions: usize,
    pub mc_keys: usize,
    pub dot_keys: usize,
}

impl InsuranceCounts {
    pub fn of(index: &InsuranceIndex) -> Self {
        let load = index.stats();
        Self {
            records: load.rows,
            short_rows: load.short_rows,
            collisions: load.collisions,
            mc_keys: index.mc_keys(),
            dot_keys: index.dot_keys(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSample {
    pub match_type: MatchType,
    pub dot_number: String,
    pub legal_name: String,
    pub phy_state: String,
}

// ---------------------------------------------------------------------------
// Tally
// ---------------------------------------------------------------------------

/// Running per-type counts, fed once per written matched row.
#[derive(Debug, Clone, Default)]
pub struct MatchTally {
    by_type: BTreeMap<MatchType, u64>,
    samples: Vec<MatchSample>,
}

impl MatchTally {
    /// Count one matched row as produced by `output::project`.
    pub fn record(&mut self, match_type: MatchType, row: &[String]) {
        *self.by_type.entry(match_type).or_insert(0) += 1;
        if self.samples.len() < SAMPLE_LIMIT {
            let cell = |name: &str| {
                carrier_column(name)
                    .and_then(|i| row.get(i))
                    .cloned()
                    .unwrap_or_default()
            };
            self.samples.push(MatchSample {
                match_type,
                dot_number: cell("dot_number"),
                legal_name: cell("legal_name"),
                phy_state: cell("phy_state"),
            });
        }
    }

    pub fn total(&self) -> u64 {
        self.by_type.values().sum()
    }

    #[cfg(test)]
    pub(crate) fn count(&self, match_type: MatchType) -> u64 {
        self.by_type.get(&match_type).copied().unwrap_or(0)
    }
}

/// Assemble the final summary from the stage counters.
pub fn compute_summary(
    meta: RunMeta,
    carriers: CarrierCounts,
    insurance: InsuranceCounts,
    tally: MatchTally,
    claimed: usize,
    unmatched: usize,
) -> LinkSummary {
    let matches_by_type = tally
        .by_type
        .iter()
        .map(|(mt, n)| (mt.to_string(), *n))
        .collect();
    LinkSummary {
        meta,
        carriers,
        insurance,
        matches_by_type,
        decisions: tally.total(),
        claimed,
        unmatched,
        match_rate: match_rate(claimed, unmatched),
        samples: tally.samples,
    }
}

/// claimed / (claimed + unmatched); zero for an empty feed.
pub fn match_rate(claimed: usize, unmatched: usize) -> f64 {
    let total = claimed + unmatched;
    if total == 0 {
        0.0
    } else {
        claimed as f64 / total as f64
    }
}

impl fmt::Display for LinkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.carriers;
        let i = &self.insurance;
        writeln!(f, "carrier registry: {} lines, {} recovered, {} skipped", c.lines, c.recovered, c.skipped)?;
        if c.processed != c.recovered {
            writeln!(f, "  sample limit: {} carriers processed", c.processed)?;
        }
        writeln!(
            f,
            "insurance feed:   {} records ({} short rows, {} key collisions)",
            i.records, i.short_rows, i.collisions
        )?;
        writeln!(f, "match decisions:  {}", self.decisions)?;
        for mt in MatchType::PRECEDENCE {
            let n = self.matches_by_type.get(mt.as_str()).copied().unwrap_or(0);
            writeln!(f, "  {:<13} {n}", mt.as_str())?;
        }
        writeln!(f, "claimed:          {}", self.claimed)?;
        writeln!(f, "unmatched:        {}", self.unmatched)?;
        write!(f, "match rate:       {:.2}%", self.match_rate * 100.0)?;
        if !self.samples.is_empty() {
            write!(f, "\nsample matches:")?;
            for s in &self.samples {
                write!(f, "\n  {} DOT {} {} ({})", s.match_type, s.dot_number, s.legal_name, s.phy_state)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::matched_header;

    fn row(dot: &str, name: &str, state: &str) -> Vec<String> {
        let mut row = vec![String::new(); matched_header().len()];
        row[carrier_column("dot_number").unwrap()] = dot.into();
        row[carrier_column("legal_name").unwrap()] = name.into();
        row[carrier_column("phy_state").unwrap()] = state.into();
        row
    }

    fn meta() -> RunMeta {
        RunMeta::now(1, None)
    }

    #[test]
    fn tally_counts_and_samples() {
        let mut tally = MatchTally::default();
        for i in 0..7 {
            tally.record(MatchType::McDirect, &row(&i.to_string(), "ACME", "OH"));
        }
        tally.record(MatchType::DotPadded, &row("9", "ZED", "TX"));
        assert_eq!(tally.total(), 8);
        assert_eq!(tally.count(MatchType::McDirect), 7);
        assert_eq!(tally.count(MatchType::DotUnpadded), 0);
        assert_eq!(tally.samples.len(), SAMPLE_LIMIT);
        assert_eq!(tally.samples[0].legal_name, "ACME");
        assert_eq!(tally.samples[0].phy_state, "OH");
    }

    #[test]
    fn rate_uses_claimed_records() {
        assert_eq!(match_rate(0, 0), 0.0);
        assert_eq!(match_rate(1, 3), 0.25);
        assert_eq!(match_rate(4, 0), 1.0);
    }

    #[test]
    fn summary_keeps_decisions_apart_from_claims() {
        let mut tally = MatchTally::default();
        tally.record(MatchType::McDirect, &row("1", "A", "OH"));
        tally.record(MatchType::McDirect, &row("2", "B", "OH"));
        let insurance = InsuranceCounts { records: 3, short_rows: 1, ..Default::default() };
        let scan = ScanStats { lines: 4, recovered: 2, skipped: 1 };
        let summary = compute_summary(meta(), CarrierCounts::new(scan, 2), insurance, tally, 1, 2);
        assert_eq!(summary.decisions, 2);
        assert_eq!(summary.claimed + summary.unmatched, summary.insurance.records);
        assert_eq!(summary.matches_by_type["MC_DIRECT"], 2);
        assert!((summary.match_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn renders_human_text_and_json() {
        let mut tally = MatchTally::default();
        tally.record(MatchType::DotDirect, &row("00012345", "ACME FREIGHT LLC", "OH"));
        let insurance = InsuranceCounts { records: 2, ..Default::default() };
        let scan = ScanStats { lines: 3, recovered: 1, skipped: 0 };
        let summary = compute_summary(meta(), CarrierCounts::new(scan, 1), insurance, tally, 1, 1);

        let text = summary.to_string();
        assert!(text.contains("match rate:       50.00%"));
        assert!(text.contains("DOT_DIRECT DOT 00012345 ACME FREIGHT LLC (OH)"));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["matches_by_type"]["DOT_DIRECT"], 1);
        assert_eq!(json["samples"][0]["match_type"], "dot_direct");
        assert_eq!(json["meta"]["engine_version"], env!("CARGO_PKG_VERSION"));
        assert!(json["meta"].get("limit").is_none());
    }
}
