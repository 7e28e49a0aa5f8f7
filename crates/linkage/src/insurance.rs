use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use log::{debug, info, warn};

use crate::config::{CollisionPolicy, LinkConfig};
use crate::error::LinkError;
use crate::model::{ins_col, InsuranceRecord};
use crate::normalize::{dot_keys, mc_key};

const LOAD_PROGRESS_EVERY: usize = 50_000;

/// Counters gathered while loading the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows: usize,
    pub short_rows: usize,
    pub collisions: usize,
}

/// The fully loaded insurance feed plus its two read-only key indices.
///
/// Index values are positions into `records`, so every lookup hands out a
/// reference into the one backing list.
#[derive(Debug)]
pub struct InsuranceIndex {
    records: Vec<InsuranceRecord>,
    by_mc: HashMap<String, usize>,
    by_dot: HashMap<String, usize>,
    stats: LoadStats,
}

impl InsuranceIndex {
    /// Read and index the feed at `path`. The whole file is read up front.
    pub fn load(path: &Path, config: &LinkConfig) -> Result<Self, LinkError> {
        let mut file = std::fs::File::open(path).map_err(|e| LinkError::missing(path, e))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|e| LinkError::io(path, e))?;
        let text = crate::text::decode_owned(bytes);

        let index = Self::from_text(&text, config).map_err(|e| match e {
            LinkError::Csv { reason, .. } => LinkError::Csv { path: path.to_path_buf(), reason },
            other => other,
        })?;

        info!(
            "loaded {} insurance records from {} ({} MC keys, {} DOT keys, {} short rows, {} key collisions)",
            index.records.len(),
            path.display(),
            index.by_mc.len(),
            index.by_dot.len(),
            index.stats.short_rows,
            index.stats.collisions,
        );
        Ok(index)
    }

    /// Parse and index feed text already in memory.
    pub fn from_text(text: &str, config: &LinkConfig) -> Result<Self, LinkError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(config.insurance_delimiter())
            .has_headers(config.insurance.has_headers)
            .flexible(true)
            .from_reader(text.as_bytes());

        let policy = config.insurance.collision;
        let width = config.matching.pad_width;
        let mut index = Self {
            records: Vec::new(),
            by_mc: HashMap::new(),
            by_dot: HashMap::new(),
            stats: LoadStats::default(),
        };

        for (i, result) in reader.records().enumerate() {
            let record = result.map_err(|e| LinkError::Csv {
                path: Default::default(),
                reason: e.to_string(),
            })?;
            if i > 0 && i % LOAD_PROGRESS_EVERY == 0 {
                info!("loaded {i} insurance rows...");
            }

            let line = record.position().map(|p| p.line()).unwrap_or(i as u64 + 1);
            let fields: Vec<String> = record.iter().map(str::to_string).collect();
            let idx = index.records.len();
            let short = fields.len() < 2;

            let mc_raw = clean_raw(fields.get(ins_col::MC));
            let dot_raw = clean_raw(fields.get(ins_col::DOT));

            if short {
                index.stats.short_rows += 1;
                warn!("insurance line {line}: {} field(s), not indexed", fields.len());
            } else {
                let mc = mc_key(&mc_raw);
                if !mc.is_empty() {
                    index.stats.collisions +=
                        insert_key(&mut index.by_mc, mc, idx, policy, "MC", line);
                }
                for key in dot_keys(&dot_raw, width) {
                    index.stats.collisions +=
                        insert_key(&mut index.by_dot, key, idx, policy, "DOT", line);
                }
            }

            index.records.push(InsuranceRecord {
                index: idx,
                line,
                mc_raw,
                dot_raw,
                fields,
                short,
            });
        }

        index.stats.rows = index.records.len();
        Ok(index)
    }

    pub fn lookup_mc(&self, key: &str) -> Option<&InsuranceRecord> {
        self.by_mc.get(key).map(|&i| &self.records[i])
    }

    pub fn lookup_dot(&self, key: &str) -> Option<&InsuranceRecord> {
        self.by_dot.get(key).map(|&i| &self.records[i])
    }

    pub fn records(&self) -> &[InsuranceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn mc_keys(&self) -> usize {
        self.by_mc.len()
    }

    pub fn dot_keys(&self) -> usize {
        self.by_dot.len()
    }

    pub fn stats(&self) -> LoadStats {
        self.stats
    }
}

/// Raw identifier as given, minus surrounding whitespace and stray quotes.
fn clean_raw(field: Option<&String>) -> String {
    field
        .map(|f| f.trim().trim_matches('"').trim().to_string())
        .unwrap_or_default()
}

/// Insert under the collision policy. Returns 1 when an existing slot held a
/// different record.
fn insert_key(
    map: &mut HashMap<String, usize>,
    key: String,
    idx: usize,
    policy: CollisionPolicy,
    kind: &str,
    line: u64,
) -> usize {
    match map.entry(key) {
        Entry::Vacant(e) => {
            e.insert(idx);
            0
        }
        Entry::Occupied(mut e) => {
            if *e.get() == idx {
                return 0;
            }
            debug!("{kind} key '{}' repeated at insurance line {line} ({policy})", e.key());
            if policy == CollisionPolicy::LastWins {
                e.insert(idx);
            }
            1
        }
    }
}
