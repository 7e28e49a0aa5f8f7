use serde::Deserialize;

use crate::error::LinkError;
use crate::model::MatchType;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Run configuration. Every section has defaults, so an empty TOML document
/// (or no file at all) yields the standard linkage behavior.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkConfig {
    #[serde(default)]
    pub insurance: InsuranceConfig,
    #[serde(default)]
    pub carriers: CarrierConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Insurance feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InsuranceConfig {
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// First row is a header and is not loaded as a record.
    #[serde(default)]
    pub has_headers: bool,
    #[serde(default)]
    pub collision: CollisionPolicy,
}

impl Default for InsuranceConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            has_headers: false,
            collision: CollisionPolicy::default(),
        }
    }
}

/// Which row keeps an index slot when two insurance rows normalize to the
/// same key. Both rows stay in the record list for reconciliation either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    #[default]
    LastWins,
    FirstWins,
}

impl std::fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LastWins => write!(f, "last_wins"),
            Self::FirstWins => write!(f, "first_wins"),
        }
    }
}

// ---------------------------------------------------------------------------
// Carrier registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CarrierConfig {
    #[serde(default = "default_dot_field")]
    pub dot_field: String,
    #[serde(default = "default_docket_fields")]
    pub docket_fields: Vec<String>,
    /// Emit a progress line every N input lines. 0 disables it.
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
    /// A buffered fragment larger than this is discarded as malformed.
    #[serde(default = "default_max_fragment_bytes")]
    pub max_fragment_bytes: usize,
    /// Stop after this many recovered carrier records (sample runs).
    #[serde(default)]
    pub limit: Option<u64>,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            dot_field: default_dot_field(),
            docket_fields: default_docket_fields(),
            progress_every: default_progress_every(),
            max_fragment_bytes: default_max_fragment_bytes(),
            limit: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    /// Strategy precedence; the first strategy that finds a key wins.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<MatchType>,
    #[serde(default = "default_pad_width")]
    pub pad_width: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            pad_width: default_pad_width(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Matcher workers. 1 runs everything on the calling thread.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Bound on records in flight between pipeline stages.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { delimiter: default_delimiter() }
    }
}

fn default_delimiter() -> String {
    ",".into()
}

fn default_dot_field() -> String {
    "dot_number".into()
}

fn default_docket_fields() -> Vec<String> {
    vec!["docket1".into(), "docket2".into(), "docket3".into()]
}

fn default_progress_every() -> u64 {
    100_000
}

fn default_max_fragment_bytes() -> usize {
    1 << 20
}

fn default_strategies() -> Vec<MatchType> {
    MatchType::PRECEDENCE.to_vec()
}

/// Widest accepted DOT pad width. A DOT number fits in far fewer digits.
pub const MAX_PAD_WIDTH: usize = 20;

fn default_pad_width() -> usize {
    crate::normalize::DOT_WIDTH
}

fn default_workers() -> usize {
    1
}

fn default_channel_capacity() -> usize {
    1024
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl LinkConfig {
    pub fn from_toml(input: &str) -> Result<Self, LinkError> {
        let config: LinkConfig =
            toml::from_str(input).map_err(|e| LinkError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LinkError> {
        delimiter_byte("insurance.delimiter", &self.insurance.delimiter)?;
        delimiter_byte("output.delimiter", &self.output.delimiter)?;

        if self.carriers.dot_field.trim().is_empty() {
            return Err(LinkError::ConfigValidation("carriers.dot_field must not be empty".into()));
        }
        if self.carriers.docket_fields.len() > 3 {
            return Err(LinkError::ConfigValidation(format!(
                "carriers.docket_fields allows at most 3 fields, found {}",
                self.carriers.docket_fields.len()
            )));
        }
        if self.carriers.max_fragment_bytes == 0 {
            return Err(LinkError::ConfigValidation(
                "carriers.max_fragment_bytes must be positive".into(),
            ));
        }

        let strategies = &self.matching.strategies;
        if strategies.is_empty() {
            return Err(LinkError::ConfigValidation(
                "matching.strategies must name at least one strategy".into(),
            ));
        }
        for (i, s) in strategies.iter().enumerate() {
            if strategies[..i].contains(s) {
                return Err(LinkError::ConfigValidation(format!(
                    "matching.strategies lists {s} more than once"
                )));
            }
        }
        if self.matching.pad_width == 0 || self.matching.pad_width > MAX_PAD_WIDTH {
            return Err(LinkError::ConfigValidation(format!(
                "matching.pad_width must be between 1 and {MAX_PAD_WIDTH}, got {}",
                self.matching.pad_width
            )));
        }

        if self.pipeline.workers == 0 {
            return Err(LinkError::ConfigValidation("pipeline.workers must be at least 1".into()));
        }
        if self.pipeline.channel_capacity == 0 {
            return Err(LinkError::ConfigValidation(
                "pipeline.channel_capacity must be positive".into(),
            ));
        }

        Ok(())
    }

    pub fn insurance_delimiter(&self) -> u8 {
        delimiter_byte("insurance.delimiter", &self.insurance.delimiter).unwrap_or(b',')
    }

    pub fn output_delimiter(&self) -> u8 {
        delimiter_byte("output.delimiter", &self.output.delimiter).unwrap_or(b',')
    }
}

fn delimiter_byte(name: &str, value: &str) -> Result<u8, LinkError> {
    let value = if value == "\\t" { "\t" } else { value };
    match value.as_bytes() {
        [b] if b.is_ascii() && *b != b'"' && *b != b'\n' && *b != b'\r' => Ok(*b),
        _ => Err(LinkError::ConfigValidation(format!(
            "{name} must be a single ASCII character, got {value:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = LinkConfig::from_toml("").unwrap();
        assert_eq!(config.insurance_delimiter(), b',');
        assert!(!config.insurance.has_headers);
        assert_eq!(config.insurance.collision, CollisionPolicy::LastWins);
        assert_eq!(config.carriers.dot_field, "dot_number");
        assert_eq!(config.carriers.docket_fields, vec!["docket1", "docket2", "docket3"]);
        assert_eq!(config.matching.strategies, MatchType::PRECEDENCE.to_vec());
        assert_eq!(config.matching.pad_width, 8);
        assert_eq!(config.pipeline.workers, 1);
        assert!(config.carriers.limit.is_none());
    }

    #[test]
    fn parse_full_document() {
        let input = r#"
[insurance]
delimiter = "\t"
has_headers = true
collision = "first_wins"

[carriers]
dot_field = "usdot"
docket_fields = ["mc1", "mc2"]
progress_every = 500
limit = 50000

[matching]
strategies = ["dot_direct", "mc_direct"]

[pipeline]
workers = 4
channel_capacity = 64

[output]
delimiter = "|"
"#;
        let config = LinkConfig::from_toml(input).unwrap();
        assert_eq!(config.insurance_delimiter(), b'\t');
        assert!(config.insurance.has_headers);
        assert_eq!(config.insurance.collision, CollisionPolicy::FirstWins);
        assert_eq!(config.carriers.dot_field, "usdot");
        assert_eq!(config.carriers.docket_fields.len(), 2);
        assert_eq!(config.carriers.limit, Some(50000));
        assert_eq!(
            config.matching.strategies,
            vec![MatchType::DotDirect, MatchType::McDirect]
        );
        assert_eq!(config.pipeline.workers, 4);
        assert_eq!(config.output_delimiter(), b'|');
    }

    #[test]
    fn escaped_tab_delimiter_accepted() {
        let config = LinkConfig::from_toml("[insurance]\ndelimiter = '\\t'\n").unwrap();
        assert_eq!(config.insurance_delimiter(), b'\t');
    }

    #[test]
    fn reject_duplicate_strategy() {
        let input = r#"
[matching]
strategies = ["mc_direct", "dot_direct", "mc_direct"]
"#;
        let err = LinkConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("MC_DIRECT"), "{err}");
    }

    #[test]
    fn reject_empty_strategies() {
        let err = LinkConfig::from_toml("[matching]\nstrategies = []\n").unwrap_err();
        assert!(matches!(err, LinkError::ConfigValidation(_)));
    }

    #[test]
    fn reject_unknown_strategy() {
        let err = LinkConfig::from_toml("[matching]\nstrategies = [\"name_fuzzy\"]\n").unwrap_err();
        assert!(matches!(err, LinkError::ConfigParse(_)));
    }

    #[test]
    fn reject_multi_char_delimiter() {
        let err = LinkConfig::from_toml("[output]\ndelimiter = \";;\"\n").unwrap_err();
        assert!(err.to_string().contains("output.delimiter"));
    }

    #[test]
    fn reject_oversized_pad_width() {
        let err = LinkConfig::from_toml("[matching]\npad_width = 1000000\n").unwrap_err();
        assert!(err.to_string().contains("matching.pad_width"), "{err}");
        assert!(LinkConfig::from_toml("[matching]\npad_width = 0\n").is_err());
        assert!(LinkConfig::from_toml("[matching]\npad_width = 20\n").is_ok());
    }

    #[test]
    fn reject_too_many_docket_fields() {
        let input = "[carriers]\ndocket_fields = [\"a\", \"b\", \"c\", \"d\"]\n";
        assert!(LinkConfig::from_toml(input).is_err());
    }

    #[test]
    fn reject_zero_workers() {
        let err = LinkConfig::from_toml("[pipeline]\nworkers = 0\n").unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn reject_unknown_key() {
        assert!(LinkConfig::from_toml("[matching]\nfuzzy = true\n").is_err());
    }
}
