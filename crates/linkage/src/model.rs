use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Carrier registry side
// ---------------------------------------------------------------------------

/// One recovered registry record. Only the identifiers are interpreted; the
/// remaining descriptive fields ride along untouched for the output writer.
#[derive(Debug, Clone)]
pub struct CarrierRecord {
    pub dot_number: Option<String>,
    pub dockets: [Option<String>; 3],
    pub fields: Map<String, Value>,
}

impl CarrierRecord {
    /// Field as output text: strings verbatim, numbers and booleans in their
    /// JSON spelling, null or missing as empty.
    pub fn field(&self, key: &str) -> String {
        match self.fields.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Docket values present on this record, in field order.
    pub fn docket_values(&self) -> impl Iterator<Item = &str> {
        self.dockets.iter().filter_map(|d| d.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Insurance feed side
// ---------------------------------------------------------------------------

/// Positional layout of an insurance feed row.
pub mod ins_col {
    pub const MC: usize = 0;
    pub const DOT: usize = 1;
    pub const COVERAGE_TYPE: usize = 2;
    pub const COVERAGE_DESC: usize = 3;
    pub const COMPANY: usize = 4;
    pub const POLICY_NUMBER: usize = 5;
    pub const EXPIRATION_DATE: usize = 6;
    pub const AMOUNT_1: usize = 7;
    pub const AMOUNT_2: usize = 8;
    pub const EFFECTIVE_DATE: usize = 9;
    pub const RENEWAL_DATE: usize = 10;
    /// Columns carried into the matched output.
    pub const WIDTH: usize = 11;
}

/// One insurance policy row, immutable after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsuranceRecord {
    /// Position in the loaded record list; the reconciliation handle.
    pub index: usize,
    /// 1-based record number in the source file.
    pub line: u64,
    pub mc_raw: String,
    pub dot_raw: String,
    pub fields: Vec<String>,
    /// Fewer than two fields: kept for reconciliation, never indexed.
    pub short: bool,
}

impl InsuranceRecord {
    /// Column by position; missing trailing columns read as empty.
    pub fn column(&self, i: usize) -> &str {
        self.fields.get(i).map(String::as_str).unwrap_or("")
    }

    pub fn coverage_type(&self) -> &str {
        self.column(ins_col::COVERAGE_TYPE)
    }

    pub fn carrier_name(&self) -> &str {
        self.column(ins_col::COMPANY)
    }

    pub fn policy_number(&self) -> &str {
        self.column(ins_col::POLICY_NUMBER)
    }

    pub fn start_date(&self) -> &str {
        self.column(ins_col::EFFECTIVE_DATE)
    }

    pub fn end_date(&self) -> &str {
        self.column(ins_col::EXPIRATION_DATE)
    }

    pub fn amounts(&self) -> (&str, &str) {
        (self.column(ins_col::AMOUNT_1), self.column(ins_col::AMOUNT_2))
    }

    /// Original row content, fields joined with `|`.
    pub fn raw_line(&self) -> String {
        self.fields.join("|")
    }
}

// ---------------------------------------------------------------------------
// Match decisions
// ---------------------------------------------------------------------------

/// Which strategy linked a carrier to a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    McDirect,
    DotDirect,
    DotPadded,
    DotUnpadded,
}

impl MatchType {
    /// Default precedence, highest first.
    pub const PRECEDENCE: [MatchType; 4] =
        [Self::McDirect, Self::DotDirect, Self::DotPadded, Self::DotUnpadded];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::McDirect => "MC_DIRECT",
            Self::DotDirect => "DOT_DIRECT",
            Self::DotPadded => "DOT_PADDED",
            Self::DotUnpadded => "DOT_UNPADDED",
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One carrier linked to one policy.
#[derive(Debug, Clone)]
pub struct MatchDecision<'a> {
    pub match_type: MatchType,
    pub carrier: CarrierRecord,
    pub insurance: &'a InsuranceRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn carrier(fields: Value) -> CarrierRecord {
        CarrierRecord {
            dot_number: None,
            dockets: [None, None, None],
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn field_stringifies_json_values() {
        let c = carrier(json!({
            "legal_name": "ACME FREIGHT LLC",
            "truck_units": 12,
            "hm_ind": false,
            "dba_name": null,
        }));
        assert_eq!(c.field("legal_name"), "ACME FREIGHT LLC");
        assert_eq!(c.field("truck_units"), "12");
        assert_eq!(c.field("hm_ind"), "false");
        assert_eq!(c.field("dba_name"), "");
        assert_eq!(c.field("not_there"), "");
    }

    #[test]
    fn insurance_columns_beyond_row_are_empty() {
        let rec = InsuranceRecord {
            index: 0,
            line: 1,
            mc_raw: "MC1".into(),
            dot_raw: "2".into(),
            fields: vec!["MC1".into(), "2".into(), "BIPD".into()],
            short: false,
        };
        assert_eq!(rec.coverage_type(), "BIPD");
        assert_eq!(rec.policy_number(), "");
        assert_eq!(rec.amounts(), ("", ""));
        assert_eq!(rec.raw_line(), "MC1|2|BIPD");
    }

    #[test]
    fn match_type_labels() {
        let labels: Vec<_> = MatchType::PRECEDENCE.iter().map(|m| m.to_string()).collect();
        assert_eq!(labels, ["MC_DIRECT", "DOT_DIRECT", "DOT_PADDED", "DOT_UNPADDED"]);
    }
}
