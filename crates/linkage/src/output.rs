//! Matched and unmatched output streams.
//!
//! Column order is part of the output contract: downstream consumers read
//! these files positionally as well as by header name.

use std::io::Write;

use crate::error::LinkError;
use crate::model::{ins_col, InsuranceRecord, MatchDecision};

pub const MATCH_COLUMNS: [&str; 3] = ["match_type", "insurance_mc", "insurance_dot"];

pub const INSURANCE_COLUMNS: [&str; ins_col::WIDTH] = [
    "ins_mc",
    "ins_dot",
    "ins_coverage_type",
    "ins_coverage_desc",
    "ins_company",
    "ins_policy_num",
    "ins_expiration_date",
    "ins_amount1",
    "ins_amount2",
    "ins_effective_date",
    "ins_renewal_date",
];

/// (output header, registry key) pairs for the carrier projection.
pub const CARRIER_COLUMNS: [(&str, &str); 68] = [
    // identity
    ("dot_number", "dot_number"),
    ("legal_name", "legal_name"),
    ("dba_name", "dba_name"),
    ("status_code", "status_code"),
    // contact
    ("phone", "phone"),
    ("fax", "fax"),
    ("cell_phone", "cell_phone"),
    ("email_address", "email_address"),
    // physical address
    ("phy_street", "phy_street"),
    ("phy_city", "phy_city"),
    ("phy_state", "phy_state"),
    ("phy_zip", "phy_zip"),
    ("phy_country", "phy_country"),
    ("phy_cnty", "phy_cnty"),
    // mailing address
    ("mail_street", "carrier_mailing_street"),
    ("mail_city", "carrier_mailing_city"),
    ("mail_state", "carrier_mailing_state"),
    ("mail_zip", "carrier_mailing_zip"),
    ("mail_country", "carrier_mailing_country"),
    ("mail_cnty", "carrier_mailing_cnty"),
    // business
    ("business_org_desc", "business_org_desc"),
    ("carrier_operation", "carrier_operation"),
    ("dun_bradstreet_no", "dun_bradstreet_no"),
    ("company_officer_1", "company_officer_1"),
    ("company_officer_2", "company_officer_2"),
    // fleet
    ("truck_units", "truck_units"),
    ("power_units", "power_units"),
    ("bus_units", "bus_units"),
    ("fleetsize", "fleetsize"),
    ("total_drivers", "total_drivers"),
    ("total_cdl", "total_cdl"),
    ("total_intrastate_drivers", "total_intrastate_drivers"),
    ("driver_inter_total", "driver_inter_total"),
    ("avg_drivers_leased_per_month", "avg_drivers_leased_per_month"),
    // operating radius
    ("interstate_beyond_100_miles", "interstate_beyond_100_miles"),
    ("interstate_within_100_miles", "interstate_within_100_miles"),
    ("intrastate_beyond_100_miles", "intrastate_beyond_100_miles"),
    ("intrastate_within_100_miles", "intrastate_within_100_miles"),
    // safety and compliance
    ("safety_rating", "safety_rating"),
    ("safety_rating_date", "safety_rating_date"),
    ("review_type", "review_type"),
    ("review_date", "review_date"),
    ("hm_ind", "hm_ind"),
    ("mcs150_date", "mcs150_date"),
    ("mcs150_mileage", "mcs150_mileage"),
    ("mcs150_mileage_year", "mcs150_mileage_year"),
    // classification
    ("classdef", "classdef"),
    // equipment
    ("owntruck", "owntruck"),
    ("owntract", "owntract"),
    ("owntrail", "owntrail"),
    ("trmtract", "trmtract"),
    ("trmtrail", "trmtrail"),
    ("trptract", "trptract"),
    // dockets
    ("docket1", "docket1"),
    ("docket2", "docket2"),
    ("docket3", "docket3"),
    // cargo
    ("crgo_genfreight", "crgo_genfreight"),
    ("crgo_household", "crgo_household"),
    ("crgo_metalsheet", "crgo_metalsheet"),
    ("crgo_motoveh", "crgo_motoveh"),
    ("crgo_logpole", "crgo_logpole"),
    ("crgo_bldgmat", "crgo_bldgmat"),
    ("crgo_produce", "crgo_produce"),
    ("crgo_livestock", "crgo_livestock"),
    ("crgo_grainfeed", "crgo_grainfeed"),
    ("crgo_coldfood", "crgo_coldfood"),
    ("crgo_beverages", "crgo_beverages"),
    ("crgo_chem", "crgo_chem"),
];

pub const UNMATCHED_COLUMNS: [&str; 3] = ["mc", "dot", "insurance_record"];

/// Full matched header, in output order.
pub fn matched_header() -> Vec<&'static str> {
    MATCH_COLUMNS
        .iter()
        .copied()
        .chain(INSURANCE_COLUMNS.iter().copied())
        .chain(CARRIER_COLUMNS.iter().map(|(header, _)| *header))
        .collect()
}

/// Position of a carrier column in a projected matched row.
pub fn carrier_column(header: &str) -> Option<usize> {
    CARRIER_COLUMNS
        .iter()
        .position(|(h, _)| *h == header)
        .map(|i| MATCH_COLUMNS.len() + INSURANCE_COLUMNS.len() + i)
}

/// Project one decision onto the matched schema.
pub fn project(decision: &MatchDecision<'_>) -> Vec<String> {
    let ins = decision.insurance;
    let mut row = Vec::with_capacity(MATCH_COLUMNS.len() + INSURANCE_COLUMNS.len() + CARRIER_COLUMNS.len());
    row.push(decision.match_type.to_string());
    row.push(ins.mc_raw.clone());
    row.push(ins.dot_raw.clone());
    row.extend((0..ins_col::WIDTH).map(|i| ins.column(i).to_string()));
    row.extend(CARRIER_COLUMNS.iter().map(|(_, key)| decision.carrier.field(key)));
    row
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Matched-row stream. Each row is flushed as soon as it is written.
pub struct MatchedWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: u64,
}

impl<W: Write> MatchedWriter<W> {
    pub fn new(inner: W, delimiter: u8) -> Result<Self, LinkError> {
        let mut writer = csv::WriterBuilder::new().delimiter(delimiter).from_writer(inner);
        writer.write_record(matched_header()).map_err(|e| LinkError::output("matched", e))?;
        writer.flush().map_err(|e| LinkError::output("matched", e))?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn write(&mut self, decision: &MatchDecision<'_>) -> Result<(), LinkError> {
        self.write_row(&project(decision))
    }

    /// Write a row already projected by `project`.
    pub fn write_row(&mut self, row: &[String]) -> Result<(), LinkError> {
        self.writer.write_record(row).map_err(|e| LinkError::output("matched", e))?;
        self.writer.flush().map_err(|e| LinkError::output("matched", e))?;
        self.rows += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<u64, LinkError> {
        self.writer.flush().map_err(|e| LinkError::output("matched", e))?;
        Ok(self.rows)
    }
}

/// Residual stream of insurance records no carrier claimed.
pub struct UnmatchedWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: u64,
}

impl<W: Write> UnmatchedWriter<W> {
    pub fn new(inner: W, delimiter: u8) -> Result<Self, LinkError> {
        let mut writer = csv::WriterBuilder::new().delimiter(delimiter).from_writer(inner);
        writer.write_record(UNMATCHED_COLUMNS).map_err(|e| LinkError::output("unmatched", e))?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn write(&mut self, record: &InsuranceRecord) -> Result<(), LinkError> {
        let raw = record.raw_line();
        self.writer
            .write_record([record.mc_raw.as_str(), record.dot_raw.as_str(), raw.as_str()])
            .map_err(|e| LinkError::output("unmatched", e))?;
        self.rows += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<u64, LinkError> {
        self.writer.flush().map_err(|e| LinkError::output("unmatched", e))?;
        Ok(self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CarrierRecord, MatchType};
    use serde_json::json;

    fn insurance() -> InsuranceRecord {
        let fields: Vec<String> = ["MC998877", "12345", "BIPD", "PRIMARY", "PROGRESSIVE", "P-77"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        InsuranceRecord {
            index: 0,
            line: 1,
            mc_raw: "MC998877".into(),
            dot_raw: "12345".into(),
            fields,
            short: false,
        }
    }

    fn carrier() -> CarrierRecord {
        let fields = json!({
            "dot_number": "00012345",
            "legal_name": "ACME FREIGHT LLC",
            "carrier_mailing_city": "AKRON",
            "truck_units": 4,
            "docket1": "MC998877",
        });
        CarrierRecord {
            dot_number: Some("00012345".into()),
            dockets: [Some("MC998877".into()), None, None],
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    fn column(header: &[&str], row: &[String], name: &str) -> String {
        let i = header.iter().position(|h| *h == name).unwrap();
        row[i].clone()
    }

    #[test]
    fn header_shape_is_fixed() {
        let header = matched_header();
        assert_eq!(header.len(), 3 + 11 + 68);
        assert_eq!(&header[..3], &["match_type", "insurance_mc", "insurance_dot"]);
        assert_eq!(header[3], "ins_mc");
        assert_eq!(header[14], "dot_number");
        assert_eq!(header.last().copied(), Some("crgo_chem"));
        let mut unique = header.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), header.len(), "duplicate column names");
    }

    #[test]
    fn carrier_column_positions() {
        let header = matched_header();
        assert_eq!(carrier_column("dot_number"), Some(14));
        assert_eq!(header[carrier_column("phy_state").unwrap()], "phy_state");
        assert_eq!(carrier_column("ins_mc"), None);
    }

    #[test]
    fn projection_fills_every_column() {
        let ins = insurance();
        let decision = MatchDecision { match_type: MatchType::McDirect, carrier: carrier(), insurance: &ins };
        let header = matched_header();
        let row = project(&decision);
        assert_eq!(row.len(), header.len());
        assert_eq!(row[0], "MC_DIRECT");
        assert_eq!(column(&header, &row, "ins_company"), "PROGRESSIVE");
        assert_eq!(column(&header, &row, "ins_renewal_date"), "");
        assert_eq!(column(&header, &row, "legal_name"), "ACME FREIGHT LLC");
        assert_eq!(column(&header, &row, "mail_city"), "AKRON");
        assert_eq!(column(&header, &row, "truck_units"), "4");
        assert_eq!(column(&header, &row, "safety_rating"), "");
    }

    #[test]
    fn matched_writer_emits_header_and_rows() {
        let ins = insurance();
        let decision = MatchDecision { match_type: MatchType::DotDirect, carrier: carrier(), insurance: &ins };
        let mut buf = Vec::new();
        {
            let mut w = MatchedWriter::new(&mut buf, b',').unwrap();
            w.write(&decision).unwrap();
            assert_eq!(w.finish().unwrap(), 1);
        }
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("match_type,insurance_mc,insurance_dot,ins_mc"));
        assert!(lines.next().unwrap().starts_with("DOT_DIRECT,MC998877,12345,MC998877"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn unmatched_writer_joins_raw_fields() {
        let mut buf = Vec::new();
        {
            let mut w = UnmatchedWriter::new(&mut buf, b',').unwrap();
            w.write(&insurance()).unwrap();
            w.finish().unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "mc,dot,insurance_record\nMC998877,12345,MC998877|12345|BIPD|PRIMARY|PROGRESSIVE|P-77\n"
        );
    }
}
