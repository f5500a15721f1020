//! Roster CSV parsing
//!
//! The roster arrives as CSV text with required `bibNumber` and `racerName`
//! columns plus optional `gender` and `team`. Structural problems with a
//! single row become row-level errors; only a missing required header
//! rejects the upload outright.

use serde::Deserialize;

use crate::error::{Error, Result};

/// One raw roster row as uploaded. Field-level validation happens during
/// the merge, so absent values survive parsing as `None`.
#[derive(Debug, Clone, Deserialize)]
pub struct RosterRow {
    #[serde(rename = "bibNumber", default)]
    pub bib_number: Option<String>,
    #[serde(rename = "racerName", default)]
    pub racer_name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
}

/// Parsed upload: rows tagged with their 1-based file row number (the
/// header is row 1), plus errors for rows the parser could not read.
#[derive(Debug, Default)]
pub struct RosterBatch {
    pub rows: Vec<(usize, RosterRow)>,
    pub errors: Vec<String>,
}

/// Parse CSV text into a roster batch.
///
/// Fails only when a required header is missing; malformed data rows are
/// collected as row errors and do not abort the batch.
pub fn parse_roster_csv(data: &str) -> Result<RosterBatch> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| Error::BadRequest(format!("unreadable CSV header: {}", e)))?
        .clone();

    for required in ["bibNumber", "racerName"] {
        if !headers.iter().any(|h| h == required) {
            return Err(Error::BadRequest(
                "CSV must contain headers: bibNumber, racerName".to_string(),
            ));
        }
    }

    let mut batch = RosterBatch::default();
    for (i, record) in reader.deserialize::<RosterRow>().enumerate() {
        let row_num = i + 2;
        match record {
            Ok(row) => batch.rows.push((row_num, row)),
            Err(e) => batch.errors.push(format!("Row {}: {}", row_num, e)),
        }
    }

    Ok(batch)
}

/// Normalize an operator-entered gender value: common spellings collapse
/// to `M`/`W`, anything unrecognized passes through uppercased.
pub fn normalize_gender(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    match upper.as_str() {
        "M" | "MALE" | "MAN" => "M".to_string(),
        "W" | "F" | "FEMALE" | "WOMAN" => "W".to_string(),
        _ => upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_csv() {
        let csv = "bibNumber,racerName,gender,team\n\
                   101,Ada Lovelace,F,Analytical\n\
                   102,Alan Turing,male,\n";
        let batch = parse_roster_csv(csv).unwrap();
        assert_eq!(batch.rows.len(), 2);
        assert!(batch.errors.is_empty());

        let (row_num, row) = &batch.rows[0];
        assert_eq!(*row_num, 2);
        assert_eq!(row.bib_number.as_deref(), Some("101"));
        assert_eq!(row.racer_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(row.gender.as_deref(), Some("F"));
    }

    #[test]
    fn test_missing_required_header_rejected() {
        let csv = "bibNumber,team\n101,Analytical\n";
        assert!(parse_roster_csv(csv).is_err());
    }

    #[test]
    fn test_missing_optional_columns_are_none() {
        let csv = "bibNumber,racerName\n101,Ada\n";
        let batch = parse_roster_csv(csv).unwrap();
        let (_, row) = &batch.rows[0];
        assert_eq!(row.gender, None);
        assert_eq!(row.team, None);
    }

    #[test]
    fn test_normalize_gender() {
        assert_eq!(normalize_gender("male"), "M");
        assert_eq!(normalize_gender("MAN"), "M");
        assert_eq!(normalize_gender("f"), "W");
        assert_eq!(normalize_gender("Woman"), "W");
        assert_eq!(normalize_gender("nb"), "NB");
        assert_eq!(normalize_gender(" m "), "M");
    }
}
