//! Schemas of the Census Area Statistics tables understood by the stores.
//!
//! Field names are generated by crossing the category bands of each table,
//! the resulting order is fixed and matches the column order of the
//! source files.

mod bands;

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::OnceLock;

use census_store::{SchemaRef, TableSchema};

use crate::bands::{
    cross,
    MARITAL_AGE_BANDS,
    MARITAL_STATUSES,
    QUINARY_AGE_BANDS,
    RESIDENT_TYPES,
    SEXES,
};

const TOTALS: &[&str] = &["all_people", "males", "females"];

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
/// A census table with a known schema.
pub enum CasTable {
    /// CAS001: Age by sex and resident type.
    Cas001,
    /// CAS002: Age by sex and marital status.
    Cas002,
}

impl CasTable {
    /// Every known table.
    pub const ALL: [CasTable; 2] = [CasTable::Cas001, CasTable::Cas002];

    /// The table code, e.g. `CAS001`.
    pub fn code(&self) -> &'static str {
        match self {
            CasTable::Cas001 => "CAS001",
            CasTable::Cas002 => "CAS002",
        }
    }

    /// A short description of what the table counts.
    pub fn description(&self) -> &'static str {
        match self {
            CasTable::Cas001 => "Age by sex and resident type",
            CasTable::Cas002 => "Age by sex and marital status",
        }
    }

    /// Returns the shared schema of the table.
    pub fn schema(&self) -> SchemaRef {
        match self {
            CasTable::Cas001 => cas001(),
            CasTable::Cas002 => cas002(),
        }
    }
}

impl Display for CasTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown census table: {0:?}")]
/// The table code is not one of the known [CasTable]s.
pub struct UnknownTable(String);

impl FromStr for CasTable {
    type Err = UnknownTable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CasTable::ALL
            .into_iter()
            .find(|table| table.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownTable(s.to_string()))
    }
}

/// Returns the schema of the named table, ignoring case.
pub fn lookup(name: &str) -> Option<SchemaRef> {
    name.parse::<CasTable>().ok().map(|table| table.schema())
}

/// CAS001, age by sex and resident type.
///
/// Totals, then totals per resident type and sex, then five year
/// age bands for all people followed by each resident type and sex.
pub fn cas001() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            let mut fields: Vec<String> = TOTALS.iter().map(|s| s.to_string()).collect();
            fields.extend(cross(&[RESIDENT_TYPES]));
            fields.extend(cross(&[RESIDENT_TYPES, SEXES]));
            fields.extend(cross(&[&["all_people_age"], QUINARY_AGE_BANDS]));
            fields.extend(cross(&[RESIDENT_TYPES, SEXES, &["age"], QUINARY_AGE_BANDS]));

            TableSchema::new(CasTable::Cas001.code(), fields)
                .expect("CAS001 field names should be unique")
                .into_ref()
        })
        .clone()
}

/// CAS002, age by sex and marital status.
///
/// Totals, then totals per sex and marital status, then each sex and
/// marital status split by age band.
pub fn cas002() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            let mut fields: Vec<String> = TOTALS.iter().map(|s| s.to_string()).collect();
            fields.extend(cross(&[SEXES, MARITAL_STATUSES]));
            fields.extend(cross(&[SEXES, MARITAL_STATUSES, &["age"], MARITAL_AGE_BANDS]));

            TableSchema::new(CasTable::Cas002.code(), fields)
                .expect("CAS002 field names should be unique")
                .into_ref()
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use census_store::CensusRecord;

    use super::*;

    #[rstest::rstest]
    #[case(CasTable::Cas001, 3 + 2 + 4 + 19 + 76)]
    #[case(CasTable::Cas002, 3 + 12 + 204)]
    fn test_field_counts(#[case] table: CasTable, #[case] expected: usize) {
        let schema = table.schema();
        assert_eq!(schema.field_count(), expected);
        assert_eq!(schema.name(), table.code());
        assert_eq!(
            schema.record_length(),
            8 + 20 + 4 * expected as u64,
        );
    }

    #[test]
    fn test_schemas_are_shared() {
        assert!(Arc::ptr_eq(&cas001(), &cas001()));
        assert!(Arc::ptr_eq(&cas002(), &CasTable::Cas002.schema()));
    }

    #[test]
    fn test_cas001_field_order() {
        let schema = cas001();
        let fields: Vec<&str> = schema.fields().collect();
        assert_eq!(&fields[..5], &[
            "all_people",
            "males",
            "females",
            "household_residents",
            "communal_residents",
        ]);
        assert_eq!(fields[5], "household_residents_males");
        assert_eq!(fields[9], "all_people_age_0_to_4");
        assert_eq!(fields[28], "household_residents_males_age_0_to_4");
        assert_eq!(
            fields.last().copied(),
            Some("communal_residents_females_age_90_and_over"),
        );
    }

    #[test]
    fn test_cas002_field_order() {
        let schema = cas002();
        assert_eq!(schema.position("males_single"), Some(3));
        assert_eq!(schema.position("females_widowed"), Some(14));
        assert_eq!(schema.position("males_single_age_0_to_15"), Some(15));
        assert_eq!(
            schema.field_name(schema.field_count() - 1),
            Some("females_widowed_age_90_and_over"),
        );
    }

    #[rstest::rstest]
    #[case("CAS001", Some(CasTable::Cas001))]
    #[case("cas002", Some(CasTable::Cas002))]
    #[case(" Cas001 ", Some(CasTable::Cas001))]
    #[case("CAS003", None)]
    fn test_parse_table(#[case] name: &str, #[case] expected: Option<CasTable>) {
        assert_eq!(name.parse::<CasTable>().ok(), expected);
        assert_eq!(lookup(name).is_some(), expected.is_some());
    }

    #[test]
    fn test_parse_cas001_line() {
        let schema = cas001();
        let counters: Vec<String> = (0..schema.field_count()).map(|i| i.to_string()).collect();
        let line = format!("\"00AAFA0001\",{}", counters.join(","));

        let record = CensusRecord::parse_line(schema.clone(), 0, &line).unwrap();
        assert_eq!(record.get("all_people"), Some(0));
        assert_eq!(record.get("females"), Some(2));
        assert_eq!(
            record.get("communal_residents_females_age_90_and_over"),
            Some(schema.field_count() as i32 - 1),
        );
    }
}
