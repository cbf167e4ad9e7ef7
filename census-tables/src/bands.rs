//! The category bands census tables cross to produce their counters.

/// Five year age bands covering the whole population.
pub(crate) const QUINARY_AGE_BANDS: &[&str] = &[
    "0_to_4",
    "5_to_9",
    "10_to_14",
    "15_to_19",
    "20_to_24",
    "25_to_29",
    "30_to_34",
    "35_to_39",
    "40_to_44",
    "45_to_49",
    "50_to_54",
    "55_to_59",
    "60_to_64",
    "65_to_69",
    "70_to_74",
    "75_to_79",
    "80_to_84",
    "85_to_89",
    "90_and_over",
];

/// Age bands used by marital status tables, everyone under 16 is single.
pub(crate) const MARITAL_AGE_BANDS: &[&str] = &[
    "0_to_15",
    "16_to_19",
    "20_to_24",
    "25_to_29",
    "30_to_34",
    "35_to_39",
    "40_to_44",
    "45_to_49",
    "50_to_54",
    "55_to_59",
    "60_to_64",
    "65_to_69",
    "70_to_74",
    "75_to_79",
    "80_to_84",
    "85_to_89",
    "90_and_over",
];

pub(crate) const SEXES: &[&str] = &["males", "females"];

pub(crate) const RESIDENT_TYPES: &[&str] = &["household_residents", "communal_residents"];

pub(crate) const MARITAL_STATUSES: &[&str] = &[
    "single",
    "married",
    "remarried",
    "separated",
    "divorced",
    "widowed",
];

/// Joins every combination of the given bands with `_`, the last band
/// varying fastest.
pub(crate) fn cross(bands: &[&[&str]]) -> Vec<String> {
    bands.iter().fold(vec![String::new()], |names, band| {
        names
            .iter()
            .flat_map(|name| {
                band.iter().map(move |value| {
                    if name.is_empty() {
                        value.to_string()
                    } else {
                        format!("{name}_{value}")
                    }
                })
            })
            .collect()
    })
}
