use serde::{Deserialize, Serialize};

/// Column headers of the tabular export, in field order.
pub const COLUMNS: [&str; 14] = [
    "Cadastral number",
    "Address",
    "Area (sq. m)",
    "Land category",
    "Permitted use",
    "Status",
    "Cadastral value",
    "Assessment date",
    "Registration date",
    "Ownership type",
    "Right type",
    "Coordinates",
    "Data source",
    "Checked at",
];

/// One registered land parcel as found in the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParcelRecord {
    pub cadastral_number: String,
    pub address: String,
    pub area: String,
    pub land_category: String,
    pub permitted_use: String,
    pub status: String,
    pub assessed_value: String,
    pub assessment_date: String,
    pub registration_date: String,
    pub ownership_type: String,
    pub right_type: String,
    pub coordinates: String,
    pub data_source: String,
    pub checked_at: String,
}

impl ParcelRecord {
    /// Field values in [`COLUMNS`] order.
    pub fn row(&self) -> [&str; 14] {
        [
            &self.cadastral_number,
            &self.address,
            &self.area,
            &self.land_category,
            &self.permitted_use,
            &self.status,
            &self.assessed_value,
            &self.assessment_date,
            &self.registration_date,
            &self.ownership_type,
            &self.right_type,
            &self.coordinates,
            &self.data_source,
            &self.checked_at,
        ]
    }
}
