//! Decoding of registry search payloads into [`ParcelRecord`]s.

use chrono::Local;
use serde::Deserialize;
use serde_json::Value;

use crate::record::ParcelRecord;
use crate::{Error, Result};

/// Registry category of registered land parcels.
pub const PARCEL_CATEGORY: &str = "Земельные участки ЕГРН";
const DATA_SOURCE: &str = "NSPD RF";
const NO_ADDRESS: &str = "Not specified";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Option<SearchData>,
}

/// Features stay untyped until one is picked, so an unrelated feature of an
/// odd shape can't spoil the payload.
#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    features: Option<Vec<Value>>,
}

/// Attributes of a parcel feature. The registry mixes numbers and strings, so
/// every value is kept loose and rendered as text.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Options {
    cad_num: Option<Value>,
    readable_address: Option<Value>,
    area: Option<Value>,
    specified_area: Option<Value>,
    land_record_category_type: Option<Value>,
    permitted_use_established_by_document: Option<Value>,
    status: Option<Value>,
    cost_value: Option<Value>,
    cost_determination_date: Option<Value>,
    land_record_reg_date: Option<Value>,
    ownership_type: Option<Value>,
    right_type: Option<Value>,
}

/// Extracts the first registered land parcel from a search payload.
///
/// Returns `Ok(None)` when the payload holds no parcel feature and an
/// [`Error::Payload`] when its shape can't be decoded at all. Nothing is
/// produced for a payload that fails to decode.
pub fn extract_parcel(payload: Value, cad_num: &str) -> Result<Option<ParcelRecord>> {
    let response: SearchResponse =
        serde_json::from_value(payload).map_err(|source| Error::Payload {
            cad_num: cad_num.to_string(),
            source,
        })?;

    let features = response
        .data
        .and_then(|d| d.features)
        .unwrap_or_default();

    let Some(feature) = features.iter().find(|f| is_parcel(f)) else {
        return Ok(None);
    };

    let options = match &feature["properties"]["options"] {
        Value::Null => Options::default(),
        options => Options::deserialize(options).map_err(|source| Error::Payload {
            cad_num: cad_num.to_string(),
            source,
        })?,
    };
    let coordinates = text(Some(&feature["geometry"]["coordinates"]));

    Ok(Some(build_record(options, coordinates, cad_num)))
}

fn is_parcel(feature: &Value) -> bool {
    feature["properties"]["categoryName"].as_str() == Some(PARCEL_CATEGORY)
}

fn build_record(opts: Options, coordinates: String, cad_num: &str) -> ParcelRecord {
    let area = if is_blank(opts.area.as_ref()) {
        text(opts.specified_area.as_ref())
    } else {
        text(opts.area.as_ref())
    };

    ParcelRecord {
        cadastral_number: text_or(opts.cad_num.as_ref(), cad_num),
        address: text_or(opts.readable_address.as_ref(), NO_ADDRESS),
        area,
        land_category: text(opts.land_record_category_type.as_ref()),
        permitted_use: text(opts.permitted_use_established_by_document.as_ref()),
        status: text(opts.status.as_ref()),
        assessed_value: text(opts.cost_value.as_ref()),
        assessment_date: text(opts.cost_determination_date.as_ref()),
        registration_date: text(opts.land_record_reg_date.as_ref()),
        ownership_type: text(opts.ownership_type.as_ref()),
        right_type: text(opts.right_type.as_ref()),
        coordinates,
        data_source: DATA_SOURCE.to_string(),
        checked_at: Local::now().format("%Y-%m-%d %H:%M").to_string(),
    }
}

#[inline]
fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[inline]
fn text_or(value: Option<&Value>, default: &str) -> String {
    if is_blank(value) {
        default.to_string()
    } else {
        text(value)
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::Bool(b)) => !b,
        Some(_) => false,
    }
}
