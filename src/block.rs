//! Cadastral block identifiers and the parcel number range scanned inside one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, MAX_PARCEL_NUM, MIN_PARCEL_NUM};

/// A cadastral block such as `77:01:0001001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockId(String);

impl BlockId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The block id with every non-alphanumeric character replaced by `_`, usable in file names.
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }

    /// Fully qualified parcel identifier `<block>:<num>`.
    pub fn parcel_id(&self, num: u32) -> String {
        format!("{}:{num}", self.0)
    }
}

impl FromStr for BlockId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parts = s.split(':').collect::<Vec<_>>();
        let valid = parts.len() == 3
            && parts
                .iter()
                .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
        if !valid {
            return Err(Error::InvalidBlockId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for BlockId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BlockId> for String {
    fn from(value: BlockId) -> Self {
        value.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parses a range bound and checks it lies in `min..=max`.
pub fn parse_bound(value: &str, min: u32, max: u32) -> Result<u32> {
    let invalid = || Error::InvalidNumber {
        value: value.trim().to_string(),
        min,
        max,
    };
    let num = value.trim().parse::<u32>().map_err(|_| invalid())?;
    if !(min..=max).contains(&num) {
        return Err(invalid());
    }
    Ok(num)
}

/// The parcel numbers of one block a scan walks through. Fixed once the scan begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRange {
    pub block: BlockId,
    pub start: u32,
    pub end: u32,
}

impl ScanRange {
    pub fn new(block: BlockId, start: u32, end: u32) -> Result<Self> {
        let in_bounds = |n: u32| (MIN_PARCEL_NUM..=MAX_PARCEL_NUM).contains(&n);
        if !in_bounds(start) || !in_bounds(end) || end < start {
            return Err(Error::InvalidRange { start, end });
        }
        Ok(Self { block, start, end })
    }

    /// Number of parcel numbers in the range.
    pub fn size(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn parcel_id(&self, num: u32) -> String {
        self.block.parcel_id(num)
    }
}
