//! VSN pools, maps and query descriptors.

use serde::{Deserialize, Serialize};

use crate::CatalogEntry;

/// A named set of VSN expressions the archiver may pick media from.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VsnPool {
    pub name: String,
    /// Two letter media type code
    pub media_type: String,
    /// Regular expressions naming the member volumes
    pub vsn_expressions: Vec<String>,
}

/// A VSN map: expressions plus referenced pools for one archive set copy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VsnMap {
    /// Archive set copy name
    pub name: String,
    pub media_type: String,
    pub vsn_expressions: Vec<String>,
    /// Pools whose members are merged into this map
    pub pool_names: Vec<String>,
}

/// Resolved view of a pool or map against the live catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VsnPoolProperty {
    pub name: String,
    pub media_type: String,
    /// Number of member volumes (counted before pagination)
    pub number_of_vsn: u64,
    /// Aggregate capacity in bytes over all members
    pub capacity: u64,
    /// Aggregate free space in bytes over unreserved members
    pub free_space: u64,
    /// The requested (sorted, paginated) window of member entries
    pub entries: Vec<CatalogEntry>,
}

/// Volume list filter - exactly one filter is active per query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VsnFilter {
    /// No filtering
    None,
    /// Keep volumes assigned to this scratch pool
    ScratchPool(i32),
    /// Keep volumes inside the range generated from start to end VSN
    VsnRange { start_vsn: String, end_vsn: String },
    /// Keep volumes whose VSN matches this regular expression
    VsnExpression(String),
}
