//! Volume list filtering.
//!
//! A query against the library manager returns every volume of a media
//! type; the caller narrows the list by scratch pool, VSN range or VSN
//! expression. Exactly one filter is active per query.

use rmc_api_types::{StkVolume, VsnFilter};

use crate::mediatype::stk_media_to_sam_media;
use crate::{Error, Result};

use super::{AcsClient, AcsTransport, SsiDaemon};

/// Parse a filter option string as passed by management clients, a
/// space or comma separated `name=value` list, e.g.
/// `filter_type=2 start_vsn=AA001 end_vsn=AA005`. The numeric
/// `filter_type` selects which filter is active; its parameters must
/// be present.
pub fn parse_filter_options(options: &str) -> Result<VsnFilter> {
    let mut filter_type = 0;
    let mut scratch_pool_id = None;
    let mut start_vsn = None;
    let mut end_vsn = None;
    let mut vsn_expression = None;

    for token in options.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let (name, value) = token.split_once('=').ok_or_else(|| {
            Error::InvalidParameter(format!("expected name=value, got '{}'", token))
        })?;

        match name {
            "filter_type" => {
                filter_type = value.parse().map_err(|_| {
                    Error::InvalidParameter(format!("bad filter_type '{}'", value))
                })?
            }
            "scratch_pool_id" => {
                scratch_pool_id = Some(value.parse().map_err(|_| {
                    Error::InvalidParameter(format!("bad scratch_pool_id '{}'", value))
                })?)
            }
            "start_vsn" => start_vsn = Some(value.to_string()),
            "end_vsn" => end_vsn = Some(value.to_string()),
            "vsn_expression" => vsn_expression = Some(value.to_string()),
            // equipment type and physical location bounds are parsed
            // by the caller, not part of the VSN filter itself
            _ => (),
        }
    }

    let missing = |what: &str| Error::InvalidParameter(format!("filter requires {}", what));

    match filter_type {
        0 => Ok(VsnFilter::None),
        1 => Ok(VsnFilter::ScratchPool(
            scratch_pool_id.ok_or_else(|| missing("scratch_pool_id"))?,
        )),
        2 => Ok(VsnFilter::VsnRange {
            start_vsn: start_vsn.ok_or_else(|| missing("start_vsn"))?,
            end_vsn: end_vsn.ok_or_else(|| missing("end_vsn"))?,
        }),
        3 => Ok(VsnFilter::VsnExpression(
            vsn_expression.ok_or_else(|| missing("vsn_expression"))?,
        )),
        other => Err(Error::InvalidParameter(format!(
            "unknown filter_type {}",
            other
        ))),
    }
}

/// Extract the numeric suffix of a VSN: the digits from the first
/// digit following the last non-digit through the end of the string.
/// Returns the parsed number and the width of the digit run (for zero
/// padded regeneration), e.g. `abc099` -> (99, 3), `a9b7c9` -> (9, 1).
fn vsn_numeric_suffix(vsn: &str) -> Result<(u64, usize)> {
    let digits = vsn
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .count();

    if digits == 0 {
        return Err(Error::InvalidParameter(format!(
            "VSN '{}' has no numeric suffix",
            vsn
        )));
    }

    let run = &vsn[vsn.len() - digits..];
    let value = run.parse().map_err(|_| {
        Error::InvalidParameter(format!("numeric suffix of '{}' out of range", vsn))
    })?;

    Ok((value, digits))
}

/// Generate every VSN of the range [start_vsn, end_vsn] by
/// incrementing the numeric suffix of the start VSN while preserving
/// its character width.
fn generate_vsn_range(start_vsn: &str, end_vsn: &str) -> Result<Vec<String>> {
    let (start_num, width) = vsn_numeric_suffix(start_vsn)?;
    let (end_num, _) = vsn_numeric_suffix(end_vsn)?;

    let prefix = &start_vsn[..start_vsn.len() - width];

    let mut range = Vec::new();
    let mut num = start_num;
    while num <= end_num {
        range.push(format!("{}{:0width$}", prefix, num, width = width));
        num += 1;
    }

    Ok(range)
}

/// Apply a [`VsnFilter`] to a volume list.
///
/// Matching volumes are moved (not copied) into the result; the input
/// list is consumed.
pub fn filter_volume_list(
    volumes: Vec<StkVolume>,
    filter: &VsnFilter,
) -> Result<Vec<StkVolume>> {
    match filter {
        VsnFilter::None => Ok(volumes),
        VsnFilter::ScratchPool(pool_id) => Ok(volumes
            .into_iter()
            .filter(|vol| vol.pool_id == *pool_id)
            .collect()),
        VsnFilter::VsnRange { start_vsn, end_vsn } => {
            let range = generate_vsn_range(start_vsn, end_vsn)?;
            Ok(volumes
                .into_iter()
                .filter(|vol| range.iter().any(|vsn| *vsn == vol.vsn))
                .collect())
        }
        VsnFilter::VsnExpression(expression) => {
            let re = regex::Regex::new(expression).map_err(|err| {
                Error::InvalidParameter(format!(
                    "bad VSN expression '{}' - {}",
                    expression, err
                ))
            })?;
            Ok(volumes
                .into_iter()
                .filter(|vol| re.is_match(&vol.vsn))
                .collect())
        }
    }
}

/// All volumes whose StorageTek media type maps to the given SAM media
/// type.
///
/// A volume with an unmappable media type is a hard error - it cannot
/// be accounted for.
pub fn volume_list_by_media<T: AcsTransport>(
    client: &mut AcsClient<T>,
    sam_media: &str,
) -> Result<Vec<StkVolume>> {
    let volumes = client.volumes()?;

    let mut matching = Vec::new();
    for vol in volumes {
        let (mapped, _capacity) = stk_media_to_sam_media(&vol.media_type)?;
        if mapped == sam_media {
            matching.push(vol);
        }
    }

    Ok(matching)
}

/// Query and filter the volume list of an ACSLS library: make sure the
/// SSI runs, fetch all volumes of the equipment type, apply the
/// filter.
pub fn filtered_volume_list<T: AcsTransport>(
    daemon: &mut SsiDaemon,
    client: &mut AcsClient<T>,
    sam_media: &str,
    filter: &VsnFilter,
) -> Result<Vec<StkVolume>> {
    daemon.start()?;

    let volumes = volume_list_by_media(client, sam_media)?;
    filter_volume_list(volumes, filter)
}
