//! Response row parsing.
//!
//! The display response payload is not general XML, only a fixed one
//! level grammar: a `<data>` section holding `<r>` rows of
//! `<f maxlen="n">value</f>` fields (the generic panel query sends a
//! `<format>` header first, naming the fields of the rows that
//! follow). A deliberately small tokenizer handles exactly this
//! grammar - a general XML parser would accept inputs the server never
//! sends while mishandling its actual quirks, like unescaped `&` and
//! `<` inside field values.

use nom::bytes::complete::{tag, take_until};

use rmc_api_types::{AcsCap, AcsDrive, AcsLsm, StkPool, StkVolume};
use rmc_tools::nom::{parse_error, IResult};

use crate::{Error, Result};

/// One `<f maxlen="n">value</f>` field.
///
/// The cursor consumes the field content up through the closing
/// `</f>`, advancing by content length + 4. The value starts after the
/// first `>` - the `maxlen="n"` attribute never contains a literal
/// `>`, so embedded `>` characters in the content cannot confuse the
/// scan for the end of the opening tag.
pub(crate) fn parse_f(i: &str) -> IResult<&str, &str> {
    let (i, field) = take_until("</f>")(i)?;
    let (i, _) = tag("</f>")(i)?;

    let value = match field.find('>') {
        Some(pos) => &field[pos + 1..],
        None => return Err(parse_error(field, "missing '>' in field tag")),
    };

    Ok((i, value))
}

/// Field decoded as an integer. Non-numeric content decodes to 0.
pub(crate) fn parse_f_int(i: &str) -> IResult<&str, i32> {
    let (i, value) = parse_f(i)?;
    Ok((i, value.trim().parse().unwrap_or(0)))
}

/// Field decoded as a byte-ranged integer.
///
/// Values outside signed char bounds are substituted by the -3
/// sentinel with a logged error rather than truncated silently. This
/// is a wire compatibility contract, not an accident.
pub(crate) fn parse_f_byte(i: &str) -> IResult<&str, i8> {
    let (i, value) = parse_f(i)?;
    let decoded: i64 = value.trim().parse().unwrap_or(0);
    if decoded < i8::MIN as i64 || decoded > i8::MAX as i64 {
        log::error!("field value {} out of byte bounds, using sentinel", decoded);
        return Ok((i, -3));
    }
    Ok((i, decoded as i8))
}

/// Iterate the `<r>` rows of a `<data>` section, decoding each with
/// the given row parser. A response without a `<data>` section has no
/// rows. A row the parser cannot decode aborts the whole response.
pub(crate) fn parse_rows<'a, T, F>(xml: &'a str, mut row_parser: F) -> Result<Vec<T>>
where
    F: FnMut(&'a str) -> IResult<&'a str, T>,
{
    let mut rest = match xml.find("<data>") {
        Some(pos) => &xml[pos + 6..],
        None => return Ok(Vec::new()),
    };

    let mut rows = Vec::new();

    while let Some(pos) = rest.find("<r>") {
        let i = &rest[pos + 3..];

        let (i, row) = row_parser(i).map_err(|err| {
            Error::ProtocolError(format!("malformed response row - {}", err))
        })?;
        rows.push(row);

        // advance past the 4 byte `</r>` closer
        rest = i.get(4..).unwrap_or("");
    }

    Ok(rows)
}

fn volume_row(i: &str) -> IResult<&str, StkVolume> {
    let (i, vsn) = parse_f(i)?;
    let (i, acs) = parse_f_int(i)?;
    let (i, lsm) = parse_f_int(i)?;
    let (i, panel) = parse_f_int(i)?;
    let (i, row) = parse_f_int(i)?;
    let (i, column) = parse_f_int(i)?;
    let (i, pool_id) = parse_f_int(i)?;
    let (i, status) = parse_f(i)?;
    let (i, media_type) = parse_f(i)?;
    let (i, volume_type) = parse_f(i)?;

    Ok((
        i,
        StkVolume {
            vsn: vsn.trim().to_string(),
            acs,
            lsm,
            panel,
            row,
            column,
            pool_id,
            status: status.trim().to_string(),
            media_type: media_type.trim().to_string(),
            volume_type: volume_type.trim().to_string(),
        },
    ))
}

/// Decode a `display volume` data payload.
///
/// Row format: vol_id, acs, lsm, panel, row, column, pool, status,
/// media, type.
pub fn parse_volume_response(xml: &str) -> Result<Vec<StkVolume>> {
    parse_rows(xml, volume_row)
}

fn drive_row(i: &str) -> IResult<&str, AcsDrive> {
    let (i, acs) = parse_f(i)?;
    let (i, lsm) = parse_f(i)?;
    let (i, panel) = parse_f(i)?;
    let (i, drive) = parse_f(i)?;
    let (i, status) = parse_f(i)?;
    let (i, state) = parse_f(i)?;
    let (i, volume) = parse_f(i)?;
    let (i, drive_type) = parse_f(i)?;
    let (i, lock) = parse_f_int(i)?;
    let (i, serial_num) = parse_f(i)?;
    let (i, condition) = parse_f(i)?;

    Ok((
        i,
        AcsDrive {
            acs: acs.trim().to_string(),
            lsm: lsm.trim().to_string(),
            panel: panel.trim().to_string(),
            drive: drive.trim().to_string(),
            status: status.trim().to_string(),
            state: state.trim().to_string(),
            volume: volume.trim().to_string(),
            drive_type: drive_type.trim().to_string(),
            lock,
            serial_num: serial_num.trim().to_string(),
            condition: condition.trim().to_string(),
        },
    ))
}

/// Decode a `display drive` data payload.
pub fn parse_drive_response(xml: &str) -> Result<Vec<AcsDrive>> {
    parse_rows(xml, drive_row)
}

fn lsm_row(i: &str) -> IResult<&str, AcsLsm> {
    let (i, acs) = parse_f(i)?;
    let (i, lsm) = parse_f(i)?;
    let (i, serial_num) = parse_f(i)?;
    let (i, status) = parse_f(i)?;
    let (i, state) = parse_f(i)?;
    let (i, free_cells) = parse_f_int(i)?;

    Ok((
        i,
        AcsLsm {
            acs: acs.trim().to_string(),
            lsm: lsm.trim().to_string(),
            serial_num: serial_num.trim().to_string(),
            status: status.trim().to_string(),
            state: state.trim().to_string(),
            free_cells,
        },
    ))
}

/// Decode a `display lsm` data payload.
pub fn parse_lsm_response(xml: &str) -> Result<Vec<AcsLsm>> {
    parse_rows(xml, lsm_row)
}

fn cap_row(i: &str) -> IResult<&str, AcsCap> {
    let (i, acs) = parse_f_int(i)?;
    let (i, lsm) = parse_f_int(i)?;
    let (i, cap) = parse_f_int(i)?;

    Ok((i, AcsCap { acs, lsm, cap }))
}

/// Decode a `display cap` data payload.
pub fn parse_cap_response(xml: &str) -> Result<Vec<AcsCap>> {
    parse_rows(xml, cap_row)
}

fn pool_row(i: &str) -> IResult<&str, StkPool> {
    let (i, pool_id) = parse_f_int(i)?;
    let (i, low_water_mark) = parse_f_int(i)?;
    let (i, high_water_mark) = parse_f_int(i)?;
    let (i, overflow) = parse_f(i)?;

    Ok((
        i,
        StkPool {
            pool_id,
            low_water_mark,
            high_water_mark,
            overflow: overflow.trim().to_string(),
        },
    ))
}

/// Decode a `display pool` data payload.
pub fn parse_pool_response(xml: &str) -> Result<Vec<StkPool>> {
    parse_rows(xml, pool_row)
}

/// Extract the field names of a `<format>` header.
///
/// ```text
/// <format><fields>
///     <field name="fieldname" format="fmttype" maxlen="nn"/>
/// </fields></format>
/// ```
pub fn parse_format_fields(xml: &str) -> Result<Vec<String>> {
    let mut rest = match xml.find("<format>") {
        Some(pos) => &xml[pos..],
        None => {
            return Err(Error::ProtocolError(
                "response carries no format section".to_string(),
            ))
        }
    };

    let mut fields = Vec::new();

    while let Some(pos) = rest.find("<field ") {
        rest = &rest[pos + 7..];

        let end = rest.find('>').ok_or_else(|| {
            Error::ProtocolError("unterminated field element".to_string())
        })?;
        let attrs = &rest[..end];

        for attr in attrs.split_whitespace() {
            if let Some((key, value)) = attr.split_once('=') {
                if key.eq_ignore_ascii_case("name") {
                    fields.push(value.trim_matches(|c| c == '"' || c == '/').to_string());
                }
            }
        }

        rest = &rest[end..];
    }

    if fields.is_empty() {
        return Err(Error::ProtocolError(
            "format section names no fields".to_string(),
        ));
    }

    Ok(fields)
}

/// Decode a generic data payload using a previously captured format
/// field list, producing one key/value row per `<r>` element.
pub fn parse_kv_rows(xml: &str, fields: &[String]) -> Result<Vec<Vec<(String, String)>>> {
    parse_rows(xml, |mut i| {
        let mut row = Vec::new();
        for field in fields {
            let (rest, value) = parse_f(i)?;
            row.push((field.clone(), value.trim().to_string()));
            i = rest;
        }
        Ok((i, row))
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn wrap_rows(rows: &[&[&str]]) -> String {
        let mut xml = String::from("<response><data>");
        for row in rows {
            xml.push_str("<r>");
            for value in *row {
                xml.push_str(&format!("<f maxlen=\"{}\">{}</f>", value.len(), value));
            }
            xml.push_str("</r>");
        }
        xml.push_str("</data></response>");
        xml
    }

    #[test]
    fn cursor_arithmetic_extracts_every_row() -> Result<()> {
        let rows: Vec<Vec<&str>> = (0..10)
            .map(|_| vec!["0", "1", "2"])
            .enumerate()
            .map(|(n, mut row)| {
                row[0] = if n % 2 == 0 { "7" } else { "13" };
                row
            })
            .collect();
        let row_refs: Vec<&[&str]> = rows.iter().map(|r| &r[..]).collect();
        let xml = wrap_rows(&row_refs);

        let caps = parse_cap_response(&xml)?;
        assert_eq!(caps.len(), 10);
        assert_eq!(caps[0].acs, 7);
        assert_eq!(caps[1].acs, 13);
        assert_eq!(caps[9].lsm, 1);
        Ok(())
    }

    #[test]
    fn embedded_gt_in_value_tolerated() -> Result<()> {
        // unescaped '>' inside the content must not derail the cursor
        let xml = "<data><r>\
            <f maxlen=\"6\">VOL>01</f>\
            <f maxlen=\"3\">0</f><f maxlen=\"3\">1</f><f maxlen=\"5\">2</f>\
            <f maxlen=\"5\">3</f><f maxlen=\"5\">4</f><f maxlen=\"5\">5</f>\
            <f maxlen=\"9\">home</f><f maxlen=\"9\">LTO-400G</f>\
            <f maxlen=\"9\">data</f>\
            </r></data>";

        let vols = parse_volume_response(xml)?;
        assert_eq!(vols.len(), 1);
        assert_eq!(vols[0].vsn, "VOL>01");
        assert_eq!(vols[0].media_type, "LTO-400G");
        Ok(())
    }

    #[test]
    fn no_data_section_yields_no_rows() -> Result<()> {
        assert!(parse_volume_response("<response></response>")?.is_empty());
        Ok(())
    }

    #[test]
    fn volume_rows_decode() -> Result<()> {
        let xml = wrap_rows(&[
            &["VOL001", "0", "1", "2", "3", "4", "5", "home", "LTO-400G", "data"],
            &["VOL002", "0", "1", "2", "4", "4", "5", "home", "LTO-400G", "data"],
        ]);

        let vols = parse_volume_response(&xml)?;
        assert_eq!(vols.len(), 2);
        assert_eq!(vols[0].vsn, "VOL001");
        assert_eq!(vols[0].pool_id, 5);
        assert_eq!(vols[1].row, 4);
        Ok(())
    }

    #[test]
    fn drive_rows_decode() -> Result<()> {
        let xml = wrap_rows(&[&[
            "0", "1", "2", "3", "online", "available", "VOL001", "T10000C", "0", "DRV123", "operative",
        ]]);

        let drives = parse_drive_response(&xml)?;
        assert_eq!(drives.len(), 1);
        assert_eq!(drives[0].serial_num, "DRV123");
        assert_eq!(drives[0].volume, "VOL001");
        Ok(())
    }

    #[test]
    fn byte_bounds_sentinel() {
        let xml = "<f maxlen=\"5\">300</f><f maxlen=\"5\">-7</f>";
        let (rest, value) = parse_f_byte(xml).unwrap();
        // out of signed char range substitutes the sentinel
        assert_eq!(value, -3);
        let (_, value) = parse_f_byte(rest).unwrap();
        assert_eq!(value, -7);
    }

    #[test]
    fn format_then_data() -> Result<()> {
        let format_xml = "<response><format><fields>\
            <field name=\"acs\" format=\"int\" maxlen=\"3\"/>\
            <field name=\"panel\" format=\"int\" maxlen=\"5\"/>\
            </fields></format></response>";
        let fields = parse_format_fields(format_xml)?;
        assert_eq!(fields, vec!["acs", "panel"]);

        let data_xml = wrap_rows(&[&["0", "11"], &["1", "12"]]);
        let rows = parse_kv_rows(&data_xml, &fields)?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![
            ("acs".to_string(), "0".to_string()),
            ("panel".to_string(), "11".to_string()),
        ]);
        assert_eq!(rows[1][1].1, "12");
        Ok(())
    }

    #[test]
    fn truncated_row_aborts_response() {
        // second row is cut off in the middle of a field
        let xml = "<data><r><f maxlen=\"3\">0</f><f maxlen=\"3\">1</f>\
                   <f maxlen=\"3\">2</f></r><r><f maxlen=\"3\">3</f></data>";
        assert!(matches!(
            parse_cap_response(xml),
            Err(Error::ProtocolError(_))
        ));
    }
}
