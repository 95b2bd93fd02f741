//! Range Table Parser (IP2Location CSV)
//!
//! Parses IP2Location LITE DB1 style files:
//!
//! ```text
//! "16777216","16777471","AU","Australia"
//! "16777472","16778239","-","-"
//! ```
//!
//! Only the first three columns are read. Rows whose country is `-`
//! (unassigned space) and rows with unparseable numbers are skipped.

use crate::range::{GeoRange, RangeTable};
use std::io::{BufRead, BufReader, Read};
use std::str::FromStr;
use tracing::debug;

/// Field separator between quoted columns
const FIELD_SEPARATOR: &str = "\",\"";

/// Country code marking unassigned ranges
const UNASSIGNED: &str = "-";

/// Parse a range table from a reader.
///
/// Keys are `u32` for IPv4 files and `u128` for IPv6 files, both written
/// as decimal strings.
pub fn parse_table<K, R>(reader: R) -> std::io::Result<RangeTable<K>>
where
    K: FromStr + Ord,
    R: Read,
{
    let mut ranges = Vec::new();
    let mut skipped = 0usize;

    for line in BufReader::new(reader).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(&line) {
            Some(range) => ranges.push(range),
            None => skipped += 1,
        }
    }

    debug!("Parsed {} ranges ({} rows skipped)", ranges.len(), skipped);
    Ok(RangeTable::from_sorted(ranges))
}

/// Parse one `"start","end","CC"...` row
pub fn parse_row<K: FromStr>(line: &str) -> Option<GeoRange<K>> {
    let mut fields = line.trim().split(FIELD_SEPARATOR);
    let start = fields.next()?.trim_matches('"');
    let end = fields.next()?.trim_matches('"');
    let code = fields.next()?.trim_matches('"');

    if code == UNASSIGNED || code.is_empty() {
        return None;
    }

    Some(GeoRange {
        start: start.parse().ok()?,
        end: end.parse().ok()?,
        country_code: code.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPV4_SAMPLE: &str = r#""0","16777215","-","-"
"16777216","16777471","AU","Australia"
"16777472","16778239","CN","China"
"bogus","16778240","US","United States"
"16778240","16779263","AU","Australia"
"#;

    const IPV6_SAMPLE: &str = r#""0","281470681743359","-","-"
"42540766411282592856903984951653826560","42540766411282592875350729025363378175","US","United States of America"
"58569107296622255421594597096899477504","58569107375850417935858934690443427839","NG","Nigeria"
"#;

    #[test]
    fn test_parse_ipv4_table() {
        let table: RangeTable<u32> = parse_table(IPV4_SAMPLE.as_bytes()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup(&16_777_300), Some("AU"));
        assert_eq!(table.lookup(&16_777_472), Some("CN"));
        assert_eq!(table.lookup(&100), None);
    }

    #[test]
    fn test_parse_ipv6_table() {
        let table: RangeTable<u128> = parse_table(IPV6_SAMPLE.as_bytes()).unwrap();

        // 2001:db8:: lies inside the first assigned range
        let doc_prefix = 0x2001_0db8_0000_0000_0000_0000_0000_0000u128;
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup(&doc_prefix), Some("US"));
    }

    #[test]
    fn test_parse_row_variants() {
        let row: GeoRange<u32> = parse_row(r#""1","2","JP","Japan""#).unwrap();
        assert_eq!(row, GeoRange { start: 1, end: 2, country_code: "JP".into() });

        // Three-column files carry the closing quote on the code
        let row: GeoRange<u32> = parse_row(r#""1","2","JP""#).unwrap();
        assert_eq!(row.country_code, "JP");

        assert!(parse_row::<u32>(r#""1","2","-","-""#).is_none());
        assert!(parse_row::<u32>(r#""1","2""#).is_none());
        assert!(parse_row::<u32>(r#""1","99999999999","US""#).is_none());
        assert!(parse_row::<u128>(r#""-5","2","US""#).is_none());
    }

    #[test]
    fn test_crlf_lines() {
        let table: RangeTable<u32> = parse_table("\"1\",\"5\",\"FR\",\"France\"\r\n\r\n".as_bytes()).unwrap();

        assert_eq!(table.lookup(&3), Some("FR"));
    }
}
