//! `.idx` inventory parsing.
//!
//! NOAA publishes a wgrib2-style inventory next to every GRIB2 file:
//!
//! ```text
//! 1:0:d=2024011506:REFC:entire atmosphere:7 hour fcst:
//! 2:412044:d=2024011506:RETOP:cloud top:7 hour fcst:
//! ...
//! 84:41512347:d=2024011506:APCP:surface:0-7 hour acc fcst:
//! ```
//!
//! Message `n` spans from its offset up to one byte before the offset of the
//! next message; the last message is open-ended. Fields packed into one
//! message as submessages are listed as `n.1`, `n.2`, ... and share the
//! message's offset and byte range.

use nwp_common::FieldSelector;

use crate::error::SourceError;

/// One inventory line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEntry {
    pub number: u32,
    /// 1-based submessage number for `n.m` lines
    pub submessage: Option<u32>,
    pub offset: u64,
    /// Reference time as written (`d=YYYYMMDDHH` without the prefix)
    pub reference: String,
    pub parameter: String,
    pub level: String,
    /// Forecast description (`7 hour fcst`, `0-7 hour acc fcst`, `anl`)
    pub forecast: String,
}

/// Inclusive byte range of one message, open-ended when `end` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Value for an HTTP `Range` header.
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

/// Parsed inventory in file order.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    entries: Vec<InventoryEntry>,
}

impl Inventory {
    /// Parse inventory text. Blank lines are ignored; any other malformed line
    /// fails the whole inventory.
    pub fn parse(text: &str) -> Result<Self, SourceError> {
        let mut entries = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            entries.push(parse_line(line).ok_or_else(|| SourceError::Inventory {
                line: line_no + 1,
                content: line.to_string(),
            })?);
        }
        entries.sort_by_key(|e| (e.offset, e.submessage));
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[InventoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Byte range of the message holding the entry at `index`.
    pub fn byte_range(&self, index: usize) -> Option<ByteRange> {
        let entry = self.entries.get(index)?;
        let end = self.entries[index + 1..]
            .iter()
            .find(|next| next.offset > entry.offset)
            .map(|next| next.offset - 1);
        Some(ByteRange {
            start: entry.offset,
            end,
        })
    }

    /// Index of the message addressed by `selector`.
    ///
    /// With `accumulation = Some(fxx)` only the run-total window `0-fxx` is
    /// accepted; otherwise accumulated and averaged messages are passed over
    /// in favour of the instantaneous one.
    pub fn find(&self, selector: &FieldSelector, accumulation: Option<u32>) -> Option<usize> {
        let mut candidates = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| selector.matches(&e.parameter, &e.level));

        match accumulation {
            Some(fxx) => candidates
                .find(|(_, e)| is_run_total_window(&e.forecast, fxx))
                .map(|(i, _)| i),
            None => {
                let all: Vec<(usize, &InventoryEntry)> = candidates.collect();
                all.iter()
                    .find(|(_, e)| !is_time_processed(&e.forecast))
                    .or_else(|| all.first())
                    .map(|(i, _)| *i)
            }
        }
    }
}

impl InventoryEntry {
    /// 0-based position of this field among the submessages of its message.
    pub fn submessage_index(&self) -> usize {
        self.submessage.map_or(0, |m| m.saturating_sub(1) as usize)
    }
}

fn parse_line(line: &str) -> Option<InventoryEntry> {
    let mut parts = line.splitn(7, ':');
    let number_field = parts.next()?.trim();
    let (number, submessage) = match number_field.split_once('.') {
        Some((n, m)) => (n.parse().ok()?, Some(m.parse().ok()?)),
        None => (number_field.parse().ok()?, None),
    };
    let offset = parts.next()?.trim().parse().ok()?;
    let reference = parts.next()?.trim();
    let reference = reference.strip_prefix("d=").unwrap_or(reference).to_string();
    let parameter = parts.next()?.trim().to_string();
    let level = parts.next()?.trim().to_string();
    let forecast = parts
        .next()
        .map(|f| f.trim().to_string())
        .unwrap_or_default();

    if parameter.is_empty() {
        return None;
    }

    Some(InventoryEntry {
        number,
        submessage,
        offset,
        reference,
        parameter,
        level,
        forecast,
    })
}

/// `0-<fxx> hour acc fcst`, or `0-<days> day acc fcst` when `fxx` is a whole
/// number of days.
pub fn is_run_total_window(forecast: &str, fxx: u32) -> bool {
    let window = forecast.trim().trim_end_matches(" fcst");
    if window == format!("0-{} hour acc", fxx) {
        return true;
    }
    fxx > 0 && fxx % 24 == 0 && window == format!("0-{} day acc", fxx / 24)
}

fn is_time_processed(forecast: &str) -> bool {
    forecast.contains(" acc") || forecast.contains(" ave") || forecast.contains(" max") || forecast.contains(" min")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
1:0:d=2024011506:REFC:entire atmosphere:7 hour fcst:
2:412044:d=2024011506:TMP:2 m above ground:7 hour fcst:
3:1204401:d=2024011506:UGRD:10 m above ground:7 hour fcst:
4:2011112:d=2024011506:VGRD:10 m above ground:7 hour fcst:
5:2800000:d=2024011506:APCP:surface:6-7 hour acc fcst:
6:3100000:d=2024011506:APCP:surface:0-7 hour acc fcst:
7:3400000:d=2024011506:GUST:surface:6-7 hour max fcst:
8:3500000:d=2024011506:GUST:surface:7 hour fcst:
";

    #[test]
    fn test_parse_sample() {
        let inv = Inventory::parse(SAMPLE).unwrap();
        assert_eq!(inv.len(), 8);
        let tmp = &inv.entries()[1];
        assert_eq!(tmp.number, 2);
        assert_eq!(tmp.offset, 412044);
        assert_eq!(tmp.reference, "2024011506");
        assert_eq!(tmp.parameter, "TMP");
        assert_eq!(tmp.level, "2 m above ground");
        assert_eq!(tmp.forecast, "7 hour fcst");
    }

    #[test]
    fn test_byte_ranges() {
        let inv = Inventory::parse(SAMPLE).unwrap();
        assert_eq!(
            inv.byte_range(0),
            Some(ByteRange { start: 0, end: Some(412043) })
        );
        assert_eq!(inv.byte_range(7), Some(ByteRange { start: 3500000, end: None }));
        assert_eq!(inv.byte_range(8), None);
        assert_eq!(inv.byte_range(1).unwrap().header_value(), "bytes=412044-1204400");
        assert_eq!(inv.byte_range(7).unwrap().header_value(), "bytes=3500000-");
    }

    #[test]
    fn test_find_exact_level() {
        let inv = Inventory::parse(SAMPLE).unwrap();
        let sel = FieldSelector::new("TMP", "2 m above ground");
        assert_eq!(inv.find(&sel, None), Some(1));
        assert_eq!(inv.find(&FieldSelector::new("TMP", "2 m"), None), None);
    }

    #[test]
    fn test_find_accumulation_window() {
        let inv = Inventory::parse(SAMPLE).unwrap();
        let sel = FieldSelector::new("APCP", "surface");
        assert_eq!(inv.find(&sel, Some(7)), Some(5));
        assert_eq!(inv.find(&sel, Some(6)), None);
    }

    #[test]
    fn test_find_prefers_instantaneous() {
        let inv = Inventory::parse(SAMPLE).unwrap();
        assert_eq!(inv.find(&FieldSelector::new("GUST", "surface"), None), Some(7));
    }

    #[test]
    fn test_day_window() {
        assert!(is_run_total_window("0-2 day acc fcst", 48));
        assert!(is_run_total_window("0-48 hour acc fcst", 48));
        assert!(!is_run_total_window("0-2 day acc fcst", 47));
        assert!(!is_run_total_window("42-48 hour acc fcst", 48));
    }

    #[test]
    fn test_malformed_line() {
        let err = Inventory::parse("1:0:d=2024011506:TMP:2 m above ground:anl:\nnot an inventory\n")
            .unwrap_err();
        assert!(matches!(err, SourceError::Inventory { line: 2, .. }));
    }

    #[test]
    fn test_packed_submessages_share_one_range() {
        let inv = Inventory::parse(
            "1:0:d=2024011512:TMP:2 m above ground:1 hour fcst:
2.1:1000:d=2024011512:UGRD:10 m above ground:1 hour fcst:
2.2:1000:d=2024011512:VGRD:10 m above ground:1 hour fcst:
3:5000:d=2024011512:REFC:entire atmosphere:1 hour fcst:
",
        )
        .unwrap();
        assert_eq!(inv.len(), 4);

        let u = inv.find(&FieldSelector::new("UGRD", "10 m above ground"), None).unwrap();
        let v = inv.find(&FieldSelector::new("VGRD", "10 m above ground"), None).unwrap();
        assert_eq!((inv.entries()[u].number, inv.entries()[u].submessage), (2, Some(1)));
        assert_eq!((inv.entries()[v].number, inv.entries()[v].submessage), (2, Some(2)));
        assert_eq!(inv.entries()[u].submessage_index(), 0);
        assert_eq!(inv.entries()[v].submessage_index(), 1);

        let message = ByteRange { start: 1000, end: Some(4999) };
        assert_eq!(inv.byte_range(u), Some(message));
        assert_eq!(inv.byte_range(v), Some(message));
        assert_eq!(inv.byte_range(0).unwrap().end, Some(999));
        assert_eq!(inv.entries()[0].submessage_index(), 0);
    }

    #[test]
    fn test_trailing_submessages_are_open_ended() {
        let inv = Inventory::parse("1:0:d=1:A:x:anl:\n2.1:40:d=1:U:x:anl:\n2.2:40:d=1:V:x:anl:\n").unwrap();
        assert_eq!(inv.byte_range(1), Some(ByteRange { start: 40, end: None }));
        assert_eq!(inv.byte_range(2), Some(ByteRange { start: 40, end: None }));
        assert!(Inventory::parse("2.x:40:d=1:U:x:anl:\n").is_err());
    }

    #[test]
    fn test_blank_lines_and_sorting() {
        let inv = Inventory::parse("\n2:50:d=1:B:x:anl:\n\n1:0:d=1:A:x:anl:\n").unwrap();
        assert_eq!(inv.entries()[0].parameter, "A");
        assert_eq!(inv.byte_range(0).unwrap().end, Some(49));
    }
}
