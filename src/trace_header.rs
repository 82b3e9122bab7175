use std::collections::BTreeMap;
use std::fmt;

use crate::byte_locs::{ByteLocationSpec, FieldWidth, TRACE_SEQ_FIELD};
use crate::sample_format::Endian;
use crate::segy_error::SegyError;

/// Size in bytes of the header preceding each trace's samples.
pub const TRACE_HEADER_SIZE: usize = 240;

/// Offset of the per-trace samples-count field (bytes 115-116 of the
/// standard layout). Used by the scanner to cross-check the binary header.
pub const TRACE_SAMPLES_OFFSET: usize = 114;

/// Which fields to decode from a trace header. Scanning millions of traces
/// only pays for the fields it asks for.
#[derive(Debug, Clone, Copy)]
pub enum FieldSelection<'a> {
    All,
    Subset(&'a [&'a str]),
}

/// Decoded trace header field values, keyed by the logical names of the
/// byte-location spec that produced them. Ephemeral, one per trace during
/// scan and load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceHeader {
    values: BTreeMap<String, i32>,
}

impl TraceHeader {
    pub fn new() -> TraceHeader {
        TraceHeader {
            values: BTreeMap::new(),
        }
    }

    pub fn from_values(values: BTreeMap<String, i32>) -> TraceHeader {
        TraceHeader { values }
    }

    /// Decodes the requested fields from a raw 240-byte trace header. The
    /// trace sequence number is always decoded when the spec maps it.
    pub fn from_bytes(
        raw: &[u8],
        spec: &ByteLocationSpec,
        fields: FieldSelection,
        endian: Endian,
    ) -> Result<TraceHeader, SegyError> {
        if raw.len() != TRACE_HEADER_SIZE {
            return Err(SegyError::HeaderSize(TRACE_HEADER_SIZE, raw.len()));
        }
        let mut values = BTreeMap::new();
        match fields {
            FieldSelection::All => {
                for name in spec.field_names() {
                    let loc = spec.get(name).unwrap();
                    values.insert(name.to_string(), decode_field(raw, loc, endian)?);
                }
            }
            FieldSelection::Subset(names) => {
                for &name in names {
                    let loc = spec.require(name)?;
                    values.insert(name.to_string(), decode_field(raw, loc, endian)?);
                }
                if let Some(loc) = spec.get(TRACE_SEQ_FIELD) {
                    values
                        .entry(TRACE_SEQ_FIELD.to_string())
                        .or_insert(decode_field(raw, loc, endian)?);
                }
            }
        }
        Ok(TraceHeader { values })
    }

    /// Encodes to 240 bytes. Bytes not covered by a stored field are zero.
    /// A stored field the spec does not map is an error.
    pub fn to_bytes(&self, spec: &ByteLocationSpec, endian: Endian) -> Result<Vec<u8>, SegyError> {
        let mut raw = vec![0u8; TRACE_HEADER_SIZE];
        for (name, &value) in &self.values {
            let loc = spec.require(name)?;
            encode_field(&mut raw, loc, value, endian);
        }
        Ok(raw)
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.values.get(name).copied()
    }

    pub fn set(&mut self, name: &str, value: i32) {
        self.values.insert(name.to_string(), value);
    }

    pub fn values(&self) -> &BTreeMap<String, i32> {
        &self.values
    }
}

impl fmt::Display for TraceHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.values {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
            first = false;
        }
        Ok(())
    }
}

fn decode_field(
    raw: &[u8],
    loc: &crate::byte_locs::FieldLoc,
    endian: Endian,
) -> Result<i32, SegyError> {
    let slice = &raw[loc.offset..loc.offset + loc.width.len()];
    let v = match (loc.width, loc.signed) {
        (FieldWidth::Two, true) => endian.read_i16(slice)? as i32,
        (FieldWidth::Two, false) => endian.read_u16(slice)? as i32,
        (FieldWidth::Four, true) => endian.read_i32(slice)?,
        (FieldWidth::Four, false) => endian.read_u32(slice)? as i32,
    };
    Ok(v)
}

fn encode_field(raw: &mut [u8], loc: &crate::byte_locs::FieldLoc, value: i32, endian: Endian) {
    match loc.width {
        FieldWidth::Two => {
            let bytes = match endian {
                Endian::Big => (value as i16).to_be_bytes(),
                Endian::Little => (value as i16).to_le_bytes(),
            };
            raw[loc.offset..loc.offset + 2].copy_from_slice(&bytes);
        }
        FieldWidth::Four => {
            let bytes = match endian {
                Endian::Big => value.to_be_bytes(),
                Endian::Little => value.to_le_bytes(),
            };
            raw[loc.offset..loc.offset + 4].copy_from_slice(&bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_locs::well_known;

    fn dummy_trace_header(spec: &ByteLocationSpec) -> Vec<u8> {
        let mut header = TraceHeader::new();
        header.set(TRACE_SEQ_FIELD, 17);
        header.set("iline", 1002);
        header.set("xline", 2431);
        header.set("cdp_x", 431_200);
        header.set("cdp_y", 6_213_400);
        header.to_bytes(spec, Endian::Big).unwrap()
    }

    #[test]
    fn decode_all_fields() {
        let spec = well_known("standard_3d").unwrap();
        let raw = dummy_trace_header(spec);
        let header = TraceHeader::from_bytes(&raw, spec, FieldSelection::All, Endian::Big).unwrap();
        assert_eq!(header.get(TRACE_SEQ_FIELD), Some(17));
        assert_eq!(header.get("iline"), Some(1002));
        assert_eq!(header.get("xline"), Some(2431));
        assert_eq!(header.get("cdp_x"), Some(431_200));
        assert_eq!(header.get("cdp_y"), Some(6_213_400));
    }

    #[test]
    fn decode_subset_keeps_trace_seq() {
        let spec = well_known("standard_3d").unwrap();
        let raw = dummy_trace_header(spec);
        let header =
            TraceHeader::from_bytes(&raw, spec, FieldSelection::Subset(&["iline"]), Endian::Big)
                .unwrap();
        assert_eq!(header.get("iline"), Some(1002));
        assert_eq!(header.get(TRACE_SEQ_FIELD), Some(17));
        assert_eq!(header.get("xline"), None);
    }

    #[test]
    fn decode_unmapped_field_rejected() {
        let spec = well_known("standard_3d").unwrap();
        let raw = dummy_trace_header(spec);
        let result =
            TraceHeader::from_bytes(&raw, spec, FieldSelection::Subset(&["shotpoint"]), Endian::Big);
        assert!(matches!(result, Err(SegyError::UnmappedField(f)) if f == "shotpoint"));
    }

    #[test]
    fn encode_unmapped_field_rejected() {
        let spec = well_known("standard_3d").unwrap();
        let mut header = TraceHeader::new();
        header.set("shotpoint", 9);
        assert!(matches!(
            header.to_bytes(spec, Endian::Big),
            Err(SegyError::UnmappedField(_))
        ));
    }

    #[test]
    fn encode_zero_fills_missing_fields() {
        let spec = well_known("standard_3d").unwrap();
        let mut header = TraceHeader::new();
        header.set("iline", 5);
        let raw = header.to_bytes(spec, Endian::Big).unwrap();
        assert_eq!(raw.len(), TRACE_HEADER_SIZE);
        assert_eq!(&raw[192..196], &[0, 0, 0, 0]); // xline untouched
        assert_eq!(i32::from_be_bytes(raw[188..192].try_into().unwrap()), 5);
    }

    #[test]
    fn round_trip_negative_values() {
        let spec = well_known("standard_3d_gathers").unwrap();
        let mut header = TraceHeader::new();
        header.set(TRACE_SEQ_FIELD, 1);
        header.set("iline", -12);
        header.set("xline", 3);
        header.set("offset", -150);
        header.set("cdp_x", 0);
        header.set("cdp_y", 0);
        let raw = header.to_bytes(spec, Endian::Little).unwrap();
        let rt = TraceHeader::from_bytes(&raw, spec, FieldSelection::All, Endian::Little).unwrap();
        assert_eq!(rt, header);
    }

    #[test]
    fn wrong_size_rejected() {
        let spec = well_known("standard_3d").unwrap();
        let raw = vec![0u8; 239];
        assert!(matches!(
            TraceHeader::from_bytes(&raw, spec, FieldSelection::All, Endian::Big),
            Err(SegyError::HeaderSize(TRACE_HEADER_SIZE, 239))
        ));
    }
}
