use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::convert::TryFrom;

use crate::segy_error::SegyError;
use crate::trace_header::TRACE_HEADER_SIZE;

/// Width in bytes of a trace header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FieldWidth {
    Two,
    Four,
}

impl FieldWidth {
    pub fn len(&self) -> usize {
        match self {
            FieldWidth::Two => 2,
            FieldWidth::Four => 4,
        }
    }
}

impl TryFrom<u8> for FieldWidth {
    type Error = String;
    fn try_from(v: u8) -> Result<FieldWidth, String> {
        match v {
            2 => Ok(FieldWidth::Two),
            4 => Ok(FieldWidth::Four),
            _ => Err(format!("field width must be 2 or 4, was {}", v)),
        }
    }
}

impl From<FieldWidth> for u8 {
    fn from(w: FieldWidth) -> u8 {
        w.len() as u8
    }
}

/// Location of one logical field within the 240-byte trace header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLoc {
    pub offset: usize,
    pub width: FieldWidth,
    #[serde(default = "default_signed")]
    pub signed: bool,
}

fn default_signed() -> bool {
    true
}

impl FieldLoc {
    pub fn i32(offset: usize) -> FieldLoc {
        FieldLoc {
            offset,
            width: FieldWidth::Four,
            signed: true,
        }
    }

    pub fn i16(offset: usize) -> FieldLoc {
        FieldLoc {
            offset,
            width: FieldWidth::Two,
            signed: true,
        }
    }
}

/// An immutable mapping from logical field names to byte locations within
/// the trace header. Validated on construction; shared by reference across
/// every decode in a conversion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, FieldLoc>",
    into = "BTreeMap<String, FieldLoc>"
)]
pub struct ByteLocationSpec {
    fields: BTreeMap<String, FieldLoc>,
}

impl ByteLocationSpec {
    pub fn new(fields: BTreeMap<String, FieldLoc>) -> Result<ByteLocationSpec, SegyError> {
        let spec = ByteLocationSpec { fields };
        spec.validate()?;
        Ok(spec)
    }

    /// Loads an explicit field mapping from JSON, e.g.
    /// `{"iline": {"offset": 188, "width": 4}, "xline": {"offset": 192, "width": 4}}`.
    pub fn from_json(json: &str) -> Result<ByteLocationSpec, SegyError> {
        let spec: ByteLocationSpec = serde_json::from_str(json)?;
        Ok(spec)
    }

    fn validate(&self) -> Result<(), SegyError> {
        for (name, loc) in &self.fields {
            let end = loc.offset + loc.width.len();
            if loc.offset >= TRACE_HEADER_SIZE || end > TRACE_HEADER_SIZE {
                return Err(SegyError::HeaderFormat(format!(
                    "field `{}` at bytes {}..{} does not fit the {}-byte trace header",
                    name, loc.offset, end, TRACE_HEADER_SIZE
                )));
            }
            for (other, other_loc) in &self.fields {
                if other <= name {
                    continue;
                }
                // byte-identical locations are aliases and allowed
                if loc == other_loc {
                    continue;
                }
                let other_end = other_loc.offset + other_loc.width.len();
                if loc.offset < other_end && other_loc.offset < end {
                    return Err(SegyError::FieldOverlap {
                        name: name.clone(),
                        offset: loc.offset,
                        end,
                        other: other.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FieldLoc> {
        self.fields.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&FieldLoc, SegyError> {
        self.fields
            .get(name)
            .ok_or_else(|| SegyError::UnmappedField(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl TryFrom<BTreeMap<String, FieldLoc>> for ByteLocationSpec {
    type Error = SegyError;
    fn try_from(fields: BTreeMap<String, FieldLoc>) -> Result<ByteLocationSpec, SegyError> {
        ByteLocationSpec::new(fields)
    }
}

impl From<ByteLocationSpec> for BTreeMap<String, FieldLoc> {
    fn from(spec: ByteLocationSpec) -> BTreeMap<String, FieldLoc> {
        spec.fields
    }
}

/// The trace sequence number field, present in every convention.
pub const TRACE_SEQ_FIELD: &str = "trace_seq";

fn build(pairs: &[(&str, FieldLoc)]) -> ByteLocationSpec {
    let mut fields = BTreeMap::new();
    fields.insert(TRACE_SEQ_FIELD.to_string(), FieldLoc::i32(0));
    for (name, loc) in pairs {
        fields.insert((*name).to_string(), *loc);
    }
    ByteLocationSpec::new(fields).unwrap()
}

lazy_static! {
    static ref WELL_KNOWN: HashMap<&'static str, ByteLocationSpec> = {
        let mut m = HashMap::new();
        // SEG-Y rev1 standard locations (byte numbers 181/185/189/193, 0-based here)
        m.insert(
            "standard_3d",
            build(&[
                ("cdp_x", FieldLoc::i32(180)),
                ("cdp_y", FieldLoc::i32(184)),
                ("iline", FieldLoc::i32(188)),
                ("xline", FieldLoc::i32(192)),
            ]),
        );
        m.insert(
            "standard_3d_gathers",
            build(&[
                ("offset", FieldLoc::i32(36)),
                ("cdp_x", FieldLoc::i32(180)),
                ("cdp_y", FieldLoc::i32(184)),
                ("iline", FieldLoc::i32(188)),
                ("xline", FieldLoc::i32(192)),
            ]),
        );
        // Petrel exports put inline/crossline in the first header words
        m.insert(
            "petrel_3d",
            build(&[
                ("iline", FieldLoc::i32(4)),
                ("xline", FieldLoc::i32(20)),
                ("cdp_x", FieldLoc::i32(180)),
                ("cdp_y", FieldLoc::i32(184)),
            ]),
        );
        m.insert(
            "petrel_3d_gathers",
            build(&[
                ("iline", FieldLoc::i32(4)),
                ("xline", FieldLoc::i32(20)),
                ("offset", FieldLoc::i32(36)),
                ("cdp_x", FieldLoc::i32(180)),
                ("cdp_y", FieldLoc::i32(184)),
            ]),
        );
        m
    };
}

/// Looks up a named vendor byte-location convention.
pub fn well_known(vendor_key: &str) -> Result<&'static ByteLocationSpec, SegyError> {
    WELL_KNOWN
        .get(vendor_key)
        .ok_or_else(|| SegyError::UnknownConvention(vendor_key.to_string()))
}

/// The registered convention names.
pub fn well_known_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = WELL_KNOWN.keys().copied().collect();
    keys.sort_unstable();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_locations() {
        let spec = well_known("standard_3d").unwrap();
        assert_eq!(spec.get("iline").unwrap().offset, 188);
        assert_eq!(spec.get("xline").unwrap().offset, 192);
        assert_eq!(spec.get("cdp_x").unwrap().offset, 180);
        assert_eq!(spec.get(TRACE_SEQ_FIELD).unwrap().offset, 0);
        assert!(spec.get("offset").is_none());
    }

    #[test]
    fn gathers_have_offset() {
        let spec = well_known("standard_3d_gathers").unwrap();
        assert_eq!(spec.get("offset").unwrap().offset, 36);
        let spec = well_known("petrel_3d_gathers").unwrap();
        assert_eq!(spec.get("iline").unwrap().offset, 4);
        assert_eq!(spec.get("xline").unwrap().offset, 20);
    }

    #[test]
    fn unknown_convention() {
        assert!(matches!(
            well_known("landmark_2d"),
            Err(SegyError::UnknownConvention(_))
        ));
    }

    #[test]
    fn all_keys_registered() {
        assert_eq!(
            well_known_keys(),
            vec![
                "petrel_3d",
                "petrel_3d_gathers",
                "standard_3d",
                "standard_3d_gathers"
            ]
        );
    }

    #[test]
    fn overlap_rejected() {
        let mut fields = BTreeMap::new();
        fields.insert("a".to_string(), FieldLoc::i32(10));
        fields.insert("b".to_string(), FieldLoc::i16(12));
        assert!(matches!(
            ByteLocationSpec::new(fields),
            Err(SegyError::FieldOverlap { .. })
        ));
    }

    #[test]
    fn alias_allowed() {
        let mut fields = BTreeMap::new();
        fields.insert("iline".to_string(), FieldLoc::i32(188));
        fields.insert("inline_3d".to_string(), FieldLoc::i32(188));
        assert!(ByteLocationSpec::new(fields).is_ok());
    }

    #[test]
    fn out_of_range_rejected() {
        let mut fields = BTreeMap::new();
        fields.insert("tail".to_string(), FieldLoc::i32(238));
        assert!(matches!(
            ByteLocationSpec::new(fields),
            Err(SegyError::HeaderFormat(_))
        ));
    }

    #[test]
    fn json_mapping() {
        let spec = ByteLocationSpec::from_json(
            r#"{"iline": {"offset": 188, "width": 4}, "xline": {"offset": 192, "width": 4}}"#,
        )
        .unwrap();
        assert_eq!(spec.get("iline").unwrap().offset, 188);
        assert!(spec.get("iline").unwrap().signed);
        assert!(ByteLocationSpec::from_json(r#"{"x": {"offset": 0, "width": 3}}"#).is_err());
    }
}
