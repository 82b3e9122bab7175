//! A library for reading and writing SEG-Y seismic data.
//!
//! SEG-Y files carry a 3200-byte textual header (EBCDIC or ASCII), a
//! 400-byte binary header and a sequence of traces, each a 240-byte header
//! plus fixed-width samples. Vendors disagree on where the inline and
//! crossline numbers live in the trace header, so every decode here takes an
//! explicit [ByteLocationSpec], either a registered convention
//! ([well_known_byte_locs]) or a custom field mapping.

mod binary_header;
mod byte_locs;
mod loader;
mod sample_format;
mod scanner;
mod segy_error;
mod text_header;
mod trace_header;
mod writer;

use std::path::Path;

pub use self::binary_header::{BinaryHeader, BINARY_HEADER_SIZE};
pub use self::byte_locs::{
    well_known as well_known_byte_locs, well_known_keys, ByteLocationSpec, FieldLoc, FieldWidth,
    TRACE_SEQ_FIELD,
};
pub use self::loader::{load, ArrayStore, DType, GriddedDataset, LoadOptions, MemoryStore};
pub use self::sample_format::{f32_to_ibm, ibm_to_f32, Endian, SampleFormat};
pub use self::scanner::{
    infer_geometry, scan, scrape_binary_header, scrape_text_header, Geometry, ScanFailure,
    ScanOptions, ScanRecord, ScanTable, TraceLocation,
};
pub use self::segy_error::SegyError;
pub use self::text_header::{
    detect_encoding, TextEncoding, TextHeader, TEXT_COLS, TEXT_HEADER_SIZE, TEXT_LINES,
};
pub use self::trace_header::{
    FieldSelection, TraceHeader, TRACE_HEADER_SIZE, TRACE_SAMPLES_OFFSET,
};
pub use self::writer::{replace_text_header, write, WriteMode, WriteOptions};

/// Scan, infer geometry and load in one pass over the file plus one
/// geometry-ordered read. The spec must map `iline` and `xline`; an `offset`
/// mapping turns on the gather axis.
///
/// #Example
///
/// ```no_run
/// use segy::SegyError;
/// # fn main() -> Result<(), SegyError> {
/// let spec = segy::well_known_byte_locs("standard_3d")?;
/// let dataset = segy::read_segy(
///     "survey.segy",
///     spec,
///     &segy::ScanOptions::default(),
///     &segy::LoadOptions::default(),
/// )?;
/// println!("grid shape {:?}", dataset.data.shape());
/// # Ok(())
/// # }
/// ```
pub fn read_segy<P: AsRef<Path>>(
    path: P,
    spec: &ByteLocationSpec,
    scan_options: &ScanOptions,
    load_options: &LoadOptions,
) -> Result<GriddedDataset, SegyError> {
    let offset_field = if spec.contains("offset") {
        Some("offset")
    } else {
        None
    };
    let mut fields = vec!["iline", "xline"];
    if let Some(off) = offset_field {
        fields.push(off);
    }
    let table = scan(&path, spec, &fields, scan_options)?;
    let geometry = infer_geometry(&table, "iline", "xline", offset_field)?;
    load(&path, &geometry, spec, load_options)
}

/// [read_segy] with a registered vendor convention instead of an explicit
/// byte-location spec.
pub fn read_segy_well_known<P: AsRef<Path>>(
    path: P,
    vendor_key: &str,
    scan_options: &ScanOptions,
    load_options: &LoadOptions,
) -> Result<GriddedDataset, SegyError> {
    let spec = byte_locs::well_known(vendor_key)?;
    read_segy(path, spec, scan_options, load_options)
}
