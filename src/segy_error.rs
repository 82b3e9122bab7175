use std::string::FromUtf8Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegyError {
    #[error("IO Error")]
    IOError(#[from] std::io::Error),
    #[error("Header must be {0} bytes but was {1}")]
    HeaderSize(usize, usize),
    #[error("Header content invalid: {0}")]
    HeaderFormat(String),
    #[error("Unsupported sample format code: `{0}`")]
    UnsupportedFormat(i16),
    #[error("Unsupported SEG-Y revision: `{0:#06X}`")]
    UnsupportedRevision(u16),
    #[error("Unknown byte-location convention: `{0}`")]
    UnknownConvention(String),
    #[error("Field `{0}` is not mapped by the byte-location spec")]
    UnmappedField(String),
    #[error("Field `{name}` at bytes {offset}..{end} overlaps field `{other}`")]
    FieldOverlap {
        name: String,
        offset: usize,
        end: usize,
        other: String,
    },
    #[error("Duplicate traces for (inline {inline}, crossline {crossline}, offset {offset}): trace indices {traces:?}")]
    GeometryConflict {
        inline: i32,
        crossline: i32,
        offset: i32,
        traces: Vec<usize>,
    },
    #[error("Cannot derive required trace header field `{0}` from the dataset")]
    IncompleteMetadata(String),
    #[error("File truncated mid-trace at byte {offset}, trace index {trace_index}")]
    Truncated { offset: u64, trace_index: usize },
    #[error("Trace {trace_index} header declares {header_samples} samples but file header declares {file_samples}")]
    TraceSampleMismatch {
        trace_index: usize,
        header_samples: u16,
        file_samples: u16,
    },
    #[error("Text not UTF8")]
    FromUtf8Error(#[from] FromUtf8Error),
    #[error("Cannot parse byte-location mapping")]
    JsonError(#[from] serde_json::Error),
    #[error("SEG-Y error: `{0}`")]
    Unknown(String),
}
