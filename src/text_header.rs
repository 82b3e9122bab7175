use chrono::Utc;
use lazy_static::lazy_static;
use std::collections::BTreeMap;
use std::fmt;

use crate::segy_error::SegyError;

/// Size in bytes of the textual file header.
pub const TEXT_HEADER_SIZE: usize = 3200;
/// Number of lines (cards) in the textual header.
pub const TEXT_LINES: usize = 40;
/// Characters per line.
pub const TEXT_COLS: usize = 80;

/// Character set of the textual header on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Ebcdic,
    Ascii,
}

/// The 3200-byte textual header, 40 lines of 80 characters each.
/// Immutable once built; edits replace the whole header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextHeader {
    lines: Vec<String>,
}

impl TextHeader {
    /// Builds a header from up to 40 lines, space-padding each to 80
    /// characters. A line longer than 80 characters is an error rather than
    /// silently truncated.
    pub fn from_lines<I, S>(lines: I) -> Result<TextHeader, SegyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut padded: Vec<String> = Vec::with_capacity(TEXT_LINES);
        for line in lines {
            let line = line.into();
            // length in characters, matching the padding below
            let chars = line.chars().count();
            if chars > TEXT_COLS {
                return Err(SegyError::HeaderFormat(format!(
                    "text header line {} is {} characters, max {}",
                    padded.len() + 1,
                    chars,
                    TEXT_COLS
                )));
            }
            padded.push(format!("{:<width$}", line, width = TEXT_COLS));
        }
        if padded.len() > TEXT_LINES {
            return Err(SegyError::HeaderFormat(format!(
                "text header has {} lines, max {}",
                padded.len(),
                TEXT_LINES
            )));
        }
        while padded.len() < TEXT_LINES {
            padded.push(" ".repeat(TEXT_COLS));
        }
        Ok(TextHeader { lines: padded })
    }

    /// Decodes the 3200-byte textual header. When `encoding` is None the
    /// character set is detected by scoring the bytes as readable text under
    /// each candidate. Returns the header together with the encoding used.
    pub fn from_bytes(
        raw: &[u8],
        encoding: Option<TextEncoding>,
    ) -> Result<(TextHeader, TextEncoding), SegyError> {
        if raw.len() != TEXT_HEADER_SIZE {
            return Err(SegyError::HeaderSize(TEXT_HEADER_SIZE, raw.len()));
        }
        let encoding = encoding.unwrap_or_else(|| detect_encoding(raw));
        let mut lines = Vec::with_capacity(TEXT_LINES);
        for chunk in raw.chunks_exact(TEXT_COLS) {
            let mut line = String::with_capacity(TEXT_COLS);
            for &b in chunk {
                let c = match encoding {
                    TextEncoding::Ascii => {
                        if (0x20..0x7f).contains(&b) {
                            b as char
                        } else {
                            ' '
                        }
                    }
                    TextEncoding::Ebcdic => EBCDIC_TO_ASCII[b as usize] as char,
                };
                line.push(c);
            }
            lines.push(line);
        }
        Ok((TextHeader { lines }, encoding))
    }

    /// Encodes the header to its 3200-byte on-disk form.
    pub fn to_bytes(&self, encoding: TextEncoding) -> Vec<u8> {
        let mut out = Vec::with_capacity(TEXT_HEADER_SIZE);
        for line in &self.lines {
            for c in line.chars() {
                let b = if c.is_ascii() { c as u8 } else { b' ' };
                match encoding {
                    TextEncoding::Ascii => out.push(b),
                    TextEncoding::Ebcdic => out.push(ASCII_TO_EBCDIC[(b & 0x7f) as usize]),
                }
            }
        }
        out
    }

    /// Standard 40-line boilerplate with client-supplied substitutions
    /// merged in. Keys are 1-based line numbers.
    pub fn default_template(
        overrides: &BTreeMap<usize, String>,
    ) -> Result<TextHeader, SegyError> {
        let mut lines = default_lines();
        for (&num, text) in overrides {
            if num == 0 || num > TEXT_LINES {
                return Err(SegyError::HeaderFormat(format!(
                    "text header line number {} out of range 1-{}",
                    num, TEXT_LINES
                )));
            }
            let chars = text.chars().count();
            if chars > TEXT_COLS {
                return Err(SegyError::HeaderFormat(format!(
                    "text header line {} is {} characters, max {}",
                    num, chars, TEXT_COLS
                )));
            }
            lines[num - 1] = text.clone();
        }
        TextHeader::from_lines(lines)
    }

    /// Line by 0-based index, always exactly 80 characters.
    pub fn line(&self, index: usize) -> &str {
        &self.lines[index]
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|s| s.as_str())
    }
}

impl fmt::Display for TextHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

/// Detects the character set by scoring the bytes as readable text under
/// each candidate encoding. Blank bytes are excluded because the EBCDIC
/// space (0x40) also lands in the printable ASCII range and would swamp the
/// ratio on mostly-blank headers.
pub fn detect_encoding(raw: &[u8]) -> TextEncoding {
    let ascii = raw
        .iter()
        .filter(|&&b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b':' | b'-' | b'/'))
        .count();
    let ebcdic = raw
        .iter()
        .filter(|&&b| EBCDIC_TO_ASCII[b as usize].is_ascii_alphanumeric())
        .count();
    if ebcdic > ascii {
        TextEncoding::Ebcdic
    } else {
        TextEncoding::Ascii
    }
}

fn default_lines() -> Vec<String> {
    let mut lines: Vec<String> = (1..=TEXT_LINES)
        .map(|n| format!("C{:>2}", n))
        .collect();
    lines[0] = "C 1 CLIENT:                    COMPANY:                    CREW NO:".to_string();
    lines[1] = "C 2 LINE:          AREA:                    MAP ID:".to_string();
    lines[2] = "C 3 REEL NO:        DAY-START OF REEL:      YEAR:      OBSERVER:".to_string();
    lines[3] = "C 4 INSTRUMENT: MFG           MODEL           SERIAL NO:".to_string();
    lines[4] = "C 5 DATA TRACES/RECORD:       AUXILIARY TRACES/RECORD:      CDP FOLD:".to_string();
    lines[5] = "C 6 SAMPLE INTERVAL:       SAMPLES/TRACE:       BITS/IN:     BYTES/SAMPLE:".to_string();
    lines[6] = "C 7 RECORDING FORMAT:       FORMAT THIS REEL:       MEASUREMENT SYSTEM:".to_string();
    lines[7] = "C 8 PROCESSING:".to_string();
    lines[8] = "C 9 PROCESSING:".to_string();
    lines[37] = format!("C38 CREATED: {}", Utc::now().format("%Y-%m-%d"));
    lines[38] = "C39 SEG-Y REV1".to_string();
    lines[39] = "C40 END TEXTUAL HEADER".to_string();
    lines
}

lazy_static! {
    static ref ASCII_TO_EBCDIC: [u8; 128] = build_ascii_to_ebcdic();
    static ref EBCDIC_TO_ASCII: [u8; 256] = build_ebcdic_to_ascii();
}

// Code page 037 for the printable ASCII range. Everything else translates
// to space in both directions.
fn build_ascii_to_ebcdic() -> [u8; 128] {
    let mut t = [0x40u8; 128];
    let punct: [(u8, u8); 33] = [
        (b' ', 0x40),
        (b'!', 0x5A),
        (b'"', 0x7F),
        (b'#', 0x7B),
        (b'$', 0x5B),
        (b'%', 0x6C),
        (b'&', 0x50),
        (b'\'', 0x7D),
        (b'(', 0x4D),
        (b')', 0x5D),
        (b'*', 0x5C),
        (b'+', 0x4E),
        (b',', 0x6B),
        (b'-', 0x60),
        (b'.', 0x4B),
        (b'/', 0x61),
        (b':', 0x7A),
        (b';', 0x5E),
        (b'<', 0x4C),
        (b'=', 0x7E),
        (b'>', 0x6E),
        (b'?', 0x6F),
        (b'@', 0x7C),
        (b'[', 0xBA),
        (b'\\', 0xE0),
        (b']', 0xBB),
        (b'^', 0xB0),
        (b'_', 0x6D),
        (b'`', 0x79),
        (b'{', 0xC0),
        (b'|', 0x4F),
        (b'}', 0xD0),
        (b'~', 0xA1),
    ];
    for (a, e) in punct {
        t[a as usize] = e;
    }
    for i in 0..9u8 {
        t[(b'a' + i) as usize] = 0x81 + i;
        t[(b'A' + i) as usize] = 0xC1 + i;
        t[(b'j' + i) as usize] = 0x91 + i;
        t[(b'J' + i) as usize] = 0xD1 + i;
    }
    for i in 0..8u8 {
        t[(b's' + i) as usize] = 0xA2 + i;
        t[(b'S' + i) as usize] = 0xE2 + i;
    }
    for i in 0..10u8 {
        t[(b'0' + i) as usize] = 0xF0 + i;
    }
    t
}

fn build_ebcdic_to_ascii() -> [u8; 256] {
    let mut t = [b' '; 256];
    let forward = build_ascii_to_ebcdic();
    for (a, &e) in forward.iter().enumerate() {
        if e != 0x40 || a == b' ' as usize {
            t[e as usize] = a as u8;
        }
    }
    t
}
