mod error;
mod parser;
mod sheet;
mod time;

pub use error::CueError;
pub use parser::parse;
pub use sheet::{CueSheet, FileSection, Track};
pub use time::{Timecode, TimecodeError, FRAMES_PER_SECOND};

use std::path::Path;

/// Read a cue sheet from disk and parse it.
///
/// The file is read as raw bytes and decoded through a fallback chain:
/// a byte-order mark selects the encoding outright, otherwise strict
/// UTF-8 is attempted, then UTF-16LE, then a detector guess for legacy
/// single-byte encodings.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<CueSheet, CueError> {
    let raw = std::fs::read(path)?;
    parse(&decode_text(&raw))
}

fn decode_text(raw: &[u8]) -> String {
    if let Some((encoding, bom_length)) = encoding_rs::Encoding::for_bom(raw) {
        let (text, _) = encoding.decode_without_bom_handling(&raw[bom_length..]);
        return text.into_owned();
    }
    // A NUL byte is never text; it marks BOM-less UTF-16.
    if !raw.contains(&0) {
        if let Ok(text) = std::str::from_utf8(raw) {
            return text.to_owned();
        }
    }
    let (text, _, had_errors) = encoding_rs::UTF_16LE.decode(raw);
    if !had_errors {
        return text.into_owned();
    }
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(raw, true);
    let (text, encoding, _) = detector.guess(None, true).decode(raw);
    log::trace!("cue encoding detected: {}", encoding.name());
    text.into_owned()
}
