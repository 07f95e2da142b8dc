use crate::error::CueError;
use crate::sheet::{CueSheet, FileSection, Track};

/// Parse a complete cue sheet.
///
/// Nesting is selected by the leading-space count of each line: album
/// level at the margin, file level at two spaces, track level at four.
/// Unknown directives are stored verbatim under their first token, and a
/// repeated key at one level keeps the last value.
pub fn parse(input: &str) -> Result<CueSheet, CueError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);

    let mut sheet = CueSheet::default();
    for (number, raw) in input.lines().enumerate() {
        let line = number + 1;
        if raw.trim().is_empty() {
            continue;
        }
        let indent = raw.len() - raw.trim_start_matches(' ').len();
        let text = raw.trim();
        match indent {
            0 | 1 => album_line(&mut sheet, text, line)?,
            2 | 3 => file_line(&mut sheet, text, line)?,
            _ => track_line(&mut sheet, text, line)?,
        }
    }

    // A sheet that opens with a track missing INDEX 01 has no usable
    // starting point at all.
    if let Some(track) = sheet.files.first().and_then(|file| file.tracks.first()) {
        if !track.index.contains_key(&1) {
            return Err(CueError::MissingFirstIndex);
        }
    }
    Ok(sheet)
}

fn album_line(sheet: &mut CueSheet, text: &str, line: usize) -> Result<(), CueError> {
    let (key, rest) = split_directive(text);
    if key == "FILE" {
        let name = quoted_name(rest).ok_or(CueError::MalformedDirective {
            line,
            directive: "FILE",
        })?;
        sheet.files.push(FileSection {
            name,
            ..FileSection::default()
        });
    } else {
        sheet.tags.insert(key.to_string(), unquote(rest));
    }
    Ok(())
}

fn file_line(sheet: &mut CueSheet, text: &str, line: usize) -> Result<(), CueError> {
    let (key, rest) = split_directive(text);
    if key == "TRACK" {
        let file = sheet
            .files
            .last_mut()
            .ok_or(CueError::TrackBeforeFile { line })?;
        let number = rest
            .split_whitespace()
            .next()
            .and_then(|token| token.parse().ok())
            .ok_or(CueError::MalformedDirective {
                line,
                directive: "TRACK",
            })?;
        file.tracks.push(Track {
            number,
            ..Track::default()
        });
    } else {
        let file = sheet
            .files
            .last_mut()
            .ok_or(CueError::UnexpectedIndent { line })?;
        file.tags.insert(key.to_string(), unquote(rest));
    }
    Ok(())
}

fn track_line(sheet: &mut CueSheet, text: &str, line: usize) -> Result<(), CueError> {
    let track = sheet
        .files
        .last_mut()
        .and_then(|file| file.tracks.last_mut())
        .ok_or(CueError::UnexpectedIndent { line })?;
    let (key, rest) = split_directive(text);
    if key == "INDEX" {
        let (number, time) = rest
            .split_once(char::is_whitespace)
            .ok_or(CueError::MalformedDirective {
                line,
                directive: "INDEX",
            })?;
        let number = number.parse().map_err(|_| CueError::MalformedDirective {
            line,
            directive: "INDEX",
        })?;
        track.index.insert(number, unquote(time));
    } else {
        track.tags.insert(key.to_string(), unquote(rest));
    }
    Ok(())
}

/// First whitespace-separated token and the trimmed remainder.
fn split_directive(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((key, rest)) => (key, rest.trim()),
        None => (text, ""),
    }
}

/// `FILE "<name>" <fmt>` keeps only the quoted name.
fn quoted_name(rest: &str) -> Option<String> {
    let mut parts = rest.split('"');
    parts.next()?;
    parts.next().map(str::to_string)
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::parse;
    use crate::error::CueError;

    const SHEET: &str = r#"PERFORMER "Artist"
TITLE "Album"
FILE "Artist - Album.flac" WAVE
  TRACK 01 AUDIO
    TITLE "Opener"
    PERFORMER "Artist"
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    TITLE "Closer"
    INDEX 00 03:12:00
    INDEX 01 03:14:17
"#;

    #[test]
    fn levels_are_separated() {
        let sheet = parse(SHEET).unwrap();
        assert_eq!(sheet.tag("TITLE"), Some("Album"));
        assert_eq!(sheet.tag("PERFORMER"), Some("Artist"));
        assert_eq!(sheet.files.len(), 1);

        let file = &sheet.files[0];
        assert_eq!(file.name, "Artist - Album.flac");
        assert_eq!(file.tracks.len(), 2);

        assert_eq!(file.tracks[0].number, 1);
        assert_eq!(file.tracks[0].tag("TITLE"), Some("Opener"));
        assert_eq!(file.tracks[0].index(1), Some("00:00:00"));

        assert_eq!(file.tracks[1].number, 2);
        assert_eq!(file.tracks[1].index(0), Some("03:12:00"));
        assert_eq!(file.tracks[1].index(1), Some("03:14:17"));
    }

    #[test]
    fn quotes_are_stripped_from_values() {
        let sheet = parse("TITLE \"An \"Album\"\"\n").unwrap();
        assert_eq!(sheet.tag("TITLE"), Some("An \"Album\""));
    }

    #[test]
    fn duplicate_key_keeps_last_value() {
        let sheet = parse("REM one\nREM two\n").unwrap();
        assert_eq!(sheet.tag("REM"), Some("two"));
    }

    #[test]
    fn directive_without_value_stores_empty() {
        let sheet = parse("CATALOG\n").unwrap();
        assert_eq!(sheet.tag("CATALOG"), Some(""));
    }

    #[test]
    fn track_before_file_is_rejected() {
        assert!(matches!(
            parse("  TRACK 01 AUDIO\n"),
            Err(CueError::TrackBeforeFile { line: 1 })
        ));
    }

    #[test]
    fn index_before_track_is_rejected() {
        let input = "FILE \"a.flac\" WAVE\n    INDEX 01 00:00:00\n";
        assert!(matches!(
            parse(input),
            Err(CueError::UnexpectedIndent { line: 2 })
        ));
    }

    #[test]
    fn first_track_requires_index_one() {
        let input = "FILE \"a.flac\" WAVE\n  TRACK 01 AUDIO\n    TITLE \"x\"\n";
        assert!(matches!(parse(input), Err(CueError::MissingFirstIndex)));
    }

    #[test]
    fn file_sections_group_their_tracks() {
        let input = "\
FILE \"disc1.flac\" WAVE
  TRACK 01 AUDIO
    INDEX 01 00:00:00
FILE \"disc2.flac\" WAVE
  TRACK 01 AUDIO
    INDEX 01 00:00:00
";
        let sheet = parse(input).unwrap();
        assert_eq!(sheet.files.len(), 2);
        assert_eq!(sheet.files[0].name, "disc1.flac");
        assert_eq!(sheet.files[1].name, "disc2.flac");
        assert_eq!(sheet.files[1].tracks.len(), 1);
    }

    #[test]
    fn blank_lines_and_bom_are_tolerated() {
        let input = "\u{feff}TITLE \"Album\"\n\nFILE \"a.flac\" WAVE\n  TRACK 01 AUDIO\n    INDEX 01 00:00:00\n";
        let sheet = parse(input).unwrap();
        assert_eq!(sheet.tag("TITLE"), Some("Album"));
        assert_eq!(sheet.files.len(), 1);
    }
}
