//! The split path form names a window of a backing audio file:
//! `<stem>.flaccuesplit.<start>.<end><ext>`, times as `MM:SS:FF` cue
//! codes, `-1` standing for end of file.

use std::path::{Path, PathBuf};

use flaccue_cue::Timecode;

/// Marker between the backing file stem and the time window.
pub const SPLIT_MARKER: &str = ".flaccuesplit.";

/// Stand-in for "play to end of file": ten hours, beyond any disc.
pub const END_OF_FILE_SECS: f64 = 36_000.0;

/// A decoded split path.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPath {
    /// The backing file, marker and window removed.
    pub real: PathBuf,
    /// Window start in seconds.
    pub start: f64,
    /// Window end in seconds; [END_OF_FILE_SECS] when open-ended.
    pub end: f64,
}

impl SplitPath {
    pub fn ends_at_eof(&self) -> bool {
        self.end >= END_OF_FILE_SECS
    }
}

/// Decode a path whose basename carries the split marker. Returns `None`
/// for ordinary paths.
pub fn decode(path: &Path) -> Option<SplitPath> {
    let name = path.file_name()?.to_str()?;
    let (stem, rest) = name.split_once(SPLIT_MARKER)?;

    let (times, extension) = split_times(rest);
    let (start, end) = match times.split_once('.') {
        Some((start, end)) => (start, end),
        None => (times, ""),
    };

    let mut real_name = String::from(stem);
    if let Some(extension) = extension {
        real_name.push('.');
        real_name.push_str(extension);
    }

    Some(SplitPath {
        real: path.with_file_name(real_name),
        start: window_seconds(start).unwrap_or(0.0),
        end: window_seconds(end).unwrap_or(END_OF_FILE_SECS),
    })
}

/// The backing path of a split path; any other path unchanged.
pub fn clean(path: &Path) -> PathBuf {
    match decode(path) {
        Some(split) => split.real,
        None => path.to_path_buf(),
    }
}

/// Build the split form of `real` for the given window, keeping the time
/// codes verbatim.
pub fn encode(real: &Path, start: &str, end: &str) -> PathBuf {
    let name = real
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, extension)) => (stem.to_string(), format!(".{extension}")),
        None => (name, String::new()),
    };
    real.with_file_name(format!("{stem}{SPLIT_MARKER}{start}.{end}{extension}"))
}

/// Split `<times><ext>` after the marker. The trailing component is only
/// an extension when it does not look like part of a time window: an
/// integer, or an integer followed by `:`, belongs to the times.
fn split_times(rest: &str) -> (&str, Option<&str>) {
    match rest.rsplit_once('.') {
        Some((times, candidate)) if !is_time_fragment(candidate) => (times, Some(candidate)),
        _ => (rest, None),
    }
}

fn is_time_fragment(candidate: &str) -> bool {
    if candidate.parse::<i64>().is_ok() {
        return true;
    }
    candidate
        .split(':')
        .next()
        .map_or(false, |head| head.parse::<i64>().is_ok())
}

fn window_seconds(token: &str) -> Option<f64> {
    token
        .parse::<Timecode>()
        .ok()
        .map(|time| time.as_seconds())
}

#[cfg(test)]
mod tests {
    use super::{clean, decode, encode, END_OF_FILE_SECS};
    use std::path::{Path, PathBuf};

    #[test]
    fn round_trips_through_encode() {
        let real = Path::new("/music/Artist - Album.flac");
        let split = decode(&encode(real, "01:02:37", "02:05:00")).unwrap();
        assert_eq!(split.real, real);
        assert!((split.start - (62.0 + 37.0 / 75.0)).abs() < 1e-9);
        assert!((split.end - 125.0).abs() < 1e-9);
    }

    #[test]
    fn open_ended_window_uses_sentinel() {
        let split = decode(Path::new("/a/X.flaccuesplit.00:00:00.-1.flac")).unwrap();
        assert_eq!(split.real, PathBuf::from("/a/X.flac"));
        assert_eq!(split.start, 0.0);
        assert_eq!(split.end, END_OF_FILE_SECS);
        assert!(split.ends_at_eof());
    }

    #[test]
    fn fractional_seconds_from_frames() {
        let split = decode(Path::new("/a/X.flaccuesplit.01:02:37.02:05:00.flac")).unwrap();
        assert_eq!(split.real, PathBuf::from("/a/X.flac"));
        assert!((split.start - (62.0 + 37.0 / 75.0)).abs() < 1e-9);
        assert!((split.end - 125.0).abs() < 1e-9);
    }

    #[test]
    fn missing_extension_is_folded_back() {
        // No trailing extension: the last dot-component is the end code.
        let split = decode(Path::new("/a/X.flaccuesplit.00:00:00.02:10:75")).unwrap();
        assert_eq!(split.real, PathBuf::from("/a/X"));
        assert!((split.end - (130.0 + 75.0 / 75.0)).abs() < 1e-9);

        let split = decode(Path::new("/a/X.flaccuesplit.00:00:00.-1")).unwrap();
        assert_eq!(split.real, PathBuf::from("/a/X"));
        assert!(split.ends_at_eof());
    }

    #[test]
    fn garbled_times_fall_back_to_full_window() {
        let split = decode(Path::new("/a/X.flaccuesplit.bogus.alsobogus.flac")).unwrap();
        assert_eq!(split.start, 0.0);
        assert!(split.ends_at_eof());
    }

    #[test]
    fn clean_leaves_ordinary_paths_alone() {
        assert_eq!(
            clean(Path::new("/music/Album/song.flac")),
            PathBuf::from("/music/Album/song.flac")
        );
        assert_eq!(
            clean(Path::new("/a/X.flaccuesplit.00:00:00.-1.flac")),
            PathBuf::from("/a/X.flac")
        );
    }
}
