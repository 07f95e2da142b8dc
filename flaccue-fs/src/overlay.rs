//! Directory synthesis: every cue sheet in a directory contributes one
//! virtual WAV file per track and hides the backing audio it slices.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use flaccue_cue::{CueError, CueSheet, FileSection};

use crate::split;
use crate::transcode::TrackMeta;

/// Start time when the first track of a file carries no INDEX 01.
const TRACK_START: &str = "00:00:00";
/// End token for the last track of a backing file.
const TO_END_OF_FILE: &str = "-1";

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualTrack {
    /// Synthetic filename shown in directory listings.
    pub name: String,
    /// Absolute split path of the backing audio window.
    pub source: PathBuf,
    pub meta: TrackMeta,
}

/// Virtual additions and hidden backing names for one directory.
#[derive(Debug, Default)]
pub struct DirectoryOverlay {
    pub tracks: BTreeMap<String, VirtualTrack>,
    pub hidden: HashSet<String>,
}

/// Expand every cue sheet found in `dir`. A sheet that fails to parse is
/// skipped so one bad sheet cannot poison the directory; the sheet file
/// itself and its backing files stay visible.
pub fn expand_directory(dir: &Path) -> io::Result<DirectoryOverlay> {
    let mut overlay = DirectoryOverlay::default();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map_or(false, |extension| extension == "cue") {
            if let Err(error) = expand_cue(&path, &mut overlay) {
                log::warn!("skipping cue sheet {}: {error}", path.display());
            }
        }
    }
    Ok(overlay)
}

/// Resolve a path that does not exist on disk against the cue overlay of
/// its parent directory.
pub fn find_virtual(path: &Path) -> Option<VirtualTrack> {
    let parent = split::clean(path.parent()?);
    let name = path.file_name()?.to_str()?;
    match expand_directory(&parent) {
        Ok(mut overlay) => overlay.tracks.remove(name),
        Err(error) => {
            log::debug!("cannot expand {}: {error}", parent.display());
            None
        }
    }
}

fn expand_cue(cue_path: &Path, overlay: &mut DirectoryOverlay) -> Result<(), CueError> {
    let sheet = flaccue_cue::parse_file(cue_path)?;
    let dir = cue_path.parent().unwrap_or_else(|| Path::new("."));

    let album = sheet.tag("TITLE").unwrap_or_default().to_string();
    let album_artist = album_artist(&sheet);

    for section in &sheet.files {
        let backing = dir.join(&section.name);
        if !backing.exists() {
            log::debug!(
                "{} references missing file {}",
                cue_path.display(),
                section.name
            );
            continue;
        }
        expand_section(
            section,
            &backing,
            disc_number(&section.name),
            &album,
            &album_artist,
            overlay,
        );
        overlay.hidden.insert(section.name.clone());
    }
    Ok(())
}

fn expand_section(
    section: &FileSection,
    backing: &Path,
    disc: u32,
    album: &str,
    album_artist: &str,
    overlay: &mut DirectoryOverlay,
) {
    let mut previous_end = TRACK_START.to_string();
    for (position, track) in section.tracks.iter().enumerate() {
        let start = track
            .index(1)
            .map(str::to_string)
            .unwrap_or_else(|| previous_end.clone());
        let end = section
            .tracks
            .get(position + 1)
            .and_then(|next| next.index(1))
            .map(str::to_string)
            .unwrap_or_else(|| TO_END_OF_FILE.to_string());
        previous_end = end.clone();

        let Some(title) = track.tag("TITLE") else {
            log::warn!(
                "track {} of {} has no TITLE, skipping",
                track.number,
                backing.display()
            );
            continue;
        };
        let artist = track
            .tag("PERFORMER")
            .filter(|performer| !performer.is_empty())
            .unwrap_or(album_artist);

        let meta = TrackMeta {
            artist: artist.to_string(),
            album: album.to_string(),
            disc,
            track: track.number,
            title: title.to_string(),
        };
        let name = format!(
            "{} - {} - {}{:02}  {}.wav",
            meta.artist, meta.album, disc, track.number, meta.title
        )
        .replace('/', " ");

        overlay.tracks.insert(
            name.clone(),
            VirtualTrack {
                name,
                source: split::encode(backing, &start, &end),
                meta,
            },
        );
    }
}

/// Album-level PERFORMER, falling back to the performer of track 1 of
/// the first file, then to "Unknown".
fn album_artist(sheet: &CueSheet) -> String {
    sheet
        .tag("PERFORMER")
        .filter(|performer| !performer.is_empty())
        .or_else(|| {
            sheet
                .files
                .first()
                .and_then(|file| file.tracks.iter().find(|track| track.number == 1))
                .and_then(|track| track.tag("PERFORMER"))
                .filter(|performer| !performer.is_empty())
        })
        .unwrap_or("Unknown")
        .to_string()
}

/// Multi-disc sets name their files "… Disc N"; anything else is disc 1.
fn disc_number(file_name: &str) -> u32 {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    let mut tokens = stem.split_whitespace().rev();
    let number = tokens.next().and_then(|token| token.parse().ok());
    match (tokens.next(), number) {
        (Some("Disc"), Some(number)) => number,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::{disc_number, expand_directory, find_virtual};
    use std::fs;

    const TWO_TRACKS: &str = r#"PERFORMER "Artist"
TITLE "Album"
FILE "Artist - Album.flac" WAVE
  TRACK 01 AUDIO
    TITLE "Opener"
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    TITLE "Closer"
    INDEX 01 03:14:17
"#;

    #[test]
    fn disc_numbers_come_from_the_stem() {
        assert_eq!(disc_number("Artist - Album Disc 2.flac"), 2);
        assert_eq!(disc_number("Artist - Album Disc 12.flac"), 12);
        assert_eq!(disc_number("Artist - Album.flac"), 1);
        assert_eq!(disc_number("Disc.flac"), 1);
        assert_eq!(disc_number("x.flac"), 1);
    }

    #[test]
    fn expands_tracks_and_hides_backing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("album.cue"), TWO_TRACKS).unwrap();
        fs::write(dir.path().join("Artist - Album.flac"), b"flac").unwrap();

        let overlay = expand_directory(dir.path()).unwrap();
        assert!(overlay.hidden.contains("Artist - Album.flac"));
        assert_eq!(overlay.tracks.len(), 2);

        let opener = &overlay.tracks["Artist - Album - 101  Opener.wav"];
        assert_eq!(
            opener.source,
            dir.path()
                .join("Artist - Album.flaccuesplit.00:00:00.03:14:17.flac")
        );
        assert_eq!(opener.meta.artist, "Artist");
        assert_eq!(opener.meta.track, 1);

        let closer = &overlay.tracks["Artist - Album - 102  Closer.wav"];
        assert_eq!(
            closer.source,
            dir.path()
                .join("Artist - Album.flaccuesplit.03:14:17.-1.flac")
        );
    }

    #[test]
    fn missing_backing_file_expands_to_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("album.cue"), TWO_TRACKS).unwrap();

        let overlay = expand_directory(dir.path()).unwrap();
        assert!(overlay.tracks.is_empty());
        assert!(overlay.hidden.is_empty());
    }

    #[test]
    fn malformed_sheet_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.cue"), "  TRACK 01 AUDIO\n").unwrap();
        fs::write(dir.path().join("good.cue"), TWO_TRACKS).unwrap();
        fs::write(dir.path().join("Artist - Album.flac"), b"flac").unwrap();

        let overlay = expand_directory(dir.path()).unwrap();
        assert_eq!(overlay.tracks.len(), 2);
    }

    #[test]
    fn slashes_in_tags_become_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = r#"PERFORMER "AC/DC"
TITLE "Album"
FILE "a.flac" WAVE
  TRACK 01 AUDIO
    TITLE "Live/Wire"
    INDEX 01 00:00:00
"#;
        fs::write(dir.path().join("album.cue"), sheet).unwrap();
        fs::write(dir.path().join("a.flac"), b"flac").unwrap();

        let overlay = expand_directory(dir.path()).unwrap();
        assert!(overlay
            .tracks
            .contains_key("AC DC - Album - 101  Live Wire.wav"));
    }

    #[test]
    fn artist_falls_back_to_first_track_then_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = r#"PERFORMER ""
TITLE "Album"
FILE "a.flac" WAVE
  TRACK 01 AUDIO
    TITLE "One"
    PERFORMER "Fallback"
    INDEX 01 00:00:00
"#;
        fs::write(dir.path().join("album.cue"), sheet).unwrap();
        fs::write(dir.path().join("a.flac"), b"flac").unwrap();

        let overlay = expand_directory(dir.path()).unwrap();
        assert!(overlay
            .tracks
            .contains_key("Fallback - Album - 101  One.wav"));

        let dir = tempfile::tempdir().unwrap();
        let sheet = r#"TITLE "Album"
FILE "a.flac" WAVE
  TRACK 01 AUDIO
    TITLE "One"
    INDEX 01 00:00:00
"#;
        fs::write(dir.path().join("album.cue"), sheet).unwrap();
        fs::write(dir.path().join("a.flac"), b"flac").unwrap();

        let overlay = expand_directory(dir.path()).unwrap();
        assert!(overlay
            .tracks
            .contains_key("Unknown - Album - 101  One.wav"));
    }

    #[test]
    fn missing_index_starts_at_previous_end() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = r#"PERFORMER "Artist"
TITLE "Album"
FILE "a.flac" WAVE
  TRACK 01 AUDIO
    TITLE "One"
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    TITLE "Two"
    INDEX 01 01:00:00
  TRACK 03 AUDIO
    TITLE "Three"
"#;
        fs::write(dir.path().join("album.cue"), sheet).unwrap();
        fs::write(dir.path().join("a.flac"), b"flac").unwrap();

        let overlay = expand_directory(dir.path()).unwrap();
        // Track 2 ends at track 3's start; track 3 has no INDEX 01, so it
        // starts at the previous resolved end.
        let two = &overlay.tracks["Artist - Album - 102  Two.wav"];
        assert_eq!(
            two.source,
            dir.path().join("a.flaccuesplit.01:00:00.-1.flac")
        );
        let three = &overlay.tracks["Artist - Album - 103  Three.wav"];
        assert_eq!(three.source, dir.path().join("a.flaccuesplit.-1.-1.flac"));
    }

    #[test]
    fn tracks_without_title_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = r#"PERFORMER "Artist"
TITLE "Album"
FILE "a.flac" WAVE
  TRACK 01 AUDIO
    TITLE "One"
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    INDEX 01 01:00:00
"#;
        fs::write(dir.path().join("album.cue"), sheet).unwrap();
        fs::write(dir.path().join("a.flac"), b"flac").unwrap();

        let overlay = expand_directory(dir.path()).unwrap();
        assert_eq!(overlay.tracks.len(), 1);
    }

    #[test]
    fn resolves_a_virtual_name_to_its_source() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("album.cue"), TWO_TRACKS).unwrap();
        fs::write(dir.path().join("Artist - Album.flac"), b"flac").unwrap();

        let track =
            find_virtual(&dir.path().join("Artist - Album - 101  Opener.wav")).unwrap();
        assert_eq!(
            track.source,
            dir.path()
                .join("Artist - Album.flaccuesplit.00:00:00.03:14:17.flac")
        );
        assert!(find_virtual(&dir.path().join("nope.wav")).is_none());
    }
}
