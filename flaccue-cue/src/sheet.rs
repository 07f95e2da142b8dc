use std::collections::{BTreeMap, HashMap};

/// Parsed form of one cue sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CueSheet {
    /// Album level directives, keyed by their first token.
    pub tags: HashMap<String, String>,
    pub files: Vec<FileSection>,
}

/// One FILE block and the tracks cut from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileSection {
    /// Backing file name exactly as written in the FILE directive.
    pub name: String,
    pub tags: HashMap<String, String>,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    /// 1-based track number from the TRACK directive.
    pub number: u32,
    pub tags: HashMap<String, String>,
    /// INDEX number to its `MM:SS:FF` time code, kept verbatim.
    pub index: BTreeMap<u32, String>,
}

impl CueSheet {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

impl FileSection {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

impl Track {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Time code of the given INDEX entry.
    pub fn index(&self, number: u32) -> Option<&str> {
        self.index.get(&number).map(String::as_str)
    }
}
