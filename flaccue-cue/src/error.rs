use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CueError {
    #[error("line {line}: TRACK directive before any FILE")]
    TrackBeforeFile { line: usize },

    #[error("line {line}: unexpected indentation")]
    UnexpectedIndent { line: usize },

    #[error("line {line}: malformed {directive} directive")]
    MalformedDirective { line: usize, directive: &'static str },

    #[error("first track carries no INDEX 01")]
    MissingFirstIndex,

    #[error(transparent)]
    IOError(#[from] io::Error),
}
