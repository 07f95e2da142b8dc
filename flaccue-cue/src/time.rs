use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// CD frames per second; a cue INDEX time code counts in 1/75 s units.
pub const FRAMES_PER_SECOND: u32 = 75;

/// `MM:SS:FF` time code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timecode {
    pub minutes: u32,
    pub seconds: u32,
    pub frames: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid time code: {0:?}")]
pub struct TimecodeError(pub String);

impl Timecode {
    pub fn as_seconds(&self) -> f64 {
        f64::from(self.minutes) * 60.0
            + f64::from(self.seconds)
            + f64::from(self.frames) / f64::from(FRAMES_PER_SECOND)
    }
}

impl FromStr for Timecode {
    type Err = TimecodeError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let mut fields = token.split(':').map(str::parse::<u32>);
        match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(Ok(minutes)), Some(Ok(seconds)), Some(Ok(frames)), None) => Ok(Timecode {
                minutes,
                seconds,
                frames,
            }),
            _ => Err(TimecodeError(token.to_string())),
        }
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.minutes, self.seconds, self.frames
        )
    }
}
