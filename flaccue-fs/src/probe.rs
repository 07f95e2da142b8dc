use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("not a FLAC stream")]
    NotFlac,

    #[error("STREAMINFO block missing or unusable")]
    MissingStreamInfo,

    #[error(transparent)]
    IOError(#[from] io::Error),
}

/// Audio parameters needed to size a PCM window analytically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioProperties {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Total stream duration in seconds.
    pub duration: f64,
}

impl AudioProperties {
    /// Byte length of the PCM data for a `[start, end)` window in
    /// seconds.
    pub fn window_bytes(&self, start: f64, end: f64) -> u64 {
        let bytes_per_second = f64::from(self.channels)
            * (f64::from(self.bits_per_sample) / 8.0)
            * f64::from(self.sample_rate);
        ((end - start) * bytes_per_second).round().max(0.0) as u64
    }
}

/// Supplies the audio parameters of a backing file.
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Result<AudioProperties, ProbeError>;
}

/// [MediaProbe] reading the STREAMINFO block of a FLAC file.
pub struct FlacProbe;

impl MediaProbe for FlacProbe {
    fn probe(&self, path: &Path) -> Result<AudioProperties, ProbeError> {
        let mut file = File::open(path)?;
        read_stream_info(&mut file)
    }
}

fn read_stream_info<R: Read>(reader: &mut R) -> Result<AudioProperties, ProbeError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != b"fLaC" {
        return Err(ProbeError::NotFlac);
    }

    // STREAMINFO is mandatory and always first.
    let header = reader.read_u32::<BigEndian>()?;
    if (header >> 24) & 0x7f != 0 {
        return Err(ProbeError::MissingStreamInfo);
    }

    let _min_block_size = reader.read_u16::<BigEndian>()?;
    let _max_block_size = reader.read_u16::<BigEndian>()?;
    let _min_frame_size = reader.read_u24::<BigEndian>()?;
    let _max_frame_size = reader.read_u24::<BigEndian>()?;

    let mut sample_region = [0u8; 8];
    reader.read_exact(&mut sample_region)?;
    // 20 bits
    let sample_rate = ((sample_region[0] as u32) << 12)
        + ((sample_region[1] as u32) << 4)
        + ((sample_region[2] as u32) >> 4);
    // 3 bits
    let channels = u16::from(((sample_region[2] >> 1) & 0b0000_0111) + 1);
    // 5 bits
    let bits_per_sample =
        u16::from(((sample_region[2] & 0b0000_0001) << 4) + (sample_region[3] >> 4) + 1);
    // 36 bits
    let total_samples = ((sample_region[3] as u64 & 0b0000_1111) << 32)
        + ((sample_region[4] as u64) << 24)
        + ((sample_region[5] as u64) << 16)
        + ((sample_region[6] as u64) << 8)
        + (sample_region[7] as u64);

    if sample_rate == 0 {
        return Err(ProbeError::MissingStreamInfo);
    }

    Ok(AudioProperties {
        channels,
        sample_rate,
        bits_per_sample,
        duration: total_samples as f64 / f64::from(sample_rate),
    })
}
