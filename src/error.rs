use std::{error, fmt};

// -------------------------------------------------------------------------------------------------

/// Provides an enumeration of all possible errors reported by duskverb.
///
/// Errors are only ever reported by the non real-time setup functions. The audio path never
/// fails: invalid states pass audio through, invalid parameters get clamped.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    InvalidSampleRate(u32),
    InvalidBlockSize(usize),
    UnsupportedChannelLayout(usize),
    ParameterError(String),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSampleRate(sample_rate) => {
                write!(f, "Invalid sample rate: {sample_rate} Hz")
            }
            Self::InvalidBlockSize(block_size) => {
                write!(f, "Invalid block size: {block_size} frames")
            }
            Self::UnsupportedChannelLayout(channel_count) => {
                write!(
                    f,
                    "Unsupported channel layout: {channel_count} channels (only stereo is supported)"
                )
            }
            Self::ParameterError(str) => write!(f, "Invalid parameter: {str}"),
        }
    }
}
