use thiserror::Error;

/// Failures the decode side of an extraction can surface.
///
/// Cancellation is not represented here: it is a deliberate outcome, not
/// an error. A silent input (zero peak) is handled inside the reducer and
/// never surfaces at all.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The file could not be opened or recognized as a supported audio
    /// format. No frames were produced.
    #[error("failed to initialize decoder: {0}")]
    DecoderInit(String),

    /// The stream was recognized but decoding failed partway through.
    /// Terminal for the job; frames read so far are discarded.
    #[error("decode failed: {0}")]
    Decode(String),
}

impl ExtractError {
    /// Stable tag for host-facing failure reporting.
    pub fn code(&self) -> &'static str {
        match self {
            ExtractError::DecoderInit(_) => "decoder_init",
            ExtractError::Decode(_) => "decode",
        }
    }
}
