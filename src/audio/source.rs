use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::ExtractError;

/// One decode unit: a block of signed 16-bit mono PCM samples.
pub type PcmFrame = Vec<i16>;

/// A pull-based source of PCM frames bound to one audio file.
///
/// `Ok(None)` signals end of stream; no frame is ever returned twice.
/// Dropping the source releases decoder resources, and the extraction
/// worker owns its source, so the release runs exactly once on every
/// exit path (completion, cancellation, or failure).
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<PcmFrame>, ExtractError>;
}

/// Frame source backed by symphonia's probe/demux/decode pipeline.
pub struct SymphoniaSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: usize,
}

impl SymphoniaSource {
    /// Open `path` and prepare the first audio track for decoding.
    ///
    /// Every failure here is a `DecoderInit` error: the job never starts
    /// producing frames from a file it cannot parse.
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        let file = std::fs::File::open(path).map_err(|e| {
            ExtractError::DecoderInit(format!("failed to open {}: {}", path.display(), e))
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| ExtractError::DecoderInit(format!("unsupported format: {}", e)))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| ExtractError::DecoderInit("no audio track found".into()))?;

        let track_id = track.id;
        let channels = track.codec_params.channels.map_or(1, |c| c.count());

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| ExtractError::DecoderInit(format!("failed to create decoder: {}", e)))?;

        log::debug!("Opened {} ({} channel(s))", path.display(), channels);

        Ok(Self {
            format,
            decoder,
            track_id,
            channels,
        })
    }
}

impl FrameSource for SymphoniaSource {
    fn next_frame(&mut self) -> Result<Option<PcmFrame>, ExtractError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(ExtractError::Decode(format!("demux error: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            // A corrupt packet is terminal for the extraction; frames
            // read so far are discarded by the job.
            let decoded = self
                .decoder
                .decode(&packet)
                .map_err(|e| ExtractError::Decode(format!("corrupt packet: {}", e)))?;

            let num_frames = decoded.frames();
            if num_frames == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<i16>::new(num_frames as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            let samples = sample_buf.samples();

            // Downmix to mono
            let frame: PcmFrame = if self.channels == 1 {
                samples.to_vec()
            } else {
                samples
                    .chunks(self.channels)
                    .map(|s| {
                        (s.iter().map(|&v| i32::from(v)).sum::<i32>() / self.channels as i32) as i16
                    })
                    .collect()
            };

            return Ok(Some(frame));
        }
    }
}
