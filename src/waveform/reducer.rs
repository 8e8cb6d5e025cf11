use crate::audio::source::PcmFrame;

/// Root-sum-of-squares magnitude of a sequence: `sqrt(sum(x^2))`.
///
/// Applied at both granularities: over a frame's samples when it is
/// consumed, and again over each bucket's per-frame energies when the
/// stream ends.
pub fn root_sum_squares<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    values.into_iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// What to do with a trailing partial bucket at the end of the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TailPolicy {
    /// Emit only full buckets; leftover energies at the tail are dropped.
    /// Output length is `floor(n / bucket_size)`.
    Drop,
    /// Emit the trailing partial bucket as a final point. Output length
    /// is `ceil(n / bucket_size)`.
    Flush,
}

/// Reduction parameters.
#[derive(Clone, Copy, Debug)]
pub struct ReducerOptions {
    /// Attenuation applied after peak normalization. The output maximum
    /// for non-silent input equals this value.
    pub scale: f64,
    pub tail: TailPolicy,
}

impl Default for ReducerOptions {
    fn default() -> Self {
        Self {
            scale: 0.25,
            tail: TailPolicy::Drop,
        }
    }
}

/// Accumulates one energy value per decoded frame and reduces the
/// sequence into a bounded, normalized point list at end of stream.
///
/// The energy buffer is owned by one extraction and grows with the
/// stream; its length always equals the number of frames consumed.
pub struct WaveformReducer {
    energies: Vec<f64>,
    options: ReducerOptions,
}

impl WaveformReducer {
    pub fn new(options: ReducerOptions) -> Self {
        Self {
            energies: Vec::new(),
            options,
        }
    }

    /// Record the energy of one frame. Pure accumulation, no failure
    /// mode; the frame is not retained.
    pub fn add_frame(&mut self, frame: &PcmFrame) {
        self.energies
            .push(root_sum_squares(frame.iter().map(|&s| f64::from(s))));
    }

    pub fn frame_count(&self) -> usize {
        self.energies.len()
    }

    /// Reduce the accumulated energies into at most `expected_points`
    /// normalized points.
    ///
    /// `bucket_size` is `n / expected_points` (floor). When
    /// `expected_points > n` the whole sequence collapses into a single
    /// bucket: the output is one point, a documented reduced length
    /// rather than an error.
    pub fn finish(&self, expected_points: usize) -> Vec<f64> {
        let n = self.energies.len();
        if n == 0 {
            return Vec::new();
        }

        let mut bucket_size = n / expected_points.max(1);
        if bucket_size == 0 {
            bucket_size = n;
        }

        let representatives: Vec<f64> = match self.options.tail {
            TailPolicy::Drop => self
                .energies
                .chunks_exact(bucket_size)
                .map(|bucket| root_sum_squares(bucket.iter().copied()))
                .collect(),
            TailPolicy::Flush => self
                .energies
                .chunks(bucket_size)
                .map(|bucket| root_sum_squares(bucket.iter().copied()))
                .collect(),
        };

        let max = representatives.iter().copied().fold(0.0f64, f64::max);

        log::debug!(
            "Reduced {} energies into {} points (bucket size {}, peak {:.3})",
            n,
            representatives.len(),
            bucket_size,
            max
        );

        // Silent input: every representative is zero, so normalizing
        // would divide by zero. Emit a flat waveform instead.
        if max == 0.0 {
            return vec![0.0; representatives.len()];
        }

        representatives
            .iter()
            .map(|&r| r / max * self.options.scale)
            .collect()
    }
}
