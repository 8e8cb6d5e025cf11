use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Instant;

use crate::audio::source::FrameSource;
use crate::error::ExtractError;
use crate::waveform::reducer::{ReducerOptions, WaveformReducer};

/// Lifecycle of one extraction: `Running` moves to exactly one terminal
/// state and never changes again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// The single terminal result delivered to the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum ExtractionOutcome {
    Completed(Vec<f64>),
    Cancelled,
    Failed { code: &'static str, message: String },
}

/// Published once by the worker, together with its state transition, so
/// polling can never observe a half-written result.
struct Terminal {
    state: JobState,
    waveform: Vec<f64>,
}

struct JobShared {
    cancel: AtomicBool,
    terminal: OnceLock<Terminal>,
}

/// A background waveform extraction.
///
/// The worker thread exclusively owns the frame source and the reducer.
/// The only state shared with the caller is the cancel flag and the
/// one-shot terminal publication; the outcome channel delivers exactly
/// one value per job.
pub struct ExtractionJob {
    shared: Arc<JobShared>,
    worker: JoinHandle<()>,
}

impl ExtractionJob {
    /// Spawn the decode loop on a worker thread and return a handle plus
    /// the receiving end of the one-shot outcome channel.
    ///
    /// `open` runs on the worker; a decoder that cannot be initialized
    /// is delivered as a `Failed` outcome like any other error.
    pub fn start<S, F>(
        open: F,
        expected_points: usize,
        options: ReducerOptions,
    ) -> (Self, Receiver<ExtractionOutcome>)
    where
        S: FrameSource + 'static,
        F: FnOnce() -> Result<S, ExtractError> + Send + 'static,
    {
        let shared = Arc::new(JobShared {
            cancel: AtomicBool::new(false),
            terminal: OnceLock::new(),
        });
        let (outcome_tx, outcome_rx) = mpsc::channel();

        let worker = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                let started = Instant::now();
                let outcome = match run_loop(open, expected_points, options, &shared.cancel) {
                    Ok(Some(waveform)) => {
                        log::info!(
                            "Extraction complete: {} points in {:.0?}",
                            waveform.len(),
                            started.elapsed()
                        );
                        let _ = shared.terminal.set(Terminal {
                            state: JobState::Completed,
                            waveform: waveform.clone(),
                        });
                        ExtractionOutcome::Completed(waveform)
                    }
                    Ok(None) => {
                        log::info!("Extraction cancelled after {:.0?}", started.elapsed());
                        let _ = shared.terminal.set(Terminal {
                            state: JobState::Cancelled,
                            waveform: Vec::new(),
                        });
                        ExtractionOutcome::Cancelled
                    }
                    Err(e) => {
                        log::warn!("Extraction failed: {}", e);
                        let _ = shared.terminal.set(Terminal {
                            state: JobState::Failed,
                            waveform: Vec::new(),
                        });
                        ExtractionOutcome::Failed {
                            code: e.code(),
                            message: e.to_string(),
                        }
                    }
                };
                // The caller may have dropped the receiver; delivery is
                // best-effort then.
                let _ = outcome_tx.send(outcome);
            })
        };

        (Self { shared, worker }, outcome_rx)
    }

    /// Request cancellation. Idempotent, non-blocking, and safe at any
    /// time, including after the job has already reached a terminal
    /// state; the worker observes the flag at its next loop boundary.
    #[allow(dead_code)]
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::SeqCst);
    }

    /// Current state snapshot.
    #[allow(dead_code)]
    pub fn state(&self) -> JobState {
        self.shared
            .terminal
            .get()
            .map_or(JobState::Running, |t| t.state)
    }

    /// The completed waveform, or empty while running and on every
    /// non-success terminal state. Idempotent; never recomputes.
    #[allow(dead_code)]
    pub fn data(&self) -> Vec<f64> {
        match self.shared.terminal.get() {
            Some(t) if t.state == JobState::Completed => t.waveform.clone(),
            _ => Vec::new(),
        }
    }

    /// Wait for the worker thread to exit. The outcome has already been
    /// delivered by the time this returns.
    pub fn join(self) {
        if self.worker.join().is_err() {
            log::error!("Extraction worker panicked");
        }
    }
}

/// The decode loop. Returns `Ok(None)` when cancellation was observed;
/// the frame source is dropped on every path out of here, which releases
/// the decoder exactly once.
fn run_loop<S, F>(
    open: F,
    expected_points: usize,
    options: ReducerOptions,
    cancel: &AtomicBool,
) -> Result<Option<Vec<f64>>, ExtractError>
where
    S: FrameSource,
    F: FnOnce() -> Result<S, ExtractError>,
{
    let mut source = open()?;
    let mut reducer = WaveformReducer::new(options);

    loop {
        // Cancellation is only observed at frame boundaries, never
        // mid-frame.
        if cancel.load(Ordering::SeqCst) {
            return Ok(None);
        }
        match source.next_frame()? {
            Some(frame) => reducer.add_frame(&frame),
            None => break,
        }
    }

    log::debug!("Stream ended after {} frames", reducer.frame_count());
    Ok(Some(reducer.finish(expected_points)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::PcmFrame;

    enum Step {
        Frame(PcmFrame),
        Fail(&'static str),
    }

    /// In-memory frame source that replays a fixed script; the stream
    /// ends when the script runs out. An optional gate blocks the first
    /// `next_frame` call until the test releases it.
    struct ScriptedSource {
        steps: std::vec::IntoIter<Step>,
        gate: Option<mpsc::Receiver<()>>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into_iter(),
                gate: None,
            }
        }

        fn gated(steps: Vec<Step>, gate: mpsc::Receiver<()>) -> Self {
            Self {
                steps: steps.into_iter(),
                gate: Some(gate),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<PcmFrame>, ExtractError> {
            if let Some(gate) = self.gate.take() {
                let _ = gate.recv();
            }
            match self.steps.next() {
                Some(Step::Frame(frame)) => Ok(Some(frame)),
                Some(Step::Fail(message)) => Err(ExtractError::Decode(message.into())),
                None => Ok(None),
            }
        }
    }

    fn frames(values: &[i16]) -> Vec<Step> {
        values.iter().map(|&v| Step::Frame(vec![v])).collect()
    }

    #[test]
    fn completes_and_publishes_data() {
        let steps = frames(&[3, 4, 6, 8]);
        let (job, rx) = ExtractionJob::start(
            move || Ok(ScriptedSource::new(steps)),
            2,
            ReducerOptions::default(),
        );

        let points = match rx.recv().unwrap() {
            ExtractionOutcome::Completed(points) => points,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(points.len(), 2);
        assert!((points[1] - 0.25).abs() < 1e-12);

        assert_eq!(job.state(), JobState::Completed);
        assert_eq!(job.data(), points);
        // Polling is idempotent.
        assert_eq!(job.data(), points);
        job.join();
    }

    #[test]
    fn outcome_is_delivered_exactly_once() {
        let steps = frames(&[1, 2]);
        let (job, rx) = ExtractionJob::start(
            move || Ok(ScriptedSource::new(steps)),
            2,
            ReducerOptions::default(),
        );

        assert!(matches!(
            rx.recv().unwrap(),
            ExtractionOutcome::Completed(_)
        ));
        job.join();
        // The worker has exited and its sender is gone; nothing else
        // ever arrives.
        assert!(rx.recv().is_err());
    }

    #[test]
    fn cancel_yields_cancelled_outcome_without_data() {
        let (gate_tx, gate_rx) = mpsc::channel();
        let steps = frames(&[1, 2, 3]);
        let (job, rx) = ExtractionJob::start(
            move || Ok(ScriptedSource::gated(steps, gate_rx)),
            3,
            ReducerOptions::default(),
        );

        job.cancel();
        job.cancel(); // repeated calls are a no-op
        drop(gate_tx); // release the source; the flag is already set

        assert_eq!(rx.recv().unwrap(), ExtractionOutcome::Cancelled);
        assert_eq!(job.state(), JobState::Cancelled);
        assert!(job.data().is_empty());
        job.join();
    }

    #[test]
    fn cancel_after_completion_is_a_noop() {
        let steps = frames(&[5, 5]);
        let (job, rx) = ExtractionJob::start(
            move || Ok(ScriptedSource::new(steps)),
            1,
            ReducerOptions::default(),
        );

        let points = match rx.recv().unwrap() {
            ExtractionOutcome::Completed(points) => points,
            other => panic!("unexpected outcome: {:?}", other),
        };

        job.cancel();
        assert_eq!(job.state(), JobState::Completed);
        assert_eq!(job.data(), points);
        job.join();
    }

    #[test]
    fn decode_error_midstream_fails_without_partial_data() {
        let mut steps = frames(&[7, 7, 7]);
        steps.push(Step::Fail("corrupt packet"));
        let (job, rx) = ExtractionJob::start(
            move || Ok(ScriptedSource::new(steps)),
            3,
            ReducerOptions::default(),
        );

        match rx.recv().unwrap() {
            ExtractionOutcome::Failed { code, message } => {
                assert_eq!(code, "decode");
                assert!(message.contains("corrupt packet"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(job.state(), JobState::Failed);
        assert!(job.data().is_empty());
        job.join();
    }

    #[test]
    fn decoder_init_failure_fails_the_job() {
        let (job, rx) = ExtractionJob::start(
            || Err::<ScriptedSource, _>(ExtractError::DecoderInit("bad file".into())),
            10,
            ReducerOptions::default(),
        );

        match rx.recv().unwrap() {
            ExtractionOutcome::Failed { code, .. } => assert_eq!(code, "decoder_init"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(job.state(), JobState::Failed);
        job.join();
    }
}
