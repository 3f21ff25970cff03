use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::ProgressBar;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::AudioFormat;
use crate::error::{AutosubError, Result};
use crate::transcoder::Transcoder;

/// One input waiting for its audio to be extracted.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    /// Position of the input in the run; results are keyed by it.
    pub key: usize,
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: AudioFormat,
}

/// Run every job through the transcoder with at most `workers` transcoder
/// processes alive at a time.
///
/// Jobs finish in any order; the returned map is keyed by [`ExtractionJob::key`]
/// and holds exactly one entry per job.
pub async fn extract_all(
    transcoder: Arc<dyn Transcoder>,
    jobs: Vec<ExtractionJob>,
    workers: usize,
    progress: Option<ProgressBar>,
) -> HashMap<usize, Result<PathBuf>> {
    let mut results = HashMap::with_capacity(jobs.len());
    if jobs.is_empty() {
        return results;
    }

    let workers = workers.max(1);
    info!(
        "Extracting audio from {} file(s) with {} worker(s)",
        jobs.len(),
        workers
    );

    let semaphore = Arc::new(Semaphore::new(workers));
    let mut futures = FuturesUnordered::new();

    for job in jobs {
        let sem = semaphore.clone();
        let transcoder = transcoder.clone();
        let pb = progress.clone();

        futures.push(async move {
            let result = match sem.acquire().await {
                Ok(_permit) => {
                    let started = Instant::now();
                    info!("Extracting audio from {}...", job.input.display());
                    let result = transcoder
                        .extract_audio(&job.input, &job.output, job.format)
                        .await
                        .map(|_| job.output.clone());
                    debug!(
                        "Extraction of {} finished in {:.2}s",
                        job.input.display(),
                        started.elapsed().as_secs_f64()
                    );
                    result
                }
                Err(_) => Err(AutosubError::ExtractionFailure(
                    "worker pool closed".to_string(),
                )),
            };

            if let Some(ref pb) = pb {
                pb.inc(1);
            }

            (job.key, job.input, result)
        });
    }

    while let Some((key, input, result)) = futures.next().await {
        if let Err(ref e) = result {
            warn!("Extraction failed for {}: {}", input.display(), e);
        }
        results.insert(key, result);
    }

    if let Some(pb) = progress {
        pb.finish_with_message("Audio extracted");
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mux::SubtitleStyle;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records peak concurrency and fails on inputs named `bad*`.
    struct SlowTranscoder {
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl SlowTranscoder {
        fn new() -> Self {
            Self {
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transcoder for SlowTranscoder {
        async fn extract_audio(&self, input: &Path, _output: &Path, _format: AudioFormat) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            // Later inputs finish first
            let name = input.file_stem().unwrap().to_string_lossy().to_string();
            let delay = 40u64.saturating_sub(name.len() as u64 * 5);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.active.fetch_sub(1, Ordering::SeqCst);
            if name.starts_with("bad") {
                return Err(AutosubError::ExtractionFailure(name));
            }
            Ok(())
        }

        async fn mux_subtitles(
            &self,
            _video: &Path,
            _subtitles: &Path,
            _output: &Path,
            _style: &SubtitleStyle,
        ) -> Result<()> {
            unreachable!("extraction only")
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    fn jobs(names: &[&str]) -> Vec<ExtractionJob> {
        names
            .iter()
            .enumerate()
            .map(|(key, name)| ExtractionJob {
                key,
                input: PathBuf::from(format!("/in/{name}.mp4")),
                output: PathBuf::from(format!("/out/{name}.wav")),
                format: AudioFormat::Wav,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_empty_jobs() {
        let transcoder = Arc::new(SlowTranscoder::new());
        let results = extract_all(transcoder.clone(), Vec::new(), 2, None).await;
        assert!(results.is_empty());
        assert_eq!(transcoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_results_keyed_by_input() {
        let transcoder = Arc::new(SlowTranscoder::new());
        let results = extract_all(
            transcoder,
            jobs(&["a", "bb", "ccc", "dddd"]),
            4,
            None,
        )
        .await;

        assert_eq!(results.len(), 4);
        assert_eq!(
            results[&0].as_ref().unwrap(),
            &PathBuf::from("/out/a.wav")
        );
        assert_eq!(
            results[&3].as_ref().unwrap(),
            &PathBuf::from("/out/dddd.wav")
        );
    }

    #[tokio::test]
    async fn test_worker_limit_is_respected() {
        let transcoder = Arc::new(SlowTranscoder::new());
        let results = extract_all(
            transcoder.clone(),
            jobs(&["a", "b", "c", "d", "e", "f"]),
            2,
            None,
        )
        .await;

        assert_eq!(results.len(), 6);
        assert_eq!(transcoder.calls.load(Ordering::SeqCst), 6);
        assert!(transcoder.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_failure_does_not_drop_other_inputs() {
        let transcoder = Arc::new(SlowTranscoder::new());
        let results = extract_all(transcoder, jobs(&["ok1", "bad", "ok2"]), 3, None).await;

        assert_eq!(results.len(), 3);
        assert!(results[&0].is_ok());
        assert!(matches!(
            results[&1],
            Err(AutosubError::ExtractionFailure(_))
        ));
        assert!(results[&2].is_ok());
    }
}
