//! The conversion orchestrator.
//!
//! [`Converter`] owns the service handle and the one active [`ResultSet`].
//! A call to [`Converter::convert`]:
//!
//! 1. releases the previous results,
//! 2. raises the busy flag,
//! 3. sends every file in order through [`crate::stream::convert_stream`],
//! 4. on success installs the new result set; on the first failure drops
//!    what was collected so far and returns the error,
//! 5. lowers the busy flag, whichever way it ended.
//!
//! There is no cancellation and no retry. Total latency is the sum of the
//! per-file round trips.

use crate::error::ImgConvError;
use crate::params::ConversionParams;
use crate::preview::PreviewStore;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::results::{ConvertedResult, ResultSet};
use crate::selection::SelectedFile;
use crate::service::ConversionService;
use crate::stream::convert_stream;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Shared view of whether a conversion batch is in flight.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn raise(&self) -> BusyGuard {
        self.0.store(true, Ordering::SeqCst);
        BusyGuard(self.clone())
    }
}

/// Lowers the flag when dropped, including on early return.
struct BusyGuard(BusyFlag);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        (self.0).0.store(false, Ordering::SeqCst);
    }
}

/// Sequentially converts selections and owns the resulting set.
pub struct Converter<S> {
    service: S,
    store: PreviewStore,
    results: ResultSet,
    busy: BusyFlag,
    progress: ProgressCallback,
}

impl<S: ConversionService> Converter<S> {
    /// Converted results get their URLs from `store`.
    pub fn new(service: S, store: PreviewStore) -> Self {
        Self {
            service,
            store,
            results: ResultSet::default(),
            busy: BusyFlag::default(),
            progress: Arc::new(NoopProgressCallback),
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// The active result set (empty before the first success or after a
    /// failure or clear).
    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    /// A handle that can be polled while [`convert`](Self::convert) runs.
    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }

    /// Release the active result set.
    pub fn clear_results(&mut self) {
        if !self.results.is_empty() {
            debug!("Releasing {} converted results", self.results.len());
        }
        self.results = ResultSet::default();
    }

    /// Convert `files` with `params`, one request at a time.
    ///
    /// Returns the new result set, one result per input file in input order.
    /// On error no results are kept, including any from a previous call.
    pub async fn convert(
        &mut self,
        files: &[SelectedFile],
        params: &ConversionParams,
    ) -> Result<&ResultSet, ImgConvError> {
        if files.is_empty() {
            return Err(ImgConvError::EmptySelection);
        }

        self.clear_results();
        let _busy = self.busy.raise();
        let total = files.len();
        let start = Instant::now();
        info!(
            "Converting {} files to {} (quality {}, resize {:?}, grayscale {})",
            total, params.format, params.quality, params.resize, params.grayscale
        );
        self.progress.on_conversion_start(total);

        let mut collected: Vec<ConvertedResult> = Vec::with_capacity(total);
        let outcome = {
            let mut stream = convert_stream(&self.service, files, params, Arc::clone(&self.progress));
            let mut outcome = Ok(());
            while let Some(item) = stream.next().await {
                let stored = item.and_then(|blob| {
                    let url = self.store.create(&blob.bytes, params.extension())?;
                    Ok(ConvertedResult::new(url, blob.format))
                });
                match stored {
                    Ok(result) => collected.push(result),
                    Err(e) => {
                        outcome = Err(e);
                        break;
                    }
                }
            }
            outcome
        };

        let success = collected.len();
        match outcome {
            Ok(()) => {
                self.progress.on_conversion_complete(total, success);
                info!(
                    "Converted {}/{} files in {}ms",
                    success,
                    total,
                    start.elapsed().as_millis()
                );
                self.results = ResultSet::new(collected);
                Ok(&self.results)
            }
            Err(e) => {
                // Partial results are dropped here, releasing their URLs.
                drop(collected);
                self.progress.on_conversion_complete(total, success);
                info!("Conversion aborted after {}/{} files: {}", success, total, e);
                Err(e)
            }
        }
    }
}
