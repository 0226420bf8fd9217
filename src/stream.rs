//! Streaming conversion API: emit converted files as they arrive.
//!
//! [`convert_stream`] sends the files one at a time, in input order, and
//! yields each converted blob as soon as its response is in. The stream ends
//! right after the first error; later files are never sent. The orchestrator
//! in [`crate::convert`] is built on top of this and adds result ownership
//! and the busy flag; use the stream directly when you want to write each
//! output somewhere as soon as it exists.

use crate::error::ImgConvError;
use crate::params::ConversionParams;
use crate::progress::ProgressCallback;
use crate::selection::SelectedFile;
use crate::service::ConversionService;
use futures::stream;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::warn;

/// One converted file, before it is given a preview URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedBlob {
    /// 0-indexed position of the source file in the batch.
    pub index: usize,
    /// Name of the source file.
    pub source_name: String,
    /// Declared output format (from the request parameters).
    pub format: String,
    pub bytes: Vec<u8>,
}

/// A boxed stream of per-file conversion results.
pub type ConvertStream<'a> =
    Pin<Box<dyn Stream<Item = Result<ConvertedBlob, ImgConvError>> + Send + 'a>>;

/// Convert `files` one after the other, yielding results in input order.
///
/// `progress` receives `on_file_start` before each request and
/// `on_file_complete` / `on_file_error` after it. Batch-level events are the
/// caller's business.
pub fn convert_stream<'a, S: ConversionService>(
    service: &'a S,
    files: &'a [SelectedFile],
    params: &'a ConversionParams,
    progress: ProgressCallback,
) -> ConvertStream<'a> {
    let total = files.len();

    let s = stream::unfold((0usize, false), move |(index, halted)| {
        let progress = progress.clone();
        async move {
            if halted || index >= total {
                return None;
            }
            let file = &files[index];
            progress.on_file_start(index + 1, total, file.name());

            match service.convert(file, params).await {
                Ok(bytes) => {
                    progress.on_file_complete(index + 1, total, bytes.len());
                    let blob = ConvertedBlob {
                        index,
                        source_name: file.name().to_string(),
                        format: params.format.clone(),
                        bytes,
                    };
                    Some((Ok(blob), (index + 1, false)))
                }
                Err(e) => {
                    warn!("File {}/{} ({}) failed: {}", index + 1, total, file.name(), e);
                    progress.on_file_error(index + 1, total, &e.user_detail());
                    Some((Err(e), (index + 1, true)))
                }
            }
        }
    });

    Box::pin(s)
}
