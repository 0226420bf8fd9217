//! # imgconv
//!
//! Client for a remote image conversion service.
//!
//! The service does the real work (decoding, resizing, grayscale, encoding).
//! This crate is everything on the client side of that boundary: collecting
//! image files, keeping previews for them, validating conversion parameters,
//! sending the files one by one, and handing back the converted images as
//! individual downloads or as one zip archive.
//!
//! ## Flow
//!
//! ```text
//! files ─┐
//!        ├─ 1. Select   filter image/*, de-duplicate by (name, size), previews
//!        ├─ 2. Form     format · resize (w, h) · grayscale · quality 1–100
//!        ├─ 3. Convert  POST /convert/ per file, sequentially, abort on error
//!        └─ 4. Present  download names, thumbnails, converted_images.zip
//! ```
//!
//! Previews and converted images are ephemeral `file://` URLs owned by
//! handles; dropping the owning state releases them (see [`preview`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgconv::{App, ClientConfig, HttpConversionService, SelectedFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_env()?;
//!     let service = HttpConversionService::new(&config)?;
//!     let mut app = App::new(service, &config)?;
//!     app.load_supported_formats().await;
//!
//!     app.add_files([SelectedFile::from_path("photo.jpg").await?])?;
//!     app.form_mut().format = "webp".into();
//!     app.form_mut().quality = "75".into();
//!     app.submit().await?;
//!
//!     app.results().save_archive("converted_images.zip").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `imgconv` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod app;
pub mod config;
pub mod convert;
pub mod error;
pub mod params;
pub mod preview;
pub mod progress;
pub mod results;
pub mod selection;
pub mod service;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use app::App;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use convert::{BusyFlag, Converter};
pub use error::{ImgConvError, ValidationError};
pub use params::{ConversionParams, FormInput, Resize};
pub use preview::{PreviewEntry, PreviewStore, PreviewUrl};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use results::{ConvertedResult, DownloadLink, ResultSet};
pub use selection::{AddOutcome, SelectedFile, Selection, SelectionState};
pub use service::{load_supported_formats, ConversionService, HttpConversionService};
pub use stream::{convert_stream, ConvertStream, ConvertedBlob};
