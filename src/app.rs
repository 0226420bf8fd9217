//! Top-level client state.
//!
//! [`App`] is what a view layer (terminal UI, desktop UI, CLI) holds: the
//! selection, the form, the orchestrator with its results, the list of
//! formats offered, and the two independent error messages. Every mutation
//! goes through a method here; children only ever see shared references.

use crate::config::{default_formats, ClientConfig};
use crate::convert::{BusyFlag, Converter};
use crate::error::{ImgConvError, ValidationError};
use crate::params::FormInput;
use crate::preview::PreviewStore;
use crate::progress::ProgressCallback;
use crate::results::ResultSet;
use crate::selection::{AddOutcome, SelectedFile, Selection};
use crate::service::{load_supported_formats, ConversionService};
use tracing::warn;

/// Prefix of the application error shown after a failed conversion.
pub const CONVERSION_FAILED_PREFIX: &str = "Conversion failed: ";

/// Client state for one session.
pub struct App<S> {
    selection: Selection,
    converter: Converter<S>,
    form: FormInput,
    supported_formats: Vec<String>,
    error: Option<String>,
    form_error: Option<ValidationError>,
}

impl<S: ConversionService> App<S> {
    /// Create a session with previews stored according to `config`.
    ///
    /// The format list starts as the default set until
    /// [`load_supported_formats`](Self::load_supported_formats) runs.
    pub fn new(service: S, config: &ClientConfig) -> Result<Self, ImgConvError> {
        let store = match &config.preview_dir {
            Some(dir) => PreviewStore::new_in(dir)?,
            None => PreviewStore::new()?,
        };
        Ok(Self::with_store(service, store))
    }

    pub fn with_store(service: S, store: PreviewStore) -> Self {
        Self {
            selection: Selection::new(store.clone()),
            converter: Converter::new(service, store),
            form: FormInput::default(),
            supported_formats: default_formats(),
            error: None,
            form_error: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.converter = self.converter.with_progress(progress);
        self
    }

    /// Replace the offered formats with the service's list (or the default
    /// set if the service cannot tell).
    pub async fn load_supported_formats(&mut self) -> &[String] {
        self.supported_formats = load_supported_formats(self.converter.service()).await;
        &self.supported_formats
    }

    pub fn service(&self) -> &S {
        self.converter.service()
    }

    pub fn supported_formats(&self) -> &[String] {
        &self.supported_formats
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn form(&self) -> &FormInput {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut FormInput {
        &mut self.form
    }

    pub fn results(&self) -> &ResultSet {
        self.converter.results()
    }

    pub fn is_busy(&self) -> bool {
        self.converter.is_busy()
    }

    pub fn busy_flag(&self) -> BusyFlag {
        self.converter.busy_flag()
    }

    /// Whether the submit action should be offered.
    pub fn can_submit(&self) -> bool {
        !self.selection.is_empty() && !self.is_busy()
    }

    /// Application-level error message, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Form validation error, if any.
    pub fn form_error(&self) -> Option<&ValidationError> {
        self.form_error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn dismiss_form_error(&mut self) {
        self.form_error = None;
    }

    /// Add picked or dropped files.
    ///
    /// A changed selection invalidates the current results and both error
    /// messages.
    pub fn add_files(
        &mut self,
        files: impl IntoIterator<Item = SelectedFile>,
    ) -> Result<AddOutcome, ImgConvError> {
        let outcome = self.selection.add_files(files)?;
        self.converter.clear_results();
        self.error = None;
        self.form_error = None;
        Ok(outcome)
    }

    /// Validate the form and, if it passes, convert the whole selection.
    ///
    /// Returns the number of converted results. A validation failure is
    /// recorded as the form error and sends nothing; a conversion failure is
    /// recorded as the application error.
    pub async fn submit(&mut self) -> Result<usize, ImgConvError> {
        self.form_error = None;
        let params = match self
            .form
            .validate(self.selection.len(), &self.supported_formats)
        {
            Ok(p) => p,
            Err(v) => {
                self.form_error = Some(v.clone());
                return Err(v.into());
            }
        };

        self.error = None;
        match self.converter.convert(self.selection.files(), &params).await {
            Ok(results) => Ok(results.len()),
            Err(e) => {
                warn!("Conversion failed: {}", e);
                self.error = Some(format!("{CONVERSION_FAILED_PREFIX}{}", e.user_detail()));
                Err(e)
            }
        }
    }

    /// Reset to a fresh session: no files, no previews, no results, no
    /// messages. The form keeps its values.
    pub fn clear_all(&mut self) {
        self.selection.clear();
        self.converter.clear_results();
        self.error = None;
        self.form_error = None;
    }
}
