//! Conversion parameters and the form that produces them.
//!
//! [`FormInput`] holds what the user typed, as raw strings, exactly like the
//! inputs of a web form. [`FormInput::validate`] turns it into a
//! [`ConversionParams`] or the first [`ValidationError`] it hits. Nothing here
//! touches shared state; a rejected form leaves the selection and results
//! untouched.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Output format preselected in a fresh form.
pub const DEFAULT_FORMAT: &str = "jpeg";

/// Quality preselected in a fresh form.
pub const DEFAULT_QUALITY: u8 = 80;

/// Target dimensions in pixels, both strictly positive.
///
/// Serialised as a two-element array `[width, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct Resize {
    pub width: u32,
    pub height: u32,
}

impl From<(u32, u32)> for Resize {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl From<Resize> for (u32, u32) {
    fn from(r: Resize) -> Self {
        (r.width, r.height)
    }
}

/// Parameters sent alongside every file, as the `params` multipart field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionParams {
    /// Output format, lowercase (`jpeg`, `png`, `webp`, …).
    pub format: String,
    /// Present only when both dimensions were given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resize: Option<Resize>,
    pub grayscale: bool,
    /// 1–100.
    pub quality: u8,
}

impl ConversionParams {
    /// File extension for outputs in this format.
    pub fn extension(&self) -> &str {
        extension_for(&self.format)
    }
}

/// Extension used for a declared format; `jpg` when the format is blank.
pub fn extension_for(format: &str) -> &str {
    let f = format.trim();
    if f.is_empty() {
        "jpg"
    } else {
        f
    }
}

/// Raw, unvalidated form state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormInput {
    pub format: String,
    pub width: String,
    pub height: String,
    pub grayscale: bool,
    pub quality: String,
}

impl Default for FormInput {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_string(),
            width: String::new(),
            height: String::new(),
            grayscale: false,
            quality: DEFAULT_QUALITY.to_string(),
        }
    }
}

impl FormInput {
    /// Validate the form for a submission of `file_count` files.
    ///
    /// Checks, in order, stopping at the first failure:
    /// 1. at least one file is selected;
    /// 2. if width or height is filled in, both are positive integers;
    /// 3. quality is an integer in 1–100;
    /// 4. the format is one of `supported_formats` (skipped when the list is empty).
    pub fn validate(
        &self,
        file_count: usize,
        supported_formats: &[String],
    ) -> Result<ConversionParams, ValidationError> {
        if file_count == 0 {
            return Err(ValidationError::NoFiles);
        }

        let width = self.width.trim();
        let height = self.height.trim();
        let resize = if width.is_empty() && height.is_empty() {
            None
        } else {
            match (parse_positive(width), parse_positive(height)) {
                (Some(w), Some(h)) => Some(Resize {
                    width: w,
                    height: h,
                }),
                _ => return Err(ValidationError::InvalidDimensions),
            }
        };

        let quality = match self.quality.trim().parse::<i64>() {
            Ok(q) if (1..=100).contains(&q) => q as u8,
            _ => return Err(ValidationError::InvalidQuality),
        };

        let format = self.format.trim().to_ascii_lowercase();
        if !supported_formats.is_empty()
            && !supported_formats
                .iter()
                .any(|f| f.eq_ignore_ascii_case(&format))
        {
            return Err(ValidationError::UnsupportedFormat {
                format,
                supported: supported_formats.to_vec(),
            });
        }

        Ok(ConversionParams {
            format,
            resize,
            grayscale: self.grayscale,
            quality,
        })
    }
}

fn parse_positive(s: &str) -> Option<u32> {
    s.parse::<u32>().ok().filter(|v| *v > 0)
}
