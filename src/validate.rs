//! Upload validation: extension allow-lists and size limits.
//!
//! Runs before any byte is written to disk, so a rejected upload leaves
//! nothing behind under the storage root.

use crate::config::Config;
use crate::error::StoreError;
use std::collections::HashSet;

/// Image extensions accepted for upload. Fixed set; thumbnail support is a
/// separate, narrower question decided in the thumbnail module.
const IMAGE_EXT_NAMES: &[&str] = &[".jpg", ".jpeg", ".png", ".ico", ".svg", ".bmp", ".gif"];

/// Upload category, selected by route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Image,
    File,
}

/// Per-category validation policy, built once from config and shared
/// read-only for the process lifetime.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    image_exts: HashSet<String>,
    image_max_size: u64,
    /// Empty set = accept any extension.
    file_exts: HashSet<String>,
    file_max_size: u64,
}

impl UploadPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            image_exts: IMAGE_EXT_NAMES.iter().map(|s| s.to_string()).collect(),
            image_max_size: config.image.max_size,
            file_exts: config
                .file
                .allow_types
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            file_max_size: config.file.max_size,
        }
    }

    /// Maximum upload size for a category, in bytes.
    pub fn max_size(&self, category: Category) -> u64 {
        match category {
            Category::Image => self.image_max_size,
            Category::File => self.file_max_size,
        }
    }

    /// Validate a declared filename and size against the category policy.
    ///
    /// Returns the normalized (lowercased, dot-prefixed) extension on
    /// success. Comparison is case-insensitive: `photo.PNG` passes as
    /// `.png`.
    pub fn check(
        &self,
        category: Category,
        filename: &str,
        declared_size: u64,
    ) -> Result<String, StoreError> {
        let ext = extension_of(filename);

        let allowed = match category {
            Category::Image => self.image_exts.contains(&ext),
            Category::File => self.file_exts.is_empty() || self.file_exts.contains(&ext),
        };
        if !allowed {
            return Err(StoreError::UnsupportedType(ext));
        }

        let limit = self.max_size(category);
        if declared_size > limit {
            return Err(StoreError::TooLarge {
                size: declared_size,
                limit,
            });
        }

        Ok(ext)
    }
}

/// Lowercased extension of a filename, including the leading dot.
/// `photo.PNG` -> `.png`; no dot -> empty string. A leading dot counts as
/// the extension (`.png` -> `.png`), so a bare-dotted name is still
/// accepted under its extension's policy.
pub fn extension_of(filename: &str) -> String {
    match filename.rfind('.') {
        Some(idx) => filename[idx..].to_lowercase(),
        None => String::new(),
    }
}
