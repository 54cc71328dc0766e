//! Multipart upload validation and persistence.
//!
//! [`UploadValidator::process`] checks the files submitted under one form
//! field against an [`UploadConstraintSet`] and, only when every file passes,
//! stores them under collision-resistant names. Checks run in a fixed order:
//!
//! 1. a required field with no files fails with `FileRequired`
//! 2. more files than allowed fails with `TooManyFiles`
//! 3. per file: size, then extension, then the sniffed content type
//!
//! Storage is all-or-nothing (see [`crate::file_storage`]).

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::Duration,
};

use axum::http::StatusCode;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::AppError,
    file_storage::{StagedUpload, StorageError},
    sniff::{essence, sniff},
    validation::{FieldNames, format_validation_errors, summarize},
};

pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

const MIB: u64 = 1 << 20;

static CONSTRAINT_FIELD_NAMES: LazyLock<FieldNames> = LazyLock::new(|| {
    FieldNames::new(&[
        ("max_size", "max_file_size"),
        ("allowed_extensions", "allowed_extensions"),
        ("allowed_content_types", "allowed_types"),
        ("field_name", "field_name"),
        ("max_files", "max_files"),
    ])
});

/// Per-route upload rules. Extensions are stored lower-cased with their
/// leading dot; content types are bare media types (`image/png`).
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct UploadConstraintSet {
    #[validate(range(min = 1, message = "Maximum file size must be at least 1 byte"))]
    pub max_size: u64,

    #[validate(length(min = 1, message = "At least one extension must be allowed"))]
    pub allowed_extensions: Vec<String>,

    #[validate(length(min = 1, message = "At least one content type must be allowed"))]
    pub allowed_content_types: Vec<String>,

    #[validate(length(min = 1, message = "Field name must not be empty"))]
    pub field_name: String,

    pub required: bool,

    #[validate(range(min = 1, max = 100, message = "Between 1 and 100 files may be allowed"))]
    pub max_files: usize,

    pub destination: PathBuf,
}

#[derive(Debug, Error)]
#[error("Invalid upload constraints: {}", summarize(.0))]
pub struct InvalidConstraints(pub BTreeMap<String, String>);

impl UploadConstraintSet {
    pub fn new(
        field_name: impl Into<String>,
        max_size: u64,
        allowed_extensions: &[&str],
        allowed_content_types: &[&str],
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            max_size,
            allowed_extensions: allowed_extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
            allowed_content_types: allowed_content_types
                .iter()
                .map(|ct| essence(ct))
                .collect(),
            field_name: field_name.into(),
            required: true,
            max_files: 1,
            destination: destination.into(),
        }
    }

    /// `file` field, 10 MiB, common images and PDF, stored in `root`.
    pub fn default_upload(root: &Path) -> Self {
        Self::new(
            "file",
            10 * MIB,
            &[".jpg", ".jpeg", ".png", ".gif", ".pdf"],
            &["image/jpeg", "image/png", "image/gif", "application/pdf"],
            root,
        )
    }

    /// `image` field, 5 MiB, stored in `root/images`.
    pub fn image_upload(root: &Path) -> Self {
        Self::new(
            "image",
            5 * MIB,
            &[".jpg", ".jpeg", ".png", ".gif", ".webp"],
            &["image/jpeg", "image/png", "image/gif", "image/webp"],
            root.join("images"),
        )
    }

    /// `document` field, 20 MiB, stored in `root/documents`.
    ///
    /// Legacy `.doc` files sniff as OLE compound storage and `.docx` files as
    /// zip containers; the extension check narrows these down.
    pub fn document_upload(root: &Path) -> Self {
        Self::new(
            "document",
            20 * MIB,
            &[".pdf", ".doc", ".docx"],
            &[
                "application/pdf",
                "application/x-ole-storage",
                "application/zip",
            ],
            root.join("documents"),
        )
    }

    /// Image rules under the `images` field, up to `max_files` files.
    pub fn multiple_image_upload(root: &Path, max_files: usize) -> Self {
        Self {
            field_name: "images".to_string(),
            max_files,
            ..Self::image_upload(root)
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    /// Validate the rule set itself, formatting errors with user-facing names.
    pub fn ensure_valid(&self) -> Result<(), InvalidConstraints> {
        self.validate()
            .map_err(|e| InvalidConstraints(format_validation_errors(&e, &CONSTRAINT_FIELD_NAMES)))
    }

    fn allows_extension(&self, ext: &str) -> bool {
        self.allowed_extensions.iter().any(|allowed| allowed == ext)
    }

    fn allows_content_type(&self, content_type: &str) -> bool {
        let detected = essence(content_type);
        self.allowed_content_types
            .iter()
            .any(|allowed| *allowed == detected)
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// One file part of a multipart body.
///
/// `size` is the full size of the part as received. When a part is larger
/// than the route allows, reading stops early and `content` may be truncated
/// or empty; such a file never reaches the content checks.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub field_name: String,
    pub file_name: String,
    pub declared_content_type: Option<String>,
    pub size: u64,
    pub content: Bytes,
}

impl IncomingFile {
    pub fn new(field_name: impl Into<String>, file_name: impl Into<String>, content: Bytes) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            declared_content_type: None,
            size: content.len() as u64,
            content,
        }
    }
}

/// File parts collected from a multipart body, in submission order.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    files: Vec<IncomingFile>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, file: IncomingFile) {
        self.files.push(file);
    }

    pub fn files(&self, field_name: &str) -> impl Iterator<Item = &IncomingFile> {
        self.files
            .iter()
            .filter(move |file| file.field_name == field_name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
impl MultipartForm {
    fn with_file(mut self, file: IncomingFile) -> Self {
        self.push(file);
        self
    }
}

/// Metadata of a file that passed every check and was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFileRecord {
    pub original_name: String,
    pub filename: String,
    pub size: u64,
    pub path: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum UploadFailure {
    #[error("File field '{field}' is required")]
    FileRequired { field: String },

    #[error("Maximum {max} files allowed, received {received}")]
    TooManyFiles { max: usize, received: usize },

    #[error("File '{file}' exceeds maximum allowed size of {max} bytes")]
    FileTooLarge { file: String, max: u64 },

    #[error("File extension '{ext}' not allowed. Allowed extensions: {}", .allowed.join(", "))]
    DisallowedExtension { ext: String, allowed: Vec<String> },

    #[error("File type '{detected}' not allowed. Allowed types: {}", .allowed.join(", "))]
    DisallowedContentType {
        detected: String,
        allowed: Vec<String>,
    },

    #[error("Failed to parse multipart form")]
    InvalidForm(String),

    #[error("Failed to create upload directory")]
    Directory(#[source] StorageError),

    #[error("Failed to save uploaded files")]
    Storage(#[source] StorageError),

    #[error("Saving uploaded files timed out")]
    TimedOut,
}

impl UploadFailure {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::FileRequired { .. } => "FileRequired",
            Self::TooManyFiles { .. } => "TooManyFiles",
            Self::FileTooLarge { .. } => "FileTooLarge",
            Self::DisallowedExtension { .. } => "DisallowedExtension",
            Self::DisallowedContentType { .. } => "DisallowedContentType",
            Self::InvalidForm(_) => crate::errors::tags::INVALID_FORM_DATA,
            Self::Directory(_) => crate::errors::tags::INTERNAL,
            Self::Storage(_) | Self::TimedOut => "StorageFailure",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Directory(_) | Self::Storage(_) | Self::TimedOut => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<UploadFailure> for AppError {
    fn from(failure: UploadFailure) -> Self {
        let status = failure.status();
        let tag = failure.tag();
        AppError::new(status, tag, failure)
    }
}

/// Applies one route's [`UploadConstraintSet`] to submitted files.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    constraints: UploadConstraintSet,
    io_timeout: Duration,
}

impl UploadValidator {
    pub fn new(constraints: UploadConstraintSet) -> Self {
        Self {
            constraints,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    pub fn constraints(&self) -> &UploadConstraintSet {
        &self.constraints
    }

    /// Run every check without touching the filesystem.
    pub fn check<'a>(&self, form: &'a MultipartForm) -> Result<Vec<&'a IncomingFile>, UploadFailure> {
        let c = &self.constraints;
        let files: Vec<&IncomingFile> = form.files(&c.field_name).collect();

        if files.is_empty() {
            if c.required {
                return Err(UploadFailure::FileRequired {
                    field: c.field_name.clone(),
                });
            }
            return Ok(files);
        }

        if files.len() > c.max_files {
            return Err(UploadFailure::TooManyFiles {
                max: c.max_files,
                received: files.len(),
            });
        }

        for file in &files {
            self.check_file(file)?;
        }

        Ok(files)
    }

    fn check_file(&self, file: &IncomingFile) -> Result<(), UploadFailure> {
        let c = &self.constraints;

        if file.size > c.max_size {
            return Err(UploadFailure::FileTooLarge {
                file: file.file_name.clone(),
                max: c.max_size,
            });
        }

        let (_, ext) = split_name(&file.file_name);
        let ext = ext.to_ascii_lowercase();
        if !c.allows_extension(&ext) {
            return Err(UploadFailure::DisallowedExtension {
                ext,
                allowed: c.allowed_extensions.clone(),
            });
        }

        // The declared content type is deliberately not consulted.
        let detected = sniff(&file.content);
        if !c.allows_content_type(detected) {
            return Err(UploadFailure::DisallowedContentType {
                detected: detected.to_string(),
                allowed: c.allowed_content_types.clone(),
            });
        }

        Ok(())
    }

    /// Validate and store the files submitted under the configured field.
    pub async fn process(&self, form: &MultipartForm) -> Result<Vec<StoredFileRecord>, UploadFailure> {
        let files = self.check(form)?;
        if files.is_empty() {
            return Ok(Vec::new());
        }

        match tokio::time::timeout(self.io_timeout, self.store(&files)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    field = %self.constraints.field_name,
                    timeout_secs = self.io_timeout.as_secs_f64(),
                    "Upload storage timed out"
                );
                Err(UploadFailure::TimedOut)
            }
        }
    }

    async fn store(&self, files: &[&IncomingFile]) -> Result<Vec<StoredFileRecord>, UploadFailure> {
        let mut upload = StagedUpload::begin(&self.constraints.destination)
            .await
            .map_err(UploadFailure::Directory)?;

        let now = Utc::now();
        let mut pending = Vec::with_capacity(files.len());
        for file in files {
            let filename = unique_filename(&file.file_name, now);
            let path = upload
                .stage(&filename, &file.content)
                .await
                .map_err(UploadFailure::Storage)?;
            debug!(original = %file.file_name, %filename, size = file.size, "Staged upload");
            pending.push((file, filename, path));
        }

        upload.commit().await.map_err(UploadFailure::Storage)?;

        let records: Vec<StoredFileRecord> = pending
            .into_iter()
            .map(|(file, filename, path)| StoredFileRecord {
                original_name: file.file_name.clone(),
                filename,
                size: file.size,
                path: path.to_string_lossy().replace('\\', "/"),
                uploaded_at: now,
            })
            .collect();

        info!(
            count = records.len(),
            dir = %self.constraints.destination.display(),
            "Stored uploaded files"
        );
        Ok(records)
    }
}

/// Split the final path segment of a client file name into base and
/// extension (with its dot). `"a/b/photo.JPG"` -> `("photo", ".JPG")`.
fn split_name(file_name: &str) -> (&str, &str) {
    let name = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    match name.rfind('.') {
        Some(idx) => name.split_at(idx),
        None => (name, ""),
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `<base>_<unix-timestamp>_<uuid-v4-simple><.ext>` with unsafe characters
/// replaced by `_`.
pub fn unique_filename(original: &str, now: DateTime<Utc>) -> String {
    let (base, ext) = split_name(original);
    let base = sanitize(base.trim_start_matches('.'));
    let base = if base.is_empty() { "file".to_string() } else { base };
    let ext = match ext.strip_prefix('.') {
        Some(rest) if !rest.is_empty() => format!(".{}", sanitize(rest)),
        _ => String::new(),
    };

    format!(
        "{base}_{}_{}{ext}",
        now.timestamp(),
        Uuid::new_v4().simple()
    )
}
