use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "xlsm"];

const UPLOAD_KEYWORDS: [&str; 12] = [
    "upload",
    "submit",
    "file",
    "workbook",
    "excel",
    "spreadsheet",
    "evaluate",
    "check",
    "review",
    "assess",
    ".xlsx",
    ".xls",
];

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Please upload a valid Excel file (.xlsx, .xls, or .xlsm)")]
    UnsupportedExtension(String),

    #[error("Permission denied. Please check if the file is open in another application.")]
    PermissionDenied(PathBuf),

    #[error("Error reading file: {0}")]
    Io(#[from] std::io::Error),

    #[error("File content is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
}

/// A workbook held in memory for the duration of one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedFile {
    pub filename: String,
    #[serde(skip_serializing)]
    pub encoded_data: String,
    pub size_bytes: usize,
}

impl UploadedFile {
    pub fn from_bytes(filename: &str, bytes: &[u8]) -> Result<Self, UploadError> {
        ensure_excel_extension(filename)?;
        Ok(Self {
            filename: filename.to_string(),
            encoded_data: BASE64.encode(bytes),
            size_bytes: bytes.len(),
        })
    }

    /// Accepts content that already arrived base64-encoded (browser uploads).
    pub fn from_base64(filename: &str, encoded: &str) -> Result<Self, UploadError> {
        ensure_excel_extension(filename)?;
        let bytes = BASE64.decode(encoded.trim())?;
        Ok(Self {
            filename: filename.to_string(),
            encoded_data: BASE64.encode(&bytes),
            size_bytes: bytes.len(),
        })
    }

    pub fn size_kb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0
    }
}

/// Reads a workbook from disk. The extension is checked before any I/O.
pub fn load_workbook(path: &Path) -> Result<UploadedFile, UploadError> {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    ensure_excel_extension(&filename)?;

    if !path.exists() {
        return Err(UploadError::NotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => UploadError::PermissionDenied(path.to_path_buf()),
        ErrorKind::NotFound => UploadError::NotFound(path.to_path_buf()),
        _ => UploadError::Io(e),
    })?;

    tracing::info!(
        filename = %filename,
        size_bytes = bytes.len(),
        "Workbook loaded"
    );
    UploadedFile::from_bytes(&filename, &bytes)
}

pub fn ensure_excel_extension(filename: &str) -> Result<(), UploadError> {
    let extension = Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(UploadError::UnsupportedExtension(extension))
    }
}

/// True when the user's text suggests they want to hand in a file.
pub fn detect_upload_intent(text: &str) -> bool {
    let lowered = text.to_lowercase();
    UPLOAD_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}
