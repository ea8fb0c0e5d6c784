//! Multipart file uploads to a local directory.
//!
//! An upload runs in two phases. The whole multipart body is read first, under the configured
//! size ceiling, so an oversized request is rejected before anything touches the disk. File
//! parts are then validated and written one at a time, in the order the parser grouped them
//! (by form field name, fields in order of first appearance).
//!
//! Uploads are not transactional: when a part fails, the files already written stay on disk
//! and their records are handed back inside [`UploadFailure`].

use std::path::Path;

use axum::{extract::Request, http::header};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::instrument;

use crate::config::UploadConfig;
use crate::errors::{Error, Result};
use crate::random::random_string;
use crate::sniff::{SNIFF_LEN, detect_content_type};

/// Length of the random prefix given to renamed files
pub const RENAMED_FILE_LEN: usize = 25;

/// Metadata for one file written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Name of the file inside the target directory
    pub stored_name: String,
    /// Filename supplied by the client
    pub original_name: String,
    /// Bytes written
    pub size: u64,
}

/// A batch upload that stopped at a failing part.
///
/// `uploaded` holds the records of every file stored before the failure; those files are
/// left in place.
#[derive(Debug, ThisError)]
#[error("{error}")]
pub struct UploadFailure {
    pub uploaded: Vec<UploadedFile>,
    #[source]
    pub error: Error,
}

impl UploadFailure {
    fn new(uploaded: Vec<UploadedFile>, error: Error) -> Self {
        Self { uploaded, error }
    }
}

impl From<UploadFailure> for Error {
    fn from(failure: UploadFailure) -> Self {
        failure.error
    }
}

/// A buffered file part awaiting validation.
struct FilePart {
    original_name: String,
    data: Bytes,
}

/// Stores every file part of a multipart request in `dir`.
///
/// `dir` is created (mode 0755) if missing. With `rename`, each file is stored under a
/// 25-character random name keeping the original extension; otherwise the client's filename
/// is used as-is and a later part with the same name overwrites an earlier one.
///
/// On failure the returned [`UploadFailure`] carries the records of the files already stored.
#[instrument(skip_all, fields(dir = %dir.as_ref().display(), rename = rename))]
pub async fn upload_files(
    request: Request,
    dir: impl AsRef<Path>,
    rename: bool,
    config: &UploadConfig,
) -> std::result::Result<Vec<UploadedFile>, UploadFailure> {
    let dir = dir.as_ref();

    create_dir_if_not_exist(dir)
        .await
        .map_err(|e| UploadFailure::new(Vec::new(), e))?;

    let groups = read_file_parts(request, config.effective_max_request_size())
        .await
        .map_err(|e| UploadFailure::new(Vec::new(), e))?;

    let mut uploaded = Vec::new();
    for (field_name, parts) in groups {
        for part in parts {
            match store_part(part, dir, rename, config).await {
                Ok(file) => {
                    tracing::info!(
                        field = %field_name,
                        stored_name = %file.stored_name,
                        original_name = %file.original_name,
                        size = file.size,
                        "Stored uploaded file"
                    );
                    uploaded.push(file);
                }
                Err(error) => {
                    tracing::warn!(
                        field = %field_name,
                        stored = uploaded.len(),
                        error = %error,
                        "Upload stopped at failing file part"
                    );
                    return Err(UploadFailure::new(uploaded, error));
                }
            }
        }
    }

    tracing::info!(files = uploaded.len(), "Completed multipart upload");
    Ok(uploaded)
}

/// Stores the first file part of a multipart request in `dir`.
///
/// Fails with [`Error::NoFiles`] if the request carried no file parts.
pub async fn upload_one_file(request: Request, dir: impl AsRef<Path>, rename: bool, config: &UploadConfig) -> Result<UploadedFile> {
    let files = upload_files(request, dir, rename, config).await?;
    files.into_iter().next().ok_or(Error::NoFiles)
}

/// Creates `path` and any missing parents with mode 0755. Existing directories are left alone.
pub async fn create_dir_if_not_exist(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();

    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);

    builder
        .create(path)
        .await
        .map_err(|e| Error::io(format!("create directory {}", path.display()), e))?;

    tracing::debug!(path = %path.display(), "Upload directory ready");
    Ok(())
}

/// Reads the whole multipart body, returning file parts grouped by field name.
async fn read_file_parts(request: Request, max_size: u64) -> Result<Vec<(String, Vec<FilePart>)>> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Multipart {
            message: "request Content-Type isn't multipart/form-data".to_string(),
        })?;

    let boundary = multer::parse_boundary(content_type).map_err(|e| Error::Multipart {
        message: format!("Failed to parse multipart data: {e}"),
    })?;

    let declared_length = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Some(length) = declared_length
        && length > max_size
    {
        tracing::warn!(length, max_size, "Upload request exceeds size limit");
        return Err(Error::PayloadTooLarge { limit: max_size });
    }

    let constraints = multer::Constraints::new().size_limit(multer::SizeLimit::new().whole_stream(max_size));
    let mut multipart = multer::Multipart::with_constraints(request.into_body().into_data_stream(), boundary, constraints);

    let mut groups: Vec<(String, Vec<FilePart>)> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        // Plain form values and empty file inputs are not uploads
        let original_name = match field.file_name().map(base_name) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };
        let Some(field_name) = field.name().map(str::to_string) else {
            continue;
        };

        let data = field.bytes().await.map_err(multipart_error)?;
        tracing::debug!(field = %field_name, original_name = %original_name, size = data.len(), "Read file part");

        let part = FilePart { original_name, data };
        match groups.iter_mut().find(|(name, _)| *name == field_name) {
            Some((_, parts)) => parts.push(part),
            None => groups.push((field_name, vec![part])),
        }
    }

    Ok(groups)
}

fn multipart_error(e: multer::Error) -> Error {
    match e {
        multer::Error::StreamSizeExceeded { limit } => {
            tracing::warn!(limit, "Upload request exceeds size limit");
            Error::PayloadTooLarge { limit }
        }
        other => Error::Multipart {
            message: format!("Failed to parse multipart data: {other}"),
        },
    }
}

/// Validates one part and writes it to `dir`.
async fn store_part(part: FilePart, dir: &Path, rename: bool, config: &UploadConfig) -> Result<UploadedFile> {
    let head = &part.data[..part.data.len().min(SNIFF_LEN)];
    let content_type = detect_content_type(head);
    tracing::debug!(original_name = %part.original_name, content_type = %content_type, "Sniffed file part");

    if !config.allowed_content_types.permits(&content_type) {
        tracing::warn!(original_name = %part.original_name, content_type = %content_type, "File type not permitted");
        return Err(Error::UnsupportedFileType { content_type });
    }

    if matches!(part.original_name.as_str(), "." | "..") {
        return Err(Error::InvalidInput {
            message: format!("invalid upload filename {:?}", part.original_name),
        });
    }

    let stored_name = if rename {
        format!("{}{}", random_string(RENAMED_FILE_LEN), extension(&part.original_name))
    } else {
        part.original_name.clone()
    };

    let path = dir.join(&stored_name);
    let size = {
        let mut file = File::create(&path)
            .await
            .map_err(|e| Error::io(format!("create {}", path.display()), e))?;

        let mut reader: &[u8] = &part.data;
        let written = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| Error::io(format!("write {}", path.display()), e))?;
        file.flush()
            .await
            .map_err(|e| Error::io(format!("flush {}", path.display()), e))?;
        written
    };

    Ok(UploadedFile {
        stored_name,
        original_name: part.original_name,
        size,
    })
}

/// Final path component of a client-supplied filename.
fn base_name(file_name: &str) -> &str {
    file_name.rsplit(['/', '\\']).next().unwrap_or(file_name)
}

/// Extension of `file_name` including the leading dot, or `""`.
fn extension(file_name: &str) -> &str {
    file_name.rfind('.').map_or("", |idx| &file_name[idx..])
}
