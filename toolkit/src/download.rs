//! File downloads served as attachments.

use std::path::{Component, Path};

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::instrument;

/// Streams `dir/stored_name` to the client as an attachment named `display_name`.
///
/// Conditional and range requests (`If-Modified-Since`, `Range`, ...) are honoured, and
/// `Content-Type`/`Content-Length` come from the file. Failures such as a missing file are
/// reported through the response status rather than returned.
#[instrument(skip_all, fields(stored_name = %stored_name, display_name = %display_name))]
pub async fn download_file(request: Request, dir: impl AsRef<Path>, stored_name: &str, display_name: &str) -> Response {
    if !is_plain_file_name(stored_name) {
        tracing::debug!("Refusing download outside the directory");
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = dir.as_ref().join(stored_name);
    let mut response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };

    if response.status().is_client_error() || response.status().is_server_error() {
        tracing::debug!(status = %response.status(), "Download failed");
        return response;
    }

    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, content_disposition(display_name));
    response
}

/// `attachment; filename="<display_name>"`, with characters that can't appear in a quoted
/// header value replaced by `_`.
pub fn content_disposition(display_name: &str) -> HeaderValue {
    let sanitized: String = display_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    HeaderValue::from_str(&format!("attachment; filename=\"{sanitized}\"")).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
}
