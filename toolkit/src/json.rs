//! Strict JSON request decoding and envelope-style responses.
//!
//! [`read_json`] accepts exactly one JSON document per body, bounded in size, and classifies
//! every failure into a dedicated [`Error`] variant. Responses go through [`write_json`], with
//! [`error_json`] rendering the canonical `{"error": true, "message": ...}` envelope.

use std::fmt::Display;

use axum::{
    body::Body,
    extract::{FromRequest, Request},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::error::Category;

use crate::config::JsonConfig;
use crate::errors::{Error, Result};

/// Envelope for every JSON response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonResponse<T = serde_json::Value> {
    pub error: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> JsonResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Decodes the request body as a single JSON document into `T`.
///
/// The body may not exceed [`JsonConfig::max_body_size`]. Unless
/// [`JsonConfig::allow_unknown_fields`] is set, object keys that `T` does not consume are
/// rejected. Anything after the first document other than whitespace is rejected.
pub async fn read_json<T: DeserializeOwned>(request: Request, config: &JsonConfig) -> Result<T> {
    let limit = config.effective_max_body_size();

    let declared_length = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Some(length) = declared_length
        && length > limit
    {
        tracing::debug!(length, limit, "JSON body exceeds size limit");
        return Err(Error::PayloadTooLarge { limit });
    }

    let body = read_body(request.into_body(), limit).await?;
    let result = decode_json(&body, config.allow_unknown_fields);
    if let Err(e) = &result {
        tracing::debug!(error = %e, body_size = body.len(), "Rejected JSON body");
    }
    result
}

/// Collects the body, failing as soon as it grows past `limit` bytes.
async fn read_body(body: Body, limit: u64) -> Result<Bytes> {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::JsonOther {
            message: format!("failed to read request body: {e}"),
        })?;

        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(Error::PayloadTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf.freeze())
}

/// Decodes exactly one JSON document from `input`.
pub fn decode_json<T: DeserializeOwned>(input: &[u8], allow_unknown_fields: bool) -> Result<T> {
    if input.iter().all(|&b| matches!(b, b' ' | b'\t' | b'\n' | b'\r')) {
        return Err(Error::JsonEmptyBody);
    }

    let mut de = serde_json::Deserializer::from_slice(input);
    let mut unknown_field: Option<String> = None;
    let mut on_ignored = |path: serde_ignored::Path| {
        if unknown_field.is_none() {
            unknown_field = Some(key_path(&path));
        }
    };

    let decoded = serde_path_to_error::deserialize::<_, T>(serde_ignored::Deserializer::new(&mut de, &mut on_ignored));
    let value = match decoded {
        Ok(value) => value,
        Err(e) => {
            let path = e.path().to_string();
            return Err(classify(e.into_inner(), path, input));
        }
    };

    if !allow_unknown_fields && let Some(field) = unknown_field {
        return Err(Error::JsonUnknownField { field });
    }

    // Only whitespace may follow the document
    de.end().map_err(|_| Error::JsonMultipleDocuments)?;

    Ok(value)
}

/// Dotted path of an ignored key, leaving out `Option` and newtype wrappers.
fn key_path(path: &serde_ignored::Path) -> String {
    use serde_ignored::Path;

    let (parent, segment) = match path {
        Path::Root => return String::new(),
        Path::Seq { parent, index } => (parent, index.to_string()),
        Path::Map { parent, key } => (parent, key.clone()),
        Path::Some { parent } | Path::NewtypeStruct { parent } | Path::NewtypeVariant { parent } => {
            return key_path(parent);
        }
    };

    match key_path(parent) {
        prefix if prefix.is_empty() => segment,
        prefix => format!("{prefix}.{segment}"),
    }
}

fn classify(e: serde_json::Error, path: String, input: &[u8]) -> Error {
    let offset = byte_offset(input, e.line(), e.column());

    match e.classify() {
        Category::Eof => Error::JsonTruncated,
        Category::Syntax => Error::JsonSyntax { offset },
        Category::Data => {
            let message = e.to_string();
            if let Some(field) = message
                .strip_prefix("unknown field `")
                .and_then(|rest| rest.split_once('`'))
                .map(|(field, _)| field.to_string())
            {
                Error::JsonUnknownField { field }
            } else if ["invalid type", "invalid value", "invalid length"]
                .iter()
                .any(|prefix| message.starts_with(prefix))
            {
                Error::JsonTypeMismatch {
                    field: (path != ".").then_some(path),
                    offset,
                }
            } else {
                Error::JsonOther { message }
            }
        }
        Category::Io => Error::JsonOther { message: e.to_string() },
    }
}

/// Converts serde_json's 1-based line/column into a byte offset.
fn byte_offset(input: &[u8], line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let line_start: usize = input.split(|&b| b == b'\n').take(line - 1).map(|l| l.len() + 1).sum();
    (line_start + column).min(input.len())
}

/// Serializes `payload` into a JSON response with the given status.
///
/// `headers` are applied first; `Content-Type: application/json` always wins.
pub fn write_json<T: Serialize + ?Sized>(status: StatusCode, payload: &T, headers: Option<HeaderMap>) -> Result<Response> {
    let body = serde_json::to_vec(payload)?;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    if let Some(headers) = headers {
        response.headers_mut().extend(headers);
    }
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Ok(response)
}

/// Error envelope response with status 400.
pub fn error_json(err: &impl Display) -> Result<Response> {
    error_json_with_status(err, StatusCode::BAD_REQUEST)
}

/// Error envelope response with an explicit status.
pub fn error_json_with_status(err: &impl Display, status: StatusCode) -> Result<Response> {
    write_json(status, &JsonResponse::<()>::error(err.to_string()), None)
}

/// Extractor that decodes the body with [`read_json`].
///
/// The [`JsonConfig`] is taken from request extensions (e.g. an `Extension` layer), falling
/// back to the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictJson<T>(pub T);

impl<T, S> FromRequest<S> for StrictJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let config = req.extensions().get::<JsonConfig>().cloned().unwrap_or_default();
        read_json(req, &config).await.map(StrictJson)
    }
}
