//! # toolkit: helpers for axum backends
//!
//! `toolkit` bundles the chores most HTTP backends end up writing by hand: persisting uploaded
//! files, decoding JSON bodies strictly, serving files as downloads, turning titles into URL
//! slugs and minting random tokens. It is a library for handlers to call, not a server: routing,
//! authentication and storage beyond the local filesystem belong to the embedding application.
//!
//! ## Uploads
//!
//! [`upload::upload_files`] reads a `multipart/form-data` request under a size ceiling, sniffs
//! each file part's content type from its leading bytes, checks it against an allowlist and
//! writes it to a target directory, optionally under a random name. A batch that fails part
//! way keeps the files already written and reports them alongside the error.
//!
//! ## JSON
//!
//! [`json::read_json`] decodes exactly one JSON document into a typed destination, rejecting
//! oversized bodies, unknown keys and trailing content with distinct [`Error`] variants.
//! [`json::write_json`] and [`json::error_json`] produce responses, using the
//! `{"error": bool, "message": string, "data"?: any}` envelope for errors.
//!
//! ## Configuration
//!
//! Limits and allowlists live in immutable [`config::UploadConfig`] and [`config::JsonConfig`]
//! values passed by reference into every call, so they can be shared freely across requests.
//!
//! ## Quick Start
//!
//! ```no_run
//! use axum::{Json, Router, extract::Request, http::StatusCode, routing::post};
//! use toolkit::{Error, UploadConfig, UploadedFile, upload::upload_files};
//!
//! async fn upload(request: Request) -> Result<(StatusCode, Json<Vec<UploadedFile>>), Error> {
//!     let config = UploadConfig::new(10 * 1024 * 1024, ["image/png", "image/jpeg"]);
//!     let files = upload_files(request, "./uploads", true, &config).await?;
//!     Ok((StatusCode::CREATED, Json(files)))
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! toolkit::telemetry::init_telemetry()?;
//! let app: Router = Router::new().route("/upload", post(upload));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod download;
pub mod errors;
pub mod json;
pub mod random;
pub mod slug;
pub mod sniff;
pub mod telemetry;
pub mod upload;

#[cfg(test)]
mod test_utils;

pub use config::{Config, ContentTypeAllowlist, JsonConfig, UploadConfig};
pub use download::download_file;
pub use errors::{Error, Result};
pub use json::{JsonResponse, StrictJson, error_json, error_json_with_status, read_json, write_json};
pub use random::random_string;
pub use slug::slugify;
pub use sniff::detect_content_type;
pub use upload::{UploadFailure, UploadedFile, create_dir_if_not_exist, upload_files, upload_one_file};
