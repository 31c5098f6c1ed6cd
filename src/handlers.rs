use std::io::{self, Cursor};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        ConnectInfo, FromRequest, Multipart, Request, State,
        multipart::{Field, MultipartError},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use bytes::Bytes;
use futures::TryStreamExt;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::AppState;
use crate::config::Config;
use crate::error::UploadError;
use crate::models::UploadResponse;
use crate::upload::{UploadRequest, UploadResult, upload};

// ─── Routes ──────────────────────────────────────────────────────

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/upload", post(upload_file).fallback(nope))
}

/// Anything but POST on an upload path is not acknowledged.
pub(crate) async fn nope() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "nope!")
}

// ─── Native Upload ───────────────────────────────────────────────

async fn upload_file(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let config = state.config.current();
    let remote = remote_addr(&request, &config);

    let result = match Multipart::from_request(request, &state).await {
        Ok(multipart) => store_form(multipart, &config).await,
        Err(rejection) => Err(UploadError::bad_input(rejection.body_text())),
    };

    match result {
        Ok(result) => {
            tracing::info!(%remote, file_url = %result.file_url, "upload complete");
            Json(UploadResponse {
                file_url: result.file_url,
            })
            .into_response()
        }
        Err(e) => {
            log_failure(&remote, &e);
            e.into_response()
        }
    }
}

/// A file part that follows `key` goes straight to disk. One that precedes it
/// is held in memory until the rest of the form has been read.
async fn store_form(mut multipart: Multipart, config: &Config) -> Result<UploadResult, UploadError> {
    let mut key = None;
    let mut random_filename = false;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "key" => key = Some(field.text().await.map_err(multipart_error)?),
            "randomname" => random_filename = field.text().await.map_err(multipart_error)? == "true",
            "file" if key.is_some() => {
                let request = UploadRequest {
                    key: key.take().unwrap_or_default(),
                    filename: field.file_name().unwrap_or_default().to_string(),
                    random_filename,
                    content_type: field.content_type().unwrap_or_default().to_string(),
                    input: field_reader(field),
                };
                return upload(request, config).await;
            }
            "file" => file = Some(FilePart::read(field).await?),
            _ => {}
        }
    }

    let key = key.unwrap_or_default();
    // An unknown key is reported before a missing file.
    if !config.keys.validate(&key) {
        return Err(UploadError::InvalidKey);
    }
    let file = file.ok_or_else(|| UploadError::bad_input("no file field in form"))?;

    let request = UploadRequest {
        key,
        input: Cursor::new(file.data),
        filename: file.file_name.unwrap_or_default(),
        random_filename,
        content_type: file.content_type.unwrap_or_default(),
    };
    upload(request, config).await
}

// ─── Shared Helpers ──────────────────────────────────────────────

/// Body of a multipart field as a reader, pulled from the request as the
/// pipeline consumes it.
pub(crate) fn field_reader(field: Field<'_>) -> impl AsyncRead + Send + '_ {
    StreamReader::new(field.map_err(io::Error::other))
}

/// A multipart field read fully into memory.
pub(crate) struct FilePart {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FilePart {
    pub(crate) async fn read(field: Field<'_>) -> Result<Self, UploadError> {
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;
        Ok(Self {
            file_name,
            content_type,
            data,
        })
    }

    pub(crate) fn from_text(text: String) -> Self {
        Self {
            file_name: None,
            content_type: None,
            data: Bytes::from(text),
        }
    }

    pub(crate) fn text(&self) -> Result<&str, UploadError> {
        std::str::from_utf8(&self.data).map_err(|_| UploadError::bad_input("field is not valid UTF-8"))
    }
}

pub(crate) fn multipart_error(e: MultipartError) -> UploadError {
    UploadError::bad_input(format!("multipart error: {}", e))
}

/// Client address for logging: the configured header if the request
/// carries it, otherwise the socket peer.
pub(crate) fn remote_addr(request: &Request, config: &Config) -> String {
    let forwarded = config
        .remote_addr_header
        .as_deref()
        .and_then(|header| request.headers().get(header))
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(value) = forwarded {
        return value.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub(crate) fn log_failure(remote: &str, error: &UploadError) {
    match error {
        UploadError::InvalidKey | UploadError::BadInput(_) | UploadError::InvalidFilename(_) => {
            tracing::warn!(%remote, error = %error, "upload rejected")
        }
        _ => tracing::error!(%remote, error = ?error, "upload failed"),
    }
}
