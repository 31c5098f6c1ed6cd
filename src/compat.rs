//! Imgur compatible upload endpoint.
//!
//! Accepts the request shape of `https://api.imgur.com/3/image` so existing
//! clients only need a different base URL. The `album`, `title`,
//! `description` and `disable_audio` parameters are accepted and ignored.

use std::io::{self, Cursor};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{FromRequest, Multipart, Request, State, multipart::Field},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures::TryStreamExt;
use serde::Deserialize;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::AppState;
use crate::config::Config;
use crate::content;
use crate::error::UploadError;
use crate::handlers::{FilePart, field_reader, log_failure, multipart_error, nope, remote_addr};
use crate::models::{ImgurImageData, ImgurImageResponse};
use crate::upload::{UploadRequest, UploadResult, upload};

type Input<'a> = Pin<Box<dyn AsyncRead + Send + 'a>>;

pub fn routes() -> Router<Arc<AppState>> {
    let image = post(upload_image).fallback(nope);
    Router::new()
        .route("/compat/imgur/image", image.clone())
        .route("/compat/imgur/3/image", image.clone())
        .route("/compat/imgur/3/upload", image)
}

async fn upload_image(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let config = state.config.current();
    let remote = remote_addr(&request, &config);

    match handle(&state, &config, request).await {
        Ok(result) => {
            tracing::info!(%remote, file_url = %result.file_url, "imgur upload complete");
            (StatusCode::OK, Json(success(result))).into_response()
        }
        Err(e) => {
            log_failure(&remote, &e);
            let status = e.status_code();
            let body = ImgurImageResponse {
                success: false,
                status: status.as_u16(),
                data: ImgurImageData::default(),
            };
            (status, Json(body)).into_response()
        }
    }
}

fn success(result: UploadResult) -> ImgurImageResponse {
    let id = Path::new(&result.filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| result.filename.clone());
    let mime_type = (!result.content_type.is_empty()).then_some(result.content_type);

    ImgurImageResponse {
        success: true,
        status: StatusCode::OK.as_u16(),
        data: ImgurImageData {
            id: Some(id),
            datetime: Some(chrono::Utc::now().timestamp()),
            mime_type,
            size: Some(result.size),
            link: Some(result.file_url),
            ..Default::default()
        },
    }
}

/// Pull the upload key out of `Authorization: Bearer <key>`. Imgur's
/// anonymous `Client-ID` scheme is not supported.
pub fn bearer_key(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, key) = value.split_once(' ')?;
    (scheme == "Bearer").then(|| key.trim().to_string())
}

async fn handle(state: &Arc<AppState>, config: &Config, request: Request) -> Result<UploadResult, UploadError> {
    let key = bearer_key(request.headers()).ok_or(UploadError::InvalidKey)?;
    // Checked up front so unauthenticated callers cannot trigger fetches.
    if !config.keys.validate(&key) {
        return Err(UploadError::InvalidKey);
    }

    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|r| UploadError::bad_input(r.body_text()))?;
        upload_multipart(state, config, key, multipart).await
    } else {
        let Form(fields) = Form::<UrlencodedImage>::from_request(request, state)
            .await
            .map_err(|r| UploadError::bad_input(r.body_text()))?;
        store_form(state, config, key, ImageForm::from(fields), false).await
    }
}

/// File parts are streamed as soon as they arrive unless an earlier `type`
/// field asked for something other than a file upload.
async fn upload_multipart(
    state: &Arc<AppState>,
    config: &Config,
    key: String,
    mut multipart: Multipart,
) -> Result<UploadResult, UploadError> {
    let mut form = ImageForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "type" => form.kind = Some(field.text().await.map_err(multipart_error)?),
            "name" => form.name = Some(field.text().await.map_err(multipart_error)?),
            "image" | "video" if form.expects_file() && field.file_name().is_some() => {
                return store(config, key, form.name, Source::from_field(field)).await;
            }
            "image" => form.image = Some(FilePart::read(field).await?),
            "video" => form.video = Some(FilePart::read(field).await?),
            _ => {}
        }
    }
    store_form(state, config, key, form, true).await
}

async fn store_form(
    state: &Arc<AppState>,
    config: &Config,
    key: String,
    form: ImageForm,
    is_multipart: bool,
) -> Result<UploadResult, UploadError> {
    let kind = match form.kind.as_deref().map(str::trim) {
        Some(kind) if !kind.is_empty() => kind.to_string(),
        _ if is_multipart => "file".to_string(),
        _ => "url".to_string(),
    };

    let source = match kind.as_str() {
        "file" if is_multipart => from_file(form.image.or(form.video))?,
        "file" => return Err(UploadError::bad_input("file uploads need a multipart body")),
        "base64" => from_base64(form.image.as_ref(), form.name.as_deref())?,
        "url" => from_url(&state.http, form.image.as_ref()).await?,
        other => return Err(UploadError::bad_input(format!("unsupported upload type {:?}", other))),
    };
    store(config, key, form.name, source).await
}

async fn store(
    config: &Config,
    key: String,
    name: Option<String>,
    source: Source<'_>,
) -> Result<UploadResult, UploadError> {
    let filename = name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(source.filename);

    let request = UploadRequest {
        key,
        input: source.input,
        filename,
        random_filename: true,
        content_type: source.content_type,
    };
    upload(request, config).await
}

/// Form fields common to both body encodings.
#[derive(Default)]
struct ImageForm {
    kind: Option<String>,
    image: Option<FilePart>,
    video: Option<FilePart>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct UrlencodedImage {
    #[serde(rename = "type")]
    kind: Option<String>,
    image: Option<String>,
    name: Option<String>,
}

impl From<UrlencodedImage> for ImageForm {
    fn from(fields: UrlencodedImage) -> Self {
        Self {
            kind: fields.kind,
            image: fields.image.map(FilePart::from_text),
            video: None,
            name: fields.name,
        }
    }
}

impl ImageForm {
    fn expects_file(&self) -> bool {
        matches!(self.kind.as_deref().map(str::trim), None | Some("") | Some("file"))
    }
}

/// One of the three inputs, translated into what the pipeline needs.
struct Source<'a> {
    input: Input<'a>,
    filename: String,
    content_type: String,
}

impl<'a> Source<'a> {
    fn from_field(field: Field<'a>) -> Self {
        Self {
            filename: field.file_name().unwrap_or_default().to_string(),
            content_type: field.content_type().unwrap_or_default().to_string(),
            input: Box::pin(field_reader(field)),
        }
    }
}

fn from_file(part: Option<FilePart>) -> Result<Source<'static>, UploadError> {
    let part = part.ok_or_else(|| UploadError::bad_input("no image or video in form"))?;
    Ok(Source {
        filename: part.file_name.unwrap_or_default(),
        content_type: part.content_type.unwrap_or_default(),
        input: Box::pin(Cursor::new(part.data)),
    })
}

fn from_base64(part: Option<&FilePart>, name: Option<&str>) -> Result<Source<'static>, UploadError> {
    let text = part
        .ok_or_else(|| UploadError::bad_input("no image in form"))?
        .text()?;
    let (declared_type, bytes) = decode_base64(text)?;

    let content_type = content::resolve_type(declared_type, name.unwrap_or_default(), Some(&bytes));
    if content_type.is_empty() {
        return Err(UploadError::bad_input("no filename or mime type given"));
    }

    Ok(Source {
        input: Box::pin(Cursor::new(bytes)),
        filename: String::new(),
        content_type,
    })
}

/// Decode a plain or `data:<type>;base64,` payload. Embedded whitespace
/// (line wrapping) is ignored.
pub fn decode_base64(text: &str) -> Result<(Option<&str>, Vec<u8>), UploadError> {
    let text = text.trim();
    let (declared_type, encoded) = match text.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
        Some((meta, data)) => {
            let mime = meta.strip_suffix(";base64").filter(|m| !m.is_empty());
            (mime, data)
        }
        None => (None, text),
    };

    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(UploadError::bad_input("empty base64 payload"));
    }
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| UploadError::bad_input(format!("bad base64: {}", e)))?;
    Ok((declared_type, bytes))
}

async fn from_url(client: &reqwest::Client, part: Option<&FilePart>) -> Result<Source<'static>, UploadError> {
    let raw = part
        .ok_or_else(|| UploadError::bad_input("no image URL in form"))?
        .text()?
        .trim();
    let url = reqwest::Url::parse(raw).map_err(|e| UploadError::bad_input(format!("bad URL: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(UploadError::bad_input(format!("unsupported URL scheme {}", url.scheme())));
    }

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| UploadError::bad_input(format!("fetch failed: {}", e)))?;
    if response.status() != reqwest::StatusCode::OK {
        return Err(UploadError::bad_input(format!(
            "fetch returned status {}",
            response.status().as_u16()
        )));
    }

    let filename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default()
        .to_string();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let stream = response.bytes_stream().map_err(io::Error::other);

    Ok(Source {
        input: Box::pin(StreamReader::new(stream)),
        filename,
        content_type,
    })
}
