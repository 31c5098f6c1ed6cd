use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::config::Config;
use crate::content;
use crate::error::UploadError;
use crate::filename;

const COPY_BUF_SIZE: usize = 64 * 1024;

/// One upload, whatever endpoint it came in through.
pub struct UploadRequest<R> {
    pub key: String,
    /// Read once, front to back.
    pub input: R,
    pub filename: String,
    pub random_filename: bool,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub file_url: String,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

/// Validate, name and store one payload under `config`.
pub async fn upload<R>(request: UploadRequest<R>, config: &Config) -> Result<UploadResult, UploadError>
where
    R: AsyncRead,
{
    let UploadRequest {
        key,
        input,
        filename: declared,
        random_filename,
        mut content_type,
    } = request;

    if !config.keys.validate(&key) {
        return Err(UploadError::InvalidKey);
    }

    if content_type.is_empty() {
        content_type = content::resolve_type(None, &declared, None);
    }

    let filename = filename::decide_filename(&declared, random_filename, &content_type)?;
    let target = config.upload_path.join(&filename);
    let temp = temp_path(&config.upload_path);

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp)
        .await
        .map_err(UploadError::StorageOpen)?;

    tokio::pin!(input);
    let size = match copy_to_file(&mut input, &mut file).await {
        Ok(size) => size,
        Err(e) => {
            drop(file);
            discard(&temp).await;
            return Err(e);
        }
    };
    drop(file);

    if let Err(source) = fs::rename(&temp, &target).await {
        discard(&temp).await;
        return Err(UploadError::StorageWrite {
            written: size,
            source,
        });
    }

    tracing::info!(%filename, size, content_type = %content_type, "stored upload");

    Ok(UploadResult {
        file_url: format!("{}{}", config.upload_url, filename),
        filename,
        content_type,
        size,
    })
}

/// Hidden file in the storage directory, unique per attempt. The name has a
/// fixed length so any name that fits the directory also fits its temp file.
fn temp_path(dir: &Path) -> PathBuf {
    dir.join(format!(".{}.part", uuid::Uuid::new_v4().simple()))
}

async fn copy_to_file<R>(input: &mut R, file: &mut File) -> Result<u64, UploadError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut written = 0u64;
    let fail = |written, source| UploadError::StorageWrite { written, source };

    loop {
        let n = match input.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(fail(written, e)),
        };
        file.write_all(&buf[..n]).await.map_err(|e| fail(written, e))?;
        written += n as u64;
    }

    file.flush().await.map_err(|e| fail(written, e))?;
    file.sync_all().await.map_err(|e| fail(written, e))?;
    Ok(written)
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove partial upload");
    }
}
