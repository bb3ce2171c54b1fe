//! Getting the source video into `<run_dir>/video`

use std::path::{Path, PathBuf};

use tokio::fs;

use super::{AcquiredMedia, MediaFetcher, MediaMetadata, VideoReference, FETCHED_VIDEO_EXTENSIONS};
use crate::error::AcquisitionError;
use crate::utils::{format_file_size, has_known_video_extension};

/// Download or copy the referenced video into `video_dir`
pub async fn acquire(
    reference: &VideoReference,
    video_dir: &Path,
    fetcher: &dyn MediaFetcher,
) -> Result<AcquiredMedia, AcquisitionError> {
    fs::create_dir_all(video_dir).await?;

    let path = match reference {
        VideoReference::Remote { url, raw } => {
            tracing::info!(host = url.host_str().unwrap_or_default(), "Starting download: {}", raw);
            fetcher.fetch(raw, video_dir).await?;
            find_fetched_video(video_dir).await?
        }
        VideoReference::Local { path, .. } => copy_local(path, video_dir).await?,
    };

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let size = fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
    tracing::info!("Using video: {} ({})", path.display(), format_file_size(size));

    Ok(AcquiredMedia {
        path,
        metadata: MediaMetadata {
            source: reference.raw().to_string(),
            filename,
        },
    })
}

/// First downloaded file, searching extensions in preference order
async fn find_fetched_video(video_dir: &Path) -> Result<PathBuf, AcquisitionError> {
    let mut entries = Vec::new();
    let mut dir = fs::read_dir(video_dir).await?;
    while let Some(entry) = dir.next_entry().await? {
        if entry.file_type().await?.is_file() {
            entries.push(entry.path());
        }
    }

    for ext in FETCHED_VIDEO_EXTENSIONS {
        let mut matches: Vec<&PathBuf> = entries
            .iter()
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(ext))
            })
            .collect();
        matches.sort();

        if let Some(first) = matches.first() {
            return Ok((*first).clone());
        }
    }

    Err(AcquisitionError::NoMediaFound {
        dir: video_dir.to_path_buf(),
    })
}

/// Resolve a local path and copy it into `video_dir` unless it already lives there
async fn copy_local(path: &Path, video_dir: &Path) -> Result<PathBuf, AcquisitionError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let metadata = match fs::metadata(&absolute).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AcquisitionError::NotFound(absolute));
        }
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_file() {
        return Err(AcquisitionError::NotAFile(absolute));
    }

    let source = fs::canonicalize(&absolute).await?;
    if !has_known_video_extension(&source) {
        tracing::warn!("Unrecognised video extension, continuing anyway: {}", source.display());
    }

    let file_name = source
        .file_name()
        .ok_or_else(|| AcquisitionError::NotAFile(source.clone()))?;
    let destination = fs::canonicalize(video_dir).await?.join(file_name);

    if source != destination {
        tracing::info!("Copying {} to {}", source.display(), destination.display());
        fs::copy(&source, &destination)
            .await
            .map_err(|e| AcquisitionError::CopyFailed {
                from: source.clone(),
                to: destination.clone(),
                source: e,
            })?;
    }

    Ok(destination)
}
