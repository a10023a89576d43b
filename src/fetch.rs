use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;

use crate::checksum;
use crate::errors::EntryError;

/// Checksum manifests are tiny; a hung mirror should not stall the batch.
const CHECKSUM_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// A file the fetcher has written to local disk. The path lives inside a
/// per-entry scratch directory and disappears with it.
#[derive(Debug)]
pub struct DownloadedArtifact {
    pub path: PathBuf,
    pub bytes: u64,
}

fn progress_bar(total: Option<u64>, url: &str) -> ProgressBar {
    let pb = match total {
        Some(len) => ProgressBar::new(len),
        None => ProgressBar::new_spinner(),
    };
    if let Ok(style) = ProgressStyle::with_template(
        "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] \
         {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(format!("Downloading {url}"));
    pb
}

/// Stream `url` to `dest`. Fails on connection errors and on any
/// non-success HTTP status; partial files are left to the scratch-dir
/// cleanup.
pub async fn download_file(
    client: &Client,
    url: &str,
    dest: &Path,
) -> Result<DownloadedArtifact, EntryError> {
    let mut res = client
        .get(url)
        .send()
        .await
        .map_err(|source| EntryError::Fetch {
            url: url.to_string(),
            source,
        })?;

    let status = res.status();
    if !status.is_success() {
        return Err(EntryError::FetchStatus {
            url: url.to_string(),
            status,
        });
    }

    let pb = progress_bar(res.content_length(), url);

    let mut file = File::create(dest).map_err(|source| EntryError::Io {
        path: dest.to_path_buf(),
        source,
    })?;
    let mut downloaded: u64 = 0;

    while let Some(chunk) = res.chunk().await.map_err(|source| EntryError::Fetch {
        url: url.to_string(),
        source,
    })? {
        file.write_all(&chunk).map_err(|source| EntryError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    pb.finish_with_message(format!("Downloaded {url} to {}", dest.display()));
    tracing::debug!(url, bytes = downloaded, "download complete");

    Ok(DownloadedArtifact {
        path: dest.to_path_buf(),
        bytes: downloaded,
    })
}

/// Download the checksum manifest at `url` and extract the digest declared
/// for `filename`.
pub async fn fetch_expected_checksum(
    client: &Client,
    url: &str,
    filename: &str,
) -> Result<String, EntryError> {
    let res = client
        .get(url)
        .timeout(CHECKSUM_FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|source| EntryError::Fetch {
            url: url.to_string(),
            source,
        })?;

    let status = res.status();
    if !status.is_success() {
        return Err(EntryError::FetchStatus {
            url: url.to_string(),
            status,
        });
    }

    let body = res.text().await.map_err(|source| EntryError::Fetch {
        url: url.to_string(),
        source,
    })?;

    checksum::find_digest(&body, filename)
        .map(str::to_string)
        .ok_or_else(|| EntryError::ChecksumNotFound {
            filename: filename.to_string(),
            url: url.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn download_writes_body_to_dest() {
        let mut server = mockito::Server::new_async().await;
        let body = vec![7u8; 64 * 1024 + 17];
        let mock = server
            .mock("GET", "/images/test.qcow2")
            .with_body(body.clone())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("test.qcow2");
        let client = Client::new();
        let artifact = download_file(&client, &format!("{}/images/test.qcow2", server.url()), &dest)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(artifact.bytes, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn non_success_status_is_fetch_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/gone.img")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("gone.img");
        let client = Client::new();
        let err = download_file(&client, &format!("{}/gone.img", server.url()), &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, EntryError::FetchStatus { .. }));
    }

    #[tokio::test]
    async fn checksum_manifest_lookup() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/SHA256SUMS")
            .with_body("aa11  one.qcow2\nbb22  two.qcow2\n")
            .create_async()
            .await;

        let client = Client::new();
        let url = format!("{}/SHA256SUMS", server.url());
        assert_eq!(
            fetch_expected_checksum(&client, &url, "two.qcow2")
                .await
                .unwrap(),
            "bb22"
        );
        let err = fetch_expected_checksum(&client, &url, "three.qcow2")
            .await
            .unwrap_err();
        assert!(matches!(err, EntryError::ChecksumNotFound { .. }));
    }
}
