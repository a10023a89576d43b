//! Image API v2 operations: create + upload, lookup, visibility patch,
//! delete, and the sweep that retires superseded versions of an image.

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::Path;
use tokio_util::io::ReaderStream;

use super::client::OsClient;
use crate::errors::EntryError;
use crate::manifest::ImageSpec;

const PATCH_MEDIA_TYPE: &str = "application/openstack-images-v2.1-json-patch";
const TOKEN_HEADER: &str = "X-Auth-Token";

/// The deprecation convention: demoted images stay bootable for whoever
/// still references them, but disappear from the default listings.
pub const DEPRECATED_VISIBILITY: &str = "community";

/// The cloud's representation of an image. Never cached across runs.
#[derive(Debug, Clone, Deserialize)]
pub struct OsImage {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub status: String,
    pub visibility: String,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(flatten)]
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ImageList {
    images: Vec<OsImage>,
}

/// Merge the injected defaults with the manifest's property bag. Explicit
/// manifest values win. Only scalar values are accepted; the Image API
/// stores additional properties as strings.
pub fn build_properties(spec: &ImageSpec) -> Result<BTreeMap<String, String>, EntryError> {
    let mut props = BTreeMap::new();
    props.insert(
        "description".to_string(),
        "To find out which user to login with: ssh in as root.".to_string(),
    );
    props.insert("os_type".to_string(), spec.os_type.clone());
    props.insert("hw_vif_multiqueue_enabled".to_string(), "true".to_string());
    if let Some(distro) = &spec.distro {
        props.insert("os_distro".to_string(), distro.clone());
    }
    for (key, value) in &spec.properties {
        let rendered = match value {
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            _ => return Err(EntryError::InvalidProperty { key: key.clone() }),
        };
        props.insert(key.clone(), rendered);
    }
    Ok(props)
}

fn transport(context: &str) -> impl FnOnce(reqwest::Error) -> EntryError + '_ {
    move |source| EntryError::CloudTransport {
        context: context.to_string(),
        source,
    }
}

async fn expect_success(
    res: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, EntryError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let detail = res.text().await.unwrap_or_default();
    Err(EntryError::CloudApi {
        context: context.to_string(),
        status: status.as_u16(),
        detail,
    })
}

impl OsClient {
    /// Create an image record and upload the raw artifact into it.
    ///
    /// The image is created `private`; the orchestrator promotes it to its
    /// declared visibility only after the post-upload gates pass.
    pub async fn create_image(
        &self,
        name: &str,
        properties: &BTreeMap<String, String>,
        raw_path: &Path,
    ) -> Result<OsImage, EntryError> {
        let mut body = json!({
            "name": name,
            "disk_format": "raw",
            "container_format": "bare",
            "visibility": "private",
        });
        for (key, value) in properties {
            body[key.as_str()] = Value::String(value.clone());
        }

        let url = self.image_url("v2/images");
        let res = self
            .http
            .post(&url)
            .header(TOKEN_HEADER, &self.token)
            .json(&body)
            .send()
            .await
            .map_err(transport("create image record"))?;
        let created: OsImage = expect_success(res, "create image record")
            .await?
            .json()
            .await
            .map_err(transport("parse created image"))?;

        tracing::info!(id = %created.id, name, "image record created, uploading data");

        let file = tokio::fs::File::open(raw_path)
            .await
            .map_err(|source| EntryError::Io {
                path: raw_path.to_path_buf(),
                source,
            })?;
        let len = file
            .metadata()
            .await
            .map_err(|source| EntryError::Io {
                path: raw_path.to_path_buf(),
                source,
            })?
            .len();

        let upload_url = self.image_url(&format!("v2/images/{}/file", created.id));
        let res = self
            .http
            .put(&upload_url)
            .header(TOKEN_HEADER, &self.token)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, len)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(transport("upload image data"))?;
        expect_success(res, "upload image data").await?;

        let uploaded = self.get_image(&created.id).await?;
        if uploaded.status != "active" {
            return Err(EntryError::CloudApi {
                context: format!("image {} after upload", created.id),
                status: 0,
                detail: format!("status is '{}', expected 'active'", uploaded.status),
            });
        }
        Ok(uploaded)
    }

    pub async fn get_image(&self, id: &str) -> Result<OsImage, EntryError> {
        let url = self.image_url(&format!("v2/images/{id}"));
        let res = self
            .http
            .get(&url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(transport("get image"))?;
        expect_success(res, "get image")
            .await?
            .json()
            .await
            .map_err(transport("parse image"))
    }

    /// All images with the given exact name. An empty result is not an
    /// error; the deprecation workflow treats it as a no-op.
    pub async fn find_images(&self, name: &str) -> Result<Vec<OsImage>, EntryError> {
        let url = self.image_url("v2/images");
        let res = self
            .http
            .get(&url)
            .query(&[("name", name)])
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(transport("list images"))?;
        let list: ImageList = expect_success(res, "list images")
            .await?
            .json()
            .await
            .map_err(transport("parse image list"))?;
        Ok(list.images)
    }

    pub async fn update_visibility(&self, id: &str, visibility: &str) -> Result<(), EntryError> {
        let url = self.image_url(&format!("v2/images/{id}"));
        let patch = json!([
            {"op": "replace", "path": "/visibility", "value": visibility}
        ]);
        let res = self
            .http
            .patch(&url)
            .header(TOKEN_HEADER, &self.token)
            .header(CONTENT_TYPE, PATCH_MEDIA_TYPE)
            .body(patch.to_string())
            .send()
            .await
            .map_err(transport("update visibility"))?;
        expect_success(res, "update visibility").await?;
        Ok(())
    }

    pub async fn delete_image(&self, id: &str) -> Result<(), EntryError> {
        let url = self.image_url(&format!("v2/images/{id}"));
        let res = self
            .http
            .delete(&url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(transport("delete image"))?;
        expect_success(res, "delete image").await?;
        Ok(())
    }

    /// Retire every image named `name` except `keep`: delete when asked to,
    /// otherwise demote to community visibility. Returns how many images
    /// were touched; zero is the idempotent no-op case.
    pub async fn sweep_superseded(
        &self,
        name: &str,
        keep: Option<&str>,
        delete: bool,
    ) -> Result<usize, EntryError> {
        let mut touched = 0;
        for image in self.find_images(name).await? {
            if keep == Some(image.id.as_str()) {
                continue;
            }
            if delete {
                tracing::info!(id = %image.id, name, "deleting superseded image");
                self.delete_image(&image.id).await?;
            } else if image.visibility != DEPRECATED_VISIBILITY {
                tracing::info!(id = %image.id, name, "demoting superseded image to community");
                self.update_visibility(&image.id, DEPRECATED_VISIBILITY)
                    .await?;
            } else {
                continue;
            }
            touched += 1;
        }
        Ok(touched)
    }
}
