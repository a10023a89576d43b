use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Default visibility for a published image when the manifest omits one.
fn default_visibility() -> String {
    "private".to_string()
}

fn default_os_type() -> String {
    "linux".to_string()
}

/// One image to download, verify and register.
/// Serde is confined to this module tree; callers use the fields directly.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageSpec {
    pub image_name: String,
    pub image_url: String,
    /// Checksum manifest URL. When absent the artifact is trusted as-is.
    #[serde(default)]
    pub checksum_url: Option<String>,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    #[serde(default = "default_os_type")]
    pub os_type: String,
    /// Distro tag, surfaced to the cloud as the `os_distro` property.
    #[serde(default)]
    pub distro: Option<String>,
    /// Optional host to ping once the image is registered.
    #[serde(default)]
    pub ping_host: Option<String>,
    /// Free-form extra properties, merged over the injected defaults.
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl ImageSpec {
    /// Filename of the artifact, derived from the last URL path segment.
    pub fn filename(&self) -> &str {
        self.image_url
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or(self.image_url.as_str())
    }
}

/// One image to deprecate or delete.
#[derive(Debug, Clone, Deserialize)]
pub struct DeprecationSpec {
    pub image_name: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// The declarative input file: images to add and images to retire.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Manifest {
    /// `new` is the documented key; `current` is the legacy spelling.
    #[serde(default, alias = "current")]
    pub new: Vec<ImageSpec>,
    #[serde(default)]
    pub deprecated: Vec<DeprecationSpec>,
}

#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    #[error("cannot read manifest {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed manifest {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Manifest {
    /// Load and parse the manifest. Any failure here is fatal to the run;
    /// there is no partial-parse recovery.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ManifestError::Json {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_new_and_deprecated() {
        let json = r#"{
            "new": [{
                "image_name": "Debian 13",
                "image_url": "https://cloud.debian.org/images/debian-13.qcow2",
                "checksum_url": "https://cloud.debian.org/images/SHA256SUMS",
                "visibility": "public",
                "distro": "debian",
                "properties": {"hw_scsi_model": "virtio-scsi"}
            }],
            "deprecated": [{"image_name": "Debian 11", "filename": "debian-11.qcow2"}]
        }"#;
        let m: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(m.new.len(), 1);
        assert_eq!(m.deprecated.len(), 1);
        let spec = &m.new[0];
        assert_eq!(spec.filename(), "debian-13.qcow2");
        assert_eq!(spec.visibility, "public");
        assert_eq!(spec.os_type, "linux");
        assert_eq!(spec.distro.as_deref(), Some("debian"));
        assert_eq!(m.deprecated[0].filename.as_deref(), Some("debian-11.qcow2"));
    }

    #[test]
    fn accepts_legacy_current_key() {
        let json = r#"{"current": [{"image_name": "X", "image_url": "http://h/x.img"}], "deprecated": []}"#;
        let m: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(m.new.len(), 1);
        assert_eq!(m.new[0].visibility, "private");
        assert!(m.new[0].checksum_url.is_none());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Manifest::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }

    #[test]
    fn malformed_json_is_fatal() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"{\"new\": [").unwrap();
        f.flush().unwrap();
        let err = Manifest::load(f.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Json { .. }));
    }
}
