//! `clouds.yaml` discovery and parsing. Searched in the conventional
//! locations: working directory, user config dir, system config dir.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

fn default_domain() -> String {
    "Default".to_string()
}

/// The `auth` block of one cloud profile.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthInfo {
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub project_name: String,
    #[serde(default = "default_domain")]
    pub user_domain_name: String,
    #[serde(default = "default_domain")]
    pub project_domain_name: String,
}

/// One named entry under `clouds:`.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudProfile {
    pub auth: AuthInfo,
    #[serde(default)]
    pub region_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloudsFile {
    clouds: BTreeMap<String, CloudProfile>,
}

#[derive(thiserror::Error, Debug)]
pub enum CloudsConfigError {
    #[error("no clouds.yaml found (searched: {searched})")]
    NotFound { searched: String },
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("cloud profile '{name}' not defined in {path}")]
    UnknownProfile { name: String, path: String },
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("clouds.yaml")];
    if let Ok(xdg_dirs) = xdg::BaseDirectories::with_prefix("openstack") {
        paths.push(xdg_dirs.get_config_home().join("clouds.yaml"));
    }
    paths.push(PathBuf::from("/etc/openstack/clouds.yaml"));
    paths
}

/// Find clouds.yaml in the search path and return the named profile.
pub fn load_profile(cloud: &str) -> Result<CloudProfile, CloudsConfigError> {
    let candidates = candidate_paths();
    let Some(path) = candidates.iter().find(|p| p.is_file()) else {
        let searched = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(CloudsConfigError::NotFound { searched });
    };
    profile_from_path(path.clone(), cloud)
}

fn profile_from_path(path: PathBuf, cloud: &str) -> Result<CloudProfile, CloudsConfigError> {
    let data = fs::read_to_string(&path).map_err(|source| CloudsConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    profile_from_str(&data, cloud, &path.display().to_string())
}

fn profile_from_str(
    data: &str,
    cloud: &str,
    path: &str,
) -> Result<CloudProfile, CloudsConfigError> {
    let mut parsed: CloudsFile =
        serde_yaml::from_str(data).map_err(|source| CloudsConfigError::Yaml {
            path: path.to_string(),
            source,
        })?;
    parsed
        .clouds
        .remove(cloud)
        .ok_or_else(|| CloudsConfigError::UnknownProfile {
            name: cloud.to_string(),
            path: path.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
clouds:
  prod:
    auth:
      auth_url: https://keystone.example.net:5000/v3
      username: builder
      password: hunter2
      project_name: images
      user_domain_name: ldap
      project_domain_name: ldap
    region_name: region-a
  dev:
    auth:
      auth_url: https://dev.example.net:5000/v3
      username: dev
      password: dev
      project_name: sandbox
"#;

    #[test]
    fn parses_named_profile() {
        let p = profile_from_str(SAMPLE, "prod", "clouds.yaml").unwrap();
        assert_eq!(p.auth.auth_url, "https://keystone.example.net:5000/v3");
        assert_eq!(p.auth.user_domain_name, "ldap");
        assert_eq!(p.region_name.as_deref(), Some("region-a"));
    }

    #[test]
    fn domains_default_when_omitted() {
        let p = profile_from_str(SAMPLE, "dev", "clouds.yaml").unwrap();
        assert_eq!(p.auth.user_domain_name, "Default");
        assert_eq!(p.auth.project_domain_name, "Default");
        assert!(p.region_name.is_none());
    }

    #[test]
    fn unknown_profile_is_reported() {
        let err = profile_from_str(SAMPLE, "staging", "clouds.yaml").unwrap_err();
        assert!(matches!(err, CloudsConfigError::UnknownProfile { .. }));
    }

    #[test]
    fn malformed_yaml_is_reported() {
        let err = profile_from_str("clouds: [", "prod", "clouds.yaml").unwrap_err();
        assert!(matches!(err, CloudsConfigError::Yaml { .. }));
    }
}
