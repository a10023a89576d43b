//! The batch orchestrator: drives every manifest entry through
//! fetch → verify → convert → register, then processes deprecations.
//!
//! Fault isolation is the whole point: per-entry errors are caught here,
//! logged with entry context and folded into the run report. Nothing short
//! of a manifest or auth failure aborts the batch.

use std::fmt;

use crate::checksum;
use crate::config::Config;
use crate::convert;
use crate::errors::EntryError;
use crate::fetch;
use crate::manifest::{DeprecationSpec, ImageSpec, Manifest};
use crate::openstack::{OsClient, images};
use crate::probe;

/// Per-entry progress. `Failed` can be entered from any other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Fetched,
    Verified,
    Converted,
    Registered,
    Failed,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryState::Pending => "pending",
            EntryState::Fetched => "fetched",
            EntryState::Verified => "verified",
            EntryState::Converted => "converted",
            EntryState::Registered => "registered",
            EntryState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Terminal result of one manifest entry.
#[derive(Debug)]
pub enum Outcome {
    Registered { image_id: String },
    Deprecated { touched: usize },
    /// Nothing to do; counted separately from success and failure.
    Skipped { reason: String },
    Failed { kind: &'static str, message: String },
}

#[derive(Debug)]
pub struct EntryOutcome {
    pub name: String,
    pub outcome: Outcome,
}

/// Aggregate of the whole run, rendered at the end.
#[derive(Debug, Default)]
pub struct RunReport {
    pub entries: Vec<EntryOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| {
                matches!(
                    e.outcome,
                    Outcome::Registered { .. } | Outcome::Deprecated { .. }
                )
            })
            .count()
    }

    pub fn failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Failed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Skipped { .. }))
            .count()
    }

    pub fn failure_kind(&self, name: &str) -> Option<&'static str> {
        self.entries.iter().find_map(|e| match &e.outcome {
            Outcome::Failed { kind, .. } if e.name == name => Some(*kind),
            _ => None,
        })
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "run summary: {} succeeded, {} failed, {} skipped",
            self.succeeded(),
            self.failed(),
            self.skipped()
        )?;
        for entry in &self.entries {
            match &entry.outcome {
                Outcome::Registered { image_id } => {
                    writeln!(f, "  {}: registered as {}", entry.name, image_id)?
                }
                Outcome::Deprecated { touched } => {
                    writeln!(f, "  {}: deprecated ({} image(s))", entry.name, touched)?
                }
                Outcome::Skipped { reason } => {
                    writeln!(f, "  {}: skipped ({})", entry.name, reason)?
                }
                Outcome::Failed { kind, message } => {
                    writeln!(f, "  {}: FAILED ({kind}): {message}", entry.name)?
                }
            }
        }
        Ok(())
    }
}

/// One run over one manifest. Holds the shared HTTP client for mirror
/// downloads and the authenticated cloud client.
pub struct Runner<'a> {
    cfg: &'a Config,
    os: &'a OsClient,
    http: reqwest::Client,
}

impl<'a> Runner<'a> {
    pub fn new(cfg: &'a Config, os: &'a OsClient) -> Self {
        Self {
            cfg,
            os,
            http: reqwest::Client::new(),
        }
    }

    /// Process every entry, never bailing out of the loop. New images
    /// first, then deprecations, in manifest order.
    pub async fn run(&self, manifest: &Manifest) -> RunReport {
        let mut report = RunReport::default();

        for spec in &manifest.new {
            let outcome = match self.process_image(spec).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(
                        image = %spec.image_name,
                        state = %EntryState::Failed,
                        error = %err,
                        "entry failed"
                    );
                    Outcome::Failed {
                        kind: err.kind(),
                        message: err.to_string(),
                    }
                }
            };
            report.entries.push(EntryOutcome {
                name: spec.image_name.clone(),
                outcome,
            });
        }

        for spec in &manifest.deprecated {
            let outcome = match self.process_deprecation(spec).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(image = %spec.image_name, error = %err, "deprecation failed");
                    Outcome::Failed {
                        kind: err.kind(),
                        message: err.to_string(),
                    }
                }
            };
            report.entries.push(EntryOutcome {
                name: spec.image_name.clone(),
                outcome,
            });
        }

        report
    }

    /// Fetch, verify, convert and register one image. The scratch directory
    /// (and everything downloaded or converted into it) is removed when this
    /// returns, on success and failure alike.
    async fn process_image(&self, spec: &ImageSpec) -> Result<Outcome, EntryError> {
        let mut state = EntryState::Pending;
        let filename = spec.filename();
        tracing::info!(image = %spec.image_name, filename, %state, "processing image");

        let scratch = tempfile::tempdir().map_err(|source| EntryError::Io {
            path: std::env::temp_dir(),
            source,
        })?;

        // Resolve the expected digest first; a missing checksum entry should
        // not cost a multi-gigabyte download.
        let expected = match (&spec.checksum_url, self.cfg.skip_checksum) {
            (_, true) => {
                tracing::warn!(
                    image = %spec.image_name,
                    "checksum verification disabled, trusting artifact"
                );
                None
            }
            (None, false) => {
                tracing::warn!(
                    image = %spec.image_name,
                    "no checksum_url in manifest, trusting artifact"
                );
                None
            }
            (Some(url), false) => {
                Some(fetch::fetch_expected_checksum(&self.http, url, filename).await?)
            }
        };

        let dest = scratch.path().join(filename);
        let artifact = fetch::download_file(&self.http, &spec.image_url, &dest).await?;
        state = EntryState::Fetched;
        tracing::debug!(image = %spec.image_name, %state, bytes = artifact.bytes);

        if let Some(expected) = &expected {
            let computed = checksum::sha256_file(&artifact.path).map_err(|source| {
                EntryError::Io {
                    path: artifact.path.clone(),
                    source,
                }
            })?;
            if !checksum::digests_match(expected, &computed) {
                return Err(EntryError::ChecksumMismatch {
                    path: artifact.path.clone(),
                    expected: expected.clone(),
                    computed,
                });
            }
        }
        state = EntryState::Verified;
        tracing::debug!(image = %spec.image_name, %state);

        let raw_path = convert::convert_to_raw(&artifact.path, self.cfg.debug).await?;
        state = EntryState::Converted;
        tracing::debug!(image = %spec.image_name, %state);

        let properties = images::build_properties(spec)?;
        let image = self
            .os
            .create_image(&spec.image_name, &properties, &raw_path)
            .await?;

        if let Some(host) = &spec.ping_host
            && !self.cfg.disable_ping
        {
            let reachable = probe::probe_host(host).await;
            if !reachable {
                if self.cfg.ping_strict {
                    // The uploaded image stays private so nothing advertises it.
                    return Err(EntryError::Unreachable { host: host.clone() });
                }
                tracing::warn!(
                    image = %spec.image_name,
                    host = %host,
                    "probe host unreachable, continuing (advisory mode)"
                );
            }
        }

        if spec.visibility != "private" {
            self.os
                .update_visibility(&image.id, &spec.visibility)
                .await?;
        }

        self.os
            .sweep_superseded(&spec.image_name, Some(&image.id), self.cfg.deprecate_delete)
            .await?;

        state = EntryState::Registered;
        tracing::info!(image = %spec.image_name, %state, id = %image.id);
        Ok(Outcome::Registered { image_id: image.id })
    }

    /// Deprecate or delete every cloud image matching the spec's name.
    /// A name with no matches is an idempotent no-op, not an error.
    async fn process_deprecation(&self, spec: &DeprecationSpec) -> Result<Outcome, EntryError> {
        tracing::info!(
            image = %spec.image_name,
            filename = spec.filename.as_deref().unwrap_or("-"),
            "processing deprecation"
        );
        let touched = self
            .os
            .sweep_superseded(&spec.image_name, None, self.cfg.deprecate_delete)
            .await?;
        if touched == 0 {
            tracing::info!(image = %spec.image_name, "no matching image, nothing to do");
            return Ok(Outcome::Skipped {
                reason: "no matching image".to_string(),
            });
        }
        Ok(Outcome::Deprecated { touched })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(name: &str, kind: &'static str) -> EntryOutcome {
        EntryOutcome {
            name: name.to_string(),
            outcome: Outcome::Failed {
                kind,
                message: "boom".to_string(),
            },
        }
    }

    #[test]
    fn report_counts_by_outcome() {
        let report = RunReport {
            entries: vec![
                EntryOutcome {
                    name: "a".to_string(),
                    outcome: Outcome::Registered {
                        image_id: "id-1".to_string(),
                    },
                },
                failed("b", "FetchError"),
                EntryOutcome {
                    name: "c".to_string(),
                    outcome: Outcome::Skipped {
                        reason: "no matching image".to_string(),
                    },
                },
                EntryOutcome {
                    name: "d".to_string(),
                    outcome: Outcome::Deprecated { touched: 2 },
                },
            ],
        };
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failure_kind("b"), Some("FetchError"));
        assert_eq!(report.failure_kind("a"), None);
    }

    #[test]
    fn report_renders_summary_line() {
        let report = RunReport {
            entries: vec![failed("Test", "ChecksumNotFoundError")],
        };
        let rendered = report.to_string();
        assert!(rendered.contains("0 succeeded, 1 failed, 0 skipped"));
        assert!(rendered.contains("Test: FAILED (ChecksumNotFoundError)"));
    }

    #[test]
    fn entry_states_display() {
        assert_eq!(EntryState::Pending.to_string(), "pending");
        assert_eq!(EntryState::Registered.to_string(), "registered");
        assert_eq!(EntryState::Failed.to_string(), "failed");
    }
}
