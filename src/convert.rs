//! Wrapper around the `qemu-img` CLI. Conversion itself is entirely
//! delegated; this module only builds the command lines and surfaces
//! failures.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::errors::EntryError;

/// Subset of `qemu-img info --output=json` we care about.
#[derive(Debug, Deserialize)]
struct ImageInfo {
    format: String,
}

fn command_error(program: &str, source: std::io::Error) -> EntryError {
    EntryError::Conversion {
        code: None,
        stderr: format!("failed to spawn {program}: {source}"),
    }
}

/// Probe the on-disk format of `input`. File inspection, never the
/// extension: upstream mirrors are not consistent about naming.
pub async fn inspect_format(input: &Path) -> Result<String, EntryError> {
    let output = Command::new("qemu-img")
        .args(["info", "--output=json"])
        .arg(input)
        .output()
        .await
        .map_err(|e| command_error("qemu-img", e))?;

    if !output.status.success() {
        return Err(EntryError::Conversion {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let info: ImageInfo =
        serde_json::from_slice(&output.stdout).map_err(|e| EntryError::Conversion {
            code: None,
            stderr: format!("unparseable qemu-img info output: {e}"),
        })?;
    Ok(info.format)
}

/// Convert `input` into raw format next to it, returning the output path.
/// Non-zero exit aborts the current entry with the captured stderr.
pub async fn convert_to_raw(input: &Path, show_progress: bool) -> Result<PathBuf, EntryError> {
    let source_format = inspect_format(input).await?;
    let output_path = {
        let mut p = input.as_os_str().to_owned();
        p.push(".raw");
        PathBuf::from(p)
    };

    if source_format == "raw" {
        tracing::debug!(
            input = %input.display(),
            "source already raw, raw-to-raw convert degenerates to a copy"
        );
    }

    let mut cmd = Command::new("qemu-img");
    cmd.arg("convert");
    if show_progress {
        cmd.arg("-p");
    }
    cmd.args(["-f", &source_format, "-O", "raw"])
        .arg(input)
        .arg(&output_path);

    tracing::info!(
        input = %input.display(),
        format = %source_format,
        output = %output_path.display(),
        "converting image to raw"
    );

    let output = cmd
        .output()
        .await
        .map_err(|e| command_error("qemu-img", e))?;

    if !output.status.success() {
        return Err(EntryError::Conversion {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(output_path)
}
