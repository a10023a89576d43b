use clap::Parser;
use std::path::PathBuf;

/// Runtime configuration, built exactly once at startup. Components receive a
/// `&Config`; nothing else reads the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "cloud-image-sync", version, about)]
pub struct Config {
    /// Cloud profile name, looked up in clouds.yaml.
    #[arg(long, env = "IMAGESYNC_CLOUD")]
    pub cloud: String,

    /// Network the uploaded images are expected to be reachable on.
    /// Recorded in the run log so operators can cross-reference runs with
    /// their deployment tooling; no API call consumes it.
    #[arg(long, env = "IMAGESYNC_NETWORK")]
    pub network: String,

    /// Manifest file declaring images to add and deprecate.
    #[arg(long, env = "IMAGESYNC_INPUT_FILE", default_value = "input.json")]
    pub input_file: PathBuf,

    /// Append log output to this file in addition to stderr.
    #[arg(long, env = "IMAGESYNC_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Skip the reachability probe entirely.
    #[arg(long, env = "IMAGESYNC_DISABLE_PING")]
    pub disable_ping: bool,

    /// Treat an unreachable probe host as a failure instead of a warning.
    #[arg(long, env = "IMAGESYNC_PING_STRICT")]
    pub ping_strict: bool,

    /// Trust downloaded artifacts without verifying their checksum.
    #[arg(long, env = "IMAGESYNC_SKIP_CHECKSUM")]
    pub skip_checksum: bool,

    /// Delete deprecated images instead of demoting them to community.
    #[arg(long, env = "IMAGESYNC_DEPRECATE_DELETE")]
    pub deprecate_delete: bool,

    /// Verbose output from external commands and debug-level logs.
    #[arg(long, env = "IMAGESYNC_DEBUG")]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(args).expect("parse")
    }

    #[test]
    fn defaults() {
        let cfg = parse(&["cloud-image-sync", "--cloud", "prod", "--network", "lan"]);
        assert_eq!(cfg.cloud, "prod");
        assert_eq!(cfg.network, "lan");
        assert_eq!(cfg.input_file, PathBuf::from("input.json"));
        assert!(cfg.log_file.is_none());
        assert!(!cfg.disable_ping);
        assert!(!cfg.ping_strict);
        assert!(!cfg.skip_checksum);
        assert!(!cfg.deprecate_delete);
    }

    #[test]
    fn cloud_and_network_are_required() {
        assert!(Config::try_parse_from(["cloud-image-sync", "--network", "lan"]).is_err());
        assert!(Config::try_parse_from(["cloud-image-sync", "--cloud", "prod"]).is_err());
    }

    #[test]
    fn flags_toggle() {
        let cfg = parse(&[
            "cloud-image-sync",
            "--cloud",
            "dev",
            "--network",
            "lan",
            "--skip-checksum",
            "--disable-ping",
            "--deprecate-delete",
        ]);
        assert!(cfg.skip_checksum);
        assert!(cfg.disable_ping);
        assert!(cfg.deprecate_delete);
    }
}
