//! Pre-flight reachability probe: resolve the host, then a handful of ICMP
//! echoes via the system `ping`.

use std::net::IpAddr;
use tokio::net::lookup_host;
use tokio::process::Command;

const PROBE_COUNT: u32 = 3;
const PROBE_TIMEOUT_SECS: u32 = 2;

/// Resolve `host` to an address. A bare IP parses directly; otherwise DNS.
/// Port 0 is a lookup_host artifact, never dialed.
pub async fn resolve(host: &str) -> Option<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip);
    }
    lookup_host((host, 0))
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .map(|a| a.ip())
}

/// Send a few echo probes with a short per-probe timeout. `true` means at
/// least the final probe run exited cleanly; `false` covers unresolvable
/// hosts, a non-zero ping exit, and a missing ping binary alike.
pub async fn probe_host(host: &str) -> bool {
    let Some(ip) = resolve(host).await else {
        tracing::warn!(host, "could not resolve probe host");
        return false;
    };

    let result = Command::new("ping")
        .args([
            "-c",
            &PROBE_COUNT.to_string(),
            "-W",
            &PROBE_TIMEOUT_SECS.to_string(),
        ])
        .arg(ip.to_string())
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => {
            tracing::debug!(host, %ip, "probe ok");
            true
        }
        Ok(out) => {
            tracing::debug!(host, %ip, code = ?out.status.code(), "probe failed");
            false
        }
        Err(e) => {
            tracing::warn!(host, "ping could not be spawned: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_literal_ip_without_dns() {
        assert_eq!(resolve("127.0.0.1").await, Some("127.0.0.1".parse().unwrap()));
        assert_eq!(resolve("::1").await, Some("::1".parse().unwrap()));
    }

    #[tokio::test]
    async fn unresolvable_host_is_none() {
        assert!(resolve("no-such-host.invalid").await.is_none());
    }
}
