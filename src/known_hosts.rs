use std::io::Write as _;
use std::net::TcpStream;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::KnownKey;

type HmacSha1 = Hmac<Sha1>;

/// Parses an OpenSSH `known_hosts` file, tolerating comment and blank lines.
/// Each line yields one or more host patterns and a public key.
pub fn parse_known_hosts(text: &str) -> Result<Vec<KnownKey>> {
    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let hosts_field = fields
            .next()
            .ok_or_else(|| Error::invalid_known_hosts("missing host field"))?;
        let key_type = fields
            .next()
            .ok_or_else(|| Error::invalid_known_hosts("missing key type"))?;
        let key_data = fields
            .next()
            .ok_or_else(|| Error::invalid_known_hosts("missing key data"))?;
        let hosts = hosts_field.split(',').map(str::to_string).collect();
        let key = format!("{key_type} {key_data}").into_bytes();
        entries.push(KnownKey { hosts, key });
    }
    Ok(entries)
}

/// Matches a host (optionally with a SHA-256 fingerprint, reserved for future
/// stricter comparisons) against this entry's host patterns.
pub trait KnownKeyExt {
    fn matches(&self, host: &str) -> bool;
}

impl KnownKeyExt for KnownKey {
    fn matches(&self, host: &str) -> bool {
        self.hosts.iter().any(|pattern| matches_pattern(pattern, host))
    }
}

fn matches_pattern(pattern: &str, host: &str) -> bool {
    if let Some(rest) = pattern.strip_prefix('|') {
        matches_hashed_pattern(rest, host).unwrap_or(false)
    } else {
        pattern == host
    }
}

/// `rest` is `"1|<base64-salt>|<base64-hash>"`. Any other leading version
/// number is unsupported.
fn matches_hashed_pattern(rest: &str, host: &str) -> Result<bool> {
    let mut parts = rest.splitn(3, '|');
    let version = parts.next().unwrap_or_default();
    if version != "1" {
        return Err(Error::invalid_known_hosts(format!(
            "unsupported hashed-host version '{version}'"
        )));
    }
    let salt_b64 = parts.next().ok_or_else(|| Error::invalid_known_hosts("missing salt"))?;
    let hash_b64 = parts.next().ok_or_else(|| Error::invalid_known_hosts("missing hash"))?;
    let salt = B64
        .decode(salt_b64)
        .map_err(|e| Error::invalid_known_hosts(e.to_string()))?;
    let expected = B64
        .decode(hash_b64)
        .map_err(|e| Error::invalid_known_hosts(e.to_string()))?;

    let mut mac = HmacSha1::new_from_slice(&salt).map_err(|e| Error::invalid_known_hosts(e.to_string()))?;
    mac.update(host.as_bytes());
    let computed = mac.finalize().into_bytes();
    Ok(computed.as_slice() == expected.as_slice())
}

/// Formats a host as a hashed known-hosts pattern, `"|1|<salt>|<hash>"`.
pub fn hash_host(host: &str, salt: &[u8]) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(salt).map_err(|e| Error::invalid_known_hosts(e.to_string()))?;
    mac.update(host.as_bytes());
    let digest = mac.finalize().into_bytes();
    Ok(format!("|1|{}|{}", B64.encode(salt), B64.encode(digest)))
}

/// Dials `host:22` (unless `host` already carries a port), performs an SSH
/// handshake, and records every host key the server offers in
/// `"<host> <keytype> <base64-key>\n"` form. Used to seed a known-hosts file
/// for first contact with a new remote.
pub fn scan_host_key(host: &str, timeout: Duration) -> Result<Vec<u8>> {
    scan_host_key_cancellable(host, timeout, None)
}

/// As [`scan_host_key`], but checked against `cancellation` before dialing;
/// the TCP connect and SSH handshake that follow are themselves bounded by
/// `timeout` and have no further cancellation point once underway.
pub fn scan_host_key_cancellable(
    host: &str,
    timeout: Duration,
    cancellation: Option<&CancellationToken>,
) -> Result<Vec<u8>> {
    if cancellation.is_some_and(CancellationToken::is_cancelled) {
        return Err(Error::git_msg("host key scan cancelled"));
    }
    let addr = if host.contains(':') { host.to_string() } else { format!("{host}:22") };
    let stream = TcpStream::connect(&addr).map_err(|e| Error::git_msg(format!("dial {addr}: {e}")))?;
    stream.set_read_timeout(Some(timeout)).ok();
    stream.set_write_timeout(Some(timeout)).ok();

    let mut session = ssh2::Session::new().map_err(|e| Error::git_msg(e.to_string()))?;
    session.set_tcp_stream(stream);
    session.handshake().map_err(|e| Error::git_msg(format!("ssh handshake with {host}: {e}")))?;

    let mut out = Vec::new();
    if let Some((key, key_type)) = session.host_key() {
        let type_name = match key_type {
            ssh2::HostKeyType::Rsa => "ssh-rsa",
            ssh2::HostKeyType::Dss => "ssh-dss",
            ssh2::HostKeyType::Ecdsa256 => "ecdsa-sha2-nistp256",
            ssh2::HostKeyType::Ecdsa384 => "ecdsa-sha2-nistp384",
            ssh2::HostKeyType::Ecdsa521 => "ecdsa-sha2-nistp521",
            ssh2::HostKeyType::Ed255219 => "ssh-ed25519",
            ssh2::HostKeyType::Unknown => "unknown",
        };
        writeln!(out, "{host} {type_name} {}", B64.encode(key))
            .map_err(|e| Error::git_msg(e.to_string()))?;
    }

    if out.is_empty() {
        return Err(Error::git_msg(format!("no host key offered by {host}")));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_entry() {
        let entries = parse_known_hosts("example.com ssh-ed25519 AAAAC3Nz\n").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hosts, vec!["example.com".to_string()]);
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let entries = parse_known_hosts("# comment\n\nexample.com ssh-ed25519 AAAAC3Nz\n").unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn exact_match() {
        let k = KnownKey { hosts: vec!["example.com".into()], key: vec![] };
        assert!(k.matches("example.com"));
        assert!(!k.matches("other.com"));
    }

    #[test]
    fn hashed_host_matches_same_host() {
        let salt = b"0123456789abcdef";
        let pattern = hash_host("example.com", salt).unwrap();
        let k = KnownKey { hosts: vec![pattern], key: vec![] };
        assert!(k.matches("example.com"));
        assert!(!k.matches("example.org"));
    }

    #[test]
    fn unsupported_hash_version_is_rejected() {
        assert!(matches_hashed_pattern("2|AA==|AA==", "x").is_err());
    }

    #[test]
    fn cancelled_token_short_circuits_before_dialing() {
        let token = CancellationToken::new();
        token.cancel();
        let err = scan_host_key_cancellable("example.invalid", Duration::from_millis(50), Some(&token));
        assert!(err.is_err());
    }
}
