//! Token and per-session RSA public key.

use crate::error::{Error, Result};
use log::{error, info};
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use ureq::Agent;

/// Long-lived bearer token, read from disk and never written.
pub fn read_token(path: &Path) -> Result<String> {
    let missing = || Error::MissingCredentials {
        path: path.to_path_buf(),
    };
    let token = std::fs::read_to_string(path).map_err(|e| {
        error!("Cannot read token file {}: {e}", path.display());
        missing()
    })?;
    let token = token.trim();
    if token.is_empty() {
        return Err(missing());
    }
    Ok(token.to_string())
}

#[derive(Debug, Deserialize)]
struct KeyResponse {
    data: String,
}

/// Exchanges a token for the session's PEM public key.
#[derive(Debug)]
pub struct KeyProvider<'a> {
    agent: &'a Agent,
    url: &'a str,
}

impl<'a> KeyProvider<'a> {
    #[must_use]
    pub const fn new(agent: &'a Agent, url: &'a str) -> Self {
        Self { agent, url }
    }

    /// One request, no retry.
    pub fn fetch(&self, token: &str) -> Result<String> {
        let mut response = self
            .agent
            .post(self.url)
            .send_form([("token", token)])
            .map_err(|e| Error::KeyFetchFailed(e.to_string()))?;
        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::KeyFetchFailed(e.to_string()))?;
        let key = serde_json::from_str::<KeyResponse>(&body)
            .map_err(|e| Error::KeyFetchFailed(format!("HTTP {status}: {e}: {body}")))?
            .data;
        if !is_pem(&key) {
            return Err(Error::KeyFetchFailed(format!(
                "HTTP {status}: not a PEM key: {key}"
            )));
        }
        Ok(key)
    }

    /// Fetch and store the key at `dest`.
    ///
    /// Failures are logged and leave any previous key file untouched.
    pub fn refresh(&self, token: &str, dest: &Path) -> Option<PathBuf> {
        let stored = self.fetch(token).and_then(|key| {
            store(dest, &normalize_newlines(&key))
                .map_err(|e| Error::KeyFetchFailed(format!("cannot write {}: {e}", dest.display())))
        });
        match stored {
            Ok(()) => {
                info!("Public key stored at {}", dest.display());
                Some(dest.to_path_buf())
            }
            Err(e) => {
                error!("{e}");
                None
            }
        }
    }
}

/// Replace `dest` in one rename, so a failed write leaves the previous key.
fn store(dest: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

fn is_pem(s: &str) -> bool {
    let s = s.trim();
    s.starts_with("-----BEGIN ") && s.contains("-----END ")
}

/// The on-device collector expects `\n` line endings.
fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n")
}
