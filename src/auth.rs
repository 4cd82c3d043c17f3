//! Credential gates for login and database export
//!
//! Secrets are never compared with `==`. Each configured secret is stored as
//! an HMAC-SHA256 tag under a per-process random key, and candidates are
//! checked with `ring::hmac::verify`, which runs in constant time.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use ring::hmac;
use thiserror::Error;

/// A configured secret that can be checked but not read back
pub struct Secret {
    key: hmac::Key,
    tag: hmac::Tag,
}

impl Secret {
    pub fn new(value: &str) -> Self {
        let key_bytes: [u8; 32] = rand::random();
        let key = hmac::Key::new(hmac::HMAC_SHA256, &key_bytes);
        let tag = hmac::sign(&key, value.as_bytes());
        Self { key, tag }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        hmac::verify(&self.key, candidate.as_bytes(), self.tag.as_ref()).is_ok()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Granted,
    Denied,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("Incorrect admin password.")]
    IncorrectAdminPassword,

    #[error("No admin password is configured")]
    NotConfigured,
}

/// Username + password check for the rating front end. No sessions are kept.
#[derive(Debug)]
pub struct LoginGate {
    credentials: Option<(Secret, Secret)>,
}

impl LoginGate {
    pub fn new(username: &str, password: Option<&str>) -> Self {
        Self {
            credentials: password.map(|p| (Secret::new(username), Secret::new(p))),
        }
    }

    pub fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let Some((user, pass)) = &self.credentials else {
            log::warn!("Login attempted for {} but no password is configured", username);
            return Err(AuthError::NotConfigured);
        };

        // Check both halves so timing does not reveal which one failed
        let user_ok = user.matches(username);
        let pass_ok = pass.matches(password);
        if user_ok & pass_ok {
            log::info!("Login successful for user: {}", username);
            Ok(())
        } else {
            log::warn!("Login failed for user: {}", username);
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Admin password check guarding the database download
#[derive(Debug)]
pub struct ExportGate {
    secret: Option<Secret>,
}

impl ExportGate {
    pub fn new(admin_password: Option<&str>) -> Self {
        Self {
            secret: admin_password.map(Secret::new),
        }
    }

    pub fn authorize(&self, candidate: &str) -> AuthDecision {
        match &self.secret {
            Some(secret) if secret.matches(candidate) => AuthDecision::Granted,
            Some(_) => {
                log::warn!("Incorrect admin password attempt");
                AuthDecision::Denied
            }
            None => {
                log::warn!("Export requested but no admin password is configured");
                AuthDecision::Denied
            }
        }
    }

    pub fn check(&self, candidate: &str) -> Result<(), AuthError> {
        match (self.authorize(candidate), &self.secret) {
            (AuthDecision::Granted, _) => Ok(()),
            (AuthDecision::Denied, None) => Err(AuthError::NotConfigured),
            (AuthDecision::Denied, Some(_)) => Err(AuthError::IncorrectAdminPassword),
        }
    }
}

/// Failure while streaming the database file out
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Database file not found on server: {0}")]
    NotFound(PathBuf),

    #[error("Permission denied reading database file: {0}")]
    PermissionDenied(PathBuf),

    #[error("Server error reading database file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl ExportError {
    pub fn classify(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ExportError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => ExportError::PermissionDenied(path.to_path_buf()),
            _ => ExportError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

/// Open the database file for streaming
pub fn open_export(path: &Path) -> Result<std::fs::File, ExportError> {
    std::fs::File::open(path).map_err(|e| ExportError::classify(path, e))
}

/// Stream the database file into `out`, returning the bytes written
pub fn stream_export<W: io::Write>(path: &Path, out: &mut W) -> Result<u64, ExportError> {
    let mut file = open_export(path)?;
    let bytes = io::copy(&mut file, out).map_err(|e| ExportError::classify(path, e))?;
    log::info!("Database file stream finished ({} bytes)", bytes);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_secret_matches_only_exact_value() {
        let secret = Secret::new("admin123");
        assert!(secret.matches("admin123"));
        assert!(!secret.matches("admin12"));
        assert!(!secret.matches("admin1234"));
        assert!(!secret.matches(""));
        assert_eq!(format!("{:?}", secret), "Secret(<redacted>)");
    }

    #[test]
    fn test_login_gate() {
        let gate = LoginGate::new("admin", Some("hunter2"));
        assert_eq!(gate.login("admin", "hunter2"), Ok(()));
        assert_eq!(gate.login("admin", "wrong"), Err(AuthError::InvalidCredentials));
        assert_eq!(gate.login("root", "hunter2"), Err(AuthError::InvalidCredentials));

        let closed = LoginGate::new("admin", None);
        assert_eq!(closed.login("admin", ""), Err(AuthError::NotConfigured));
    }

    #[test]
    fn test_export_gate() {
        let gate = ExportGate::new(Some("s3cret"));
        assert_eq!(gate.authorize("s3cret"), AuthDecision::Granted);
        assert_eq!(gate.authorize("S3cret"), AuthDecision::Denied);
        assert_eq!(gate.check("nope"), Err(AuthError::IncorrectAdminPassword));

        let unset = ExportGate::new(None);
        assert_eq!(unset.authorize(""), AuthDecision::Denied);
        assert_eq!(unset.check(""), Err(AuthError::NotConfigured));
    }

    #[test]
    fn test_stream_export_copies_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("database.db");
        std::fs::write(&path, b"SQLite format 3\0payload").unwrap();

        let mut out = Vec::new();
        let bytes = stream_export(&path, &mut out).unwrap();
        assert_eq!(bytes, 23);
        assert_eq!(out, b"SQLite format 3\0payload");
    }

    #[test]
    fn test_missing_file_is_classified_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let mut out = Vec::new();
        assert!(matches!(stream_export(&path, &mut out), Err(ExportError::NotFound(_))));
    }

    #[test]
    fn test_error_kinds_are_classified() {
        let path = Path::new("database.db");
        assert!(matches!(
            ExportError::classify(path, io::Error::from(io::ErrorKind::PermissionDenied)),
            ExportError::PermissionDenied(_)
        ));
        assert!(matches!(
            ExportError::classify(path, io::Error::new(io::ErrorKind::Other, "boom")),
            ExportError::Io { .. }
        ));
    }
}
