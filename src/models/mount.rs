//! Mount specification: a virtual path bound to a bucket and backend prefix.

use std::{fmt, str::FromStr};
use thiserror::Error;

/// A configured binding of a virtual path prefix to a bucket and backend prefix.
///
/// `virtual_path` always starts and ends with `/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mount {
    pub virtual_path: String,
    pub bucket: String,
    pub backend_prefix: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MountParseError {
    #[error("invalid mount `{0}`: expected `path:bucket:prefix`")]
    MissingParts(String),
    #[error("invalid mount `{0}`: bucket must not be empty")]
    EmptyBucket(String),
}

impl Mount {
    pub fn new(
        virtual_path: impl AsRef<str>,
        bucket: impl Into<String>,
        backend_prefix: impl Into<String>,
    ) -> Self {
        Self {
            virtual_path: normalize_virtual_path(virtual_path.as_ref()),
            bucket: bucket.into(),
            backend_prefix: backend_prefix.into(),
        }
    }

    /// Backend object name for a request path below this mount.
    ///
    /// The caller must have checked that `path` starts with `virtual_path`.
    pub fn backend_name(&self, path: &str) -> String {
        let relative = path.strip_prefix(&self.virtual_path).unwrap_or(path);
        format!("{}{}", self.backend_prefix, relative)
    }
}

impl FromStr for Mount {
    type Err = MountParseError;

    /// Parse `path:bucket:prefix`. The prefix may itself contain `:`.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut parts = spec.splitn(3, ':');
        let (Some(path), Some(bucket), Some(prefix)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(MountParseError::MissingParts(spec.to_string()));
        };
        if bucket.is_empty() {
            return Err(MountParseError::EmptyBucket(spec.to_string()));
        }
        Ok(Mount::new(path, bucket, prefix))
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}/{}",
            self.virtual_path, self.bucket, self.backend_prefix
        )
    }
}

fn normalize_virtual_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 2);
    if !path.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(path);
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}
