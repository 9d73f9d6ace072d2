//! Mapping request paths onto the static root.
//!
//! Two gates stand between a request and the filesystem:
//! 1. `normalize` decodes the remainder and resolves `.`/`..` lexically,
//!    refusing anything that climbs above the root before a single syscall.
//! 2. `confine` canonicalizes the joined path (following symlinks) and
//!    refuses results outside the canonical root.

use std::io;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::error::ProxyError;

/// Decode `remainder` and resolve it to a relative path below the root.
pub fn normalize(remainder: &str) -> Result<PathBuf, ProxyError> {
    let decoded = percent_decode_str(remainder)
        .decode_utf8()
        .map_err(|_| ProxyError::BadRequest {
            reason: "path is not valid UTF-8",
        })?;

    if decoded.contains('\0') {
        return Err(ProxyError::BadRequest {
            reason: "path contains a NUL byte",
        });
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(ProxyError::Forbidden {
                        path: remainder.to_string(),
                    });
                }
            }
            segment => segments.push(segment),
        }
    }

    Ok(segments.into_iter().collect())
}

/// Canonicalize `root.join(relative)` and check it stays under `root`.
///
/// `root` must already be canonical.
pub async fn confine(root: &Path, relative: &Path) -> Result<PathBuf, ProxyError> {
    let candidate = root.join(relative);
    let canonical = tokio::fs::canonicalize(&candidate)
        .await
        .map_err(|e| lookup_error(&candidate, e))?;

    if !canonical.starts_with(root) {
        return Err(ProxyError::Forbidden {
            path: candidate.display().to_string(),
        });
    }
    Ok(canonical)
}

/// Classify a failed filesystem lookup.
pub fn lookup_error(path: &Path, error: io::Error) -> ProxyError {
    match error.kind() {
        io::ErrorKind::PermissionDenied => ProxyError::Forbidden {
            path: path.display().to_string(),
        },
        // Missing entries and non-directory components alike mean there is nothing to serve.
        _ => {
            tracing::trace!(path = %path.display(), error = %error, "Static lookup failed");
            ProxyError::NotFound {
                path: path.display().to_string(),
            }
        }
    }
}
