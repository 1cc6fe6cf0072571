use std::path::{Path, PathBuf};

use crate::error::HttpError;

/// Resolve a client-supplied relative path against `root`, rejecting
/// anything that would escape it.
///
/// Two layers, matching the teacher's `handlers::jobs::list_server_files`:
/// reject absolute paths and `..` components up front, then canonicalize
/// and check `starts_with` as defense in depth against symlink tricks the
/// string check can't see.
pub fn resolve_under_root(root: &Path, requested: &str) -> Result<PathBuf, HttpError> {
    let requested_path = PathBuf::from(requested);

    if requested_path.is_absolute() {
        return Err(HttpError::BadRequest("absolute paths are not allowed".to_string()));
    }
    if requested.contains("..") {
        return Err(HttpError::BadRequest(
            "path traversal sequences are not allowed".to_string(),
        ));
    }

    let joined = root.join(&requested_path);

    let canonical = joined.canonicalize().map_err(|_| {
        crate::error::HttpError::Core(crate::error::CoreError::NotFound)
    })?;
    let canonical_root = root
        .canonicalize()
        .map_err(|e| HttpError::Internal(format!("files root is invalid: {e}")))?;

    if !canonical.starts_with(&canonical_root) {
        return Err(HttpError::Forbidden("access denied".to_string()));
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn rejects_absolute_paths() {
        let root = std::env::temp_dir();
        let err = resolve_under_root(&root, "/etc/passwd").unwrap_err();
        assert!(matches!(err, HttpError::BadRequest(_)));
    }

    #[test]
    fn rejects_dotdot_traversal() {
        let root = std::env::temp_dir();
        let err = resolve_under_root(&root, "../../etc/passwd").unwrap_err();
        assert!(matches!(err, HttpError::BadRequest(_)));
    }

    #[test]
    fn resolves_a_file_that_exists_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("movie.mp4");
        fs::write(&file_path, b"data").unwrap();

        let resolved = resolve_under_root(dir.path(), "movie.mp4").unwrap();
        assert_eq!(resolved, file_path.canonicalize().unwrap());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_under_root(dir.path(), "missing.mp4").unwrap_err();
        assert!(matches!(
            err,
            HttpError::Core(crate::error::CoreError::NotFound)
        ));
    }
}
