//! Download path policy.
//!
//! Destination paths supplied by remote callers are untrusted. They are
//! lexically cleaned first and only then checked against the allow-list, so a
//! traversal such as `/tmp/../etc/passwd` is judged by where it resolves,
//! not by how it is spelled.

use std::path::PathBuf;

use crate::error::PathError;

/// Default allowed roots for downloaded files.
pub const DEFAULT_ALLOWED_ROOTS: [&str; 2] = ["/tmp", "/var/tmp"];

/// Lexically normalise a slash-separated path.
///
/// Repeated separators collapse, `.` components are dropped, `..` removes
/// the preceding component and never climbs above `/`, and trailing
/// separators are removed. No filesystem access is performed.
///
/// ```
/// use netdev_core::clean;
///
/// assert_eq!(clean("/tmp//a/./b/../c.bin"), "/tmp/a/c.bin");
/// assert_eq!(clean("/../.."), "/");
/// assert_eq!(clean("a/../.."), "..");
/// assert_eq!(clean(""), ".");
/// ```
#[must_use]
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Allow-list policy for download destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPolicy {
    roots: Vec<String>,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self::with_roots(DEFAULT_ALLOWED_ROOTS)
    }
}

impl DownloadPolicy {
    /// Create a policy with custom allowed roots.
    ///
    /// Each root is cleaned before use.
    pub fn with_roots<I, S>(roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            roots: roots.into_iter().map(|r| clean(r.as_ref())).collect(),
        }
    }

    /// The cleaned allowed roots.
    #[must_use]
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Validate a destination path and return its cleaned form.
    ///
    /// A path is accepted only when its cleaned form is a strict descendant
    /// of one of the allowed roots. The roots themselves are rejected.
    ///
    /// # Errors
    ///
    /// Returns a [`PathError`] naming the first rule the path breaks.
    pub fn validate(&self, path: &str) -> Result<String, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        if path.contains('\0') {
            return Err(PathError::NullByte);
        }
        if !path.starts_with('/') {
            return Err(PathError::NotAbsolute(path.to_string()));
        }

        let cleaned = clean(path);
        if self.roots.iter().any(|root| is_strictly_inside(&cleaned, root)) {
            Ok(cleaned)
        } else {
            Err(PathError::OutsideAllowedRoots {
                path: cleaned,
                allowed: self.describe_roots(),
            })
        }
    }

    fn describe_roots(&self) -> String {
        self.roots
            .iter()
            .map(|r| if r == "/" { r.clone() } else { format!("{r}/") })
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

fn is_strictly_inside(cleaned: &str, root: &str) -> bool {
    let prefix = if root == "/" {
        "/".to_string()
    } else {
        format!("{root}/")
    };
    cleaned.len() > prefix.len() && cleaned.starts_with(&prefix)
}

/// Validate a path against the default `/tmp` and `/var/tmp` policy.
///
/// # Errors
///
/// See [`DownloadPolicy::validate`].
pub fn validate_download_path(path: &str) -> Result<String, PathError> {
    DownloadPolicy::default().validate(path)
}

/// Maps validated paths onto a host filesystem mounted at another location.
///
/// When the responder runs in a container with the host root mounted at
/// e.g. `/mnt/host`, a request for `/tmp/image.bin` lands at
/// `/mnt/host/tmp/image.bin`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostPathTranslator {
    host_root: Option<PathBuf>,
}

impl HostPathTranslator {
    /// Create a translator for the given host root mount point.
    #[must_use]
    pub fn new(host_root: Option<PathBuf>) -> Self {
        Self { host_root }
    }

    /// The configured host root, if any.
    #[must_use]
    pub fn host_root(&self) -> Option<&PathBuf> {
        self.host_root.as_ref()
    }

    /// Translate an absolute path into its location on the host.
    #[must_use]
    pub fn to_host(&self, path: &str) -> PathBuf {
        let cleaned = clean(path);
        match &self.host_root {
            Some(root) => root.join(cleaned.trim_start_matches('/')),
            None => PathBuf::from(cleaned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_normalises() {
        let cases = [
            ("/tmp/a/../b.bin", "/tmp/b.bin"),
            ("/tmp//file.txt", "/tmp/file.txt"),
            ("/tmp/./file.txt", "/tmp/file.txt"),
            ("/tmp/dir/", "/tmp/dir"),
            ("/tmp/../etc/passwd", "/etc/passwd"),
            ("/tmp/dir/../../../etc/passwd", "/etc/passwd"),
            ("/", "/"),
            ("//", "/"),
            ("/..", "/"),
            ("a/b/..", "a"),
            ("../a", "../a"),
            (".", "."),
        ];
        for (input, expected) in cases {
            assert_eq!(clean(input), expected, "clean({input:?})");
        }
    }

    #[test]
    fn accepts_paths_inside_roots() {
        let valid = [
            ("/tmp/test.json", "/tmp/test.json"),
            ("/var/tmp/image.bin", "/var/tmp/image.bin"),
            ("/tmp/downloads/file.bin", "/tmp/downloads/file.bin"),
            ("/var/tmp/cache/data.bin", "/var/tmp/cache/data.bin"),
            ("/tmp/a/b/c/file.bin", "/tmp/a/b/c/file.bin"),
            ("/tmp//file.txt", "/tmp/file.txt"),
            ("/tmp/dir/", "/tmp/dir"),
            ("/tmp/./file.txt", "/tmp/file.txt"),
            ("/tmp/a/../b.bin", "/tmp/b.bin"),
            ("/tmp/link/../etc/passwd", "/tmp/etc/passwd"),
        ];
        for (input, expected) in valid {
            assert_eq!(
                validate_download_path(input).as_deref(),
                Ok(expected),
                "path {input:?}"
            );
        }
    }

    #[test]
    fn rejects_empty_null_and_relative() {
        assert_eq!(validate_download_path(""), Err(PathError::Empty));
        assert_eq!(
            validate_download_path("/tmp/file\0.txt"),
            Err(PathError::NullByte)
        );
        assert_eq!(
            validate_download_path("/tmp/normal.txt\0/etc/passwd"),
            Err(PathError::NullByte)
        );
        for relative in ["test.json", "downloads/file.bin", "./test.json", "tmp/x"] {
            assert!(
                matches!(
                    validate_download_path(relative),
                    Err(PathError::NotAbsolute(_))
                ),
                "path {relative:?}"
            );
        }
    }

    #[test]
    fn rejects_paths_outside_roots() {
        let invalid = [
            "/etc/passwd",
            "/home/user/file.txt",
            "/file.txt",
            "/var/log/file.txt",
            "/tmp/../etc/passwd",
            "/var/tmp/../etc/passwd",
            "/tmp/dir/../../../etc/passwd",
            "/tmp/./../../etc/passwd",
            "/tmp/a/b/../../../etc/passwd",
            "/tmp",
            "/var/tmp",
            "/tmp/",
            "/tmp/.",
            "/tmp/sub/..",
            "/tmpdir/file.txt",
            "/vartmp/file.txt",
            "/tmp-backup/file.txt",
            "/TMP/file.txt",
            "/VAR/TMP/file.txt",
        ];
        for path in invalid {
            let err = validate_download_path(path).unwrap_err();
            assert!(
                matches!(err, PathError::OutsideAllowedRoots { .. }),
                "path {path:?} gave {err:?}"
            );
            assert!(err
                .to_string()
                .contains("must be inside /tmp/ or /var/tmp/ directories"));
        }
    }

    #[test]
    fn long_paths_inside_root_are_allowed() {
        let path = format!("/tmp/{}/file.txt", "a".repeat(100));
        assert!(validate_download_path(&path).is_ok());
    }

    #[test]
    fn custom_roots_are_cleaned() {
        let policy = DownloadPolicy::with_roots(["/data//images/"]);
        assert_eq!(policy.roots(), ["/data/images".to_string()]);
        assert!(policy.validate("/data/images/x.bin").is_ok());
        assert!(policy.validate("/data/images").is_err());
        assert!(policy.validate("/tmp/x.bin").is_err());
    }

    #[test]
    fn translator_maps_onto_host_root() {
        let identity = HostPathTranslator::default();
        assert_eq!(identity.to_host("/tmp/x.bin"), PathBuf::from("/tmp/x.bin"));

        let translator = HostPathTranslator::new(Some(PathBuf::from("/mnt/host")));
        assert_eq!(
            translator.to_host("/tmp/dir/../x.bin"),
            PathBuf::from("/mnt/host/tmp/x.bin")
        );
    }
}
