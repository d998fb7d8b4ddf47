//! POSIX-style path helpers for the virtual filesystem

use crate::error::FsError;

/// Normalize an absolute virtual path.
///
/// Collapses repeated separators, drops `.` segments and trailing slashes.
/// Relative paths and `..` segments are rejected.
pub fn normalize(path: &str) -> Result<String, FsError> {
    if !path.starts_with('/') {
        return Err(FsError::InvalidPath(path.to_string()));
    }

    let mut out = String::with_capacity(path.len());
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(FsError::InvalidPath(path.to_string())),
            s => {
                out.push('/');
                out.push_str(s);
            }
        }
    }

    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}

/// Join a child name onto a directory path
pub fn join(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if name.is_empty() {
        return if base.is_empty() { "/".to_string() } else { base.to_string() };
    }
    format!("{}/{}", base, name)
}

/// Parent directory of a normalized path, `None` for the root
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Last component of a path
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => path,
    }
}

/// Lowercased extension of a file name without the dot.
///
/// Dotfiles (`.hidden`) and names without a dot have no extension.
pub fn extension(name: &str) -> String {
    let name = file_name(name);
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx + 1..].to_lowercase(),
        _ => String::new(),
    }
}

/// File name with its last extension removed
pub fn remove_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Ancestor directories of a path, outermost first, excluding the root
pub fn ancestors(path: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut current = parent(path);
    while let Some(dir) = current {
        if dir == "/" {
            break;
        }
        result.push(dir);
        current = parent(dir);
    }
    result.reverse();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/").unwrap(), "/");
        assert_eq!(normalize("/MapImport/").unwrap(), "/MapImport");
        assert_eq!(normalize("//MapImport//a/./b").unwrap(), "/MapImport/a/b");
        assert!(normalize("relative/path").is_err());
        assert!(normalize("/a/../b").is_err());
    }

    #[test]
    fn test_join_and_parent() {
        assert_eq!(join("/MapImport", "set"), "/MapImport/set");
        assert_eq!(join("/MapImport/", "/set"), "/MapImport/set");
        assert_eq!(join("/", "MapImport"), "/MapImport");
        assert_eq!(parent("/MapImport/set"), Some("/MapImport"));
        assert_eq!(parent("/MapImport"), Some("/"));
        assert_eq!(parent("/"), None);
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("song.OSZ"), "osz");
        assert_eq!(extension("/MapImport/set/chart.qua"), "qua");
        assert_eq!(extension("archive.tar.7z"), "7z");
        assert_eq!(extension(".hidden"), "");
        assert_eq!(extension("noext"), "");
    }

    #[test]
    fn test_remove_extension() {
        assert_eq!(remove_extension("song.osz"), "song");
        assert_eq!(remove_extension("a.b.c"), "a.b");
        assert_eq!(remove_extension(".hidden"), ".hidden");
        assert_eq!(remove_extension("plain"), "plain");
    }

    #[test]
    fn test_file_name_and_ancestors() {
        assert_eq!(file_name("/MapExport/set/chart.osu"), "chart.osu");
        assert_eq!(file_name("chart.osu"), "chart.osu");
        assert_eq!(file_name("/MapExport/set/"), "set");
        assert_eq!(
            ancestors("/MapImport/set/sub/file.png"),
            vec!["/MapImport", "/MapImport/set", "/MapImport/set/sub"]
        );
    }
}
