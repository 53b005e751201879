use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Collapse `.` and `..` components without touching the file system.
/// Leading `..` components are kept when there is nothing left to pop.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            other => components.push(other),
        }
    }
    if components.is_empty() {
        return PathBuf::new();
    }
    components.iter().collect()
}

/// `path` relative to `root`, both taken lexically. Falls back to `path`.
pub fn relative_to(path: &Path, root: &Path) -> PathBuf {
    let path = normalize_path(path);
    let root = normalize_path(root);
    pathdiff::diff_paths(&path, &root).unwrap_or(path)
}

/// Render a path with forward slashes, as used in generated files
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Append a raw suffix to the file name, e.g. `a.rst` + `.stpl`
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// File name without `suffix` (if present) and without its last extension.
///
/// `dd.rest.stpl` with suffix `.stpl` gives `dd`, as does `dd.rest`.
pub fn base_name(file_name: &str, suffix: &str) -> String {
    let name = if !suffix.is_empty() {
        file_name.strip_suffix(suffix).unwrap_or(file_name)
    } else {
        file_name
    };
    match name.rfind('.') {
        Some(pos) if pos > 0 => name[..pos].to_string(),
        _ => name.to_string(),
    }
}
