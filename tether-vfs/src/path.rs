//! Path arithmetic over normalized directory paths.
//!
//! A normalized directory path starts and ends with `/` and has no empty
//! segments: `/`, `/a/`, `/a/b/`.

/// The root directory.
pub const ROOT: &str = "/";

/// Manifest object name for a device, inside the `files` container.
pub fn manifest_name(device_id: &str) -> String {
    format!("{}-filetree.json", device_id)
}

/// Normalize a directory path: leading and trailing separator, repeated
/// separators collapsed, empty input is the root.
pub fn normalize_dir(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return ROOT.to_string();
    }
    format!("/{}/", segments.join("/"))
}

/// Parent of a directory path. The root is its own parent.
pub fn ascend(path: &str) -> String {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rfind('/') {
        Some(idx) if idx > 0 => format!("{}/", &trimmed[..idx]),
        _ => ROOT.to_string(),
    }
}

/// Directory path reached by entering `name` from `current`.
pub fn child_path(current: &str, name: &str) -> String {
    normalize_dir(&format!("{}/{}", current, name))
}

/// Object key for a file uploaded into directory `dir`.
///
/// Keys carry no leading separator; the root directory maps to a bare name.
pub fn upload_path(dir: &str, file_name: &str) -> String {
    let dir = normalize_dir(dir);
    let name = file_name.trim_matches('/');
    format!("{}{}", &dir[1..], name)
}
