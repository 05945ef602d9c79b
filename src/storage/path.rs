use crate::error::StoreError;

/// Normalise the configured root folder to `""` or `/a/b` form.
pub fn normalize_root(raw: &str) -> String {
    let segments: Vec<&str> = raw
        .trim()
        .split('/')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        String::new()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Blob names are single path segments; anything that could escape the
/// root is rejected.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.trim().is_empty()
        || name != name.trim()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.starts_with('.');
    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Full path of `name` under `root` (which must already be normalised).
pub fn scoped_path(root: &str, name: &str) -> Result<String, StoreError> {
    validate_name(name)?;
    Ok(format!("{}/{}", root, name))
}
