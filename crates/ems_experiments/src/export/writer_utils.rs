use std::fs::File;
use std::path::Path;

/// Refuses to write a file with a header and nothing else.
pub(crate) fn ensure_rows<T>(rows: &[T], what: &str) -> Result<(), Box<dyn std::error::Error>> {
    if rows.is_empty() {
        return Err(format!("no {what} to export").into());
    }
    Ok(())
}

/// Creates (or truncates) `path`, creating missing parent directories.
pub(crate) fn create_output_file(path: &Path) -> Result<File, Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}
