//! Atomic file output shared by both pipelines.

use std::fs;
use std::io;
use std::path::Path;

/// Write `data` to `path` via a sibling `.tmp` file and a rename, creating
/// parent directories first. An existing file is replaced.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    fs::write(tmp_path, data)?;
    fs::rename(tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(tmp_path);
        e
    })
}
