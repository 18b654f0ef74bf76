use anyhow::Result;
use std::path::Path;
// Served-directory enumeration (flat, recomputed per connection)

/// One offered file: server-relative name plus byte length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

/// Enumerate the served root, non-recursively.
///
/// Whatever the filesystem lists is offered: no hidden-file or symlink
/// filtering. Entries whose names are not valid UTF-8 are offered lossily.
/// Fails if the root itself is inaccessible.
pub fn enumerate_directory(root: &Path) -> Result<Vec<FileEntry>> {
    use walkdir::WalkDir;

    let mut entries = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
    {
        let entry = entry?;
        let size = entry.metadata()?.len();
        entries.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            size,
        });
    }

    Ok(entries)
}
