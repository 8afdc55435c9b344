use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::treesitter::detect_language;

pub struct WalkEntry {
    pub path: PathBuf,
    /// Project-relative path with POSIX separators.
    pub rel: String,
    /// Grammar name for the parser dispatch.
    pub grammar: &'static str,
}

pub struct FileWalker {
    root: PathBuf,
}

impl FileWalker {
    /// Creates a new file walker rooted at the given directory.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Walks the root and returns all recognized source files, respecting
    /// gitignore and `.trellisignore`.
    pub fn walk(&self) -> Vec<WalkEntry> {
        let mut entries = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .add_custom_ignore_filename(".trellisignore")
            .build();

        for result in walker {
            let entry = match result {
                Ok(e) => e,
                Err(_) => continue,
            };

            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.into_path();
            let Some(grammar) = detect_language(&path) else {
                continue;
            };
            let Ok(rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            entries.push(WalkEntry {
                rel: rel.to_string_lossy().replace('\\', "/"),
                path,
                grammar,
            });
        }

        entries.sort_by(|a, b| a.rel.cmp(&b.rel));
        entries
    }
}
