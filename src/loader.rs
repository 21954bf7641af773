//! Document loaders for the two corpora.
//!
//! - [`load_trace`] reads the execution trace as one opaque [`Document`].
//! - [`load_source_tree`] walks source directories and returns one
//!   [`Document`] per file matching the extension allowlist.
//!
//! Neither loader parses its input; the trace's event vocabulary is only
//! described to the reasoning model at query time.

use chrono::{DateTime, Utc};
use engine_rag_core::models::{Corpus, Document, META_FILE_PATH};
use engine_rag_core::{RagError, RagResult};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::CorpusConfig;

const TRACE_DESCRIPTION: &str =
    "Execution trace of matching engine with function calls, order events, and snapshots";

/// Which files of a source tree become documents.
#[derive(Debug, Clone)]
pub struct SourceFilter {
    include: GlobSet,
    exclude: GlobSet,
    language: String,
    follow_symlinks: bool,
}

impl SourceFilter {
    /// Build a filter from extensions (without the dot) and extra exclude globs.
    pub fn new(extensions: &[String], exclude_globs: &[String], language: &str) -> anyhow::Result<Self> {
        let include_patterns: Vec<String> = extensions
            .iter()
            .map(|ext| format!("**/*.{}", ext.trim_start_matches('.')))
            .collect();

        let mut excludes = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/build/**".to_string(),
        ];
        excludes.extend(exclude_globs.iter().cloned());

        Ok(Self {
            include: build_globset(&include_patterns)?,
            exclude: build_globset(&excludes)?,
            language: language.to_string(),
            follow_symlinks: false,
        })
    }

    pub fn from_config(config: &CorpusConfig) -> anyhow::Result<Self> {
        let mut filter = Self::new(&config.extensions, &config.exclude_globs, &config.language)?;
        filter.follow_symlinks = config.follow_symlinks;
        Ok(filter)
    }

    fn matches(&self, relative: &str) -> bool {
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }
}

/// Read the whole trace artifact as one document tagged `source=trace`.
///
/// # Errors
///
/// - [`RagError::NotFound`] if `path` does not exist.
/// - [`RagError::Io`] if it exists but cannot be read as UTF-8 text.
pub fn load_trace(path: &Path) -> RagResult<Document> {
    if !path.exists() {
        return Err(RagError::NotFound(path.to_path_buf()));
    }

    let text = std::fs::read_to_string(path).map_err(|source| RagError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), chars = text.chars().count(), "loaded trace");

    let mut doc = Document::new(Corpus::Instrumentation, text)
        .with_metadata(META_FILE_PATH, path.display().to_string())
        .with_metadata("description", TRACE_DESCRIPTION);
    if let Some(modified) = modified_at(path) {
        doc = doc.with_metadata("modified_at", modified);
    }
    Ok(doc)
}

/// Collect source documents from every directory in `dirs`.
///
/// Missing directories are skipped with a warning. Files are visited in
/// path order within each directory, directories in the given order.
///
/// # Errors
///
/// [`RagError::EmptyCorpus`] if no directory yields a matching file.
pub fn load_source_tree(dirs: &[PathBuf], filter: &SourceFilter) -> RagResult<Vec<Document>> {
    let mut documents = Vec::new();

    for dir in dirs {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "source directory not found, skipping");
            continue;
        }
        let found = scan_dir(dir, filter);
        info!(dir = %dir.display(), files = found.len(), "loaded source files");
        documents.extend(found);
    }

    if documents.is_empty() {
        return Err(RagError::EmptyCorpus {
            corpus: Corpus::Code,
        });
    }
    Ok(documents)
}

fn scan_dir(root: &Path, filter: &SourceFilter) -> Vec<Document> {
    let mut files: Vec<(String, PathBuf)> = Vec::new();

    let walker = WalkDir::new(root).follow_links(filter.follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();
        if filter.matches(&rel_str) {
            files.push((rel_str, path.to_path_buf()));
        }
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.0.cmp(&b.0));

    files
        .into_iter()
        .filter_map(|(_, path)| file_to_document(&path, &filter.language))
        .collect()
}

fn file_to_document(path: &Path, language: &str) -> Option<Document> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable source file");
            return None;
        }
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut doc = Document::new(Corpus::Code, text)
        .with_metadata(META_FILE_PATH, path.display().to_string())
        .with_metadata("file_name", file_name)
        .with_metadata("language", language);
    if let Some(modified) = modified_at(path) {
        doc = doc.with_metadata("modified_at", modified);
    }
    Some(doc)
}

fn modified_at(path: &Path) -> Option<String> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Utc>::from(modified).to_rfc3339())
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn java_filter() -> SourceFilter {
        SourceFilter::new(&["java".to_string()], &[], "java").unwrap()
    }

    #[test]
    fn test_load_trace_missing_is_not_found() {
        let err = load_trace(Path::new("/definitely/not/here.log")).unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[test]
    fn test_load_trace_tags_document() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("instrumentation.log");
        fs::write(&path, "ORDER_IN orderId=1\nSNAPSHOT\n").unwrap();
        let doc = load_trace(&path).unwrap();
        assert_eq!(doc.source(), "trace");
        assert_eq!(doc.text(), "ORDER_IN orderId=1\nSNAPSHOT\n");
        assert!(doc.file_path().unwrap().ends_with("instrumentation.log"));
        assert!(doc.metadata().contains_key("description"));
    }

    #[test]
    fn test_filter_extensions_and_default_excludes() {
        let filter = java_filter();
        assert!(filter.matches("engine/MatchingEngine.java"));
        assert!(filter.matches("Main.java"));
        assert!(!filter.matches("README.md"));
        assert!(!filter.matches("target/classes/Gen.java"));
    }

    #[test]
    fn test_source_tree_sorted_and_tagged() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("matching");
        fs::create_dir_all(root.join("model")).unwrap();
        fs::write(root.join("model/Order.java"), "class Order {}").unwrap();
        fs::write(root.join("Main.java"), "class Main {}").unwrap();
        fs::write(root.join("notes.txt"), "ignored").unwrap();

        let docs = load_source_tree(&[root], &java_filter()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text(), "class Main {}");
        assert_eq!(docs[1].text(), "class Order {}");
        for d in &docs {
            assert_eq!(d.source(), "code");
            assert_eq!(d.metadata().get("language").unwrap(), "java");
        }
        assert_eq!(docs[1].metadata().get("file_name").unwrap(), "Order.java");
    }

    #[test]
    fn test_no_matching_files_is_empty_corpus() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "x").unwrap();
        let err = load_source_tree(
            &[tmp.path().to_path_buf(), tmp.path().join("missing")],
            &java_filter(),
        )
        .unwrap_err();
        assert!(matches!(err, RagError::EmptyCorpus { corpus: Corpus::Code }));
    }
}
