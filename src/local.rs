use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::prompt::SearchTerm;
use crate::search::ArticleRef;

/// A resolved article, as stored in the cache file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
  #[serde(rename = "search-href")]
  pub search_href: String,
  pub title: String,
  #[serde(rename = "download-href")]
  pub download_href: Option<String>,
}

impl CacheRecord {
  pub fn new(article: &ArticleRef, download_href: impl Into<String>) -> Self {
    CacheRecord {
      search_href: article.href.clone(),
      title: article.title.clone(),
      download_href: Some(download_href.into()),
    }
  }

  pub fn file_name(&self) -> String {
    pdf_file_name(&self.title)
  }
}

/// Longest stem, in bytes, that still leaves room for `.pdf` under the usual 255-byte
/// file-name limit.
pub const MAX_STEM_BYTES: usize = 240;

/// Prefix of every in-progress file this crate writes; anything still carrying it at
/// startup was abandoned by an interrupted run.
pub const TEMP_PREFIX: &str = ".biorxiv-partial-";

/// `<title>.pdf`, with path separators neutralized so every title stays inside the
/// download directory, and the stem cut at a char boundary to `MAX_STEM_BYTES`.
pub fn pdf_file_name(title: &str) -> String {
  let mut stem = String::with_capacity(title.len().min(MAX_STEM_BYTES));
  for c in title.chars() {
    let c = if c == '/' || c == '\\' || c == '\0' { '_' } else { c };
    if stem.len() + c.len_utf8() > MAX_STEM_BYTES {
      break;
    }
    stem.push(c);
  }
  format!("{}.pdf", stem)
}

pub fn temp_file_in(dir: &Path) -> std::io::Result<NamedTempFile> {
  tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile_in(dir)
}

/// Removes temp files left behind in `dir` by a run that was killed mid-write.
pub fn sweep_stale_temp_files(dir: &Path) -> usize {
  let mut removed = 0;
  for entry in WalkDir::new(dir).max_depth(1).min_depth(1).into_iter().flatten() {
    let name = entry.file_name().to_string_lossy();
    if !entry.file_type().is_file() || !name.starts_with(TEMP_PREFIX) {
      continue;
    }
    match fs::remove_file(entry.path()) {
      Ok(()) => {
        debug!(path = %entry.path().display(), "removed stale temp file");
        removed += 1;
      }
      Err(e) => warn!(path = %entry.path().display(), error = %e, "could not remove stale temp file"),
    }
  }
  removed
}

/// One JSON array file per search term under the cache directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
  dir: PathBuf,
}

impl CacheStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    CacheStore { dir: dir.into() }
  }

  pub fn path_for(&self, term: &SearchTerm) -> PathBuf {
    self.dir.join(format!("{}.json", term.slug()))
  }

  pub fn exists(&self, term: &SearchTerm) -> bool {
    self.path_for(term).is_file()
  }

  /// Creates the cache directory and an empty record list, unless already there.
  pub fn ensure_initialized(&self, term: &SearchTerm) -> Result<(), CacheError> {
    if self.exists(term) {
      return Ok(());
    }
    fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
      path: self.dir.display().to_string(),
      source,
    })?;
    self.write_all(term, &[])
  }

  pub fn load_all(&self, term: &SearchTerm) -> Result<Vec<CacheRecord>, CacheError> {
    let path = self.path_for(term);
    if !path.exists() {
      return Ok(Vec::new());
    }
    let file = File::open(&path).map_err(|source| io_error(&path, source))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CacheError::Json {
      path: path.display().to_string(),
      source,
    })
  }

  /// Adds `record` unless a record with the same search-href is already stored.
  /// Returns whether the file changed.
  pub fn append_record(&self, term: &SearchTerm, record: CacheRecord) -> Result<bool, CacheError> {
    let mut records = self.load_all(term)?;
    if records.iter().any(|r| r.search_href == record.search_href) {
      return Ok(false);
    }
    records.push(record);
    self.write_all(term, &records)?;
    Ok(true)
  }

  pub fn contains_href(&self, term: &SearchTerm, href: &str) -> Result<bool, CacheError> {
    Ok(self.load_all(term)?.iter().any(|r| r.search_href == href))
  }

  pub fn cached_hrefs(&self, term: &SearchTerm) -> Result<HashSet<String>, CacheError> {
    Ok(
      self
        .load_all(term)?
        .into_iter()
        .map(|r| r.search_href)
        .collect(),
    )
  }

  // Serialize next to the target, then rename over it: readers see the old list or the
  // new one, never a truncated file.
  fn write_all(&self, term: &SearchTerm, records: &[CacheRecord]) -> Result<(), CacheError> {
    let path = self.path_for(term);
    let mut tmp = temp_file_in(&self.dir).map_err(|source| io_error(&self.dir, source))?;
    let payload = serde_json::to_vec(records).map_err(|source| CacheError::Json {
      path: path.display().to_string(),
      source,
    })?;
    tmp
      .write_all(&payload)
      .and_then(|_| tmp.as_file().sync_all())
      .map_err(|source| io_error(&path, source))?;
    tmp
      .persist(&path)
      .map_err(|e| io_error(&path, e.error))?;
    Ok(())
  }
}

fn io_error(path: &Path, source: std::io::Error) -> CacheError {
  CacheError::Io {
    path: path.display().to_string(),
    source,
  }
}

/// File names directly inside `download_dir`. A missing directory has no files.
pub fn list_downloaded(download_dir: &Path) -> HashSet<String> {
  WalkDir::new(download_dir)
    .max_depth(1)
    .min_depth(1)
    .into_iter()
    .flatten()
    .filter(|entry| entry.file_type().is_file())
    .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
    .collect()
}

/// Search hits whose href has no cache record yet, in search order.
pub fn pending_articles(articles: &[ArticleRef], cached: &HashSet<String>) -> Vec<ArticleRef> {
  articles
    .iter()
    .filter(|article| !cached.contains(&article.href))
    .cloned()
    .collect()
}

/// Records still waiting for their PDF, split into downloadable ones and ones that
/// never got a download link.
pub fn pending_downloads(
  records: Vec<CacheRecord>,
  downloaded: &HashSet<String>,
) -> (Vec<CacheRecord>, Vec<CacheRecord>) {
  records
    .into_iter()
    .filter(|record| !downloaded.contains(&record.file_name()))
    .partition(|record| record.download_href.is_some())
}
