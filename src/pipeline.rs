use std::fmt;
use std::fs;

use tracing::info;

use crate::article::PageLinkResolver;
use crate::config::Config;
use crate::error::PipelineError;
use crate::local::{self, CacheRecord, CacheStore};
use crate::prompt::SearchTerm;
use crate::queue::{self, FilePdfDownloader, Failure, RetryQueue};
use crate::remote::Fetch;
use crate::search::{self, ArticleRef};

/// Outcome of one run, for the final report.
#[derive(Debug)]
pub struct Summary {
  pub result_count: usize,
  pub links_resolved: usize,
  pub downloaded: usize,
  pub unresolved: Vec<Failure<ArticleRef>>,
  pub not_downloaded: Vec<Failure<CacheRecord>>,
  pub unlinked: Vec<CacheRecord>,
}

impl Summary {
  pub fn is_clean(&self) -> bool {
    self.unresolved.is_empty() && self.not_downloaded.is_empty() && self.unlinked.is_empty()
  }
}

impl fmt::Display for Summary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(
      f,
      "-- {} results, {} links resolved, {} PDFs downloaded this run.",
      self.result_count, self.links_resolved, self.downloaded
    )?;
    for failure in &self.unresolved {
      writeln!(
        f,
        "-- unresolved after {} attempt(s): {} ({})",
        failure.attempts, failure.item.href, failure.error
      )?;
    }
    for failure in &self.not_downloaded {
      writeln!(
        f,
        "-- not downloaded after {} attempt(s): {} ({})",
        failure.attempts, failure.item.title, failure.error
      )?;
    }
    for record in &self.unlinked {
      writeln!(f, "-- no download link cached: {}", record.search_href)?;
    }
    Ok(())
  }
}

/// Search, resolve what is not cached yet, then download what is not on disk yet.
pub fn run(config: &Config, term: &SearchTerm, fetcher: &dyn Fetch) -> Result<Summary, PipelineError> {
  let download_dir = config.download_dir(term);
  fs::create_dir_all(&download_dir).map_err(|source| PipelineError::Io {
    context: format!("creating {}", download_dir.display()),
    source,
  })?;
  let store = CacheStore::new(config.cache_dir());
  store.ensure_initialized(term)?;
  let swept = local::sweep_stale_temp_files(&download_dir) + local::sweep_stale_temp_files(&config.cache_dir());
  if swept > 0 {
    info!("removed {} partial file(s) left by an interrupted run", swept);
  }

  let page = search::search(fetcher, config, term)?;
  let result_count = page.result_count;
  info!("Found {} Results for Search Term: {}", result_count, term);

  // Stage 1: download links
  let cached = store.cached_hrefs(term)?;
  let mut resolution = RetryQueue::new(local::pending_articles(&page.articles, &cached), config.retry);
  let mut links_resolved = 0;
  let mut unresolved = Vec::new();
  if !resolution.is_empty() {
    info!("{} of {} Links Scraped", cached.len(), result_count);
    let resolver = PageLinkResolver::new(fetcher, config);
    let progress = queue::progress_bar(resolution.len(), "Retrieving Download Links:");
    let report = queue::run_resolution_queue(&mut resolution, &resolver, &store, term, &progress)?;
    links_resolved = report.completed;
    unresolved = report.failed;
  }

  // Stage 2: PDFs
  let records = store.load_all(term)?;
  let total_cached = records.len();
  let (pending, unlinked) = local::pending_downloads(records, &local::list_downloaded(&download_dir));
  let mut downloading = RetryQueue::new(pending, config.retry);
  let mut downloaded = 0;
  let mut not_downloaded = Vec::new();
  if downloading.is_empty() {
    info!("No Articles Available for Download.");
  } else {
    info!(
      "{} of {} Have Been Downloaded",
      total_cached - downloading.len() - unlinked.len(),
      result_count
    );
    let downloader = FilePdfDownloader::new(fetcher);
    let progress = queue::progress_bar(downloading.len(), "Downloading PDFs:");
    let report = queue::run_download_queue(&mut downloading, &downloader, &download_dir, &progress)?;
    downloaded = report.completed;
    not_downloaded = report.failed;
  }

  Ok(Summary {
    result_count,
    links_resolved,
    downloaded,
    unresolved,
    not_downloaded,
    unlinked,
  })
}
