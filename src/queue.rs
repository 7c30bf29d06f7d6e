//! The two work queues of a run: article pages waiting for their PDF link, and cached
//! records waiting for their PDF.
//!
//! Both drain front to back. A transiently failing item goes to the tail with its
//! attempt counter bumped and is retried after a backoff delay; once it runs out of
//! attempts, or fails for a structural reason, it lands in the failed list of the
//! returned `RunReport`.

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use crate::article::LinkResolver;
use crate::config::RetryPolicy;
use crate::error::{CacheError, ItemError, PipelineError};
use crate::local::{self, CacheRecord, CacheStore};
use crate::prompt::SearchTerm;
use crate::remote::Fetch;
use crate::search::ArticleRef;

/// What the logs call a queue item.
pub trait QueueItem {
  fn label(&self) -> &str;
}

impl QueueItem for ArticleRef {
  fn label(&self) -> &str {
    &self.href
  }
}

impl QueueItem for CacheRecord {
  fn label(&self) -> &str {
    &self.title
  }
}

#[derive(Debug)]
pub struct Attempt<T> {
  pub item: T,
  pub failures: u32,
}

#[derive(Debug)]
pub struct Failure<T> {
  pub item: T,
  pub attempts: u32,
  pub error: ItemError,
}

#[derive(Debug)]
pub struct RunReport<T> {
  pub completed: usize,
  pub failed: Vec<Failure<T>>,
}

impl<T> RunReport<T> {
  fn empty() -> Self {
    RunReport {
      completed: 0,
      failed: Vec::new(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
  Requeued,
  GaveUp,
}

pub struct RetryQueue<T> {
  pending: VecDeque<Attempt<T>>,
  failed: Vec<Failure<T>>,
  policy: RetryPolicy,
}

impl<T> RetryQueue<T> {
  pub fn new(items: impl IntoIterator<Item = T>, policy: RetryPolicy) -> Self {
    RetryQueue {
      pending: items
        .into_iter()
        .map(|item| Attempt { item, failures: 0 })
        .collect(),
      failed: Vec::new(),
      policy,
    }
  }

  pub fn len(&self) -> usize {
    self.pending.len()
  }

  pub fn is_empty(&self) -> bool {
    self.pending.is_empty()
  }

  pub fn pop(&mut self) -> Option<Attempt<T>> {
    self.pending.pop_front()
  }

  /// Sends a failed attempt to the tail, or to the failed list when it is spent.
  pub fn fail(&mut self, mut attempt: Attempt<T>, error: ItemError) -> Disposition {
    attempt.failures += 1;
    if error.is_transient() && attempt.failures < self.policy.max_attempts {
      self.pending.push_back(attempt);
      Disposition::Requeued
    } else {
      self.failed.push(Failure {
        item: attempt.item,
        attempts: attempt.failures,
        error,
      });
      Disposition::GaveUp
    }
  }

  pub fn policy(&self) -> &RetryPolicy {
    &self.policy
  }

  pub fn take_failed(&mut self) -> Vec<Failure<T>> {
    std::mem::take(&mut self.failed)
  }
}

/// Errors a single step can raise: item errors feed the retry policy, the rest end the run.
pub enum StepError {
  Item(ItemError),
  Fatal(PipelineError),
}

impl From<ItemError> for StepError {
  fn from(e: ItemError) -> Self {
    StepError::Item(e)
  }
}

impl From<CacheError> for StepError {
  fn from(e: CacheError) -> Self {
    StepError::Fatal(PipelineError::Cache(e))
  }
}

pub fn progress_bar(len: usize, prefix: &'static str) -> ProgressBar {
  let style = ProgressStyle::with_template("{prefix} [{bar:50.cyan/blue}] ({pos}/{len}) {msg}")
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉-");
  ProgressBar::new(len as u64).with_style(style).with_prefix(prefix)
}

/// Runs `step` on every queued item until the queue is empty.
pub fn drain<T: QueueItem>(
  queue: &mut RetryQueue<T>,
  progress: &ProgressBar,
  mut step: impl FnMut(&T) -> Result<(), StepError>,
) -> Result<RunReport<T>, PipelineError> {
  let mut report = RunReport::empty();
  while let Some(attempt) = queue.pop() {
    let delay = queue.policy().delay_for(attempt.failures);
    if !delay.is_zero() {
      debug!(item = attempt.item.label(), ?delay, "backing off before retry");
      thread::sleep(delay);
    }
    match step(&attempt.item) {
      Ok(()) => {
        report.completed += 1;
        progress.inc(1);
      }
      Err(StepError::Fatal(e)) => return Err(e),
      Err(StepError::Item(e)) => {
        let label = attempt.item.label().to_string();
        let attempts = attempt.failures + 1;
        let message = e.to_string();
        match queue.fail(attempt, e) {
          Disposition::Requeued => progress.suspend(|| {
            warn!(item = %label, attempts, error = %message, "requeued");
          }),
          Disposition::GaveUp => {
            progress.suspend(|| {
              error!(item = %label, attempts, error = %message, "giving up");
            });
            progress.inc(1);
          }
        }
      }
    }
  }
  report.failed = queue.take_failed();
  progress.finish();
  Ok(report)
}

/// Resolves every queued article and appends its record to the cache as soon as it is
/// known, so an interrupted run resumes where it stopped.
pub fn run_resolution_queue(
  queue: &mut RetryQueue<ArticleRef>,
  resolver: &dyn LinkResolver,
  store: &CacheStore,
  term: &SearchTerm,
  progress: &ProgressBar,
) -> Result<RunReport<ArticleRef>, PipelineError> {
  drain(queue, progress, |article| {
    let download_href = resolver.resolve(&article.href)?;
    if !store.append_record(term, CacheRecord::new(article, download_href))? {
      debug!(href = %article.href, "already cached");
    }
    Ok(())
  })
}

/// Saves one record's PDF into a download directory.
pub trait PdfDownloader {
  fn download(&self, record: &CacheRecord, download_dir: &Path) -> Result<PathBuf, ItemError>;
}

/// Streams into a temporary file next to the target and renames it to `<title>.pdf`
/// once the body is complete. An interrupted transfer leaves no `.pdf` behind.
pub struct FilePdfDownloader<'a> {
  fetcher: &'a dyn Fetch,
}

impl<'a> FilePdfDownloader<'a> {
  pub fn new(fetcher: &'a dyn Fetch) -> Self {
    FilePdfDownloader { fetcher }
  }
}

impl PdfDownloader for FilePdfDownloader<'_> {
  fn download(&self, record: &CacheRecord, download_dir: &Path) -> Result<PathBuf, ItemError> {
    let url = record
      .download_href
      .as_deref()
      .ok_or(ItemError::NoDownloadLink)?;
    let target = download_dir.join(record.file_name());
    let save_error = |source: std::io::Error| ItemError::Save {
      path: target.display().to_string(),
      source,
    };
    let mut tmp = local::temp_file_in(download_dir).map_err(save_error)?;
    let bytes = self.fetcher.download_to(url, &mut tmp)?;
    tmp.flush().map_err(save_error)?;
    tmp.persist(&target).map_err(|e| save_error(e.error))?;
    debug!(path = %target.display(), bytes, "saved");
    Ok(target)
  }
}

pub fn run_download_queue(
  queue: &mut RetryQueue<CacheRecord>,
  downloader: &dyn PdfDownloader,
  download_dir: &Path,
  progress: &ProgressBar,
) -> Result<RunReport<CacheRecord>, PipelineError> {
  drain(queue, progress, |record| {
    downloader.download(record, download_dir)?;
    Ok(())
  })
}
