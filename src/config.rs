use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::prompt::SearchTerm;

pub const DEFAULT_DOMAIN: &str = "https://www.biorxiv.org";
pub const DEFAULT_MAX_ARTICLES: usize = 10000;
pub const USER_AGENT: &str = "biorxiv-downloader (https://www.biorxiv.org)";

const HOME_VAR: &str = "BIORXIV_DL_HOME";
const DOMAIN_VAR: &str = "BIORXIV_DL_DOMAIN";
const MAX_ARTICLES_VAR: &str = "BIORXIV_DL_MAX_ARTICLES";
const MAX_ATTEMPTS_VAR: &str = "BIORXIV_DL_MAX_ATTEMPTS";

/// How often, and how patiently, a failed queue item is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub base_delay: Duration,
  pub max_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    RetryPolicy {
      max_attempts: 5,
      base_delay: Duration::from_millis(500),
      max_delay: Duration::from_secs(30),
    }
  }
}

impl RetryPolicy {
  /// No waiting between attempts, used by tests.
  pub fn immediate(max_attempts: u32) -> Self {
    RetryPolicy {
      max_attempts,
      base_delay: Duration::ZERO,
      max_delay: Duration::ZERO,
    }
  }

  /// Delay before the attempt following `failed_attempts` failures.
  pub fn delay_for(&self, failed_attempts: u32) -> Duration {
    if failed_attempts == 0 {
      return Duration::ZERO;
    }
    let factor = 2u32.saturating_pow(failed_attempts - 1);
    self.base_delay.saturating_mul(factor).min(self.max_delay)
  }
}

#[derive(Debug, Clone)]
pub struct Config {
  pub domain: String,
  pub home: PathBuf,
  pub max_articles: usize,
  pub retry: RetryPolicy,
  pub timeout: Duration,
}

impl Config {
  pub fn new(home: impl Into<PathBuf>) -> Self {
    Config {
      domain: DEFAULT_DOMAIN.to_string(),
      home: home.into(),
      max_articles: DEFAULT_MAX_ARTICLES,
      retry: RetryPolicy::default(),
      timeout: Duration::from_secs(60),
    }
  }

  pub fn from_env() -> Result<Self, ConfigError> {
    let home = match env::var_os(HOME_VAR) {
      Some(home) => PathBuf::from(home),
      None => env::current_dir().map_err(|_| ConfigError::NoHome)?,
    };
    let mut config = Config::new(home);
    if let Ok(domain) = env::var(DOMAIN_VAR) {
      config.domain = domain.trim_end_matches('/').to_string();
    }
    if let Some(max_articles) = read_number::<usize>(MAX_ARTICLES_VAR)? {
      config.max_articles = max_articles;
    }
    if let Some(max_attempts) = read_number::<u32>(MAX_ATTEMPTS_VAR)? {
      config.retry.max_attempts = max_attempts;
    }
    Ok(config)
  }

  pub fn cache_dir(&self) -> PathBuf {
    self.home.join("cache")
  }

  pub fn download_root(&self) -> PathBuf {
    self.home.join("downloads")
  }

  pub fn download_dir(&self, term: &SearchTerm) -> PathBuf {
    self.download_root().join(term.slug())
  }

  /// Query options appended to the search path, in request order.
  pub fn search_options(&self) -> Vec<(&'static str, String)> {
    vec![
      ("numresults", self.max_articles.to_string()),
      ("sort", "relevance-rank".to_string()),
    ]
  }

  /// Prefixes server-relative links with the configured domain.
  pub fn absolute_url(&self, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
      href.to_string()
    } else if href.starts_with('/') {
      format!("{}{}", self.domain, href)
    } else {
      format!("{}/{}", self.domain, href)
    }
  }
}

// Unset is fine; zero, garbage and values out of range for `T` are not.
fn read_number<T: FromStr + Default + PartialEq>(var: &'static str) -> Result<Option<T>, ConfigError> {
  match env::var(var) {
    Err(_) => Ok(None),
    Ok(value) => match value.trim().parse::<T>() {
      Ok(n) if n != T::default() => Ok(Some(n)),
      _ => Err(ConfigError::InvalidNumber { var, value }),
    },
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use lazy_static::lazy_static;

  use super::*;

  lazy_static! {
    // the environment is shared by every test thread
    static ref ENV_LOCK: Mutex<()> = Mutex::new(());
  }

  fn from_env_with(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    for var in [HOME_VAR, DOMAIN_VAR, MAX_ARTICLES_VAR, MAX_ATTEMPTS_VAR] {
      env::remove_var(var);
    }
    for (var, value) in vars {
      env::set_var(var, value);
    }
    let config = Config::from_env();
    for (var, _) in vars {
      env::remove_var(var);
    }
    config
  }

  #[test]
  fn env_overrides_the_defaults() {
    let config = from_env_with(&[
      (HOME_VAR, "/srv/biorxiv"),
      (DOMAIN_VAR, "http://127.0.0.1:8080/"),
      (MAX_ARTICLES_VAR, "250"),
      (MAX_ATTEMPTS_VAR, " 9 "),
    ])
    .unwrap();
    assert_eq!(config.home, PathBuf::from("/srv/biorxiv"));
    assert_eq!(config.domain, "http://127.0.0.1:8080");
    assert_eq!(config.max_articles, 250);
    assert_eq!(config.retry.max_attempts, 9);
    assert_eq!(config.retry.base_delay, RetryPolicy::default().base_delay);
  }

  #[test]
  fn unset_env_keeps_the_defaults() {
    let config = from_env_with(&[(HOME_VAR, "/srv/biorxiv")]).unwrap();
    assert_eq!(config.domain, DEFAULT_DOMAIN);
    assert_eq!(config.max_articles, DEFAULT_MAX_ARTICLES);
    assert_eq!(config.retry, RetryPolicy::default());
  }

  #[test]
  fn bad_numbers_are_rejected() {
    for value in ["abc", "0", "-3", ""] {
      let err = from_env_with(&[(HOME_VAR, "/srv"), (MAX_ARTICLES_VAR, value)]).unwrap_err();
      assert_eq!(
        err,
        ConfigError::InvalidNumber {
          var: MAX_ARTICLES_VAR,
          value: value.to_string()
        }
      );
    }
  }

  #[test]
  fn attempts_out_of_u32_range_are_rejected() {
    let err =
      from_env_with(&[(HOME_VAR, "/srv"), (MAX_ATTEMPTS_VAR, "4294967296")]).unwrap_err();
    assert!(matches!(
      err,
      ConfigError::InvalidNumber {
        var: MAX_ATTEMPTS_VAR,
        ..
      }
    ));
  }

  #[test]
  fn backoff_doubles_up_to_the_cap() {
    let policy = RetryPolicy {
      max_attempts: 10,
      base_delay: Duration::from_millis(100),
      max_delay: Duration::from_millis(700),
    };
    assert_eq!(policy.delay_for(0), Duration::ZERO);
    assert_eq!(policy.delay_for(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    assert_eq!(policy.delay_for(4), Duration::from_millis(700));
    assert_eq!(policy.delay_for(40), Duration::from_millis(700));
  }

  #[test]
  fn relative_links_get_the_domain() {
    let config = Config::new("/tmp/x");
    assert_eq!(
      config.absolute_url("/content/10.1101/2020.01.01.000001v1"),
      "https://www.biorxiv.org/content/10.1101/2020.01.01.000001v1"
    );
    assert_eq!(
      config.absolute_url("https://www.biorxiv.org/a.full.pdf"),
      "https://www.biorxiv.org/a.full.pdf"
    );
  }

  #[test]
  fn layout_uses_the_slug() {
    let config = Config::new("/data");
    let term = SearchTerm::parse("gene editing").unwrap();
    assert_eq!(config.cache_dir(), PathBuf::from("/data/cache"));
    assert_eq!(
      config.download_dir(&term),
      PathBuf::from("/data/downloads/gene-editing")
    );
  }
}
