use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;

use crate::config::Config;
use crate::error::{ItemError, ParseError, PipelineError};
use crate::html;
use crate::prompt::SearchTerm;
use crate::remote::Fetch;

lazy_static! {
  // assumes no more than 99,999 results
  static ref RESULT_COUNT_REGEX: Regex = Regex::new(r"([0-9]{1,5})\sResults").unwrap();
}

const ARTICLE_LINK_CLASS: &str = "highwire-cite-linked-title";

/// One search hit: the server-relative article path and the title used as file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRef {
  pub href: String,
  pub title: String,
}

impl ArticleRef {
  pub fn new(href: impl Into<String>, title: impl Into<String>) -> Self {
    ArticleRef {
      href: href.into(),
      title: title.into(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
  pub result_count: usize,
  pub articles: Vec<ArticleRef>,
}

pub fn search_url(config: &Config, term: &SearchTerm) -> String {
  let options: String = config
    .search_options()
    .into_iter()
    .map(|(key, value)| format!("%20{}%3A{}", key, urlencoding::encode(&value)))
    .collect();
  format!(
    "{}/search/{}{}",
    config.domain,
    urlencoding::encode(term.as_str()),
    options
  )
}

/// Reads the "<N> Results" heading. Anything but exactly one match counts as zero.
pub fn parse_result_count(heading: &str) -> usize {
  let mut matches = RESULT_COUNT_REGEX.captures_iter(heading);
  match (matches.next(), matches.next()) {
    (Some(cap), None) => cap[1].parse().unwrap_or(0),
    _ => 0,
  }
}

pub fn parse_search_page(payload: &str) -> Result<SearchPage, ParseError> {
  html::with_root(payload, |doc, root| {
    let result_count = html::find_first(doc, root, "//h1")
      .map(|h1| parse_result_count(h1.get_content().trim()))
      .unwrap_or(0);
    let xpath = format!("//a[{}]", html::has_class(ARTICLE_LINK_CLASS));
    let articles = html::find_all(doc, root, &xpath)
      .into_iter()
      .filter_map(|link| {
        let href = link.get_attribute("href")?;
        let text = link.get_content();
        let title = match text.trim() {
          "" => href.clone(),
          title => title.to_string(),
        };
        Some(ArticleRef { href, title })
      })
      .collect();
    Ok(SearchPage {
      result_count,
      articles,
    })
  })
}

/// Runs the single search request. A page whose article list disagrees with its own
/// result count cannot be trusted and aborts the run.
pub fn search(
  fetcher: &dyn Fetch,
  config: &Config,
  term: &SearchTerm,
) -> Result<SearchPage, PipelineError> {
  let url = search_url(config, term);
  info!(%url, "searching");
  let payload = fetcher
    .get_text(&url)
    .map_err(|e| PipelineError::Search(ItemError::from(e)))?;
  let page = parse_search_page(&payload).map_err(|e| PipelineError::Search(e.into()))?;
  if page.articles.len() != page.result_count {
    return Err(PipelineError::CountMismatch {
      expected: page.result_count,
      found: page.articles.len(),
    });
  }
  Ok(page)
}
