use crate::config::Config;
use crate::error::{ItemError, ParseError};
use crate::html;
use crate::remote::Fetch;

/// Looks up the full-text PDF link for one article page.
pub trait LinkResolver {
  fn resolve(&self, article_href: &str) -> Result<String, ItemError>;
}

/// Resolves links by fetching `<domain><href>` and reading the new-tab link in the
/// content pane.
pub struct PageLinkResolver<'a> {
  fetcher: &'a dyn Fetch,
  config: &'a Config,
}

impl<'a> PageLinkResolver<'a> {
  pub fn new(fetcher: &'a dyn Fetch, config: &'a Config) -> Self {
    PageLinkResolver { fetcher, config }
  }
}

impl LinkResolver for PageLinkResolver<'_> {
  fn resolve(&self, article_href: &str) -> Result<String, ItemError> {
    let payload = self.fetcher.get_text(&self.config.absolute_url(article_href))?;
    let href = parse_download_link(&payload)?;
    Ok(self.config.absolute_url(&href))
  }
}

/// `div.pane-content p a[target='_blank']`, first match.
pub fn parse_download_link(payload: &str) -> Result<String, ParseError> {
  html::with_root(payload, |doc, root| {
    let xpath = format!(
      "//div[{}]//p//a[@target='_blank']",
      html::has_class("pane-content")
    );
    html::find_first(doc, root, &xpath)
      .and_then(|link| link.get_attribute("href"))
      .filter(|href| !href.trim().is_empty())
      .map(|href| href.trim().to_string())
      .ok_or(ParseError::MissingElement("download link"))
  })
}
