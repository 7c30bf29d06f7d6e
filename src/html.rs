//! Thin libxml wrapper: parse an HTML page and run XPath queries against it.

use std::sync::Mutex;

use lazy_static::lazy_static;
use libxml::parser::Parser;
use libxml::readonly::RoNode;
use libxml::tree::Document;

use crate::error::ParseError;

lazy_static! {
  // libxml2 keeps parser globals; every parse and query runs under this lock.
  static ref LIBXML_LOCK: Mutex<()> = Mutex::new(());
}

/// Parses `payload` as HTML and hands the document root to `query`. The document does
/// not outlive the call, so `query` must copy out whatever it needs.
pub fn with_root<T>(
  payload: &str,
  query: impl FnOnce(&Document, RoNode) -> Result<T, ParseError>,
) -> Result<T, ParseError> {
  if payload.trim().is_empty() {
    return Err(ParseError::Html);
  }
  let _guard = LIBXML_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
  let parser = Parser::default_html();
  let doc = parser
    .parse_string(payload)
    .map_err(|_| ParseError::Html)?;
  let root = doc.get_root_readonly().ok_or(ParseError::Html)?;
  query(&doc, root)
}

pub fn find_all(doc: &Document, root: RoNode, xpath: &str) -> Vec<RoNode> {
  root.findnodes(xpath, doc).unwrap_or_default()
}

pub fn find_first(doc: &Document, root: RoNode, xpath: &str) -> Option<RoNode> {
  find_all(doc, root, xpath).into_iter().next()
}

/// XPath predicate equivalent to the CSS `.class` selector.
pub fn has_class(class: &str) -> String {
  format!(
    "contains(concat(' ', normalize-space(@class), ' '), ' {} ')",
    class
  )
}
