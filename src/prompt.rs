use std::fmt;
use std::io::{BufRead, Write};

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::PromptError;

lazy_static! {
  static ref SEARCH_TERM_REGEX: Regex = Regex::new(r"^[A-Za-z0-9\-: ]{1,128}$").unwrap();
  static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
}

pub const PROMPT: &str = "Enter bioRxiv Search Term: ";
pub const INVALID_INPUT: &str = "Error: Invalid input";

/// A search term that passed validation. Identifies one cache file and one download
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchTerm(String);

impl SearchTerm {
  pub fn parse(raw: &str) -> Result<Self, PromptError> {
    let trimmed = raw.trim();
    if SEARCH_TERM_REGEX.is_match(trimmed) {
      Ok(SearchTerm(trimmed.to_string()))
    } else {
      Err(PromptError::InvalidSearchTerm(raw.to_string()))
    }
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// File-name form of the term, shared by the cache file and the download directory.
  pub fn slug(&self) -> String {
    WHITESPACE_REGEX.replace_all(&self.0, "-").into_owned()
  }
}

impl fmt::Display for SearchTerm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Asks for a search term until a valid one is entered.
pub fn prompt_search_term<R: BufRead, W: Write>(
  mut input: R,
  mut output: W,
) -> Result<SearchTerm, PromptError> {
  let mut line = String::new();
  loop {
    write!(output, "{}", PROMPT)?;
    output.flush()?;
    line.clear();
    if input.read_line(&mut line)? == 0 {
      return Err(PromptError::EndOfInput);
    }
    match SearchTerm::parse(&line) {
      Ok(term) => return Ok(term),
      Err(_) => writeln!(output, "{}", INVALID_INPUT)?,
    }
  }
}
