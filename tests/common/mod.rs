use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;

use biorxiv_downloader::error::FetchError;
use biorxiv_downloader::remote::Fetch;

/// Serves canned bodies by URL. Unknown URLs answer 404; URLs registered with
/// `flaky` answer 503 that many times first.
#[derive(Default)]
pub struct MemoryFetcher {
  bodies: HashMap<String, Vec<u8>>,
  failures_left: RefCell<HashMap<String, u32>>,
  requests: RefCell<Vec<String>>,
}

impl MemoryFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn serve(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
    self.bodies.insert(url.into(), body.into());
    self
  }

  pub fn flaky(self, url: impl Into<String>, failures: u32) -> Self {
    self.failures_left.borrow_mut().insert(url.into(), failures);
    self
  }

  pub fn requests_to(&self, url: &str) -> usize {
    self.requests.borrow().iter().filter(|u| *u == url).count()
  }

  fn body(&self, url: &str) -> Result<&[u8], FetchError> {
    self.requests.borrow_mut().push(url.to_string());
    if let Some(left) = self.failures_left.borrow_mut().get_mut(url) {
      if *left > 0 {
        *left -= 1;
        return Err(FetchError::Status {
          url: url.to_string(),
          status: 503,
        });
      }
    }
    self
      .bodies
      .get(url)
      .map(Vec::as_slice)
      .ok_or_else(|| FetchError::Status {
        url: url.to_string(),
        status: 404,
      })
  }
}

impl Fetch for MemoryFetcher {
  fn get_text(&self, url: &str) -> Result<String, FetchError> {
    Ok(String::from_utf8_lossy(self.body(url)?).into_owned())
  }

  fn download_to(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
    let body = self.body(url)?;
    sink.write_all(body).map_err(|source| FetchError::Io {
      url: url.to_string(),
      source,
    })?;
    Ok(body.len() as u64)
  }
}

pub fn search_page(count_heading: &str, articles: &[(&str, &str)]) -> String {
  let items: String = articles
    .iter()
    .map(|(href, title)| {
      format!(
        r#"<li><div class="highwire-cite"><a class="highwire-cite-linked-title" href="{}"><span class="highwire-cite-title">{}</span></a></div></li>"#,
        href, title
      )
    })
    .collect();
  format!(
    r#"<html><head><title>Search</title></head><body><h1 id="page-title">{}</h1><ul class="highwire-search-results-list">{}</ul></body></html>"#,
    count_heading, items
  )
}

pub fn article_page(pdf_url: &str) -> String {
  format!(
    r#"<html><body><div class="panel-pane pane-custom"><div class="pane-content"><p><a href="{}" target="_blank">Download PDF</a></p></div></div></body></html>"#,
    pdf_url
  )
}
