use std::io::{self, Read, Write};
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use crate::config::USER_AGENT;
use crate::error::FetchError;

/// One GET per call, no retries. Retrying is the queue runners' business.
pub trait Fetch {
  fn get_text(&self, url: &str) -> Result<String, FetchError>;

  /// Streams the response body into `sink`, returning the number of bytes written.
  fn download_to(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError>;
}

pub struct HttpFetcher {
  client: Client,
}

impl HttpFetcher {
  pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
    let client = reqwest::blocking::Client::builder()
      .user_agent(USER_AGENT)
      .timeout(timeout)
      .build()?;
    Ok(HttpFetcher { client })
  }

  fn get(&self, url: &str) -> Result<reqwest::blocking::Response, FetchError> {
    let resp = self.client.get(url).send().map_err(|source| FetchError::Network {
      url: url.to_string(),
      source,
    })?;
    let status = resp.status();
    debug!(url, status = status.as_u16(), "GET");
    if status != 200 {
      return Err(FetchError::Status {
        url: url.to_string(),
        status: status.as_u16(),
      });
    }
    Ok(resp)
  }
}

impl Fetch for HttpFetcher {
  fn get_text(&self, url: &str) -> Result<String, FetchError> {
    self.get(url)?.text().map_err(|source| FetchError::Network {
      url: url.to_string(),
      source,
    })
  }

  fn download_to(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
    let mut resp = self.get(url)?;
    let mut buf = vec![0u8; 64 * 1024];
    let mut written = 0u64;
    loop {
      let n = match resp.read(&mut buf) {
        Ok(0) => break,
        Ok(n) => n,
        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
        Err(source) => {
          return Err(FetchError::Transfer {
            url: url.to_string(),
            source,
          })
        }
      };
      sink.write_all(&buf[..n]).map_err(|source| FetchError::Io {
        url: url.to_string(),
        source,
      })?;
      written += n as u64;
    }
    Ok(written)
  }
}
