use std::error::Error;
use std::io;
use std::process::ExitCode;

use biorxiv_downloader::config::Config;
use biorxiv_downloader::logging;
use biorxiv_downloader::pipeline;
use biorxiv_downloader::prompt::prompt_search_term;
use biorxiv_downloader::remote::HttpFetcher;

// Reentrant: links and PDFs from an earlier run with the same term are not fetched
// again. Ctrl-C ends the process at once; whatever already reached the cache stays.
fn main() -> ExitCode {
  logging::init();
  match run() {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      eprintln!("Error: {}", e);
      ExitCode::FAILURE
    }
  }
}

fn run() -> Result<(), Box<dyn Error>> {
  let config = Config::from_env()?;
  let term = prompt_search_term(io::stdin().lock(), io::stdout())?;
  let fetcher = HttpFetcher::new(config.timeout)?;

  let summary = pipeline::run(&config, &term, &fetcher)?;
  eprint!("{}", summary);
  if !summary.is_clean() {
    eprintln!("-- some articles are still missing; run again with the same term to retry them.");
  }
  Ok(())
}
