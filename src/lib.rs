//! Search bioRxiv for a term, resolve each hit's PDF link and download the PDFs,
//! keeping a per-term JSON cache so that interrupted runs pick up where they left off.

pub mod article;
pub mod config;
pub mod error;
pub mod html;
pub mod local;
pub mod logging;
pub mod pipeline;
pub mod prompt;
pub mod queue;
pub mod remote;
pub mod search;
