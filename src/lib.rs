//! Download every image of a public article into one zip archive.
//!
//! [`ImagePipeline`] is the entry point: analyse an article, start a download, poll
//! its status and fetch the resulting archive.

pub mod application;
pub mod config;
pub mod domain;
pub mod filter;
pub mod http;
pub mod resolver;
pub mod utils;

pub use application::{Analysis, ArchiveDownload, ImagePipeline, TaskRegistry};
pub use config::PipelineConfig;
pub use domain::{
    AppError, DownloadOptions, DownloadTask, FilterOptions, ImageDescriptor, TaskStatus,
};
pub use http::{HttpError, ProxiedImage};
