pub mod archiver;
pub mod download_coordinator;
pub mod fetcher;
pub mod pipeline;
pub mod task_registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use archiver::{Archiver, PackagedArchive};
pub use download_coordinator::{BatchOutcome, DownloadCoordinator};
pub use fetcher::Fetcher;
pub use pipeline::{Analysis, ArchiveDownload, ImagePipeline};
pub use task_registry::TaskRegistry;
