pub mod error;
pub mod model;

pub use error::AppError;
pub use model::{
    DownloadOptions, DownloadOutcome, DownloadResult, DownloadTask, FilterOptions,
    ImageDescriptor, SavedImage, TaskStatus,
};
