pub mod client;
pub mod models;

pub use client::{HttpClient, HttpError};
pub use models::{ImageStream, ProxiedImage};
