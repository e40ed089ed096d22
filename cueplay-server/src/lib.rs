//! HTTP remote for a [`cueplay_core::PlaybackSession`].

pub mod api;
pub mod error;

pub use api::{create_router, AppState};
pub use error::ApiError;
