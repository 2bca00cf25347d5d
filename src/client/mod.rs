//! Client side of the permission model: fetch the caller's snapshot once,
//! answer UI gating questions from memory.

pub mod cache;
pub mod fetcher;
pub mod gate;

pub use cache::{CacheState, PermissionCache};
pub use fetcher::{ClientError, HttpPermissionFetcher, PermissionClientConfig, PermissionFetcher};
pub use gate::{ButtonState, GatedButton, PermissionGate};
