//! Application services: paginated loading, image resolution, and sessions.

pub mod error;
pub mod images;
pub mod loader;
pub mod pagination;
pub mod session;
pub mod sources;
