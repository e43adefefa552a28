pub mod comments;
pub mod details;
pub mod posts;
pub mod reactions;
