//! Application services layer.

pub mod accounts;
pub mod comments;
pub mod error;
pub mod feed;
pub mod forms;
pub mod media;
pub mod outcome;
pub mod pagination;
pub mod posts;
pub mod query;
pub mod repos;
