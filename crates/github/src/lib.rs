//! GitHub adapter for job notifications.
//!
//! [`GitHubClient`] wraps the issue-comment REST endpoints,
//! [`format`] renders job snapshots as Markdown, and [`CommentNotifier`]
//! ties the two together behind the engine's `Notifier` port.

pub mod client;
pub mod format;
pub mod notifier;

pub use client::{GitHubApiError, GitHubClient};
pub use notifier::CommentNotifier;
