//! Storage collaborator boundary.
//!
//! The feed service depends only on this contract; the uniqueness
//! constraint on `(user_id, tweet_id)` likes is the sole integrity
//! guarantee the core needs from an implementation.

pub mod memory;

pub use memory::MemoryStorage;

use crate::api::{Cursor, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("like already exists for this user and tweet")]
    DuplicateLike,
    #[error("unknown user: {0}")]
    UnknownUser(String),
    #[error("unknown tweet: {0}")]
    UnknownTweet(String),
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Feed filter, closed over its three variants. `FollowedBy` is resolved
/// against the follow graph inside the implementation so a feed page is one
/// storage query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TweetFilter {
    All,
    ByAuthor(String),
    FollowedBy(String),
}

/// One enriched feed row: the tweet plus everything a page eagerly fetches.
#[derive(Clone, Debug)]
pub struct TweetRecord {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: User,
    pub like_count: u64,
    pub liked_by_viewer: bool,
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Rows matching `filter` in (created_at desc, id desc) order, at most
    /// `limit`. When `cursor` is given, the page starts at the cursor row
    /// itself: rows at or after that sort position. `liked_by_viewer` is
    /// false on every row when `viewer` is absent.
    async fn find_tweets(
        &self,
        filter: &TweetFilter,
        cursor: Option<&Cursor>,
        limit: usize,
        viewer: Option<&str>,
    ) -> Result<Vec<TweetRecord>, StorageError>;

    /// Persist a new tweet; the implementation assigns id and timestamp.
    async fn create_tweet(
        &self,
        author_id: &str,
        content: &str,
    ) -> Result<TweetRecord, StorageError>;

    async fn find_like(&self, user_id: &str, tweet_id: &str) -> Result<bool, StorageError>;

    /// Fails with [`StorageError::DuplicateLike`] when the `(user, tweet)`
    /// pair already holds a like.
    async fn create_like(&self, user_id: &str, tweet_id: &str) -> Result<(), StorageError>;

    /// Returns whether a like row existed and was removed.
    async fn delete_like(&self, user_id: &str, tweet_id: &str) -> Result<bool, StorageError>;
}
