//! In-memory storage: mutex-guarded tables, one critical section per
//! contract call. Uniqueness of `(user, tweet)` likes is a set insert
//! inside that critical section.

use crate::api::{Cursor, User};
use crate::storage::{Storage, StorageError, TweetFilter, TweetRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Clone, Debug)]
struct TweetRow {
    id: String,
    author_id: String,
    content: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, User>,
    follows: HashSet<(String, String)>,
    tweets: Vec<TweetRow>,
    likes: HashSet<(String, String)>,
    next_tweet_id: u64,
}

impl Tables {
    fn enrich(&self, row: &TweetRow, viewer: Option<&str>) -> TweetRecord {
        let author = self
            .users
            .get(&row.author_id)
            .cloned()
            .unwrap_or_else(|| User {
                id: row.author_id.clone(),
                name: row.author_id.clone(),
                avatar_url: None,
            });
        let like_count = self
            .likes
            .iter()
            .filter(|(_, tweet_id)| *tweet_id == row.id)
            .count() as u64;
        let liked_by_viewer = viewer
            .map(|viewer| self.likes.contains(&(viewer.to_string(), row.id.clone())))
            .unwrap_or(false);

        TweetRecord {
            id: row.id.clone(),
            content: row.content.clone(),
            created_at: row.created_at,
            author,
            like_count,
            liked_by_viewer,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        let mut tables = self.tables.lock().unwrap();
        tables.users.insert(user.id.clone(), user);
    }

    pub fn insert_follow(&self, follower_id: &str, followee_id: &str) {
        let mut tables = self.tables.lock().unwrap();
        tables
            .follows
            .insert((follower_id.to_string(), followee_id.to_string()));
    }

    /// Insert a tweet with a caller-chosen timestamp. Seeding and tests
    /// need deterministic ordering; the trait's `create_tweet` stamps now.
    pub fn insert_tweet_at(
        &self,
        author_id: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.users.contains_key(author_id) {
            return Err(StorageError::UnknownUser(author_id.to_string()));
        }
        let id = format!("t{:08}", tables.next_tweet_id);
        tables.next_tweet_id += 1;
        tables.tweets.push(TweetRow {
            id: id.clone(),
            author_id: author_id.to_string(),
            content: content.to_string(),
            created_at,
        });
        Ok(id)
    }
}

/// Descending by created_at, ties broken by id descending.
fn feed_order(a: &TweetRow, b: &TweetRow) -> std::cmp::Ordering {
    (b.created_at, &b.id).cmp(&(a.created_at, &a.id))
}

/// Whether `row` sorts at or after the cursor row; the cursor row itself
/// leads the page.
fn at_or_after(row: &TweetRow, cursor: &Cursor) -> bool {
    row.created_at < cursor.created_at
        || (row.created_at == cursor.created_at && row.id <= cursor.id)
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn find_tweets(
        &self,
        filter: &TweetFilter,
        cursor: Option<&Cursor>,
        limit: usize,
        viewer: Option<&str>,
    ) -> Result<Vec<TweetRecord>, StorageError> {
        let tables = self.tables.lock().unwrap();

        let mut rows: Vec<&TweetRow> = tables
            .tweets
            .iter()
            .filter(|row| match filter {
                TweetFilter::All => true,
                TweetFilter::ByAuthor(author_id) => row.author_id == *author_id,
                TweetFilter::FollowedBy(viewer_id) => tables
                    .follows
                    .contains(&(viewer_id.clone(), row.author_id.clone())),
            })
            .filter(|row| cursor.map(|cursor| at_or_after(row, cursor)).unwrap_or(true))
            .collect();
        rows.sort_by(|a, b| feed_order(a, b));
        rows.truncate(limit);

        Ok(rows
            .into_iter()
            .map(|row| tables.enrich(row, viewer))
            .collect())
    }

    async fn create_tweet(
        &self,
        author_id: &str,
        content: &str,
    ) -> Result<TweetRecord, StorageError> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.users.contains_key(author_id) {
            return Err(StorageError::UnknownUser(author_id.to_string()));
        }
        let id = format!("t{:08}", tables.next_tweet_id);
        tables.next_tweet_id += 1;
        let row = TweetRow {
            id,
            author_id: author_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        tables.tweets.push(row.clone());
        Ok(tables.enrich(&row, Some(author_id)))
    }

    async fn find_like(&self, user_id: &str, tweet_id: &str) -> Result<bool, StorageError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .likes
            .contains(&(user_id.to_string(), tweet_id.to_string())))
    }

    async fn create_like(&self, user_id: &str, tweet_id: &str) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.users.contains_key(user_id) {
            return Err(StorageError::UnknownUser(user_id.to_string()));
        }
        if !tables.tweets.iter().any(|row| row.id == tweet_id) {
            return Err(StorageError::UnknownTweet(tweet_id.to_string()));
        }
        if !tables
            .likes
            .insert((user_id.to_string(), tweet_id.to_string()))
        {
            return Err(StorageError::DuplicateLike);
        }
        Ok(())
    }

    async fn delete_like(&self, user_id: &str, tweet_id: &str) -> Result<bool, StorageError> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .likes
            .remove(&(user_id.to_string(), tweet_id.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            name: id.to_string(),
            avatar_url: None,
        }
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn orders_newest_first_with_id_tiebreak() {
        let storage = MemoryStorage::new();
        storage.insert_user(user("alice"));
        let t0 = storage.insert_tweet_at("alice", "first", at(1)).unwrap();
        let t1 = storage.insert_tweet_at("alice", "tied low", at(2)).unwrap();
        let t2 = storage.insert_tweet_at("alice", "tied high", at(2)).unwrap();

        let rows = storage
            .find_tweets(&TweetFilter::All, None, 10, None)
            .await
            .unwrap();
        let ids: Vec<&str> = rows.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, vec![t2.as_str(), t1.as_str(), t0.as_str()]);
    }

    #[tokio::test]
    async fn cursor_row_leads_the_page() {
        let storage = MemoryStorage::new();
        storage.insert_user(user("alice"));
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(storage.insert_tweet_at("alice", "t", at(i)).unwrap());
        }

        // Newest first is ids[4]..ids[0]; cursor at ids[2] starts there.
        let cursor = Cursor {
            id: ids[2].clone(),
            created_at: at(2),
        };
        let rows = storage
            .find_tweets(&TweetFilter::All, Some(&cursor), 10, None)
            .await
            .unwrap();
        let got: Vec<&str> = rows.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(got, vec![ids[2].as_str(), ids[1].as_str(), ids[0].as_str()]);
    }

    #[tokio::test]
    async fn followed_by_restricts_to_followed_authors() {
        let storage = MemoryStorage::new();
        storage.insert_user(user("alice"));
        storage.insert_user(user("bob"));
        storage.insert_user(user("carol"));
        storage.insert_follow("alice", "bob");
        storage.insert_tweet_at("bob", "from bob", at(1)).unwrap();
        storage
            .insert_tweet_at("carol", "from carol", at(2))
            .unwrap();

        let rows = storage
            .find_tweets(
                &TweetFilter::FollowedBy("alice".to_string()),
                None,
                10,
                Some("alice"),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].author.id, "bob");
    }

    #[tokio::test]
    async fn like_uniqueness_is_enforced() {
        let storage = MemoryStorage::new();
        storage.insert_user(user("alice"));
        storage.insert_user(user("bob"));
        let tweet = storage.insert_tweet_at("bob", "hi", at(1)).unwrap();

        storage.create_like("alice", &tweet).await.unwrap();
        let err = storage.create_like("alice", &tweet).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateLike));

        assert!(storage.delete_like("alice", &tweet).await.unwrap());
        assert!(!storage.delete_like("alice", &tweet).await.unwrap());
    }

    #[tokio::test]
    async fn liking_unknown_tweet_is_rejected() {
        let storage = MemoryStorage::new();
        storage.insert_user(user("alice"));
        let err = storage.create_like("alice", "t99999999").await.unwrap_err();
        assert!(matches!(err, StorageError::UnknownTweet(_)));
    }

    #[tokio::test]
    async fn rows_carry_like_count_and_viewer_flag() {
        let storage = MemoryStorage::new();
        storage.insert_user(user("alice"));
        storage.insert_user(user("bob"));
        storage.insert_user(user("carol"));
        let tweet = storage.insert_tweet_at("bob", "hi", at(1)).unwrap();
        storage.create_like("alice", &tweet).await.unwrap();
        storage.create_like("carol", &tweet).await.unwrap();

        let rows = storage
            .find_tweets(&TweetFilter::All, None, 10, Some("alice"))
            .await
            .unwrap();
        assert_eq!(rows[0].like_count, 2);
        assert!(rows[0].liked_by_viewer);

        let rows = storage
            .find_tweets(&TweetFilter::All, None, 10, None)
            .await
            .unwrap();
        assert_eq!(rows[0].like_count, 2);
        assert!(!rows[0].liked_by_viewer);
    }
}
