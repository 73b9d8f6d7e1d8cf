//! Feed query service: cursor pagination, the like toggle, and tweet
//! creation, all over the [`Storage`] contract.

use crate::api::{Cursor, FeedPage, FeedQuery, ToggleLikeResponse, Tweet};
use crate::storage::{Storage, StorageError, TweetFilter, TweetRecord};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_PAGE_LIMIT: usize = 10;
pub const MAX_PAGE_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("tweet content must not be empty")]
    EmptyContent,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<TweetRecord> for Tweet {
    fn from(record: TweetRecord) -> Self {
        Tweet {
            id: record.id,
            content: record.content,
            created_at: record.created_at,
            like_count: record.like_count,
            liked_by_me: record.liked_by_viewer,
            author: record.author,
        }
    }
}

#[derive(Clone)]
pub struct FeedService {
    storage: Arc<dyn Storage>,
}

impl FeedService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// `user_id` wins over `only_following`; `only_following` without a
    /// known viewer degrades to the unfiltered feed rather than erroring.
    fn resolve_filter(query: &FeedQuery, viewer: Option<&str>) -> TweetFilter {
        if let Some(user_id) = &query.user_id {
            TweetFilter::ByAuthor(user_id.clone())
        } else if query.only_following {
            match viewer {
                Some(viewer) => TweetFilter::FollowedBy(viewer.to_string()),
                None => TweetFilter::All,
            }
        } else {
            TweetFilter::All
        }
    }

    pub async fn list_feed(
        &self,
        query: &FeedQuery,
        viewer: Option<&str>,
    ) -> Result<FeedPage, FeedError> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        let filter = Self::resolve_filter(query, viewer);
        let cursor = query.cursor();

        // Fetch one extra row to learn whether another page exists; the
        // extra row's key becomes the cursor that leads the next page.
        let mut rows = self
            .storage
            .find_tweets(&filter, cursor.as_ref(), limit + 1, viewer)
            .await?;
        let next_cursor = if rows.len() > limit {
            rows.pop().map(|row| Cursor {
                id: row.id,
                created_at: row.created_at,
            })
        } else {
            None
        };

        Ok(FeedPage {
            tweets: rows.into_iter().map(Tweet::from).collect(),
            next_cursor,
        })
    }

    /// Pure toggle: the current Like state determines the effect. Atomicity
    /// per `(viewer, tweet)` pair rests on the storage uniqueness
    /// constraint; a lost race on either side resolves to the state the
    /// winner established.
    pub async fn toggle_like(
        &self,
        tweet_id: &str,
        viewer: &str,
    ) -> Result<ToggleLikeResponse, FeedError> {
        if self.storage.find_like(viewer, tweet_id).await? {
            self.storage.delete_like(viewer, tweet_id).await?;
            Ok(ToggleLikeResponse { added_like: false })
        } else {
            match self.storage.create_like(viewer, tweet_id).await {
                Ok(()) => Ok(ToggleLikeResponse { added_like: true }),
                Err(StorageError::DuplicateLike) => Ok(ToggleLikeResponse { added_like: true }),
                Err(err) => Err(err.into()),
            }
        }
    }

    pub async fn create_tweet(&self, content: &str, viewer: &str) -> Result<Tweet, FeedError> {
        if content.trim().is_empty() {
            return Err(FeedError::EmptyContent);
        }
        let record = self.storage.create_tweet(viewer, content).await?;
        Ok(record.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::User;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
    }

    fn seeded_storage() -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
        for id in ["alice", "bob", "carol"] {
            storage.insert_user(User {
                id: id.to_string(),
                name: id.to_string(),
                avatar_url: None,
            });
        }
        storage.insert_follow("alice", "bob");
        storage
    }

    fn ids(page: &FeedPage) -> Vec<String> {
        page.tweets.iter().map(|tweet| tweet.id.clone()).collect()
    }

    #[tokio::test]
    async fn eleven_rows_yield_ten_plus_cursor_of_removed_row() {
        let storage = seeded_storage();
        let mut all = Vec::new();
        for i in 0..11 {
            all.push(storage.insert_tweet_at("bob", "t", at(i)).unwrap());
        }
        let service = FeedService::new(storage);

        let page = service.list_feed(&FeedQuery::default(), None).await.unwrap();
        assert_eq!(page.tweets.len(), 10);
        // Oldest row (minute 0) was the removed eleventh; its key is the cursor.
        let cursor = page.next_cursor.clone().expect("more rows exist");
        assert_eq!(cursor.id, all[0]);
        assert_eq!(cursor.created_at, at(0));

        let page2 = service
            .list_feed(&FeedQuery::default().with_cursor(Some(&cursor)), None)
            .await
            .unwrap();
        assert_eq!(ids(&page2), vec![all[0].clone()]);
        assert!(page2.next_cursor.is_none());

        // The walk covered every row exactly once.
        let mut walked = ids(&page);
        walked.extend(ids(&page2));
        let mut expected: Vec<String> = all.clone();
        expected.reverse();
        assert_eq!(walked, expected);
    }

    #[tokio::test]
    async fn next_cursor_absent_when_results_fit() {
        let storage = seeded_storage();
        for i in 0..3 {
            storage.insert_tweet_at("bob", "t", at(i)).unwrap();
        }
        let service = FeedService::new(storage);

        let page = service.list_feed(&FeedQuery::default(), None).await.unwrap();
        assert_eq!(page.tweets.len(), 3);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn exactly_limit_rows_terminate() {
        let storage = seeded_storage();
        for i in 0..10 {
            storage.insert_tweet_at("bob", "t", at(i)).unwrap();
        }
        let service = FeedService::new(storage);

        let page = service.list_feed(&FeedQuery::default(), None).await.unwrap();
        assert_eq!(page.tweets.len(), 10);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn order_is_created_at_desc_then_id_desc() {
        let storage = seeded_storage();
        let low = storage.insert_tweet_at("bob", "tied low", at(5)).unwrap();
        let high = storage.insert_tweet_at("bob", "tied high", at(5)).unwrap();
        let old = storage.insert_tweet_at("bob", "old", at(1)).unwrap();
        let new = storage.insert_tweet_at("bob", "new", at(9)).unwrap();
        let service = FeedService::new(storage);

        let page = service.list_feed(&FeedQuery::default(), None).await.unwrap();
        assert_eq!(ids(&page), vec![new, high, low, old]);
    }

    #[tokio::test]
    async fn identical_calls_are_idempotent() {
        let storage = seeded_storage();
        for i in 0..15 {
            storage.insert_tweet_at("bob", "t", at(i)).unwrap();
        }
        let service = FeedService::new(storage);

        let first = service.list_feed(&FeedQuery::default(), None).await.unwrap();
        let second = service.list_feed(&FeedQuery::default(), None).await.unwrap();
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(first.next_cursor, second.next_cursor);
    }

    #[tokio::test]
    async fn profile_filter_restricts_to_author() {
        let storage = seeded_storage();
        storage.insert_tweet_at("bob", "bob says", at(1)).unwrap();
        storage
            .insert_tweet_at("carol", "carol says", at(2))
            .unwrap();
        let service = FeedService::new(storage);

        let query = FeedQuery {
            user_id: Some("bob".to_string()),
            ..FeedQuery::default()
        };
        let page = service.list_feed(&query, None).await.unwrap();
        assert_eq!(page.tweets.len(), 1);
        assert_eq!(page.tweets[0].author.id, "bob");
    }

    #[tokio::test]
    async fn following_filter_degrades_for_anonymous_viewers() {
        let storage = seeded_storage();
        storage.insert_tweet_at("bob", "followed", at(1)).unwrap();
        storage
            .insert_tweet_at("carol", "not followed", at(2))
            .unwrap();
        let service = FeedService::new(storage);

        let query = FeedQuery {
            only_following: true,
            ..FeedQuery::default()
        };
        let followed = service.list_feed(&query, Some("alice")).await.unwrap();
        assert_eq!(followed.tweets.len(), 1);
        assert_eq!(followed.tweets[0].author.id, "bob");

        // Anonymous: the filter is ignored, not rejected.
        let anonymous = service.list_feed(&query, None).await.unwrap();
        assert_eq!(anonymous.tweets.len(), 2);
    }

    #[tokio::test]
    async fn liked_by_me_tracks_the_viewer() {
        let storage = seeded_storage();
        let tweet = storage.insert_tweet_at("bob", "hi", at(1)).unwrap();
        storage.create_like("carol", &tweet).await.unwrap();
        let service = FeedService::new(storage);

        let page = service
            .list_feed(&FeedQuery::default(), Some("carol"))
            .await
            .unwrap();
        assert!(page.tweets[0].liked_by_me);
        assert_eq!(page.tweets[0].like_count, 1);

        let page = service
            .list_feed(&FeedQuery::default(), Some("alice"))
            .await
            .unwrap();
        assert!(!page.tweets[0].liked_by_me);

        let page = service.list_feed(&FeedQuery::default(), None).await.unwrap();
        assert!(!page.tweets[0].liked_by_me);
    }

    #[tokio::test]
    async fn toggle_alternates_and_restores_state() {
        let storage = seeded_storage();
        let tweet = storage.insert_tweet_at("bob", "hi", at(1)).unwrap();
        let service = FeedService::new(storage.clone());

        assert!(service.toggle_like(&tweet, "alice").await.unwrap().added_like);
        assert!(storage.find_like("alice", &tweet).await.unwrap());

        assert!(!service.toggle_like(&tweet, "alice").await.unwrap().added_like);
        assert!(!storage.find_like("alice", &tweet).await.unwrap());

        assert!(service.toggle_like(&tweet, "alice").await.unwrap().added_like);
        assert!(storage.find_like("alice", &tweet).await.unwrap());
    }

    #[tokio::test]
    async fn toggle_on_unknown_tweet_is_an_error() {
        let service = FeedService::new(seeded_storage());
        let err = service.toggle_like("t99999999", "alice").await.unwrap_err();
        assert!(matches!(
            err,
            FeedError::Storage(StorageError::UnknownTweet(_))
        ));
    }

    /// Delegates to real storage but always reports the like as absent, so
    /// the toggle's create races a like that already landed.
    struct RacingStorage {
        inner: Arc<MemoryStorage>,
    }

    #[async_trait]
    impl Storage for RacingStorage {
        async fn find_tweets(
            &self,
            filter: &TweetFilter,
            cursor: Option<&Cursor>,
            limit: usize,
            viewer: Option<&str>,
        ) -> Result<Vec<TweetRecord>, StorageError> {
            self.inner.find_tweets(filter, cursor, limit, viewer).await
        }

        async fn create_tweet(
            &self,
            author_id: &str,
            content: &str,
        ) -> Result<TweetRecord, StorageError> {
            self.inner.create_tweet(author_id, content).await
        }

        async fn find_like(&self, _user_id: &str, _tweet_id: &str) -> Result<bool, StorageError> {
            Ok(false)
        }

        async fn create_like(&self, user_id: &str, tweet_id: &str) -> Result<(), StorageError> {
            self.inner.create_like(user_id, tweet_id).await
        }

        async fn delete_like(&self, user_id: &str, tweet_id: &str) -> Result<bool, StorageError> {
            self.inner.delete_like(user_id, tweet_id).await
        }
    }

    #[tokio::test]
    async fn lost_create_race_resolves_to_liked() {
        let storage = seeded_storage();
        let tweet = storage.insert_tweet_at("bob", "hi", at(1)).unwrap();
        storage.create_like("alice", &tweet).await.unwrap();

        let service = FeedService::new(Arc::new(RacingStorage { inner: storage }));
        let resp = service.toggle_like(&tweet, "alice").await.unwrap();
        assert!(resp.added_like);
    }

    #[tokio::test]
    async fn create_tweet_validates_content_at_the_boundary() {
        let service = FeedService::new(seeded_storage());
        assert!(matches!(
            service.create_tweet("", "alice").await.unwrap_err(),
            FeedError::EmptyContent
        ));
        assert!(matches!(
            service.create_tweet("  \n ", "alice").await.unwrap_err(),
            FeedError::EmptyContent
        ));

        let tweet = service.create_tweet("hello", "alice").await.unwrap();
        assert_eq!(tweet.content, "hello");
        assert_eq!(tweet.like_count, 0);
        assert!(!tweet.liked_by_me);
        assert_eq!(tweet.author.id, "alice");
    }

    #[tokio::test]
    async fn limit_is_clamped_to_a_positive_page() {
        let storage = seeded_storage();
        for i in 0..3 {
            storage.insert_tweet_at("bob", "t", at(i)).unwrap();
        }
        let service = FeedService::new(storage);

        let query = FeedQuery {
            limit: Some(0),
            ..FeedQuery::default()
        };
        let page = service.list_feed(&query, None).await.unwrap();
        assert_eq!(page.tweets.len(), 1);
        assert!(page.next_cursor.is_some());
    }

    #[tokio::test]
    async fn newer_inserts_are_invisible_to_a_walk_in_progress() {
        let storage = seeded_storage();
        let mut all = Vec::new();
        for i in 0..4 {
            all.push(storage.insert_tweet_at("bob", "t", at(i)).unwrap());
        }
        let service = FeedService::new(storage.clone());

        let query = FeedQuery {
            limit: Some(2),
            ..FeedQuery::default()
        };
        let page1 = service.list_feed(&query, None).await.unwrap();
        assert_eq!(ids(&page1), vec![all[3].clone(), all[2].clone()]);
        let cursor = page1.next_cursor.unwrap();

        // A tweet newer than the walk's anchor lands mid-walk.
        storage.insert_tweet_at("bob", "late", at(30)).unwrap();

        let page2 = service
            .list_feed(&query.clone().with_cursor(Some(&cursor)), None)
            .await
            .unwrap();
        assert_eq!(ids(&page2), vec![all[1].clone(), all[0].clone()]);
        assert!(page2.next_cursor.is_none());
    }
}
