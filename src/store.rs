//! Client-side page caches: one independently paginated cache per active
//! feed, kept mutually consistent across like mutations without refetching.

use crate::api::{Cursor, FeedQuery, FeedPage, Tweet};
use crate::client::FeedBackend;
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

/// Structural identity of one active feed. Two views with the same filter
/// parameters share a cache slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FeedKey {
    Global,
    Following,
    Profile(String),
}

impl FeedKey {
    pub fn label(&self) -> String {
        match self {
            FeedKey::Global => "global".to_string(),
            FeedKey::Following => "following".to_string(),
            FeedKey::Profile(user_id) => format!("profile:{user_id}"),
        }
    }

    fn to_query(&self, limit: usize) -> FeedQuery {
        let mut query = FeedQuery {
            limit: Some(limit),
            ..FeedQuery::default()
        };
        match self {
            FeedKey::Global => {}
            FeedKey::Following => query.only_following = true,
            FeedKey::Profile(user_id) => query.user_id = Some(user_id.clone()),
        }
        query
    }
}

/// Pages of one feed in fetch order, chained by cursor.
#[derive(Debug, Default)]
struct FeedState {
    pages: Vec<FeedPage>,
    loaded: bool,
    error: Option<String>,
}

impl FeedState {
    fn next_cursor(&self) -> Option<Cursor> {
        self.pages.last().and_then(|page| page.next_cursor.clone())
    }
}

#[derive(Debug, Default)]
struct FeedSlot {
    state: Mutex<FeedState>,
    // Held across fetch-and-commit, so at most one load per feed is in
    // flight and a slow response can never land on top of a newer one.
    fetch_lock: AsyncMutex<()>,
}

/// Flattened view of a feed cache for rendering.
#[derive(Clone, Debug, Default)]
pub struct FeedSnapshot {
    pub tweets: Vec<Tweet>,
    pub loaded: bool,
    pub has_more: bool,
    pub error: Option<String>,
}

pub struct Store {
    backend: Box<dyn FeedBackend>,
    page_limit: usize,
    feeds: Mutex<HashMap<FeedKey, Arc<FeedSlot>>>,
    likes_in_flight: Mutex<HashSet<String>>,
}

impl Store {
    pub fn new(backend: Box<dyn FeedBackend>, page_limit: usize) -> Self {
        Self {
            backend,
            page_limit,
            feeds: Mutex::new(HashMap::new()),
            likes_in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn slot(&self, key: &FeedKey) -> Arc<FeedSlot> {
        let mut feeds = self.feeds.lock().unwrap();
        feeds.entry(key.clone()).or_default().clone()
    }

    /// Fetch the first page (`restart`) or the page after the stored
    /// cursor, and commit it to this feed's cache. Skipped silently when a
    /// load for the feed is already in flight (the near-end trigger fires
    /// repeatedly while scrolling) or when the feed is exhausted.
    pub async fn load_page(&self, key: &FeedKey, restart: bool) -> Result<()> {
        let slot = self.slot(key);
        let _guard = match slot.fetch_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => return Ok(()),
        };

        let cursor = {
            let state = slot.state.lock().unwrap();
            if restart || !state.loaded {
                None
            } else {
                match state.next_cursor() {
                    Some(cursor) => Some(cursor),
                    // End of feed reached; nothing further to fetch.
                    None => return Ok(()),
                }
            }
        };

        let query = key.to_query(self.page_limit).with_cursor(cursor.as_ref());
        let result = self.backend.fetch_feed(&query).await;
        let mut state = slot.state.lock().unwrap();
        match result {
            Ok(page) => {
                if restart || !state.loaded {
                    state.pages = vec![page];
                } else {
                    state.pages.push(page);
                }
                state.loaded = true;
                state.error = None;
                Ok(())
            }
            Err(err) => {
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// A feed is loading while its fetch lock is held.
    pub fn is_loading(&self, key: &FeedKey) -> bool {
        self.slot(key).fetch_lock.try_lock().is_err()
    }

    pub fn snapshot(&self, key: &FeedKey) -> FeedSnapshot {
        let slot = self.slot(key);
        let state = slot.state.lock().unwrap();
        FeedSnapshot {
            tweets: state
                .pages
                .iter()
                .flat_map(|page| page.tweets.iter().cloned())
                .collect(),
            loaded: state.loaded,
            has_more: state.next_cursor().is_some(),
            error: state.error.clone(),
        }
    }

    pub fn is_like_in_flight(&self, tweet_id: &str) -> bool {
        self.likes_in_flight.lock().unwrap().contains(tweet_id)
    }

    /// Toggle a like and propagate the confirmed result to every cached
    /// view of the tweet. Returns `Ok(None)` when a toggle for this tweet
    /// is already in flight (the like control is disabled per tweet); the
    /// caches are only touched once the server has confirmed.
    pub async fn toggle_like(&self, tweet_id: &str) -> Result<Option<bool>> {
        {
            let mut in_flight = self.likes_in_flight.lock().unwrap();
            if !in_flight.insert(tweet_id.to_string()) {
                return Ok(None);
            }
        }

        let result = self.backend.toggle_like(tweet_id).await;
        self.likes_in_flight.lock().unwrap().remove(tweet_id);

        let resp = result?;
        self.apply_like_update(tweet_id, resp.added_like);
        Ok(Some(resp.added_like))
    }

    /// Scan every cached page of every feed for the tweet and apply the
    /// confirmed mutation. Feeds that don't contain it, including feeds
    /// never opened, are left untouched.
    fn apply_like_update(&self, tweet_id: &str, added_like: bool) {
        let feeds = self.feeds.lock().unwrap();
        for slot in feeds.values() {
            let mut state = slot.state.lock().unwrap();
            for page in &mut state.pages {
                for tweet in &mut page.tweets {
                    if tweet.id == tweet_id {
                        tweet.like_count = if added_like {
                            tweet.like_count + 1
                        } else {
                            tweet.like_count.saturating_sub(1)
                        };
                        tweet.liked_by_me = added_like;
                    }
                }
            }
        }
    }
}
