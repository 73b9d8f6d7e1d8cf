use crate::store::{FeedKey, Store};
use crate::ui::InternalEvent;
use anyhow::Result;
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent};
use crossterm::style::{self, Color};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{cursor, queue};
use regex::Regex;
use std::io::{Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use unicode_truncate::UnicodeTruncateStr;

/// Rows of lookahead between the selection and the end of the list before
/// the next page is requested.
const LOAD_AHEAD: usize = 3;

const AUTHOR_WIDTH: usize = 16;

pub struct FeedPane {
    events: UnboundedSender<InternalEvent>,
    store: Arc<Store>,
    key: FeedKey,
    selected_index: usize,
    view_offset: usize,
    cursor_row: u16,
    dirty: Arc<AtomicBool>,
    re_newlines: Regex,
}

impl FeedPane {
    pub fn new(events: &UnboundedSender<InternalEvent>, store: &Arc<Store>) -> Self {
        Self {
            events: events.clone(),
            store: store.clone(),
            key: FeedKey::Global,
            selected_index: 0,
            view_offset: 0,
            cursor_row: 0,
            dirty: Arc::new(AtomicBool::new(true)),
            re_newlines: Regex::new(r"[\r\n]+").unwrap(),
        }
    }

    pub fn key(&self) -> &FeedKey {
        &self.key
    }

    pub fn invalidate(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    pub fn cursor_position(&self) -> (u16, u16) {
        (0, self.cursor_row)
    }

    pub fn do_load_page(&self, restart: bool) {
        let store = self.store.clone();
        let key = self.key.clone();
        let dirty = self.dirty.clone();
        dirty.store(true, Ordering::SeqCst);

        let task = tokio::spawn(async move {
            // A failure is kept on the feed's cache and rendered in place.
            let _ = store.load_page(&key, restart).await;
            dirty.store(true, Ordering::SeqCst);
        });
        self.events.send(InternalEvent::RegisterTask(task)).unwrap();
    }

    fn do_toggle_selected_like(&self) {
        let snapshot = self.store.snapshot(&self.key);
        let tweet_id = match snapshot.tweets.get(self.selected_index) {
            Some(tweet) => tweet.id.clone(),
            None => return,
        };
        // The like control is disabled while a toggle for this tweet is in
        // flight; the cache mutates only on the confirmed response.
        if self.store.is_like_in_flight(&tweet_id) {
            return;
        }

        let events = self.events.clone();
        let store = self.store.clone();
        let dirty = self.dirty.clone();
        dirty.store(true, Ordering::SeqCst);

        let task = tokio::spawn(async move {
            if let Err(err) = store.toggle_like(&tweet_id).await {
                events.send(InternalEvent::LogError(err)).unwrap();
            }
            dirty.store(true, Ordering::SeqCst);
        });
        self.events.send(InternalEvent::RegisterTask(task)).unwrap();
    }

    fn switch_feed(&mut self, key: FeedKey) {
        if self.key == key {
            return;
        }
        self.key = key;
        self.selected_index = 0;
        self.view_offset = 0;
        self.invalidate();

        let snapshot = self.store.snapshot(&self.key);
        if !snapshot.loaded && !self.store.is_loading(&self.key) {
            self.do_load_page(true);
        }
    }

    fn switch_to_selected_profile(&mut self) {
        let snapshot = self.store.snapshot(&self.key);
        if let Some(tweet) = snapshot.tweets.get(self.selected_index) {
            let author_id = tweet.author.id.clone();
            self.switch_feed(FeedKey::Profile(author_id));
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let snapshot = self.store.snapshot(&self.key);
        let total = snapshot.tweets.len();
        if total == 0 {
            return;
        }
        self.selected_index = self
            .selected_index
            .saturating_add_signed(delta)
            .min(total - 1);
        if snapshot.has_more && self.selected_index + LOAD_AHEAD >= total {
            self.do_load_page(false);
        }
        self.invalidate();
    }

    pub fn handle_key_event(&mut self, event: &KeyEvent) -> bool {
        match event.code {
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Char('l') => self.do_toggle_selected_like(),
            KeyCode::Char('g') => self.switch_feed(FeedKey::Global),
            KeyCode::Char('f') => self.switch_feed(FeedKey::Following),
            KeyCode::Char('p') => self.switch_to_selected_profile(),
            KeyCode::Char('r') => self.do_load_page(true),
            _ => return false,
        }
        true
    }

    fn render_message(
        &self,
        stdout: &mut Stdout,
        row: u16,
        color: Color,
        message: &str,
    ) -> Result<()> {
        queue!(stdout, cursor::MoveTo(0, row))?;
        queue!(stdout, style::SetForegroundColor(color))?;
        queue!(stdout, style::Print(message))?;
        queue!(stdout, style::ResetColor)?;
        Ok(())
    }

    pub fn render(&mut self, stdout: &mut Stdout, cols: u16, rows: u16) -> Result<()> {
        let snapshot = self.store.snapshot(&self.key);
        let total = snapshot.tweets.len();
        let height = rows as usize;

        if total > 0 && self.selected_index >= total {
            self.selected_index = total - 1;
        }
        if self.selected_index < self.view_offset {
            self.view_offset = self.selected_index;
        } else if height > 0 && self.selected_index >= self.view_offset + height {
            self.view_offset = self.selected_index - height + 1;
        }
        self.cursor_row = (self.selected_index - self.view_offset) as u16;

        queue!(stdout, Clear(ClearType::All))?;

        if let Some(error) = &snapshot.error {
            self.render_message(
                stdout,
                0,
                Color::Red,
                &format!("feed unavailable: {error} (press r to retry)"),
            )?;
            stdout.flush()?;
            return Ok(());
        }
        if !snapshot.loaded {
            self.render_message(stdout, 0, Color::DarkGrey, "Loading…")?;
            stdout.flush()?;
            return Ok(());
        }
        if total == 0 {
            self.render_message(stdout, 0, Color::DarkGrey, "No Tweets")?;
            stdout.flush()?;
            return Ok(());
        }

        let from = self.view_offset.min(total);
        let to = (self.view_offset + height).min(total);

        for (line, tweet) in snapshot.tweets[from..to].iter().enumerate() {
            let row = line as u16;

            let tweet_time = tweet.created_at.with_timezone(&Local);
            let tweet_time = format!("{}  >  ", tweet_time.format("%m-%d %H:%M:%S"));
            queue!(stdout, cursor::MoveTo(0, row))?;
            queue!(stdout, style::SetForegroundColor(Color::DarkGrey))?;
            queue!(stdout, style::Print(&tweet_time))?;

            let like_marker = format!("♥ {:<4}", tweet.like_count);
            let like_color = if self.store.is_like_in_flight(&tweet.id) {
                Color::DarkYellow
            } else if tweet.liked_by_me {
                Color::Magenta
            } else {
                Color::DarkGrey
            };
            queue!(stdout, style::SetForegroundColor(like_color))?;
            queue!(stdout, style::Print(&like_marker))?;

            let (author, _) = tweet.author.name.unicode_truncate(AUTHOR_WIDTH);
            let author = format!("{author} ");
            queue!(stdout, style::SetForegroundColor(Color::DarkCyan))?;
            queue!(stdout, style::Print(&author))?;
            queue!(stdout, style::ResetColor)?;

            let formatted = self.re_newlines.replace_all(&tweet.content, "⏎ ");
            let used = tweet_time.len() + like_marker.len() + author.len();
            let remaining = (cols as usize).saturating_sub(used);
            let lines = textwrap::wrap(&formatted, remaining.max(1));
            if lines.len() == 1 {
                queue!(stdout, style::Print(lines[0].as_ref()))?;
            } else if lines.len() > 1 {
                // Rewrap to make room for the ellipsis, which may knock
                // out a word.
                let lines = textwrap::wrap(&formatted, remaining.saturating_sub(1).max(1));
                queue!(stdout, style::Print(lines[0].as_ref()))?;
                queue!(stdout, style::Print("…"))?;
            }
        }

        if snapshot.has_more && self.store.is_loading(&self.key) {
            let next_row = (to - from) as u16;
            if next_row < rows {
                self.render_message(stdout, next_row, Color::DarkGrey, "Loading…")?;
            }
        }

        stdout.flush()?;
        Ok(())
    }
}
