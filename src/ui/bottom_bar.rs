use crate::store::{FeedKey, Store};
use anyhow::Result;
use crossterm::style::{self, Color};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{cursor, queue};
use std::io::{Stdout, Write};
use std::sync::Arc;

pub struct BottomBar {
    store: Arc<Store>,
    num_tasks_in_flight: usize,
    should_render: bool,
}

impl BottomBar {
    pub fn new(store: &Arc<Store>) -> Self {
        Self {
            store: store.clone(),
            num_tasks_in_flight: 0,
            should_render: true,
        }
    }

    pub fn set_num_tasks_in_flight(&mut self, n: usize) {
        if self.num_tasks_in_flight != n {
            self.num_tasks_in_flight = n;
            self.should_render = true;
        }
    }

    pub fn invalidate(&mut self) {
        self.should_render = true;
    }

    pub fn should_render(&self) -> bool {
        self.should_render
    }

    pub fn render(&mut self, stdout: &mut Stdout, row: u16, key: &FeedKey) -> Result<()> {
        let snapshot = self.store.snapshot(key);

        queue!(stdout, cursor::MoveTo(0, row))?;
        queue!(stdout, style::SetForegroundColor(Color::Black))?;
        queue!(stdout, style::SetBackgroundColor(Color::White))?;

        if self.num_tasks_in_flight > 0 {
            queue!(
                stdout,
                style::Print(format!("[* {}] ", self.num_tasks_in_flight))
            )?;
        }
        queue!(
            stdout,
            style::Print(format!("{} · {} tweets", key.label(), snapshot.tweets.len()))
        )?;
        if snapshot.has_more {
            queue!(stdout, style::Print(" · more"))?;
        }
        queue!(
            stdout,
            style::Print("  (g/f/p feeds · l like · r refresh · q quit)")
        )?;
        queue!(stdout, style::ResetColor)?;
        queue!(stdout, Clear(ClearType::UntilNewLine))?;

        stdout.flush()?;
        self.should_render = false;
        Ok(())
    }
}
