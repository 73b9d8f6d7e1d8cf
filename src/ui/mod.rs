//! Terminal UI: an event loop joining terminal input, internal events and
//! background fetch tasks, over a feed pane and a status bar.

mod bottom_bar;
mod feed_pane;

use crate::store::Store;
use crate::ui::bottom_bar::BottomBar;
use crate::ui::feed_pane::FeedPane;
use anyhow::{Error, Result};
use crossterm::event::{Event, EventStream, KeyCode};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute, queue};
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use std::io::{stdout, Stdout, Write};
use std::process;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Log,
    Interactive,
}

#[derive(Debug)]
pub enum InternalEvent {
    RegisterTask(tokio::task::JoinHandle<()>),
    LogError(Error),
}

pub struct UI {
    stdout: Stdout,
    mode: Mode,
    events: UnboundedReceiver<InternalEvent>,
    tasks: FuturesUnordered<tokio::task::JoinHandle<()>>,
    feed_pane: FeedPane,
    bottom_bar: BottomBar,
    cols: u16,
    rows: u16,
}

impl UI {
    pub fn new(store: Arc<Store>) -> Self {
        let (cols, rows) = terminal::size().unwrap_or((80, 24));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let feed_pane = FeedPane::new(&events_tx, &store);
        let bottom_bar = BottomBar::new(&store);

        Self {
            stdout: stdout(),
            mode: Mode::Log,
            events: events_rx,
            tasks: FuturesUnordered::new(),
            feed_pane,
            bottom_bar,
            cols,
            rows,
        }
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.feed_pane.do_load_page(true);
        self.set_mode(Mode::Interactive)
    }

    fn set_mode(&mut self, mode: Mode) -> Result<()> {
        let prev_mode = self.mode;
        self.mode = mode;

        if prev_mode == Mode::Log && mode == Mode::Interactive {
            execute!(self.stdout, EnterAlternateScreen)?;
            terminal::enable_raw_mode()?;
        } else if prev_mode == Mode::Interactive && mode == Mode::Log {
            execute!(self.stdout, LeaveAlternateScreen)?;
            terminal::enable_raw_mode()?;
        }

        Ok(())
    }

    fn log_message(&mut self, message: &str) -> Result<()> {
        self.set_mode(Mode::Log)?;
        println!("{message}\r");
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        if self.mode != Mode::Interactive {
            return Ok(());
        }

        let feed_rows = self.rows.saturating_sub(1);
        let feed_rendered = self.feed_pane.take_dirty();
        if feed_rendered {
            self.feed_pane.render(&mut self.stdout, self.cols, feed_rows)?;
        }
        if feed_rendered || self.bottom_bar.should_render() {
            self.bottom_bar
                .render(&mut self.stdout, feed_rows, self.feed_pane.key())?;
        }

        let focus = self.feed_pane.cursor_position();
        queue!(self.stdout, cursor::MoveTo(focus.0, focus.1))?;
        self.stdout.flush()?;
        Ok(())
    }

    fn handle_internal_event(&mut self, event: InternalEvent) -> Result<()> {
        match event {
            InternalEvent::RegisterTask(task) => {
                self.tasks.push(task);
                self.bottom_bar.set_num_tasks_in_flight(self.tasks.len());
            }
            InternalEvent::LogError(err) => {
                self.log_message(&err.to_string())?;
            }
        }
        Ok(())
    }

    fn handle_terminal_event(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::Key(key_event) => {
                let handled = self.feed_pane.handle_key_event(key_event);
                if !handled {
                    match key_event.code {
                        KeyCode::Esc => {
                            self.set_mode(Mode::Interactive)?;
                            self.feed_pane.invalidate();
                            self.bottom_bar.invalidate();
                        }
                        KeyCode::Char('q') => {
                            reset();
                            process::exit(0);
                        }
                        _ => (),
                    }
                }
            }
            Event::Resize(cols, rows) => {
                self.cols = *cols;
                self.rows = *rows;
                self.feed_pane.invalidate();
                self.bottom_bar.invalidate();
            }
            _ => (),
        }
        Ok(())
    }

    pub async fn event_loop(&mut self) -> Result<()> {
        let mut terminal_event_stream = EventStream::new();

        loop {
            let terminal_event = terminal_event_stream.next().fuse();
            let internal_event = self.events.recv();
            let there_are_tasks = !self.tasks.is_empty();
            let task_event = self.tasks.next().fuse();

            tokio::select! {
                event = terminal_event => {
                    if let Some(Ok(event)) = event {
                        self.handle_terminal_event(&event)?;
                    }
                },
                event = internal_event => {
                    if let Some(event) = event {
                        self.handle_internal_event(event)?;
                    }
                },
                _ = task_event, if there_are_tasks => {
                    self.bottom_bar.set_num_tasks_in_flight(self.tasks.len());
                }
            }

            self.render()?;
        }
    }
}

pub fn reset() {
    execute!(stdout(), LeaveAlternateScreen).unwrap();
    terminal::disable_raw_mode().unwrap()
}
