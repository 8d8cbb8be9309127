//! Interactive viewer: one page of log lines above a status bar.
//!
//! The fetch worker never draws. It wakes this loop through the buffer's
//! coalescing wake channel and all rendering happens here, on the UI thread.
//! Uses `crossterm` for the alternate screen and raw key input.

#![allow(missing_docs)]

use std::io::{self, Write};
use std::time::Duration;

use crossbeam_channel::Receiver;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Color, Print, SetAttribute, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use log::{info, warn};

use super::{Severity, failure_notice, fit, format_line, status_text};
use crate::buffer::{BufferConfig, DriverFactory, FACILITIES, MAX_LEVEL, ScreenBuffer};
use crate::filter::FilterState;

const INPUT_POLL: Duration = Duration::from_millis(50);

// ──────────────────── key bindings ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Quit,
    LineUp,
    LineDown,
    PageUp,
    PageDown,
    LowerLevel,
    RaiseLevel,
    NextFacility,
    Restart,
}

fn action_for(key: KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let action = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        KeyCode::Up | KeyCode::Char('k') => Action::LineUp,
        KeyCode::Down | KeyCode::Char('j') => Action::LineDown,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::PageDown | KeyCode::Char(' ') => Action::PageDown,
        KeyCode::Char('l') => Action::LowerLevel,
        KeyCode::Char('L') => Action::RaiseLevel,
        KeyCode::Char('f') => Action::NextFacility,
        KeyCode::Char('r') => Action::Restart,
        _ => return None,
    };
    Some(action)
}

/// Apply a filter edit. Returns whether the filter changed.
fn edit_filter(filter: &mut FilterState, action: Action) -> bool {
    let before = filter.clone();
    match action {
        Action::LowerLevel => filter.set_level(filter.level().saturating_sub(1)),
        Action::RaiseLevel => filter.set_level(filter.level().saturating_add(1).min(MAX_LEVEL)),
        Action::NextFacility => {
            // Cycling stays inside the table, so this cannot fail.
            let _ = filter.set_facility(next_facility(filter.facility()));
        }
        _ => {}
    }
    *filter != before
}

/// All → kern → user → … → local7 → all.
fn next_facility(current: Option<u8>) -> Option<u8> {
    match current {
        None => Some(0),
        Some(code) if usize::from(code) + 1 >= FACILITIES.len() => None,
        Some(code) => Some(code + 1),
    }
}

/// Visible log rows for a terminal `rows` tall; one row is the status bar.
fn page_size_for(rows: u16) -> usize {
    usize::from(rows.saturating_sub(1)).max(1)
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Urgent => Color::Magenta,
        Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
        Severity::Notice => Color::Cyan,
        Severity::Debug => Color::DarkGrey,
        Severity::Normal => Color::White,
    }
}

// ──────────────────── main viewer loop ────────────────────

/// Viewer knobs. `buffer.page_size` is replaced by the terminal height.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub buffer: BufferConfig,
    pub color: bool,
}

struct Viewer<'a, F: DriverFactory> {
    factory: &'a F,
    buffer: ScreenBuffer,
    wake: Receiver<()>,
    filter: FilterState,
    failure: Option<String>,
    color: bool,
}

impl<F: DriverFactory> Viewer<'_, F> {
    fn restart(&mut self) {
        info!("viewer: restarting with filter {:?}", self.filter);
        self.failure = match self.buffer.restart(self.factory.create_driver(&self.filter)) {
            Ok(()) => None,
            Err(err) => Some(failure_notice(&err)),
        };
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::LineUp => self.buffer.go_to_previous_line(),
            Action::LineDown => self.buffer.go_to_next_line(),
            Action::PageUp => self.buffer.go_to_previous_page(),
            Action::PageDown => self.buffer.go_to_next_page(),
            Action::Restart => self.restart(),
            Action::LowerLevel | Action::RaiseLevel | Action::NextFacility => {
                if edit_filter(&mut self.filter, action) {
                    self.restart();
                }
            }
            Action::Quit => {}
        }
    }

    fn render(&self, stdout: &mut io::Stdout) -> io::Result<()> {
        let (cols, rows) = terminal::size()?;
        let width = usize::from(cols);

        queue!(stdout, MoveTo(0, 0), Clear(ClearType::All))?;
        for (row, line) in (0..rows.saturating_sub(1)).zip(self.buffer.current_lines()) {
            queue!(stdout, MoveTo(0, row))?;
            if self.color {
                queue!(stdout, SetForegroundColor(severity_color(Severity::of(line.level()))))?;
            }
            queue!(
                stdout,
                Print(fit(&format_line(&line), width)),
                SetAttribute(Attribute::Reset)
            )?;
        }

        let status = fit(&status_text(&self.filter, self.failure.as_deref()), width);
        queue!(
            stdout,
            MoveTo(0, rows.saturating_sub(1)),
            SetAttribute(Attribute::Reverse),
            Print(format!("{status:<width$}")),
            SetAttribute(Attribute::Reset)
        )?;
        stdout.flush()
    }
}

/// Run the viewer until the user exits (q/Esc/Ctrl-C).
pub fn run<F: DriverFactory>(
    factory: &F,
    filter: FilterState,
    config: &ViewerConfig,
) -> io::Result<()> {
    let mut stdout = io::stdout();

    terminal::enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, Hide)?;

    let result = run_inner(&mut stdout, factory, filter, config);

    // Always restore terminal state.
    let _ = execute!(stdout, Show, LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();

    result
}

fn run_inner<F: DriverFactory>(
    stdout: &mut io::Stdout,
    factory: &F,
    filter: FilterState,
    config: &ViewerConfig,
) -> io::Result<()> {
    let (_, rows) = terminal::size()?;
    let buffer = ScreenBuffer::with_config(&BufferConfig {
        page_size: page_size_for(rows),
        ..config.buffer.clone()
    });
    let (_, wake) = buffer.subscribe();
    let mut viewer = Viewer {
        factory,
        buffer,
        wake,
        filter,
        failure: None,
        color: config.color,
    };
    viewer.restart();

    let mut dirty = true;
    loop {
        if viewer.wake.try_recv().is_ok() {
            dirty = true;
        }
        if let Some(err) = viewer.buffer.take_failure() {
            warn!("viewer: fetch worker stopped: {err}");
            viewer.failure = Some(failure_notice(&err));
            dirty = true;
        }
        if dirty {
            viewer.render(stdout)?;
            dirty = false;
        }

        if !event::poll(INPUT_POLL)? {
            continue;
        }
        match event::read()? {
            Event::Key(key) => match action_for(key) {
                Some(Action::Quit) => break,
                Some(action) => {
                    viewer.apply(action);
                    dirty = true;
                }
                None => {}
            },
            Event::Resize(_, rows) => {
                viewer.buffer.set_page_size(page_size_for(rows));
                dirty = true;
            }
            _ => {}
        }
    }

    viewer.buffer.stop();
    Ok(())
}
