//! Terminal picker for catalog entries

use anyhow::{Context, Result};
use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    prelude::*,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::panic;
use tracing::debug;

use super::selector::{Selector, SelectorEvent};
use crate::catalog::{CatalogEntry, PlayState};
use crate::utils::TuiModeGuard;

/// Source of terminal events
pub trait EventSource {
    /// Block for the next event; `None` means the source is exhausted
    fn next_event(&mut self) -> Result<Option<Event>>;
}

/// Events read from the real terminal
pub struct TerminalEvents;

impl EventSource for TerminalEvents {
    fn next_event(&mut self) -> Result<Option<Event>> {
        Ok(Some(event::read().context("Failed to read terminal event")?))
    }
}

/// Raw mode, alternate screen and a hidden cursor, undone on drop
struct TerminalSession;

impl TerminalSession {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        // From here on Drop restores the terminal even if a later step fails
        let session = Self;
        execute!(io::stdout(), EnterAlternateScreen, Hide).context("Failed to prepare terminal")?;
        Ok(session)
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        restore_terminal();
    }
}

fn restore_terminal() {
    let _ = execute!(io::stdout(), Show, LeaveAlternateScreen);
    let _ = disable_raw_mode();
}

/// Runs `restore` ahead of the existing panic hook until dropped
///
/// Release builds abort on panic, so `Drop` guards never get to clean up.
struct PanicRestore;

impl PanicRestore {
    fn install<F>(restore: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore();
            previous(info);
        }));
        Self
    }
}

impl Drop for PanicRestore {
    fn drop(&mut self) {
        // take_hook panics on a panicking thread
        if !std::thread::panicking() {
            let _ = panic::take_hook();
        }
    }
}

/// Map a key press to a picker event
fn key_to_event(key: KeyEvent) -> Option<SelectorEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('d') => Some(SelectorEvent::Cancel),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(SelectorEvent::Up),
        KeyCode::Down | KeyCode::Char('j') => Some(SelectorEvent::Down),
        KeyCode::PageUp | KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('p') => Some(SelectorEvent::PageUp),
        KeyCode::PageDown | KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('n') => {
            Some(SelectorEvent::PageDown)
        }
        KeyCode::Home | KeyCode::Char('g') => Some(SelectorEvent::Home),
        KeyCode::End | KeyCode::Char('G') => Some(SelectorEvent::End),
        KeyCode::Char(c) if c.is_ascii_digit() => Some(SelectorEvent::Digit(c)),
        KeyCode::Backspace => Some(SelectorEvent::Backspace),
        KeyCode::Enter => Some(SelectorEvent::Confirm),
        KeyCode::Esc | KeyCode::Char('q') => Some(SelectorEvent::Cancel),
        _ => None,
    }
}

/// Map a terminal event to a picker event
pub fn translate_event(event: Event) -> Option<SelectorEvent> {
    match event {
        Event::Key(key) => key_to_event(key),
        Event::Resize(_, rows) => Some(SelectorEvent::Resize { rows }),
        _ => None,
    }
}

/// Drive the picker on any backend until it resolves
///
/// `on_resolve` runs exactly once, and only for an entry whose document
/// exists. An exhausted event source counts as a cancellation.
pub fn run_selector<B, E, F>(
    terminal: &mut Terminal<B>,
    entries: &[CatalogEntry],
    title: &str,
    events: &mut E,
    mut on_resolve: F,
) -> Result<Option<CatalogEntry>>
where
    B: Backend,
    E: EventSource,
    F: FnMut(&CatalogEntry),
{
    let rows = terminal.size().context("Failed to read terminal size")?.height;
    let mut selector = Selector::new(rows);

    loop {
        terminal
            .draw(|f| draw_ui(f, &selector, entries, title))
            .context("Failed to draw picker")?;

        let event = match events.next_event()? {
            Some(event) => translate_event(event),
            None => Some(SelectorEvent::Cancel),
        };
        let Some(event) = event else {
            continue;
        };

        if let SelectorEvent::Resize { .. } = event {
            terminal.autoresize().context("Failed to resize terminal")?;
        }

        selector = selector.apply(event, entries);

        if let Some(choice) = selector.resolution() {
            let chosen = choice.and_then(|index| entries.get(index)).cloned();
            match &chosen {
                Some(entry) => {
                    debug!("Picked {}", entry.identifier);
                    on_resolve(entry);
                }
                None => debug!("Picker cancelled"),
            }
            return Ok(chosen);
        }
    }
}

/// Run the picker on the real terminal
///
/// Returns `None` if the user cancelled.
pub fn pick_entry(entries: &[CatalogEntry], title: &str) -> Result<Option<CatalogEntry>> {
    let _quiet = TuiModeGuard::enter();
    let _restore = PanicRestore::install(restore_terminal);
    let _session = TerminalSession::enter()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend).context("Failed to open terminal")?;

    run_selector(&mut terminal, entries, title, &mut TerminalEvents, |_| {})
}

fn progress_note(entry: &CatalogEntry) -> Option<String> {
    let status = entry.listening_status.as_ref()?;
    if let Some(ratio) = status.completion_ratio {
        return Some(format!("{:.0}% listened", ratio * 100.0));
    }
    status
        .remaining_seconds
        .map(|secs| format!("{} min left", (secs / 60.0).round() as i64))
}

fn entry_item(position: usize, entry: &CatalogEntry) -> ListItem<'static> {
    let state_style = match entry.play_state {
        PlayState::Played => Style::default().fg(Color::DarkGray),
        PlayState::InProgress => Style::default().fg(Color::Yellow),
        PlayState::Unplayed => Style::default().fg(Color::Green),
        PlayState::Other(_) => Style::default().fg(Color::Magenta),
    };

    let title_style = if entry.has_markdown {
        Style::default()
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let first = Line::from(vec![
        Span::raw(format!("{:>4}. ", position)),
        Span::styled(format!("{} ", entry.play_state.glyph()), state_style),
        Span::styled(entry.label(), title_style),
    ]);

    let mut details = vec![entry.publish_date.clone().unwrap_or_else(|| "----------".to_string())];
    if let Some(publisher) = &entry.publisher_title {
        details.push(publisher.clone());
    }
    if let Some(note) = progress_note(entry) {
        details.push(note);
    }
    if !entry.has_markdown {
        details.push("no document".to_string());
    }

    let second = Line::styled(
        format!("        {}", details.join(" · ")),
        Style::default().fg(Color::DarkGray),
    );

    ListItem::new(vec![first, second])
}

fn draw_ui(f: &mut Frame, selector: &Selector, entries: &[CatalogEntry], title: &str) {
    f.render_widget(Clear, f.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Header
            Constraint::Min(1),    // List
            Constraint::Length(4), // Status + help
        ])
        .split(f.area());

    let header_text = format!(
        "{}  ({} episodes, page {}/{})",
        title,
        entries.len(),
        selector.current_page(),
        selector.total_pages(entries.len())
    );
    let header = Paragraph::new(header_text)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(header, chunks[0]);

    let range = selector.page_range(entries.len());
    let start = range.start;
    let items: Vec<ListItem> = entries[range]
        .iter()
        .enumerate()
        .map(|(offset, entry)| entry_item(start + offset + 1, entry))
        .collect();

    let mut list_state = ListState::default();
    if !items.is_empty() {
        list_state.select(Some(selector.cursor - start));
    }

    let list = List::new(items).highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );
    f.render_stateful_widget(list, chunks[1], &mut list_state);

    let status_line = if let Some(buffer) = selector.jump_buffer() {
        Line::styled(format!("Go to #{}_", buffer), Style::default().fg(Color::Yellow))
    } else if let Some(status) = &selector.status {
        Line::styled(status.clone(), Style::default().fg(Color::Red))
    } else {
        Line::from("")
    };

    let footer = Paragraph::new(vec![
        status_line,
        Line::styled(
            "↑/↓: Move | ←/→: Page | 0-9 Enter: Jump | Enter: Select | q/Esc: Cancel",
            Style::default().fg(Color::DarkGray),
        ),
    ])
    .block(Block::default().borders(Borders::TOP));
    f.render_widget(footer, chunks[2]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Scripted(VecDeque<Event>);

    impl Scripted {
        fn keys(codes: &[KeyCode]) -> Self {
            Self(
                codes
                    .iter()
                    .map(|code| Event::Key(KeyEvent::new(*code, KeyModifiers::NONE)))
                    .collect(),
            )
        }
    }

    impl EventSource for Scripted {
        fn next_event(&mut self) -> Result<Option<Event>> {
            Ok(self.0.pop_front())
        }
    }

    fn entries() -> Vec<CatalogEntry> {
        (0..4)
            .map(|i| CatalogEntry {
                identifier: format!("ep-{}", i),
                show_title: "Hard Fork".to_string(),
                episode_title: format!("Episode {}", i),
                show_slug: None,
                publisher_title: Some("The New York Times".to_string()),
                publisher_slug: None,
                publish_date: Some("2024-03-01".to_string()),
                relative_path: Some(format!("ep-{}.md", i)),
                absolute_path: None,
                has_markdown: i != 1,
                play_state: PlayState::Unplayed,
                listening_status: None,
                sort_timestamp: 0,
                skip_reason: None,
            })
            .collect()
    }

    #[test]
    fn test_panic_hook_restores_before_unwinding() {
        static RESTORED: AtomicBool = AtomicBool::new(false);

        let result = panic::catch_unwind(|| {
            let _restore = PanicRestore::install(|| RESTORED.store(true, Ordering::SeqCst));
            panic!("draw failed");
        });

        assert!(result.is_err());
        assert!(RESTORED.load(Ordering::SeqCst));
        let _ = panic::take_hook();
    }

    fn terminal() -> Terminal<TestBackend> {
        Terminal::new(TestBackend::new(80, 24)).unwrap()
    }

    #[test]
    fn test_enter_picks_cursor_entry() {
        let list = entries();
        let mut calls = Vec::new();
        let mut events = Scripted::keys(&[KeyCode::Down, KeyCode::Down, KeyCode::Enter]);

        let picked = run_selector(&mut terminal(), &list, "Episodes", &mut events, |e| {
            calls.push(e.identifier.clone())
        })
        .unwrap();

        assert_eq!(picked.unwrap().identifier, "ep-2");
        assert_eq!(calls, vec!["ep-2".to_string()]);
    }

    #[test]
    fn test_missing_document_never_reaches_callback() {
        let list = entries();
        let mut calls = 0;
        let mut events = Scripted::keys(&[KeyCode::Char('2'), KeyCode::Enter, KeyCode::Esc]);

        let picked = run_selector(&mut terminal(), &list, "Episodes", &mut events, |_| calls += 1).unwrap();

        assert!(picked.is_none());
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_events_after_resolution_are_ignored() {
        let list = entries();
        let mut events = Scripted::keys(&[KeyCode::Enter, KeyCode::Down, KeyCode::Enter]);

        let picked = run_selector(&mut terminal(), &list, "Episodes", &mut events, |_| {}).unwrap();

        assert_eq!(picked.unwrap().identifier, "ep-0");
        assert_eq!(events.0.len(), 2);
    }

    #[test]
    fn test_exhausted_events_cancel() {
        let list = entries();
        let mut events = Scripted::keys(&[KeyCode::Down]);
        let picked = run_selector(&mut terminal(), &list, "Episodes", &mut events, |_| {}).unwrap();
        assert!(picked.is_none());
    }

    #[test]
    fn test_key_translation() {
        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(translate_event(ctrl_c), Some(SelectorEvent::Cancel));
        assert_eq!(
            translate_event(Event::Key(KeyEvent::new(KeyCode::Char('7'), KeyModifiers::NONE))),
            Some(SelectorEvent::Digit('7'))
        );
        assert_eq!(translate_event(Event::Resize(100, 40)), Some(SelectorEvent::Resize { rows: 40 }));
        assert_eq!(translate_event(Event::FocusGained), None);
    }

    #[test]
    fn test_frame_shows_page_and_status() {
        let list = entries();
        let mut term = terminal();
        let selector = Selector::new(24).apply(SelectorEvent::Down, &list).apply(SelectorEvent::Confirm, &list);
        term.draw(|f| draw_ui(f, &selector, &list, "Episodes")).unwrap();

        let screen: String = term
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("page 1/1"));
        assert!(screen.contains("No markdown yet"));
    }
}
