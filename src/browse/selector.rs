//! Picker state machine
//!
//! The picker is a pure `(Selector, SelectorEvent) -> Selector` transition so
//! it can be driven by the terminal loop or by tests alike. The cursor indexes
//! the full, unpaged entry list and is the single source of truth; the visible
//! page is always derived from it.

use std::ops::Range;

use crate::catalog::CatalogEntry;

/// Terminal rows taken by the header and footer
pub const CHROME_ROWS: u16 = 6;
/// Rows used to draw one entry
pub const ENTRY_LINES: u16 = 2;

/// Input understood by the picker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorEvent {
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    /// A digit typed towards a jump target
    Digit(char),
    Backspace,
    Confirm,
    Cancel,
    Resize { rows: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Browsing,
    /// Collecting digits of a 1-based entry number
    TypingNumber { buffer: String },
    /// Terminal: the chosen entry index, or `None` when cancelled
    Resolved(Option<usize>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub cursor: usize,
    pub page_size: usize,
    pub mode: Mode,
    /// Inline message shown under the list
    pub status: Option<String>,
}

impl Selector {
    pub fn new(rows: u16) -> Self {
        Self {
            cursor: 0,
            page_size: Self::page_size_for(rows),
            mode: Mode::Browsing,
            status: None,
        }
    }

    /// Entries that fit in `rows` terminal rows, never less than one
    pub fn page_size_for(rows: u16) -> usize {
        (rows.saturating_sub(CHROME_ROWS) / ENTRY_LINES).max(1) as usize
    }

    /// 1-based page holding the cursor
    pub fn current_page(&self) -> usize {
        self.cursor / self.page_size + 1
    }

    pub fn total_pages(&self, len: usize) -> usize {
        len.div_ceil(self.page_size).max(1)
    }

    /// Indices of the entries on the current page
    pub fn page_range(&self, len: usize) -> Range<usize> {
        let start = (self.current_page() - 1) * self.page_size;
        start.min(len)..(start + self.page_size).min(len)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.mode, Mode::Resolved(_))
    }

    /// `Some(choice)` once resolved; the choice is `None` for a cancellation
    pub fn resolution(&self) -> Option<Option<usize>> {
        match self.mode {
            Mode::Resolved(choice) => Some(choice),
            _ => None,
        }
    }

    /// Digits typed so far, if a jump is in progress
    pub fn jump_buffer(&self) -> Option<&str> {
        match &self.mode {
            Mode::TypingNumber { buffer } => Some(buffer),
            _ => None,
        }
    }

    /// Apply one event; resolved selectors ignore everything
    pub fn apply(mut self, event: SelectorEvent, entries: &[CatalogEntry]) -> Self {
        if self.is_resolved() {
            return self;
        }

        let len = entries.len();
        let last = len.saturating_sub(1);

        if !matches!(event, SelectorEvent::Resize { .. }) {
            self.status = None;
        }

        match event {
            SelectorEvent::Up => {
                self.mode = Mode::Browsing;
                self.cursor = self.cursor.saturating_sub(1);
            }
            SelectorEvent::Down => {
                self.mode = Mode::Browsing;
                self.cursor = (self.cursor + 1).min(last);
            }
            SelectorEvent::PageUp => {
                self.mode = Mode::Browsing;
                let page = self.current_page().saturating_sub(1).max(1);
                self.cursor = ((page - 1) * self.page_size).min(last);
            }
            SelectorEvent::PageDown => {
                self.mode = Mode::Browsing;
                let page = (self.current_page() + 1).min(self.total_pages(len));
                self.cursor = ((page - 1) * self.page_size).min(last);
            }
            SelectorEvent::Home => {
                self.mode = Mode::Browsing;
                self.cursor = 0;
            }
            SelectorEvent::End => {
                self.mode = Mode::Browsing;
                self.cursor = last;
            }
            SelectorEvent::Digit(digit) if digit.is_ascii_digit() => match &mut self.mode {
                Mode::TypingNumber { buffer } => buffer.push(digit),
                _ => {
                    self.mode = Mode::TypingNumber {
                        buffer: digit.to_string(),
                    }
                }
            },
            SelectorEvent::Digit(_) => {}
            SelectorEvent::Backspace => {
                if let Mode::TypingNumber { buffer } = &mut self.mode {
                    buffer.pop();
                    if buffer.is_empty() {
                        self.mode = Mode::Browsing;
                    }
                }
            }
            SelectorEvent::Confirm => {
                let typed = match std::mem::replace(&mut self.mode, Mode::Browsing) {
                    Mode::TypingNumber { buffer } => Some(buffer),
                    _ => None,
                };
                return match typed {
                    Some(buffer) => match buffer.parse::<usize>() {
                        Ok(n) if (1..=len).contains(&n) => self.resolve(n - 1, entries),
                        _ => {
                            self.status = Some(format!("No entry #{} (1-{})", buffer, len));
                            self
                        }
                    },
                    None if len == 0 => {
                        self.status = Some("Nothing to select".to_string());
                        self
                    }
                    None => {
                        let cursor = self.cursor;
                        self.resolve(cursor, entries)
                    }
                };
            }
            SelectorEvent::Cancel => {
                self.mode = Mode::Resolved(None);
            }
            SelectorEvent::Resize { rows } => {
                self.page_size = Self::page_size_for(rows);
            }
        }

        self
    }

    fn resolve(mut self, index: usize, entries: &[CatalogEntry]) -> Self {
        match entries.get(index) {
            Some(entry) if entry.has_markdown => self.mode = Mode::Resolved(Some(index)),
            Some(entry) => {
                self.status = Some(format!("No markdown yet for #{}: {}", index + 1, entry.label()));
            }
            None => self.status = Some(format!("No entry #{}", index + 1)),
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PlayState;

    fn entries(n: usize) -> Vec<CatalogEntry> {
        (0..n)
            .map(|i| CatalogEntry {
                identifier: format!("ep-{}", i),
                show_title: "Show".to_string(),
                episode_title: format!("Episode {}", i),
                show_slug: None,
                publisher_title: None,
                publisher_slug: None,
                publish_date: None,
                relative_path: Some(format!("ep-{}.md", i)),
                absolute_path: None,
                has_markdown: true,
                play_state: PlayState::Unplayed,
                listening_status: None,
                sort_timestamp: 0,
                skip_reason: None,
            })
            .collect()
    }

    fn run(selector: Selector, events: &[SelectorEvent], entries: &[CatalogEntry]) -> Selector {
        events.iter().fold(selector, |s, e| s.apply(*e, entries))
    }

    /// A selector showing five entries per page
    fn five_per_page() -> Selector {
        Selector::new(CHROME_ROWS + 5 * ENTRY_LINES)
    }

    #[test]
    fn test_page_size_from_rows() {
        assert_eq!(Selector::page_size_for(CHROME_ROWS + 10), 5);
        assert_eq!(Selector::page_size_for(CHROME_ROWS + 11), 5);
        assert_eq!(Selector::page_size_for(2), 1);
        assert_eq!(Selector::page_size_for(0), 1);
    }

    #[test]
    fn test_cursor_moves_across_pages() {
        let list = entries(12);
        let s = run(five_per_page(), &[SelectorEvent::Down; 5], &list);
        assert_eq!(s.cursor, 5);
        assert_eq!(s.current_page(), 2);
        assert_eq!(s.page_range(list.len()), 5..10);

        let s = run(s, &[SelectorEvent::Up], &list);
        assert_eq!(s.current_page(), 1);
    }

    #[test]
    fn test_cursor_clamps_at_edges() {
        let list = entries(3);
        let s = run(five_per_page(), &[SelectorEvent::Up], &list);
        assert_eq!(s.cursor, 0);
        let s = run(s, &[SelectorEvent::Down; 10], &list);
        assert_eq!(s.cursor, 2);
    }

    #[test]
    fn test_page_moves_reset_to_first_index() {
        let list = entries(12);
        let s = run(five_per_page(), &[SelectorEvent::Down, SelectorEvent::Down], &list);
        let s = run(s, &[SelectorEvent::PageDown], &list);
        assert_eq!(s.cursor, 5);

        let s = run(s, &[SelectorEvent::PageDown, SelectorEvent::PageDown], &list);
        assert_eq!(s.cursor, 10);
        assert_eq!(s.page_range(list.len()), 10..12);

        let s = run(s, &[SelectorEvent::Down, SelectorEvent::PageUp], &list);
        assert_eq!(s.cursor, 5);
        let s = run(s, &[SelectorEvent::PageUp, SelectorEvent::PageUp], &list);
        assert_eq!(s.cursor, 0);
    }

    #[test]
    fn test_digits_do_not_move_cursor() {
        let list = entries(12);
        let s = run(five_per_page(), &[SelectorEvent::Digit('1'), SelectorEvent::Digit('1')], &list);
        assert_eq!(s.cursor, 0);
        assert_eq!(s.jump_buffer(), Some("11"));

        let s = run(s, &[SelectorEvent::Confirm], &list);
        assert_eq!(s.resolution(), Some(Some(10)));
    }

    #[test]
    fn test_backspace_edits_jump_buffer() {
        let list = entries(12);
        let s = run(
            five_per_page(),
            &[SelectorEvent::Digit('4'), SelectorEvent::Digit('2'), SelectorEvent::Backspace],
            &list,
        );
        assert_eq!(s.jump_buffer(), Some("4"));
        let s = run(s, &[SelectorEvent::Backspace], &list);
        assert_eq!(s.mode, Mode::Browsing);
    }

    #[test]
    fn test_out_of_range_jump_clears_buffer() {
        let list = entries(3);
        let s = run(five_per_page(), &[SelectorEvent::Digit('9'), SelectorEvent::Confirm], &list);
        assert_eq!(s.mode, Mode::Browsing);
        assert!(s.status.as_deref().unwrap().contains("#9"));

        let s = run(s, &[SelectorEvent::Digit('0'), SelectorEvent::Confirm], &list);
        assert_eq!(s.mode, Mode::Browsing);
        assert!(s.status.is_some());
    }

    #[test]
    fn test_confirm_resolves_cursor_entry() {
        let list = entries(3);
        let s = run(five_per_page(), &[SelectorEvent::Down, SelectorEvent::Confirm], &list);
        assert_eq!(s.resolution(), Some(Some(1)));
    }

    #[test]
    fn test_missing_document_is_rejected() {
        let mut list = entries(3);
        list[1].has_markdown = false;

        let s = run(five_per_page(), &[SelectorEvent::Down, SelectorEvent::Confirm], &list);
        assert_eq!(s.mode, Mode::Browsing);
        assert!(s.status.as_deref().unwrap().contains("Episode 1"));

        let s = run(five_per_page(), &[SelectorEvent::Digit('2'), SelectorEvent::Confirm], &list);
        assert_eq!(s.mode, Mode::Browsing);
        assert!(s.status.is_some());
        assert_eq!(s.jump_buffer(), None);
    }

    #[test]
    fn test_status_clears_on_next_move() {
        let mut list = entries(3);
        list[0].has_markdown = false;
        let s = run(five_per_page(), &[SelectorEvent::Confirm], &list);
        assert!(s.status.is_some());
        let s = run(s, &[SelectorEvent::Resize { rows: 40 }], &list);
        assert!(s.status.is_some());
        let s = run(s, &[SelectorEvent::Down], &list);
        assert!(s.status.is_none());
    }

    #[test]
    fn test_cancel_resolves_to_none() {
        let list = entries(3);
        let s = run(five_per_page(), &[SelectorEvent::Digit('2'), SelectorEvent::Cancel], &list);
        assert_eq!(s.resolution(), Some(None));
    }

    #[test]
    fn test_resolved_ignores_further_events() {
        let list = entries(3);
        let s = run(five_per_page(), &[SelectorEvent::Confirm], &list);
        let after = run(
            s.clone(),
            &[SelectorEvent::Down, SelectorEvent::Resize { rows: 100 }, SelectorEvent::Cancel],
            &list,
        );
        assert_eq!(after, s);
    }

    #[test]
    fn test_resize_keeps_cursor_and_rederives_page() {
        let list = entries(30);
        let s = run(five_per_page(), &[SelectorEvent::End], &list);
        assert_eq!(s.cursor, 29);
        assert_eq!(s.current_page(), 6);

        let s = run(s, &[SelectorEvent::Resize { rows: CHROME_ROWS + 20 }], &list);
        assert_eq!(s.cursor, 29);
        assert_eq!(s.page_size, 10);
        assert_eq!(s.current_page(), 3);
    }

    #[test]
    fn test_empty_list() {
        let list = entries(0);
        let s = run(five_per_page(), &[SelectorEvent::Down, SelectorEvent::PageDown, SelectorEvent::End], &list);
        assert_eq!(s.cursor, 0);
        assert_eq!(s.page_range(0), 0..0);
        let s = run(s, &[SelectorEvent::Confirm], &list);
        assert_eq!(s.mode, Mode::Browsing);
        assert!(s.status.is_some());
    }
}
