use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

/// Single line text input backing the search box and the column filters.
#[derive(Debug, Default, Clone)]
pub struct Inputter {
    current_input: String,
    curser_pos: usize,
    placeholder: String,
}

impl Inputter {
    pub fn with_placeholder(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
            ..Self::default()
        }
    }

    /// Applies a key, true if the text changed.
    pub fn read(&mut self, key: KeyEvent) -> bool {
        let before = self.current_input.len();
        let changed = match (key.code, key.modifiers) {
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.left(),
            (KeyCode::Right, _) => self.right(),
            (KeyCode::Home, _) => self.home(),
            (KeyCode::End, _) => self.end(),
            (KeyCode::Char(chr), KeyModifiers::NONE | KeyModifiers::SHIFT) => self.insert(chr),
            _ => false,
        };
        trace!(
            "Input {:?}: \"{}\" ({} -> {} bytes)",
            key.code,
            self.current_input,
            before,
            self.current_input.len()
        );
        changed
    }

    pub fn set(&mut self, s: &str) {
        self.current_input = s.to_string();
        self.curser_pos = s.chars().count();
    }

    pub fn value(&self) -> &str {
        &self.current_input
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Cursor position in characters.
    pub fn cursor(&self) -> usize {
        self.curser_pos
    }

    pub fn clear(&mut self) {
        self.current_input.clear();
        self.curser_pos = 0;
    }

    fn insert(&mut self, chr: char) -> bool {
        self.current_input.insert(self.getbytepos(), chr);
        self.curser_pos += 1;
        true
    }

    fn backspace(&mut self) -> bool {
        if self.curser_pos == 0 {
            return false;
        }
        self.curser_pos -= 1;
        self.current_input.remove(self.getbytepos());
        true
    }

    fn delete(&mut self) -> bool {
        if self.curser_pos >= self.current_input.chars().count() {
            return false;
        }
        self.current_input.remove(self.getbytepos());
        true
    }

    fn left(&mut self) -> bool {
        self.curser_pos = self.curser_pos.saturating_sub(1);
        false
    }

    fn right(&mut self) -> bool {
        if self.curser_pos < self.current_input.chars().count() {
            self.curser_pos += 1;
        }
        false
    }

    fn home(&mut self) -> bool {
        self.curser_pos = 0;
        false
    }

    fn end(&mut self) -> bool {
        self.curser_pos = self.current_input.chars().count();
        false
    }

    fn getbytepos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.curser_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(input: &mut Inputter, s: &str) {
        for c in s.chars() {
            assert!(input.read(key(KeyCode::Char(c))));
        }
    }

    #[test]
    fn typing_and_editing() {
        let mut input = Inputter::with_placeholder("Filter...");
        type_str(&mut input, "bernn");
        assert_eq!(input.value(), "bernn");

        assert!(!input.read(key(KeyCode::Left)));
        assert!(input.read(key(KeyCode::Backspace)));
        assert_eq!(input.value(), "bern");
        assert_eq!(input.cursor(), 3);

        input.read(key(KeyCode::Home));
        assert!(input.read(key(KeyCode::Delete)));
        assert_eq!(input.value(), "ern");
        type_str(&mut input, "B");
        assert_eq!(input.value(), "Bern");
        assert_eq!(input.placeholder(), "Filter...");
    }

    #[test]
    fn multibyte_characters() {
        let mut input = Inputter::default();
        type_str(&mut input, "zürich");
        input.read(key(KeyCode::End));
        for _ in 0..4 {
            input.read(key(KeyCode::Left));
        }
        assert!(input.read(key(KeyCode::Backspace)));
        assert_eq!(input.value(), "zrich");
    }

    #[test]
    fn noop_edits_report_no_change() {
        let mut input = Inputter::default();
        assert!(!input.read(key(KeyCode::Backspace)));
        assert!(!input.read(key(KeyCode::Delete)));
        assert!(!input.read(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL)));
        input.set("abc");
        assert_eq!(input.cursor(), 3);
        input.clear();
        assert_eq!(input.value(), "");
    }
}
