//! Cell content and the inline markup understood by raw markup columns.
//!
//! Markup is a small tag language: `<b>`, `<i>`, `<u>` and `<fg=COLOR>`, each
//! closed by the matching `</b>`, `</i>`, `</u>` or `</fg>`. Anything else
//! between angle brackets is kept as literal text.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Text(String),
    Markup(String),
}

impl CellContent {
    pub fn text(s: impl Into<String>) -> Self {
        CellContent::Text(s.into())
    }

    pub fn markup(s: impl Into<String>) -> Self {
        CellContent::Markup(s.into())
    }

    /// What the user reads in the cell; sorting compares this.
    pub fn display_text(&self) -> String {
        match self {
            CellContent::Text(s) => sanitize(s),
            CellContent::Markup(s) => parse(s).into_iter().map(|f| f.text).collect(),
        }
    }

    pub fn to_line(&self) -> Line<'static> {
        match self {
            CellContent::Text(s) => Line::from(sanitize(s)),
            CellContent::Markup(s) => Line::from(
                parse(s)
                    .into_iter()
                    .map(|f| Span::styled(f.text, f.style))
                    .collect::<Vec<_>>(),
            ),
        }
    }
}

/// Replaces line breaks and control characters so a cell stays on one line
/// and cannot drive the terminal.
pub fn sanitize(s: &str) -> String {
    s.replace("\r\n", " ↵ ")
        .replace('\n', " ↵ ")
        .chars()
        .map(|c| if c.is_control() { char::REPLACEMENT_CHARACTER } else { c })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub style: Style,
}

#[derive(Default, Clone)]
struct Open {
    bold: usize,
    italic: usize,
    underline: usize,
    colors: Vec<Color>,
}

impl Open {
    fn style(&self) -> Style {
        let mut style = Style::default();
        if self.bold > 0 {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.italic > 0 {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if self.underline > 0 {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        if let Some(color) = self.colors.last() {
            style = style.fg(*color);
        }
        style
    }

    /// Applies a tag, false if it is not part of the markup language.
    fn apply(&mut self, tag: &str) -> bool {
        match tag {
            "b" => self.bold += 1,
            "/b" => self.bold = self.bold.saturating_sub(1),
            "i" => self.italic += 1,
            "/i" => self.italic = self.italic.saturating_sub(1),
            "u" => self.underline += 1,
            "/u" => self.underline = self.underline.saturating_sub(1),
            "/fg" => {
                self.colors.pop();
            }
            _ => match tag.strip_prefix("fg=").map(Color::from_str) {
                Some(Ok(color)) => self.colors.push(color),
                _ => return false,
            },
        }
        true
    }
}

pub fn parse(markup: &str) -> Vec<Fragment> {
    let mut fragments: Vec<Fragment> = Vec::new();
    let mut open = Open::default();
    let mut current = String::new();
    let mut rest = markup;

    let mut flush = |current: &mut String, style: Style| {
        if !current.is_empty() {
            fragments.push(Fragment {
                text: sanitize(current),
                style,
            });
            current.clear();
        }
    };

    while let Some(start) = rest.find('<') {
        current.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('>') {
            Some(end) => {
                let tag = &after[..end];
                let style = open.style();
                let mut probe = open.clone();
                if probe.apply(tag) {
                    flush(&mut current, style);
                    open = probe;
                } else {
                    current.push('<');
                    current.push_str(tag);
                    current.push('>');
                }
                rest = &after[end + 1..];
            }
            None => {
                current.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    current.push_str(rest);
    let style = open.style();
    flush(&mut current, style);
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_interpreted() {
        let cell = CellContent::text("<b>bold</b>");
        assert_eq!(cell.display_text(), "<b>bold</b>");
        assert_eq!(cell.to_line().spans.len(), 1);
    }

    #[test]
    fn markup_is_interpreted() {
        let fragments = parse("a <b>bold <fg=red>red</fg></b> z");
        let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["a ", "bold ", "red", " z"]);
        assert!(fragments[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(fragments[2].style.fg, Some(Color::Red));
        assert!(fragments[2].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(fragments[3].style, Style::default());
        assert_eq!(CellContent::markup("<i>x</i>y").display_text(), "xy");
    }

    #[test]
    fn unknown_tags_stay_literal() {
        assert_eq!(
            CellContent::markup("<script>1 < 2</script>").display_text(),
            "<script>1 < 2</script>"
        );
        assert_eq!(CellContent::markup("<fg=nocolor>x").display_text(), "<fg=nocolor>x");
    }

    #[test]
    fn control_characters_are_neutralized() {
        assert_eq!(sanitize("a\nb"), "a ↵ b");
        assert_eq!(sanitize("\u{1b}[31mred"), "\u{fffd}[31mred");
    }
}
