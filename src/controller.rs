use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, TVConfig, TVError};
use crate::model::Model;
use crate::ui::TableUI;
use ratatui::crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &TVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model, ui: &TableUI) -> Result<Option<Message>, TVError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(self.map_event(event::read()?, model, ui));
        }
        Ok(None)
    }

    fn map_event(&self, event: Event, model: &Model, ui: &TableUI) -> Option<Message> {
        match event {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => self.handle_key(key, model),
            Event::Mouse(mouse) => self.handle_mouse(mouse, ui),
            Event::Resize(width, height) => Some(Message::Resize(width as usize, height as usize)),
            _ => None,
        }
    }

    fn handle_key(&self, key: KeyEvent, model: &Model) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('q'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('s'), KeyModifiers::CONTROL) => Some(Message::SortFocusedColumn),
            (KeyCode::Char('r'), KeyModifiers::CONTROL) => Some(Message::ClearSort),
            (KeyCode::Char('e'), KeyModifiers::CONTROL) => Some(Message::Export),
            (KeyCode::Char('y'), KeyModifiers::CONTROL) => Some(Message::CopyCell),
            (KeyCode::Char('l'), KeyModifiers::CONTROL) => Some(Message::CopyRow),
            (KeyCode::Home, KeyModifiers::CONTROL) => Some(Message::MoveBeginning),
            (KeyCode::End, KeyModifiers::CONTROL) => Some(Message::MoveEnd),
            (KeyCode::F(1), _) => Some(Message::Help),
            (KeyCode::Esc, _) if model.show_popup() => Some(Message::Exit),
            (KeyCode::Esc, _) => Some(Message::ClearInput),
            (KeyCode::Tab, _) => Some(Message::FocusNext),
            (KeyCode::BackTab, _) => Some(Message::FocusPrevious),
            (KeyCode::Up, _) => Some(Message::MoveUp),
            (KeyCode::Down, _) => Some(Message::MoveDown),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::Enter, _) if !model.raw_keyevents() => Some(Message::Export),
            _ if model.raw_keyevents() => Some(Message::Input(key)),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }

    fn handle_mouse(&self, mouse: MouseEvent, ui: &TableUI) -> Option<Message> {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return None;
        }
        let message = if ui.is_export_button(mouse.column, mouse.row) {
            Some(Message::Export)
        } else if let Some(column) = ui.header_at(mouse.column, mouse.row) {
            Some(Message::HeaderClicked(column))
        } else {
            ui.filter_at(mouse.column, mouse.row)
                .map(Message::FilterClicked)
        };
        trace!("Mapped: {mouse:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::TableOptions;
    use crate::dataset::{Dataset, Record};
    use crate::export::FileDownloader;
    use crate::surface::Screen;
    use crate::table::DataTable;
    use clap::Parser;
    use ratatui::{Terminal, backend::TestBackend};

    fn setup() -> (Controller, Model, TableUI) {
        let config = TVConfig::parse_from(["dtv", "x.csv"]);
        let records = vec![Record::from_iter([("a", 1i64), ("b", 2)])];
        let dataset = Dataset::new(vec!["a".into(), "b".into()], records).unwrap();
        let mut screen = Screen::new(["main"]);
        DataTable::mount(dataset, "main", TableOptions::default(), &mut screen).unwrap();
        let model = Model::init(&config, screen, Box::new(FileDownloader::new(".")), 40, 12);
        let mut ui = TableUI::new(&config);
        let mut terminal = Terminal::new(TestBackend::new(40, 12)).unwrap();
        terminal.draw(|f| ui.draw(&model, f)).unwrap();
        (Controller::new(&config), model, ui)
    }

    fn press(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent::new(code, modifiers))
    }

    fn click(column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn keys_map_to_messages() {
        let (controller, model, ui) = setup();
        let map = |event| controller.map_event(event, &model, &ui);

        assert_eq!(map(press(KeyCode::Char('q'), KeyModifiers::CONTROL)), Some(Message::Quit));
        assert_eq!(map(press(KeyCode::Tab, KeyModifiers::NONE)), Some(Message::FocusNext));
        assert_eq!(map(press(KeyCode::Esc, KeyModifiers::NONE)), Some(Message::ClearInput));
        assert_eq!(map(press(KeyCode::F(1), KeyModifiers::NONE)), Some(Message::Help));
        assert_eq!(
            map(press(KeyCode::Char('e'), KeyModifiers::CONTROL)),
            Some(Message::Export)
        );
        // plain characters, including q, are typed into the focused filter
        let typed = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert_eq!(map(Event::Key(typed)), Some(Message::Input(typed)));
        assert_eq!(map(Event::Resize(80, 24)), Some(Message::Resize(80, 24)));
    }

    #[test]
    fn clicks_hit_headers_and_export() {
        let (controller, model, ui) = setup();
        // controls take three lines, the table border one more
        assert_eq!(controller.map_event(click(1, 4), &model, &ui), Some(Message::HeaderClicked(0)));
        assert_eq!(controller.map_event(click(39, 1), &model, &ui), Some(Message::Export));
        assert_eq!(controller.map_event(click(1, 5), &model, &ui), Some(Message::FilterClicked(0)));
        assert_eq!(controller.map_event(click(1, 10), &model, &ui), None);
    }
}
