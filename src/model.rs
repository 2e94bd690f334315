use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::time::Instant;
use tracing::{error, info, trace};

use crate::domain::{HELP_TEXT, Message, TVConfig, TVError};
use crate::export::{self, Downloader};
use crate::surface::Screen;
use crate::table::DataTable;
use crate::ui::{CONTROLS_HEIGHT, STATUSLINE_HEIGHT, TABLE_CHROME_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
}

/// Which control receives typed keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    GlobalSearch,
    ColumnFilter(usize),
    Export,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub body_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let body_height = ui_height
            .saturating_sub(CONTROLS_HEIGHT + STATUSLINE_HEIGHT + TABLE_CHROME_HEIGHT)
            .max(1);
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            body_height,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: TVConfig,
    pub status: Status,
    modus: Modus,
    screen: Screen,
    focus: Focus,
    offset_row: usize,
    curser_row: usize,
    uilayout: UILayout,
    clipboard: Option<Clipboard>,
    downloader: Box<dyn Downloader>,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(
        config: &TVConfig,
        screen: Screen,
        downloader: Box<dyn Downloader>,
        ui_width: usize,
        ui_height: usize,
    ) -> Self {
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            screen,
            focus: Focus::GlobalSearch,
            offset_row: 0,
            curser_row: 0,
            uilayout: UILayout::from_values(ui_width, ui_height),
            clipboard: None,
            downloader,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        };
        let loaded = model
            .table()
            .map(|t| format!("Loaded {} records, F1 for help", t.dataset().len()))
            .unwrap_or_else(|| format!("Nothing mounted at \"{}\"", model.config.mount));
        model.set_status_message(loaded);
        model
    }

    pub fn table(&self) -> Option<&DataTable> {
        self.screen.get(&self.config.mount)
    }

    fn table_mut(&mut self) -> Result<&mut DataTable, TVError> {
        let mount = &self.config.mount;
        self.screen
            .get_mut(mount)
            .ok_or_else(|| TVError::MountPointNotFound(mount.clone()))
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn offset_row(&self) -> usize {
        self.offset_row
    }

    pub fn selected_row(&self) -> usize {
        self.curser_row
    }

    pub fn layout(&self) -> &UILayout {
        &self.uilayout
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn show_popup(&self) -> bool {
        self.modus == Modus::POPUP
    }

    pub fn popup_message(&self) -> &str {
        HELP_TEXT
    }

    /// Typed keys go to the focused input unless the export trigger is focused.
    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::TABLE && self.focus != Focus::Export
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    pub fn status_message_age(&self) -> std::time::Duration {
        self.last_status_message_update.elapsed()
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    /// Failures of single interactions end up in the status line, never in the loop.
    pub fn update(&mut self, message: Option<Message>) -> Result<(), TVError> {
        if let Some(msg) = message {
            trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);
            if let Err(e) = self.dispatch(msg) {
                error!("{e}");
                if let TVError::Format(fe) = &e {
                    error!("{}", fe.span_trace());
                }
                self.set_status_message(format!("Error: {e}"));
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, msg: Message) -> Result<(), TVError> {
        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::Help => self.modus = Modus::POPUP,
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Input(key) => self.input(key)?,
                Message::ClearInput => self.clear_input()?,
                Message::FocusNext => self.move_focus(1),
                Message::FocusPrevious => self.move_focus(-1),
                Message::SortFocusedColumn => self.sort_focused_column()?,
                Message::HeaderClicked(column) => self.sort_column(column)?,
                Message::FilterClicked(column) => self.focus_column_filter(column),
                Message::ClearSort => {
                    self.table_mut()?.clear_sort()?;
                    self.set_status_message("Sort cleared");
                }
                Message::Export => self.export()?,
                Message::CopyCell => self.copy_cell()?,
                Message::CopyRow => self.copy_row()?,
                Message::MoveUp => self.move_selection_up(1),
                Message::MoveDown => self.move_selection_down(1),
                Message::MovePageUp => self.move_selection_up(self.uilayout.body_height),
                Message::MovePageDown => self.move_selection_down(self.uilayout.body_height),
                Message::MoveBeginning => self.move_selection_beginning(),
                Message::MoveEnd => self.move_selection_end(),
                Message::Exit => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Exit | Message::Help | Message::ClearInput => self.modus = Modus::TABLE,
                _ => (),
            },
        }
        Ok(())
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.clamp_selection();
    }

    fn input(&mut self, key: KeyEvent) -> Result<(), TVError> {
        let focus = self.focus;
        let table = self.table_mut()?;
        match focus {
            Focus::GlobalSearch => table.edit_global_filter(key)?,
            Focus::ColumnFilter(column) => table.edit_column_filter(column, key)?,
            Focus::Export => return Ok(()),
        }
        self.after_filter_change();
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), TVError> {
        let focus = self.focus;
        let table = self.table_mut()?;
        match focus {
            Focus::GlobalSearch => table.clear_global_filter()?,
            Focus::ColumnFilter(column) => table.clear_column_filter(column)?,
            Focus::Export => return Ok(()),
        }
        self.after_filter_change();
        Ok(())
    }

    fn after_filter_change(&mut self) {
        self.offset_row = 0;
        self.curser_row = 0;
        if let Some(table) = self.table() {
            let message = format!(
                "Showing {} of {} records",
                table.body().len(),
                table.dataset().len()
            );
            self.set_status_message(message);
        }
    }

    fn move_focus(&mut self, step: i64) {
        let ncolumns = self.table().map(|t| t.columns().len()).unwrap_or(0);
        // Global search, one filter per column, export.
        let slots = ncolumns as i64 + 2;
        let current = match self.focus {
            Focus::GlobalSearch => 0,
            Focus::ColumnFilter(c) => c as i64 + 1,
            Focus::Export => slots - 1,
        };
        let next = (current + step).rem_euclid(slots);
        self.focus = match next {
            0 => Focus::GlobalSearch,
            n if n == slots - 1 => Focus::Export,
            n => Focus::ColumnFilter((n - 1) as usize),
        };
        trace!("Focus {:?}", self.focus);
    }

    fn focus_column_filter(&mut self, column: usize) {
        let ncolumns = self.table().map(|t| t.columns().len()).unwrap_or(0);
        if column < ncolumns {
            self.focus = Focus::ColumnFilter(column);
            trace!("Focus {:?}", self.focus);
        }
    }

    fn sort_focused_column(&mut self) -> Result<(), TVError> {
        match self.focus {
            Focus::ColumnFilter(column) => self.sort_column(column),
            _ => {
                self.set_status_message("Focus a column filter to sort by it");
                Ok(())
            }
        }
    }

    fn sort_column(&mut self, column: usize) -> Result<(), TVError> {
        let table = self.table_mut()?;
        table.sort_by_column(column)?;
        let message = match (table.sort_state(), table.headers().get(column)) {
            (Some(sort), Some(header)) => format!("Sorted by {} {}", header.label, sort.direction.symbol()),
            _ => String::new(),
        };
        self.set_status_message(message);
        Ok(())
    }

    fn export(&mut self) -> Result<(), TVError> {
        let mount = self.config.mount.clone();
        let table = self
            .screen
            .get(&mount)
            .ok_or(TVError::MountPointNotFound(mount))?;
        let path = table.export(self.downloader.as_mut())?;
        info!("Exported {} records to {:?}", table.dataset().len(), path);
        self.set_status_message(format!("Exported to {}", path.display()));
        Ok(())
    }

    fn selected(&self) -> Option<(&DataTable, usize)> {
        let table = self.table()?;
        let row = table.body().get(self.offset_row + self.curser_row)?;
        Some((table, row.record_idx))
    }

    fn copy_to_clipboard(&mut self, content: String) -> Result<(), TVError> {
        if self.clipboard.is_none() {
            self.clipboard = Some(Clipboard::new().map_err(|e| TVError::InvalidArgument(e.to_string()))?);
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            clipboard
                .set_text(content)
                .map_err(|e| TVError::InvalidArgument(e.to_string()))?;
            trace!("Copied content to clipboard.");
        }
        Ok(())
    }

    fn copy_cell(&mut self) -> Result<(), TVError> {
        let column = match self.focus {
            Focus::ColumnFilter(c) => c,
            _ => 0,
        };
        let Some((table, record_idx)) = self.selected() else {
            return Ok(());
        };
        let cell = table.dataset().records()[record_idx].text(&table.columns()[column]);
        trace!("Cell content: {}", cell);
        self.copy_to_clipboard(cell)?;
        self.set_status_message("Copied cell");
        Ok(())
    }

    fn copy_row(&mut self) -> Result<(), TVError> {
        let Some((table, record_idx)) = self.selected() else {
            return Ok(());
        };
        let line = export::record_line(&table.dataset().records()[record_idx], table.columns())?;
        self.copy_to_clipboard(line)?;
        self.set_status_message("Copied row");
        Ok(())
    }

    fn nrows(&self) -> usize {
        self.table().map(|t| t.body().len()).unwrap_or(0)
    }

    fn clamp_selection(&mut self) {
        let nrows = self.nrows();
        let height = self.uilayout.body_height;
        if nrows == 0 {
            self.offset_row = 0;
            self.curser_row = 0;
            return;
        }
        let selected = std::cmp::min(self.offset_row + self.curser_row, nrows - 1);
        if selected < self.offset_row {
            self.offset_row = selected;
        } else if selected >= self.offset_row + height {
            self.offset_row = selected + 1 - height;
        }
        self.curser_row = selected - self.offset_row;
    }

    fn move_selection_beginning(&mut self) {
        self.curser_row = 0;
        self.offset_row = 0;
    }

    fn move_selection_end(&mut self) {
        let nrows = self.nrows();
        let height = self.uilayout.body_height;
        if nrows < height {
            self.offset_row = 0;
            self.curser_row = nrows.saturating_sub(1);
        } else {
            self.offset_row = nrows - height;
            self.curser_row = height - 1;
        }
    }

    fn move_selection_up(&mut self, size: usize) {
        let selected = (self.offset_row + self.curser_row).saturating_sub(size);
        if selected < self.offset_row {
            self.offset_row = selected;
        }
        self.curser_row = selected - self.offset_row;
    }

    fn move_selection_down(&mut self, size: usize) {
        let nrows = self.nrows();
        if nrows == 0 {
            return;
        }
        let selected = std::cmp::min(self.offset_row + self.curser_row + size, nrows - 1);
        let height = self.uilayout.body_height;
        if selected >= self.offset_row + height {
            self.offset_row = selected + 1 - height;
        }
        self.curser_row = selected - self.offset_row;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::TableOptions;
    use crate::dataset::{Dataset, Record};
    use clap::Parser;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct SharedDownloader {
        files: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl Downloader for SharedDownloader {
        fn download(&mut self, filename: &str, _mime: &str, contents: &str) -> Result<PathBuf, TVError> {
            self.files
                .lock()
                .unwrap()
                .push((filename.to_string(), contents.to_string()));
            Ok(PathBuf::from("/downloads").join(filename))
        }
    }

    fn model(nrecords: i64, height: usize) -> (Model, SharedDownloader) {
        let config = TVConfig::parse_from(["dtv", "numbers.csv"]);
        let records = (0..nrecords)
            .map(|i| Record::from_iter([("n", i), ("sq", i * i)]))
            .collect();
        let dataset = Dataset::new(vec!["n".into(), "sq".into()], records).unwrap();
        let mut screen = Screen::new([config.mount.as_str()]);
        DataTable::mount(dataset, &config.mount, TableOptions::default(), &mut screen).unwrap();
        let downloader = SharedDownloader::default();
        let model = Model::init(&config, screen, Box::new(downloader.clone()), 80, height);
        (model, downloader)
    }

    fn type_str(model: &mut Model, s: &str) {
        for c in s.chars() {
            let key = KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
            model.update(Some(Message::Input(key))).unwrap();
        }
    }

    #[test]
    fn typing_filters_the_focused_input() {
        let (mut model, _) = model(20, 30);
        type_str(&mut model, "1");
        // 1, 10..19 in n and 1, 16, 81, 100, 121, 144, 169, 196, 361 in sq
        let table = model.table().unwrap();
        assert!(table.body().iter().all(|r| {
            let record = &table.dataset().records()[r.record_idx];
            record.text("n").contains('1') || record.text("sq").contains('1')
        }));

        model.update(Some(Message::FocusNext)).unwrap();
        assert_eq!(model.focus(), Focus::ColumnFilter(0));
        type_str(&mut model, "9");
        assert_eq!(model.table().unwrap().body().len(), 2);

        model.update(Some(Message::ClearInput)).unwrap();
        model.update(Some(Message::FocusPrevious)).unwrap();
        model.update(Some(Message::ClearInput)).unwrap();
        assert_eq!(model.table().unwrap().body().len(), 20);
    }

    #[test]
    fn filter_click_focuses_without_sorting() {
        let (mut model, _) = model(3, 30);
        model.update(Some(Message::FilterClicked(1))).unwrap();
        assert_eq!(model.focus(), Focus::ColumnFilter(1));
        assert_eq!(model.table().unwrap().sort_state(), None);
        model.update(Some(Message::FilterClicked(5))).unwrap();
        assert_eq!(model.focus(), Focus::ColumnFilter(1));
    }

    #[test]
    fn focus_wraps_around() {
        let (mut model, _) = model(3, 30);
        model.update(Some(Message::FocusPrevious)).unwrap();
        assert_eq!(model.focus(), Focus::Export);
        assert!(!model.raw_keyevents());
        model.update(Some(Message::FocusNext)).unwrap();
        assert_eq!(model.focus(), Focus::GlobalSearch);
    }

    #[test]
    fn header_click_sorts_and_reverses() {
        let (mut model, _) = model(5, 30);
        model.update(Some(Message::HeaderClicked(0))).unwrap();
        model.update(Some(Message::HeaderClicked(0))).unwrap();
        let first = &model.table().unwrap().body()[0];
        assert_eq!(first.record_idx, 4);
        assert!(model.status_message().starts_with("Sorted by n"));
    }

    #[test]
    fn export_writes_full_dataset() {
        let (mut model, downloader) = model(4, 30);
        type_str(&mut model, "3");
        assert_eq!(model.table().unwrap().body().len(), 1);
        model.update(Some(Message::Export)).unwrap();

        let files = downloader.files.lock().unwrap();
        assert_eq!(files[0].0, "matches_1to1.csv");
        assert_eq!(files[0].1.lines().count(), 5);
        assert_eq!(model.status_message(), "Exported to /downloads/matches_1to1.csv");
    }

    #[test]
    fn errors_go_to_the_status_line() {
        let (mut model, _) = model(2, 30);
        model.update(Some(Message::HeaderClicked(9))).unwrap();
        assert!(model.status_message().starts_with("Error:"));
        assert_eq!(model.status, Status::READY);
    }

    #[test]
    fn selection_scrolls_the_body() {
        let height = CONTROLS_HEIGHT + STATUSLINE_HEIGHT + TABLE_CHROME_HEIGHT + 5;
        let (mut model, _) = model(12, height);
        assert_eq!(model.layout().body_height, 5);

        for _ in 0..7 {
            model.update(Some(Message::MoveDown)).unwrap();
        }
        assert_eq!(model.offset_row() + model.selected_row(), 7);
        assert_eq!(model.offset_row(), 3);

        model.update(Some(Message::MoveEnd)).unwrap();
        assert_eq!((model.offset_row(), model.selected_row()), (7, 4));
        model.update(Some(Message::MovePageDown)).unwrap();
        assert_eq!((model.offset_row(), model.selected_row()), (7, 4));

        model.update(Some(Message::MovePageUp)).unwrap();
        assert_eq!(model.offset_row() + model.selected_row(), 6);
        model.update(Some(Message::MoveBeginning)).unwrap();
        assert_eq!((model.offset_row(), model.selected_row()), (0, 0));
        model.update(Some(Message::MoveUp)).unwrap();
        assert_eq!((model.offset_row(), model.selected_row()), (0, 0));
    }

    #[test]
    fn help_popup_and_quit() {
        let (mut model, _) = model(1, 30);
        model.update(Some(Message::Help)).unwrap();
        assert!(model.show_popup());
        model.update(Some(Message::Export)).unwrap();
        assert!(model.show_popup());
        model.update(Some(Message::Exit)).unwrap();
        assert!(!model.show_popup());
        model.update(Some(Message::Quit)).unwrap();
        assert_eq!(model.status, Status::QUITTING);
    }
}
