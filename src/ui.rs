use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};
use std::time::Duration;

use crate::domain::TVConfig;
use crate::inputter::Inputter;
use crate::model::{Focus, Model};
use crate::table::DataTable;

pub const CONTROLS_HEIGHT: usize = 3;
pub const STATUSLINE_HEIGHT: usize = 1;
// Borders plus the label and filter lines of the header.
pub const TABLE_CHROME_HEIGHT: usize = 4;
pub const COLUMN_WIDTH_MARGIN: usize = 1;
pub const COLUMN_SPACING: u16 = 1;
const EXPORT_BUTTON_WIDTH: u16 = 16;
const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Draws the model and remembers where the clickable parts ended up.
#[derive(Debug, Default)]
pub struct TableUI {
    max_column_width: usize,
    header_areas: Vec<(Rect, usize)>,
    filter_areas: Vec<(Rect, usize)>,
    export_area: Rect,
}

impl TableUI {
    pub fn new(config: &TVConfig) -> Self {
        Self {
            max_column_width: config.max_column_width,
            ..Self::default()
        }
    }

    /// Column whose header covers the given terminal cell.
    pub fn header_at(&self, x: u16, y: u16) -> Option<usize> {
        self.header_areas
            .iter()
            .find(|(area, _)| area.contains(Position::new(x, y)))
            .map(|(_, idx)| *idx)
    }

    /// Column whose filter input covers the given terminal cell.
    pub fn filter_at(&self, x: u16, y: u16) -> Option<usize> {
        self.filter_areas
            .iter()
            .find(|(area, _)| area.contains(Position::new(x, y)))
            .map(|(_, idx)| *idx)
    }

    pub fn is_export_button(&self, x: u16, y: u16) -> bool {
        self.export_area.contains(Position::new(x, y))
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let [controls, table_area, statusline] = Layout::vertical([
            Constraint::Length(CONTROLS_HEIGHT as u16),
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        match model.table() {
            Some(table) => {
                self.draw_controls(model, table, controls, frame);
                self.draw_table(model, table, table_area, frame);
            }
            None => {
                self.header_areas.clear();
                self.filter_areas.clear();
                self.export_area = Rect::default();
                frame.render_widget(Paragraph::new("Nothing to show").centered(), table_area);
            }
        }
        self.draw_statusline(model, statusline, frame);

        if model.show_popup() {
            self.draw_popup(model, frame);
        }
    }

    fn draw_controls(&mut self, model: &Model, table: &DataTable, area: Rect, frame: &mut Frame) {
        let [search_area, export_area] =
            Layout::horizontal([Constraint::Min(0), Constraint::Length(EXPORT_BUTTON_WIDTH)])
                .areas(area);

        let focused = model.focus() == Focus::GlobalSearch;
        let search = table.global_search();
        let block = Block::bordered()
            .title(" Search ")
            .border_style(focus_style(focused));
        let inner = block.inner(search_area);
        frame.render_widget(
            Paragraph::new(input_line(search, false)).block(block),
            search_area,
        );
        if focused && !model.show_popup() {
            frame.set_cursor_position(Position::new(
                inner.x + search.cursor().min(inner.width as usize) as u16,
                inner.y,
            ));
        }

        let focused = model.focus() == Focus::Export;
        let button_style = if focused {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        frame.render_widget(
            Paragraph::new(table.export_label().to_string())
                .centered()
                .style(button_style)
                .block(Block::bordered().border_style(focus_style(focused))),
            export_area,
        );
        self.export_area = export_area;
    }

    fn column_widths(&self, table: &DataTable, rows: std::ops::Range<usize>) -> Vec<u16> {
        let max_width = self.max_column_width.max(COLUMN_WIDTH_MARGIN + 1);
        table
            .headers()
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                // label plus room for the sort indicator
                let mut width = header.label.chars().count() + 2;
                if let Some(filter) = table.column_filter(idx) {
                    let text = if filter.value().is_empty() {
                        filter.placeholder()
                    } else {
                        filter.value()
                    };
                    width = width.max(text.chars().count());
                }
                for row in &table.body()[rows.clone()] {
                    width = width.max(row.cells[idx].display_text().chars().count());
                }
                std::cmp::min(width + COLUMN_WIDTH_MARGIN, max_width) as u16
            })
            .collect()
    }

    fn draw_table(&mut self, model: &Model, table: &DataTable, area: Rect, frame: &mut Frame) {
        let rbegin = model.offset_row().min(table.body().len());
        let rend = std::cmp::min(rbegin + model.layout().body_height, table.body().len());
        let widths = self.column_widths(table, rbegin..rend);
        let constraints: Vec<Constraint> = widths.iter().map(|w| Constraint::Length(*w)).collect();

        let header = Row::new(table.headers().iter().enumerate().map(|(idx, h)| {
            let indicator = match table.sort_state() {
                Some(sort) if sort.column == idx => format!(" {}", sort.direction.symbol()),
                _ => String::new(),
            };
            let label = Line::from(format!("{}{}", h.label, indicator)).bold();
            let focused = model.focus() == Focus::ColumnFilter(idx);
            let filter = table
                .column_filter(idx)
                .map(|f| input_line(f, focused))
                .unwrap_or_default();
            Cell::from(Text::from(vec![label, filter]))
        }))
        .height(2)
        .style(Style::default().bg(Color::DarkGray));

        let rows = table.body()[rbegin..rend]
            .iter()
            .map(|row| Row::new(row.cells.iter().map(|c| Cell::from(c.to_line()))));

        let title = format!(" {} ", if table.name().is_empty() { "table" } else { table.name() });
        let block = Block::bordered().title(Line::from(title).bold());
        let inner = block.inner(area);

        let widget = Table::new(rows, constraints.clone())
            .header(header)
            .block(block)
            .column_spacing(COLUMN_SPACING)
            .flex(Flex::Start)
            .row_highlight_style(Style::default().bg(Color::Blue).fg(Color::White));
        let mut state = TableState::default().with_selected(if rbegin < rend {
            Some(model.selected_row())
        } else {
            None
        });
        frame.render_stateful_widget(widget, area, &mut state);

        let header_area = Rect {
            height: inner.height.min(2),
            ..inner
        };
        let columns = Layout::horizontal(constraints)
            .flex(Flex::Start)
            .spacing(COLUMN_SPACING)
            .split(header_area);
        // label line sorts, filter line below it focuses the filter
        self.header_areas = columns
            .iter()
            .map(|c| Rect { height: c.height.min(1), ..*c })
            .zip(0..)
            .collect();
        self.filter_areas = columns
            .iter()
            .zip(0..)
            .filter(|(c, _)| c.height > 1)
            .map(|(c, idx)| (Rect { y: c.y + 1, height: 1, ..*c }, idx))
            .collect();

        if let Focus::ColumnFilter(idx) = model.focus()
            && let (Some(column), Some(filter)) = (columns.get(idx), table.column_filter(idx))
            && !model.show_popup()
            && column.height > 1
        {
            let x = column.x + filter.cursor().min(column.width as usize) as u16;
            frame.set_cursor_position(Position::new(x, column.y + 1));
        }
    }

    fn draw_statusline(&self, model: &Model, area: Rect, frame: &mut Frame) {
        let info = model
            .table()
            .map(|table| {
                let sort = table
                    .sort_state()
                    .and_then(|s| table.headers().get(s.column).map(|h| (h, s)))
                    .map(|(h, s)| format!(" | sort: {} {}", h.label, s.direction.symbol()))
                    .unwrap_or_default();
                format!("rows {}/{}{} ", table.body().len(), table.dataset().len(), sort)
            })
            .unwrap_or_default();
        let info_width = info.chars().count() as u16;
        let [message_area, info_area] =
            Layout::horizontal([Constraint::Min(0), Constraint::Length(info_width)]).areas(area);

        let message = if model.status_message_age() > STATUS_MESSAGE_TIMEOUT {
            Span::from(" F1 help | Ctrl-Q quit").dark_gray()
        } else {
            Span::from(format!(" {}", model.status_message()))
        };
        frame.render_widget(Paragraph::new(Line::from(message)), message_area);
        frame.render_widget(
            Paragraph::new(Span::from(info).yellow()).right_aligned(),
            info_area,
        );
    }

    fn draw_popup(&self, model: &Model, frame: &mut Frame) {
        let area = centered(frame.area(), 80, 60);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(model.popup_message())
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(" Help ".bold()).title_bottom(" <Esc> close ")),
            area,
        );
    }
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn input_line(input: &Inputter, focused: bool) -> Line<'static> {
    let line = if input.value().is_empty() {
        Line::from(input.placeholder().to_string()).style(
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
        )
    } else {
        Line::from(input.value().to_string())
    };
    if focused { line.yellow().underlined() } else { line }
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    area
}
