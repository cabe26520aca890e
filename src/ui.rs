use std::time::Duration;
use unicode_width::UnicodeWidthStr;

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState,
        Wrap,
    },
};

use crate::model::{ConfirmView, FilterView, FormView, Model, PopupView, Status, UIData};
use crate::view::SortDirection;

pub const CMDLINE_HEIGHT: u16 = 1;
pub const SEARCH_HEIGHT: u16 = 3;
pub const FOOTER_HEIGHT: u16 = 1;
pub const TABLE_HEADER_HEIGHT: u16 = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 2;
/// Room reserved next to a header label for the sort and filter markers.
pub const HEADER_MARKER_WIDTH: usize = 3;
pub const MAX_COLUMN_WIDTH: usize = 32;

const STATUS_MESSAGE_FADE: Duration = Duration::from_secs(5);

const SELECTED_ROW_STYLE: Style = Style::new().bg(Color::DarkGray);
const SELECTED_CELL_STYLE: Style = Style::new().fg(Color::Black).bg(Color::Cyan);

#[derive(Default)]
pub struct TableUI {
    table_state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self {
            table_state: TableState::default(),
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let area = frame.area();
        match &uidata.status {
            Status::LOADING => draw_loading(frame, area),
            Status::ERROR(message) => draw_error(frame, area, message),
            Status::READY | Status::QUITTING => self.draw_directory(uidata, frame, area),
        }
    }

    fn draw_directory(&mut self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let [search_area, table_area, footer_area, cmd_area] = Layout::vertical([
            Constraint::Length(SEARCH_HEIGHT),
            Constraint::Min(TABLE_HEADER_HEIGHT + 2),
            Constraint::Length(FOOTER_HEIGHT),
            Constraint::Length(CMDLINE_HEIGHT),
        ])
        .areas(area);

        self.draw_search(uidata, frame, search_area);
        self.draw_table(uidata, frame, table_area);
        draw_footer(uidata, frame, footer_area);
        self.draw_cmdline(uidata, frame, cmd_area);

        if let Some(filter) = &uidata.filter {
            draw_filter(filter, frame, area);
        }
        if let Some(confirm) = &uidata.confirm {
            draw_confirm(confirm, frame, area);
        }
        if let Some(form) = &uidata.form {
            draw_form(form, frame, area);
        }
        if let Some(popup) = &uidata.popup {
            draw_popup(popup, frame, area);
        }
    }

    fn draw_search(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let border_color = if uidata.search_active {
            Color::Yellow
        } else {
            Color::DarkGray
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_set(border::ROUNDED)
            .border_style(Style::default().fg(border_color))
            .title(" Search ");
        let text = if uidata.search.input.is_empty() && !uidata.search_active {
            Line::from("Search companies... (press /)".dark_gray())
        } else {
            Line::from(uidata.search.input.as_str())
        };
        let inner = block.inner(area);
        frame.render_widget(Paragraph::new(text).block(block), area);
        if uidata.search_active {
            frame.set_cursor_position(Position::new(
                inner.x + cursor_offset(&uidata.search.input, uidata.search.cursor_pos),
                inner.y,
            ));
        }
    }

    fn draw_table(&mut self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let title = Line::from(vec![
            uidata.title.as_str().bold(),
            format!("{} of {} companies ", uidata.matching_rows, uidata.total_rows).into(),
        ]);
        let block = Block::bordered()
            .title(title.centered())
            .border_set(border::THICK);

        if uidata.rows.is_empty() {
            let text = Text::from("No data matches the current filters".italic());
            frame.render_widget(Paragraph::new(text).centered().block(block), area);
            return;
        }

        let header = Row::new(uidata.headers.iter().map(|h| {
            let marker = match h.sort {
                SortDirection::Ascending => " ▲",
                SortDirection::Descending => " ▼",
                SortDirection::None => "",
            };
            let filter = if h.filtered { "*" } else { "" };
            let style = if h.filterable {
                Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            };
            Cell::from(format!("{}{marker}{filter}", h.label)).style(style)
        }))
        .height(TABLE_HEADER_HEIGHT);

        let status_column = uidata.headers.len().saturating_sub(1);
        let rows = uidata.rows.iter().map(|row| {
            Row::new(row.cells.iter().enumerate().map(|(idx, value)| {
                let cell = Cell::from(value.as_str());
                if idx != status_column {
                    return cell;
                }
                match value.as_str() {
                    "Active" => cell.green(),
                    "Inactive" => cell.red(),
                    _ => cell,
                }
            }))
        });
        let widths = uidata
            .headers
            .iter()
            .map(|h| Constraint::Length(h.width as u16));

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .row_highlight_style(SELECTED_ROW_STYLE)
            .cell_highlight_style(SELECTED_CELL_STYLE);

        self.table_state.select(Some(uidata.selected_row));
        self.table_state.select_column(Some(uidata.selected_column));
        frame.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn draw_cmdline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let style = if uidata.last_status_message_update.elapsed() > STATUS_MESSAGE_FADE {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };
        let line = Line::from(vec![
            Span::styled(uidata.status_message.as_str(), style),
            "  ?:help  q:quit".dark_gray(),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn draw_loading(frame: &mut Frame, area: Rect) {
    let block = Block::bordered().border_set(border::THICK);
    let text = Text::from(vec![
        Line::from(""),
        Line::from("Loading companies data...".bold()),
        Line::from("Press q to quit".dark_gray()),
    ]);
    frame.render_widget(Paragraph::new(text).centered().block(block), area);
}

fn draw_error(frame: &mut Frame, area: Rect, message: &str) {
    let block = Block::bordered()
        .title(" Error ".red().bold())
        .border_set(border::THICK)
        .border_style(Style::default().fg(Color::Red));
    let text = Text::from(vec![
        Line::from(""),
        Line::from(message.to_string()),
        Line::from(""),
        Line::from("Press r to retry, q to quit".dark_gray()),
    ]);
    frame.render_widget(
        Paragraph::new(text)
            .centered()
            .wrap(Wrap { trim: true })
            .block(block),
        area,
    );
}

fn draw_footer(uidata: &UIData, frame: &mut Frame, area: Rect) {
    let text = format!(
        "Page {} of {} · {} rows per page",
        uidata.page, uidata.total_pages, uidata.page_size
    );
    frame.render_widget(Paragraph::new(text).right_aligned(), area);
}

fn draw_filter(filter: &FilterView, frame: &mut Frame, area: Rect) {
    let widest = filter
        .options
        .iter()
        .map(|(value, _)| value.width())
        .max()
        .unwrap_or(0)
        .max(filter.title.width());
    let popup = centered(area, widest as u16 + 10, filter.options.len() as u16 + 4);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(border::ROUNDED)
        .border_style(Style::default().fg(Color::Green))
        .title(format!(" {} ", filter.title))
        .title_bottom(Line::from(" space:toggle enter:apply c:clear ").centered());
    let items: Vec<ListItem> = filter
        .options
        .iter()
        .map(|(value, checked)| {
            let mark = if *checked { "[x]" } else { "[ ]" };
            ListItem::new(format!("{mark} {value}"))
        })
        .collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(SELECTED_CELL_STYLE);
    let mut state = ListState::default().with_selected(Some(filter.cursor));
    frame.render_stateful_widget(list, popup, &mut state);
}

fn draw_confirm(confirm: &ConfirmView, frame: &mut Frame, area: Rect) {
    let popup = centered(area, 64, 9);
    frame.render_widget(Clear, popup);
    let accent = if confirm.destructive {
        Color::Red
    } else {
        Color::Yellow
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(border::ROUNDED)
        .border_style(Style::default().fg(accent))
        .title(format!(" {} ", confirm.title).bold());
    let text = Text::from(vec![
        Line::from(confirm.message.as_str().bold()),
        Line::from(""),
        Line::from(confirm.description.as_str()),
        Line::from(""),
        Line::from(vec![
            Span::styled(
                format!(" y: {} ", confirm.confirm_label),
                Style::default().fg(Color::Black).bg(accent),
            ),
            "   n: Cancel".into(),
        ]),
    ]);
    frame.render_widget(
        Paragraph::new(text).wrap(Wrap { trim: true }).block(block),
        popup,
    );
}

fn draw_form(form: &FormView, frame: &mut Frame, area: Rect) {
    let height = form.fields.len() as u16 * 2 + 3;
    let popup = centered(area, 72, height);
    frame.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(border::ROUNDED)
        .border_style(Style::default().fg(Color::Green))
        .title(format!(" {} ", form.title).bold())
        .title_bottom(Line::from(" tab:next enter:save esc:cancel ").centered());
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let label_width = form
        .fields
        .iter()
        .map(|f| f.label.width())
        .max()
        .unwrap_or(0)
        + 3;
    let mut lines = Vec::with_capacity(form.fields.len() * 2);
    let mut cursor = None;
    for (idx, field) in form.fields.iter().enumerate() {
        let label_style = if field.focused {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let mut spans = vec![
            Span::styled(format!("{:<label_width$}", format!("{} *", field.label)), label_style),
            Span::from(field.value.as_str()),
        ];
        if field.focused && field.has_suggestions {
            spans.push(Span::from("  (PgUp/PgDn)").dark_gray());
        }
        if field.focused {
            cursor = Some(Position::new(
                inner.x + label_width as u16 + cursor_offset(&field.value, form.cursor_pos),
                inner.y + idx as u16 * 2,
            ));
        }
        lines.push(Line::from(spans));
        match &field.error {
            Some(error) => lines.push(Line::from(format!("{:label_width$}{error}", "")).red()),
            None => lines.push(Line::from("")),
        }
    }
    frame.render_widget(Paragraph::new(lines), inner);
    if let Some(position) = cursor {
        frame.set_cursor_position(position);
    }
}

fn draw_popup(popup: &PopupView, frame: &mut Frame, area: Rect) {
    let lines = popup.message.lines().count() as u16;
    let width = popup
        .message
        .lines()
        .map(|l| l.width())
        .max()
        .unwrap_or(0) as u16
        + 4;
    let rect = centered(area, width.max(40), lines + 4);
    frame.render_widget(Clear, rect);
    let color = if popup.is_error {
        Color::Red
    } else {
        Color::Green
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(border::ROUNDED)
        .border_style(Style::default().fg(color))
        .title(format!(" {} ", popup.title).bold())
        .title_bottom(Line::from(" esc:close ").centered());
    frame.render_widget(
        Paragraph::new(popup.message.as_str())
            .wrap(Wrap { trim: false })
            .block(block),
        rect,
    );
}

/// Display columns taken by the first `cursor_pos` characters of `text`.
fn cursor_offset(text: &str, cursor_pos: usize) -> u16 {
    let end = text
        .char_indices()
        .nth(cursor_pos)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    text[..end].width() as u16
}

/// Rectangle of at most `width` x `height`, centered in `area`.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(2));
    let height = height.min(area.height.saturating_sub(2));
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}
