use arboard::Clipboard;
use crossbeam_channel::Sender;
use ratatui::crossterm::event::{KeyCode, KeyEvent};
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};
use unicode_width::UnicodeWidthStr;

use crate::backend::{BackendCommand, BackendEvent};
use crate::company::{Company, Field};
use crate::domain::{AppConfig, DirError, HELP_TEXT, Message};
use crate::export;
use crate::inputter::{InputResult, Inputter};
use crate::mutation::{ConfirmKind, Directory, Effect, Flow, FlowEvent};
use crate::ui::{COLUMN_WIDTH_MARGIN, HEADER_MARKER_WIDTH, MAX_COLUMN_WIDTH};
use crate::view::{DerivedView, SortDirection, ViewAction, ViewState, reduce, unique_values};

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    LOADING,
    READY,
    ERROR(String),
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    FILTER,
    SEARCH,
    CONFIRM,
    FORM,
    POPUP,
}

/// Which key map the controller should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyContext {
    Loading,
    Failed,
    Table,
    Filter,
    Confirm,
    Text,
    Popup,
}

struct FilterPopup {
    field: Field,
    options: Vec<String>,
    cursor: usize,
}

struct Popup {
    title: String,
    message: String,
    is_error: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderView {
    pub label: String,
    pub sort: SortDirection,
    pub filtered: bool,
    pub filterable: bool,
    pub width: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub id: Option<u64>,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterView {
    pub title: String,
    pub options: Vec<(String, bool)>,
    pub cursor: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmView {
    pub title: String,
    pub message: String,
    pub description: String,
    pub confirm_label: String,
    pub destructive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormFieldView {
    pub label: String,
    pub value: String,
    pub error: Option<String>,
    pub focused: bool,
    pub has_suggestions: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormView {
    pub title: String,
    pub fields: Vec<FormFieldView>,
    pub cursor_pos: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopupView {
    pub title: String,
    pub message: String,
    pub is_error: bool,
}

/// Snapshot of everything the UI draws. Rebuilt after every update so
/// rendering never reaches into the model.
#[derive(Debug, Clone)]
pub struct UIData {
    pub title: String,
    pub status: Status,
    pub headers: Vec<HeaderView>,
    pub rows: Vec<RowView>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub page: usize,
    pub total_pages: usize,
    pub page_size: usize,
    pub total_rows: usize,
    pub matching_rows: usize,
    pub search: InputResult,
    pub search_active: bool,
    pub filter: Option<FilterView>,
    pub confirm: Option<ConfirmView>,
    pub form: Option<FormView>,
    pub popup: Option<PopupView>,
    pub status_message: String,
    pub last_status_message_update: Instant,
    pub last_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            title: String::new(),
            status: Status::LOADING,
            headers: Vec::new(),
            rows: Vec::new(),
            selected_row: 0,
            selected_column: 0,
            page: 1,
            total_pages: 1,
            page_size: 0,
            total_rows: 0,
            matching_rows: 0,
            search: InputResult::default(),
            search_active: false,
            filter: None,
            confirm: None,
            form: None,
            popup: None,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
            last_update: Instant::now(),
        }
    }
}

pub struct Model {
    config: AppConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    directory: Directory,
    view_state: ViewState,
    derived: DerivedView,
    flow: Flow,
    filter_popup: Option<FilterPopup>,
    popup: Option<Popup>,
    cursor_row: usize,
    cursor_column: usize,
    input: Inputter,
    last_input: InputResult,
    clipboard: Option<Clipboard>,
    commands: Sender<BackendCommand>,
    status_message: String,
    last_status_message_update: Instant,
    uidata: UIData,
}

impl Model {
    pub fn init(config: &AppConfig, commands: Sender<BackendCommand>) -> Self {
        let view_state = ViewState::new(config.filterable.clone(), config.page_size);
        let mut model = Self {
            config: config.clone(),
            status: Status::LOADING,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            directory: Directory::default(),
            derived: DerivedView::compute(&[], &view_state),
            view_state,
            flow: Flow::Idle,
            filter_popup: None,
            popup: None,
            cursor_row: 0,
            cursor_column: 0,
            input: Inputter::default(),
            last_input: InputResult::default(),
            clipboard: None,
            commands,
            status_message: "Started compdir!".to_string(),
            last_status_message_update: Instant::now(),
            uidata: UIData::empty(),
        };
        model.update_uidata();
        model
    }

    /// Start (or restart) the bulk load of all companies.
    pub fn reload(&mut self) -> Result<(), DirError> {
        self.status = Status::LOADING;
        self.set_status_message("Loading companies data...");
        self.update_uidata();
        self.send(BackendCommand::LoadAll)
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn companies(&self) -> &[Company] {
        self.directory.rows()
    }

    pub fn view_state(&self) -> &ViewState {
        &self.view_state
    }

    pub fn processed(&self) -> &[Company] {
        &self.derived.processed
    }

    pub fn key_context(&self) -> KeyContext {
        match (&self.status, self.modus) {
            (Status::LOADING, _) => KeyContext::Loading,
            (Status::ERROR(_), _) => KeyContext::Failed,
            (_, Modus::POPUP) => KeyContext::Popup,
            (_, Modus::SEARCH) | (_, Modus::FORM) => KeyContext::Text,
            (_, Modus::FILTER) => KeyContext::Filter,
            (_, Modus::CONFIRM) => KeyContext::Confirm,
            (_, Modus::TABLE) => KeyContext::Table,
        }
    }

    pub fn raw_keyevents(&self) -> bool {
        self.key_context() == KeyContext::Text
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), DirError> {
        if let Some(msg) = message {
            match msg {
                Message::Backend(event) => self.handle_backend_event(event),
                Message::Resize(width, height) => trace!("UI was resized to {width}x{height}"),
                msg => match self.key_context() {
                    KeyContext::Loading => {
                        if msg == Message::Quit {
                            self.quit();
                        }
                    }
                    KeyContext::Failed => match msg {
                        Message::Quit => self.quit(),
                        Message::Retry => self.reload()?,
                        _ => (),
                    },
                    KeyContext::Table => self.handle_table_message(msg)?,
                    KeyContext::Filter => self.handle_filter_message(msg),
                    KeyContext::Confirm => match msg {
                        Message::Confirm | Message::Enter => self.step_flow(FlowEvent::Confirm)?,
                        Message::Cancel | Message::Exit => self.step_flow(FlowEvent::Cancel)?,
                        Message::Quit => self.quit(),
                        _ => (),
                    },
                    KeyContext::Text => match (msg, self.modus) {
                        (Message::Quit, _) => self.quit(),
                        (Message::RawKey(key), Modus::SEARCH) => self.search_input(key),
                        (Message::RawKey(key), Modus::FORM) => self.form_input(key)?,
                        _ => (),
                    },
                    KeyContext::Popup => match msg {
                        Message::Quit => self.quit(),
                        Message::Exit | Message::Enter => self.close_popup(),
                        _ => (),
                    },
                },
            }
        }

        self.update_uidata();
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn handle_table_message(&mut self, msg: Message) -> Result<(), DirError> {
        match msg {
            Message::Quit => self.quit(),
            Message::MoveUp => self.move_selection_up(),
            Message::MoveDown => self.move_selection_down(),
            Message::MoveLeft => self.cursor_column = self.cursor_column.saturating_sub(1),
            Message::MoveRight => {
                self.cursor_column = std::cmp::min(self.cursor_column + 1, Field::COLUMNS.len() - 1)
            }
            Message::NextPage => self.apply_view(ViewAction::NextPage),
            Message::PrevPage => self.apply_view(ViewAction::PrevPage),
            Message::FirstPage => self.apply_view(ViewAction::GoToPage(1)),
            Message::LastPage => self.apply_view(ViewAction::GoToPage(usize::MAX)),
            Message::Sort => self.apply_view(ViewAction::ToggleSort(self.selected_field())),
            Message::Filter => self.open_filter(),
            Message::Search => self.enter_search(),
            Message::Add => self.step_flow(FlowEvent::RequestCreate)?,
            Message::Edit => match self.selected_company().cloned() {
                Some(company) => self.step_flow(FlowEvent::RequestEdit(company))?,
                None => self.set_status_message("No company selected"),
            },
            Message::Delete => match self.selected_company().cloned() {
                Some(company) => self.step_flow(FlowEvent::RequestDelete(company))?,
                None => self.set_status_message("No company selected"),
            },
            Message::Export => self.export(),
            Message::Reset => {
                self.apply_view(ViewAction::Reset);
                self.set_status_message("Filters, search and sort reset");
            }
            Message::CyclePageSize => {
                self.apply_view(ViewAction::CyclePageSize);
                self.set_status_message(format!(
                    "{} rows per page",
                    self.view_state.page_size
                ));
            }
            Message::CopyCell => {
                if let Some(company) = self.selected_company() {
                    let cell = company.value(self.selected_field()).into_owned();
                    self.copy_to_clipboard(cell);
                }
            }
            Message::CopyRow => {
                if let Some(company) = self.selected_company() {
                    let row = export::to_csv_row(company);
                    self.copy_to_clipboard(row);
                }
            }
            Message::Help => self.show_popup("Help", HELP_TEXT, false),
            _ => (),
        }
        Ok(())
    }

    fn handle_filter_message(&mut self, msg: Message) {
        let Some(popup) = self.filter_popup.as_mut() else {
            self.modus = Modus::TABLE;
            return;
        };
        let field = popup.field;
        match msg {
            Message::MoveDown => {
                if popup.cursor + 1 < popup.options.len() {
                    popup.cursor += 1;
                }
            }
            Message::MoveUp => popup.cursor = popup.cursor.saturating_sub(1),
            Message::Toggle => {
                if let Some(value) = popup.options.get(popup.cursor).cloned() {
                    self.apply_view(ViewAction::TogglePending { field, value });
                }
            }
            Message::Enter => {
                self.apply_view(ViewAction::ApplyFilter(field));
                self.close_filter();
                self.set_status_message(format!(
                    "{} companies match",
                    self.derived.processed.len()
                ));
            }
            Message::Clear => {
                self.apply_view(ViewAction::ClearFilter(field));
                self.close_filter();
            }
            Message::Exit => {
                self.apply_view(ViewAction::DiscardPending(field));
                self.close_filter();
            }
            Message::Quit => self.quit(),
            _ => (),
        }
    }

    fn handle_backend_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Loaded(rows) => {
                let count = rows.len();
                self.directory.replace_all(rows);
                self.status = Status::READY;
                self.apply_view(ViewAction::DataChanged);
                if self.directory.is_empty() {
                    self.set_status_message("The directory is empty, press a to add a company");
                } else {
                    self.set_status_message(format!("Loaded {count} companies"));
                }
            }
            BackendEvent::LoadFailed(message) => {
                error!("Error fetching companies: {message}");
                self.status = Status::ERROR(message);
            }
            BackendEvent::Created(company) => {
                info!("Added company {:?} ({})", company.id, company.name);
                self.set_status_message(format!("Added \"{}\"", company.name));
                self.directory.apply_created(company);
                self.apply_view(ViewAction::DataChanged);
            }
            BackendEvent::Updated(company) => {
                let name = company.name.clone();
                if self.directory.apply_updated(company) {
                    self.set_status_message(format!("Updated \"{name}\""));
                } else {
                    warn!("Updated company \"{name}\" is not in the local list");
                }
                self.apply_view(ViewAction::DataChanged);
            }
            BackendEvent::Deleted(id) => {
                let removed = self.directory.apply_deleted(id);
                debug!("Removed {removed} local rows for id {id}");
                self.set_status_message("Company deleted");
                self.apply_view(ViewAction::DataChanged);
            }
            BackendEvent::MutationFailed { op, message } => {
                warn!("{op:?} failed: {message}");
                self.show_popup("Error", message, true);
            }
        }
    }

    fn step_flow(&mut self, event: FlowEvent) -> Result<(), DirError> {
        let (next, effect) = std::mem::take(&mut self.flow).step(event);
        self.flow = next;
        match &self.flow {
            Flow::Idle => {
                if matches!(self.modus, Modus::CONFIRM | Modus::FORM) {
                    self.modus = Modus::TABLE;
                }
            }
            Flow::Confirm { .. } => self.modus = Modus::CONFIRM,
            Flow::Form(form) => {
                let value = form.draft.value(form.focused()).into_owned();
                self.input.set(&value);
                self.last_input = self.input.get();
                self.modus = Modus::FORM;
            }
        }
        match effect {
            Some(effect) => self.run_effect(effect),
            None => Ok(()),
        }
    }

    fn run_effect(&mut self, effect: Effect) -> Result<(), DirError> {
        match effect {
            Effect::Create(company) => {
                self.set_status_message(format!("Adding \"{}\" ...", company.name));
                self.send(BackendCommand::Create(company))
            }
            Effect::Update { id, company } => {
                self.set_status_message(format!("Saving \"{}\" ...", company.name));
                self.send(BackendCommand::Update { id, company })
            }
            Effect::Delete(id) => {
                self.set_status_message("Deleting ...");
                self.send(BackendCommand::Delete { id })
            }
            Effect::Reject(message) => {
                self.show_popup("Error", message, true);
                Ok(())
            }
        }
    }

    fn send(&self, cmd: BackendCommand) -> Result<(), DirError> {
        debug!(command = cmd.name(), "Queue backend command");
        self.commands
            .send(cmd)
            .map_err(|_| DirError::Backend("command queue closed".into()))
    }

    fn apply_view(&mut self, action: ViewAction) {
        trace!("View action {:?}", action);
        self.view_state = reduce(&self.view_state, action, self.directory.rows());
        self.derived = DerivedView::compute(self.directory.rows(), &self.view_state);
        let visible = self.derived.page_rows().len();
        self.cursor_row = std::cmp::min(self.cursor_row, visible.saturating_sub(1));
    }

    fn selected_field(&self) -> Field {
        Field::COLUMNS[self.cursor_column]
    }

    fn selected_company(&self) -> Option<&Company> {
        self.derived.page_rows().get(self.cursor_row)
    }

    fn move_selection_down(&mut self) {
        let visible = self.derived.page_rows().len();
        if self.cursor_row + 1 < visible {
            self.cursor_row += 1;
        } else if self.derived.page < self.derived.total_pages {
            self.apply_view(ViewAction::NextPage);
            self.cursor_row = 0;
        }
    }

    fn move_selection_up(&mut self) {
        if self.cursor_row > 0 {
            self.cursor_row -= 1;
        } else if self.derived.page > 1 {
            self.apply_view(ViewAction::PrevPage);
            self.cursor_row = self.derived.page_rows().len().saturating_sub(1);
        }
    }

    fn open_filter(&mut self) {
        let field = self.selected_field();
        if !self.view_state.is_filterable(field) {
            self.set_status_message(format!("{} cannot be filtered", field.label()));
            return;
        }
        self.apply_view(ViewAction::OpenFilter(field));
        self.filter_popup = Some(FilterPopup {
            field,
            options: unique_values(self.directory.rows(), field),
            cursor: 0,
        });
        self.previous_modus = self.modus;
        self.modus = Modus::FILTER;
    }

    fn close_filter(&mut self) {
        self.filter_popup = None;
        self.modus = Modus::TABLE;
    }

    fn enter_search(&mut self) {
        trace!("Entering search mode ...");
        self.previous_modus = self.modus;
        self.modus = Modus::SEARCH;
        self.input.set(&self.view_state.search_term);
        self.last_input = self.input.get();
    }

    fn search_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.canceled {
            self.apply_view(ViewAction::SetSearch(String::new()));
            self.modus = Modus::TABLE;
            return;
        }
        self.apply_view(ViewAction::SetSearch(self.last_input.input.clone()));
        if self.last_input.finished {
            self.modus = Modus::TABLE;
            self.set_status_message(format!("Found {} results", self.derived.processed.len()));
        }
    }

    fn form_input(&mut self, key: KeyEvent) -> Result<(), DirError> {
        let Flow::Form(form) = &mut self.flow else {
            self.modus = Modus::TABLE;
            return Ok(());
        };
        match key.code {
            KeyCode::Tab | KeyCode::Down => {
                form.focus_next();
                let value = form.draft.value(form.focused()).into_owned();
                self.input.set(&value);
            }
            KeyCode::BackTab | KeyCode::Up => {
                form.focus_prev();
                let value = form.draft.value(form.focused()).into_owned();
                self.input.set(&value);
            }
            KeyCode::PageDown | KeyCode::PageUp => {
                if let Some(value) = form.cycle_suggestion(key.code == KeyCode::PageDown) {
                    self.input.set(&value);
                }
            }
            _ => {
                let result = self.input.read(key);
                if result.canceled {
                    return self.step_flow(FlowEvent::Cancel);
                }
                if result.finished {
                    self.step_flow(FlowEvent::Submit)?;
                    if let Flow::Form(form) = &self.flow {
                        // Still open: validation failed. Re-arm the input.
                        let value = form.draft.value(form.focused()).into_owned();
                        self.input.set(&value);
                        self.set_status_message("Please fill in the required fields");
                    }
                } else {
                    form.set_field(form.focused(), result.input);
                }
            }
        }
        self.last_input = self.input.get();
        Ok(())
    }

    fn export(&mut self) {
        let rows = &self.derived.processed;
        match export::write_csv(&self.config.export_path, rows) {
            Ok(path) => {
                let message = format!("Exported {} rows to {}", rows.len(), path.display());
                self.set_status_message(message);
            }
            Err(e) => {
                error!("Export failed: {e}");
                self.show_popup("Export failed", e.to_string(), true);
            }
        }
    }

    fn copy_to_clipboard(&mut self, content: String) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!("Clipboard unavailable: {e:?}");
                    self.set_status_message("Clipboard unavailable");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(content) {
                Ok(_) => {
                    trace!("Copied content to clipboard.");
                    self.set_status_message("Copied to clipboard");
                }
                Err(e) => {
                    warn!("Error copying to clipboard: {e:?}");
                    self.set_status_message("Copy failed");
                }
            }
        }
    }

    fn show_popup(&mut self, title: &str, message: impl Into<String>, is_error: bool) {
        if self.modus != Modus::POPUP {
            self.previous_modus = self.modus;
        }
        self.modus = Modus::POPUP;
        self.popup = Some(Popup {
            title: title.to_string(),
            message: message.into(),
            is_error,
        });
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.popup = None;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::TABLE;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    fn header_views(&self) -> Vec<HeaderView> {
        let page_rows = self.derived.page_rows();
        Field::COLUMNS
            .iter()
            .map(|&field| {
                let content_width = page_rows
                    .iter()
                    .map(|c| c.value(field).width())
                    .max()
                    .unwrap_or(0);
                let label_width = field.label().width() + HEADER_MARKER_WIDTH;
                let width = std::cmp::min(
                    std::cmp::max(label_width, content_width) + COLUMN_WIDTH_MARGIN,
                    MAX_COLUMN_WIDTH,
                );
                HeaderView {
                    label: field.label().to_string(),
                    sort: self.view_state.sort.direction_for(field),
                    filtered: self.view_state.is_filtered(field),
                    filterable: self.view_state.is_filterable(field),
                    width,
                }
            })
            .collect()
    }

    fn confirm_view(&self) -> Option<ConfirmView> {
        let Flow::Confirm { kind, company } = &self.flow else {
            return None;
        };
        Some(match kind {
            ConfirmKind::Delete => ConfirmView {
                title: "Delete Confirmation".into(),
                message: format!("Are you sure you want to delete \"{}\"?", company.name),
                description: "This action cannot be undone. The record will be permanently removed from the system.".into(),
                confirm_label: "Delete".into(),
                destructive: true,
            },
            ConfirmKind::Edit => ConfirmView {
                title: "Edit Confirmation".into(),
                message: format!("Are you sure you want to edit \"{}\"?", company.name),
                description: "You are about to modify this record. Make sure you have the necessary permissions.".into(),
                confirm_label: "Edit".into(),
                destructive: false,
            },
        })
    }

    fn form_view(&self) -> Option<FormView> {
        let Flow::Form(form) = &self.flow else {
            return None;
        };
        let fields = Field::COLUMNS
            .iter()
            .map(|&field| FormFieldView {
                label: field.label().to_string(),
                value: form.draft.value(field).into_owned(),
                error: form.errors.get(&field).map(|e| e.to_string()),
                focused: form.focused() == field,
                has_suggestions: !field.suggestions().is_empty(),
            })
            .collect();
        Some(FormView {
            title: form.title().to_string(),
            fields,
            cursor_pos: self.last_input.cursor_pos,
        })
    }

    fn filter_view(&self) -> Option<FilterView> {
        let popup = self.filter_popup.as_ref()?;
        Some(FilterView {
            title: format!("Filter {}", popup.field.label()),
            options: popup
                .options
                .iter()
                .map(|v| (v.clone(), self.view_state.is_pending(popup.field, v)))
                .collect(),
            cursor: popup.cursor,
        })
    }

    fn update_uidata(&mut self) {
        let headers = self.header_views();
        let rows = self
            .derived
            .page_rows()
            .iter()
            .map(|c| RowView {
                id: c.id,
                cells: Field::COLUMNS
                    .iter()
                    .map(|&f| c.value(f).into_owned())
                    .collect(),
            })
            .collect();
        let search_active = self.modus == Modus::SEARCH;
        let search = if search_active {
            self.last_input.clone()
        } else {
            InputResult {
                input: self.view_state.search_term.clone(),
                cursor_pos: self.view_state.search_term.chars().count(),
                ..InputResult::default()
            }
        };

        self.uidata = UIData {
            title: " Companies Directory ".to_string(),
            status: self.status.clone(),
            headers,
            rows,
            selected_row: self.cursor_row,
            selected_column: self.cursor_column,
            page: self.derived.page,
            total_pages: self.derived.total_pages,
            page_size: self.derived.page_size,
            total_rows: self.directory.len(),
            matching_rows: self.derived.processed.len(),
            search,
            search_active,
            filter: self.filter_view(),
            confirm: self.confirm_view(),
            form: self.form_view(),
            popup: self.popup.as_ref().map(|p| PopupView {
                title: p.title.clone(),
                message: p.message.clone(),
                is_error: p.is_error,
            }),
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
            last_update: Instant::now(),
        };
    }
}
