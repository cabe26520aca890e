use clap::Parser;
use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use std::io::Error;
use std::time::Duration;
use thiserror::Error;

use crate::backend::BackendEvent;
use crate::client::StoreError;
use crate::company::Field;
use crate::view::PageSize;

pub const DEFAULT_API_URL: &str = "http://localhost:3001";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_EXPORT_PATH: &str = "companies_directory.csv";
pub const DEFAULT_LOG_FILE: &str = "compdir.log";

pub const HELP_TEXT: &str = "\
Table
  q            quit
  j/k ↑/↓      select row
  h/l ←/→      select column
  n/p PgDn/PgUp next / previous page
  Home/End     first / last page
  s            sort column (none → asc → desc)
  f            filter column
  /            search
  a            add company
  e            edit company
  d            delete company
  x            export csv
  r            reset filters, search and sort
  z            cycle rows per page
  c / y        copy cell / row
  ?            this help

Filter popup
  Space toggle, Enter apply, c clear, Esc close

Form
  Tab/↓ next field, Shift-Tab/↑ previous field
  PgUp/PgDn cycle suggestions, Enter save, Esc cancel";

#[derive(Debug, Error)]
pub enum DirError {
    #[error("I/O error: {0}")]
    IoError(#[from] Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid path '{path}': {reason}")]
    Path { path: String, reason: String },
    #[error("could not set up logging: {0}")]
    Logging(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("backend worker unavailable: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    Sort,
    Filter,
    Search,
    Add,
    Edit,
    Delete,
    Export,
    Reset,
    CyclePageSize,
    CopyCell,
    CopyRow,
    Help,
    Enter,
    Exit,
    Toggle,
    Clear,
    Confirm,
    Cancel,
    Retry,
    RawKey(KeyEvent),
    Resize(usize, usize),
    Backend(BackendEvent),
}

#[derive(Parser, Debug)]
#[command(
    name = "compdir",
    version,
    about = "Browse and edit a company directory served by a REST store"
)]
pub struct Args {
    /// Base url of the company store
    #[arg(long, env = "COMPDIR_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Timeout of the initial load in milliseconds
    #[arg(long, env = "COMPDIR_API_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// Rows per page (5, 10 or 20)
    #[arg(long, env = "COMPDIR_PAGE_SIZE", default_value = "5")]
    pub page_size: PageSize,

    /// Target of the csv export
    #[arg(long, env = "COMPDIR_EXPORT_PATH", default_value = DEFAULT_EXPORT_PATH)]
    pub export_path: String,

    #[arg(long, env = "COMPDIR_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    pub log_file: String,

    #[arg(long, default_value_t = 100)]
    pub event_poll_ms: u64,

    /// Columns offering a value filter
    #[arg(long, value_delimiter = ',', default_value = "name,location,industry")]
    pub filterable: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Setters)]
#[setters(prefix = "with_")]
pub struct AppConfig {
    pub api_url: String,
    pub timeout: Duration,
    pub page_size: PageSize,
    pub export_path: String,
    pub log_file: String,
    pub event_poll_time: u64,
    pub filterable: Vec<Field>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            page_size: PageSize::default(),
            export_path: DEFAULT_EXPORT_PATH.to_string(),
            log_file: DEFAULT_LOG_FILE.to_string(),
            event_poll_time: 100,
            filterable: Field::DEFAULT_FILTERABLE.to_vec(),
        }
    }
}

impl TryFrom<Args> for AppConfig {
    type Error = DirError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        if args.api_url.trim().is_empty() {
            return Err(DirError::Config("api url must not be empty".into()));
        }
        if args.timeout_ms == 0 {
            return Err(DirError::Config("timeout must be positive".into()));
        }
        if args.filterable.contains(&Field::Id) {
            return Err(DirError::Config("the id column cannot be filtered".into()));
        }
        let mut filterable = Vec::new();
        for field in args.filterable {
            if !filterable.contains(&field) {
                filterable.push(field);
            }
        }
        Ok(AppConfig::default()
            .with_api_url(args.api_url.trim().to_string())
            .with_timeout(Duration::from_millis(args.timeout_ms))
            .with_page_size(args.page_size)
            .with_export_path(args.export_path)
            .with_log_file(args.log_file)
            .with_event_poll_time(args.event_poll_ms)
            .with_filterable(filterable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_to_local_store() {
        let args = Args::try_parse_from(["compdir"]).unwrap();
        let cfg = AppConfig::try_from(args).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.timeout, Duration::from_secs(10));
    }

    #[test]
    fn parses_overrides() {
        let args = Args::try_parse_from([
            "compdir",
            "--api-url",
            "http://store:8080",
            "--timeout-ms",
            "2500",
            "--page-size",
            "20",
            "--filterable",
            "industry,status,industry",
        ])
        .unwrap();
        let cfg = AppConfig::try_from(args).unwrap();
        assert_eq!(cfg.api_url, "http://store:8080");
        assert_eq!(cfg.timeout, Duration::from_millis(2500));
        assert_eq!(cfg.page_size.get(), 20);
        assert_eq!(cfg.filterable, vec![Field::Industry, Field::Status]);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Args::try_parse_from(["compdir", "--page-size", "7"]).is_err());
        let args = Args::try_parse_from(["compdir", "--timeout-ms", "0"]).unwrap();
        assert!(matches!(AppConfig::try_from(args), Err(DirError::Config(_))));
        let args = Args::try_parse_from(["compdir", "--filterable", "id"]).unwrap();
        assert!(AppConfig::try_from(args).is_err());
    }
}
