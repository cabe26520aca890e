use std::borrow::Cow;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::company::{Company, Field};
use crate::domain::DirError;

pub const HEADERS: [&str; 8] = [
    "Name",
    "Location",
    "Industry",
    "Employees",
    "Revenue",
    "Website",
    "Founded",
    "Status",
];

/// Quote a field containing a comma, quote or newline, doubling inner quotes.
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Websites are always quoted and prefixed with `'` so spreadsheets keep
/// them as plain text instead of turning them into links.
pub fn escape_website(field: &str) -> String {
    format!("\"'{}\"", field.replace('"', "\"\""))
}

pub fn to_csv_row(company: &Company) -> String {
    Field::COLUMNS
        .iter()
        .map(|&field| {
            let value = company.value(field);
            if field == Field::Website {
                escape_website(&value)
            } else {
                escape_field(&value).into_owned()
            }
        })
        .collect::<Vec<String>>()
        .join(",")
}

/// CSV document for the processed rows, header first, `\n` separated.
pub fn to_csv(rows: &[Company]) -> String {
    std::iter::once(HEADERS.join(","))
        .chain(rows.iter().map(to_csv_row))
        .collect::<Vec<String>>()
        .join("\n")
}

/// Expand `~` and environment variables in a user supplied path.
pub fn expand_path(path: &str) -> Result<PathBuf, DirError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| DirError::Path {
            path: path.to_string(),
            reason: e.to_string(),
        })
}

pub fn write_csv(path: &str, rows: &[Company]) -> Result<PathBuf, DirError> {
    let target = expand_path(path)?;
    fs::write(&target, to_csv(rows))?;
    info!("Exported {} rows to {}", rows.len(), target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Company {
        Company {
            id: Some(1),
            name: "Acme, \"Inc\"".into(),
            location: "New York".into(),
            industry: "Technology".into(),
            employees: "1000+".into(),
            revenue: "$1M - $10M".into(),
            website: "acme.example".into(),
            founded: "1999".into(),
            status: "Active".into(),
        }
    }

    #[test]
    fn plain_fields_are_left_alone() {
        assert_eq!(escape_field("Berlin"), "Berlin");
        assert_eq!(escape_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn row_quotes_name_and_wraps_website() {
        assert_eq!(
            to_csv_row(&sample()),
            "\"Acme, \"\"Inc\"\"\",New York,Technology,1000+,$1M - $10M,\"'acme.example\",1999,Active"
        );
    }

    #[test]
    fn document_starts_with_header() {
        let csv = to_csv(&[sample(), Company::draft()]);
        let lines: Vec<&str> = csv.split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Name,Location,Industry,Employees,Revenue,Website,Founded,Status"
        );
        assert_eq!(lines[2], ",,,,,\"'\",,Active");
    }

    #[test]
    fn header_only_for_empty_set() {
        assert_eq!(to_csv(&[]), HEADERS.join(","));
    }

    #[test]
    fn writes_to_expanded_path() {
        let dir = std::env::temp_dir().join(format!("compdir_export_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.csv");
        let written = write_csv(path.to_str().unwrap(), &[sample()]).unwrap();
        let content = fs::read_to_string(&written).unwrap();
        assert!(content.starts_with("Name,"));
        fs::remove_dir_all(dir).unwrap();
    }
}
