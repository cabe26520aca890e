use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const INDUSTRIES: &[&str] = &[
    "Technology",
    "Healthcare",
    "Finance",
    "Energy",
    "Retail",
    "Education",
    "Automotive",
    "Logistics",
    "Manufacturing",
    "Other",
];

pub const EMPLOYEE_BUCKETS: &[&str] = &["1-10", "11-50", "51-100", "101-500", "501-1000", "1000+"];

pub const REVENUE_BUCKETS: &[&str] = &[
    "<$1M",
    "$1M - $10M",
    "$10M - $50M",
    "$50M - $100M",
    "$100M+",
];

pub const STATUSES: &[&str] = &["Active", "Inactive"];

/// One directory entry as exchanged with the store.
///
/// Every field except `id` is a free-form string. Absent JSON fields
/// deserialize to empty strings so the table pipeline never sees a hole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Company {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    pub location: String,
    pub industry: String,
    pub employees: String,
    pub revenue: String,
    pub website: String,
    pub founded: String,
    pub status: String,
}

impl Company {
    /// Empty record used by the "add" form.
    pub fn draft() -> Self {
        Company {
            status: STATUSES[0].to_string(),
            ..Company::default()
        }
    }

    /// String form of a field, as used by search, filters and export.
    pub fn value(&self, field: Field) -> Cow<'_, str> {
        match field {
            Field::Id => Cow::Owned(self.id.map(|id| id.to_string()).unwrap_or_default()),
            Field::Name => Cow::Borrowed(&self.name),
            Field::Location => Cow::Borrowed(&self.location),
            Field::Industry => Cow::Borrowed(&self.industry),
            Field::Employees => Cow::Borrowed(&self.employees),
            Field::Revenue => Cow::Borrowed(&self.revenue),
            Field::Website => Cow::Borrowed(&self.website),
            Field::Founded => Cow::Borrowed(&self.founded),
            Field::Status => Cow::Borrowed(&self.status),
        }
    }

    /// Overwrite a text field. The id is owned by the store and is left alone.
    pub fn set_value(&mut self, field: Field, value: String) {
        match field {
            Field::Id => {}
            Field::Name => self.name = value,
            Field::Location => self.location = value,
            Field::Industry => self.industry = value,
            Field::Employees => self.employees = value,
            Field::Revenue => self.revenue = value,
            Field::Website => self.website = value,
            Field::Founded => self.founded = value,
            Field::Status => self.status = value,
        }
    }

    /// Case-insensitive substring match over every field.
    /// `needle` must already be lowercase.
    pub fn matches_search(&self, needle: &str) -> bool {
        Field::ALL
            .iter()
            .any(|&f| self.value(f).to_lowercase().contains(needle))
    }

    pub fn compare_by(&self, other: &Company, field: Field) -> Ordering {
        field.kind().compare(&self.value(field), &other.value(field))
    }
}

/// Semantic type of a column, fixed in the field catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Numeric,
    Year,
    /// Range labels ordered by their position in the list.
    Bucket(&'static [&'static str]),
}

impl FieldKind {
    /// Total order used for sorting. Empty or unparseable values sort first.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match self {
            FieldKind::Text => a.cmp(b),
            FieldKind::Numeric | FieldKind::Year => {
                let pa = a.trim().parse::<i64>().ok();
                let pb = b.trim().parse::<i64>().ok();
                match (pa, pb) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (None, None) => a.cmp(b),
                }
            }
            FieldKind::Bucket(labels) => {
                let rank = |v: &str| -> (u8, usize) {
                    if v.is_empty() {
                        (0, 0)
                    } else if let Some(pos) = labels.iter().position(|l| *l == v) {
                        (1, pos)
                    } else {
                        (2, 0)
                    }
                };
                rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Id,
    Name,
    Location,
    Industry,
    Employees,
    Revenue,
    Website,
    Founded,
    Status,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Id,
        Field::Name,
        Field::Location,
        Field::Industry,
        Field::Employees,
        Field::Revenue,
        Field::Website,
        Field::Founded,
        Field::Status,
    ];

    /// Columns shown in the table, the form and the CSV export, in order.
    pub const COLUMNS: [Field; 8] = [
        Field::Name,
        Field::Location,
        Field::Industry,
        Field::Employees,
        Field::Revenue,
        Field::Website,
        Field::Founded,
        Field::Status,
    ];

    pub const DEFAULT_FILTERABLE: [Field; 3] = [Field::Name, Field::Location, Field::Industry];

    pub fn key(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Name => "name",
            Field::Location => "location",
            Field::Industry => "industry",
            Field::Employees => "employees",
            Field::Revenue => "revenue",
            Field::Website => "website",
            Field::Founded => "founded",
            Field::Status => "status",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::Id => "ID",
            Field::Name => "Company Name",
            Field::Location => "Location",
            Field::Industry => "Industry",
            Field::Employees => "Employees",
            Field::Revenue => "Revenue",
            Field::Website => "Website",
            Field::Founded => "Founded",
            Field::Status => "Status",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::Id => FieldKind::Numeric,
            Field::Employees => FieldKind::Bucket(EMPLOYEE_BUCKETS),
            Field::Revenue => FieldKind::Bucket(REVENUE_BUCKETS),
            Field::Founded => FieldKind::Year,
            _ => FieldKind::Text,
        }
    }

    pub fn suggestions(self) -> &'static [&'static str] {
        match self {
            Field::Industry => INDUSTRIES,
            Field::Employees => EMPLOYEE_BUCKETS,
            Field::Revenue => REVENUE_BUCKETS,
            Field::Status => STATUSES,
            _ => &[],
        }
    }

    fn required_message(self) -> Option<&'static str> {
        match self {
            Field::Name => Some("Company name is required"),
            Field::Location => Some("Location is required"),
            Field::Industry => Some("Industry is required"),
            Field::Employees => Some("Employee count is required"),
            Field::Revenue => Some("Revenue is required"),
            Field::Website => Some("Website is required"),
            Field::Founded => Some("Founded year is required"),
            Field::Id | Field::Status => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown field '{s}'"))
    }
}

pub type FieldErrors = BTreeMap<Field, &'static str>;

/// Presence checks run before any create or update reaches the network.
pub fn validate(company: &Company) -> FieldErrors {
    Field::COLUMNS
        .iter()
        .filter_map(|&field| {
            let message = field.required_message()?;
            company
                .value(field)
                .trim()
                .is_empty()
                .then_some((field, message))
        })
        .collect()
}
