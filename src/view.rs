//! Table processing: search → filter → sort → paginate, plus the pure
//! reducer that owns the view state (filters, search, sort, page).

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

use crate::company::{Company, Field};

pub type FilterSet = BTreeMap<Field, BTreeSet<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    None,
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    pub key: Option<Field>,
    pub direction: SortDirection,
}

impl SortState {
    /// Header click: none → ascending → descending → none on the same column,
    /// a different column always starts ascending.
    pub fn toggled(self, field: Field) -> Self {
        let direction = if self.key == Some(field) {
            match self.direction {
                SortDirection::None => SortDirection::Ascending,
                SortDirection::Ascending => SortDirection::Descending,
                SortDirection::Descending => SortDirection::None,
            }
        } else {
            SortDirection::Ascending
        };
        SortState {
            key: Some(field),
            direction,
        }
    }

    pub fn direction_for(&self, field: Field) -> SortDirection {
        if self.key == Some(field) {
            self.direction
        } else {
            SortDirection::None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(usize);

impl PageSize {
    pub const OPTIONS: [usize; 3] = [5, 10, 20];

    pub fn new(size: usize) -> Option<Self> {
        Self::OPTIONS.contains(&size).then_some(PageSize(size))
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// Next option, wrapping around.
    pub fn next(self) -> Self {
        let pos = Self::OPTIONS.iter().position(|&s| s == self.0).unwrap_or(0);
        PageSize(Self::OPTIONS[(pos + 1) % Self::OPTIONS.len()])
    }
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize(Self::OPTIONS[0])
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: usize = s
            .trim()
            .parse()
            .map_err(|_| format!("'{s}' is not a number"))?;
        PageSize::new(n).ok_or_else(|| format!("page size must be one of {:?}", Self::OPTIONS))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub applied: FilterSet,
    pub pending: FilterSet,
    pub search_term: String,
    pub sort: SortState,
    pub page: usize,
    pub page_size: PageSize,
    pub filterable: Vec<Field>,
}

impl ViewState {
    pub fn new(filterable: Vec<Field>, page_size: PageSize) -> Self {
        let empty: FilterSet = filterable.iter().map(|&f| (f, BTreeSet::new())).collect();
        ViewState {
            applied: empty.clone(),
            pending: empty,
            search_term: String::new(),
            sort: SortState::default(),
            page: 1,
            page_size,
            filterable,
        }
    }

    pub fn is_filterable(&self, field: Field) -> bool {
        self.filterable.contains(&field)
    }

    /// True when the applied filter of `field` restricts rows.
    pub fn is_filtered(&self, field: Field) -> bool {
        self.applied.get(&field).is_some_and(|s| !s.is_empty())
    }

    pub fn is_pending(&self, field: Field, value: &str) -> bool {
        self.pending.get(&field).is_some_and(|s| s.contains(value))
    }
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState::new(Field::DEFAULT_FILTERABLE.to_vec(), PageSize::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    SetSearch(String),
    OpenFilter(Field),
    TogglePending { field: Field, value: String },
    ApplyFilter(Field),
    ClearFilter(Field),
    DiscardPending(Field),
    ToggleSort(Field),
    SetPageSize(PageSize),
    CyclePageSize,
    NextPage,
    PrevPage,
    GoToPage(usize),
    Reset,
    DataChanged,
    SetFilterable(Vec<Field>),
}

/// Pure transition of the view state. `rows` is the full data set and is
/// only used to clamp the page into `[1, total_pages]`.
pub fn reduce(state: &ViewState, action: ViewAction, rows: &[Company]) -> ViewState {
    let mut next = state.clone();
    let mut reset_page = false;

    match action {
        ViewAction::SetSearch(term) => {
            if term != next.search_term {
                next.search_term = term;
                reset_page = true;
            }
        }
        ViewAction::OpenFilter(field) | ViewAction::DiscardPending(field) => {
            if next.is_filterable(field) {
                let applied = next.applied.get(&field).cloned().unwrap_or_default();
                next.pending.insert(field, applied);
            }
        }
        ViewAction::TogglePending { field, value } => {
            if next.is_filterable(field) {
                let set = next.pending.entry(field).or_default();
                if !set.remove(&value) {
                    set.insert(value);
                }
            }
        }
        ViewAction::ApplyFilter(field) => {
            if next.is_filterable(field) {
                let pending = next.pending.get(&field).cloned().unwrap_or_default();
                next.applied.insert(field, pending);
                reset_page = true;
            }
        }
        ViewAction::ClearFilter(field) => {
            if next.is_filterable(field) {
                next.applied.insert(field, BTreeSet::new());
                next.pending.insert(field, BTreeSet::new());
                reset_page = true;
            }
        }
        ViewAction::ToggleSort(field) => next.sort = next.sort.toggled(field),
        ViewAction::SetPageSize(size) => {
            next.page_size = size;
            reset_page = true;
        }
        ViewAction::CyclePageSize => {
            next.page_size = next.page_size.next();
            reset_page = true;
        }
        ViewAction::NextPage => next.page = next.page.saturating_add(1),
        ViewAction::PrevPage => next.page = next.page.saturating_sub(1),
        ViewAction::GoToPage(page) => next.page = page,
        ViewAction::Reset => next = ViewState::new(next.filterable, next.page_size),
        ViewAction::DataChanged => reset_page = true,
        ViewAction::SetFilterable(fields) => {
            if fields != next.filterable {
                next = ViewState::new(fields, next.page_size);
            }
        }
    }

    if reset_page {
        next.page = 1;
    }
    let total = total_pages(select(rows, &next).len(), next.page_size);
    next.page = next.page.clamp(1, total);
    next
}

/// Rows containing `term` in any field, case-insensitively. Input order is kept.
pub fn search<'a>(rows: &'a [Company], term: &str) -> Vec<&'a Company> {
    if term.is_empty() {
        return rows.iter().collect();
    }
    let needle = term.to_lowercase();
    rows.par_iter().filter(|c| c.matches_search(&needle)).collect()
}

/// Keep rows whose value is in every non-empty filter set.
pub fn apply_filters<'a>(rows: Vec<&'a Company>, filters: &FilterSet) -> Vec<&'a Company> {
    let active: Vec<(&Field, &BTreeSet<String>)> =
        filters.iter().filter(|(_, set)| !set.is_empty()).collect();
    if active.is_empty() {
        return rows;
    }
    rows.into_iter()
        .filter(|c| {
            active
                .iter()
                .all(|(field, allowed)| allowed.contains(&*c.value(**field)))
        })
        .collect()
}

/// Stable sort; ties keep their input order in both directions.
pub fn sort_rows(rows: &mut [&Company], sort: SortState) {
    let Some(field) = sort.key else {
        return;
    };
    match sort.direction {
        SortDirection::None => {}
        SortDirection::Ascending => rows.sort_by(|a, b| a.compare_by(b, field)),
        SortDirection::Descending => rows.sort_by(|a, b| b.compare_by(a, field)),
    }
}

fn select<'a>(rows: &'a [Company], state: &ViewState) -> Vec<&'a Company> {
    apply_filters(search(rows, &state.search_term), &state.applied)
}

/// Processed data: search, filter and sort, before pagination.
pub fn process(rows: &[Company], state: &ViewState) -> Vec<Company> {
    let mut selected = select(rows, state);
    sort_rows(&mut selected, state.sort);
    trace!(
        "Processed {} of {} rows (search '{}', sort {:?})",
        selected.len(),
        rows.len(),
        state.search_term,
        state.sort
    );
    selected.into_iter().cloned().collect()
}

pub fn total_pages(count: usize, page_size: PageSize) -> usize {
    count.div_ceil(page_size.get()).max(1)
}

/// Rows of a 1-based page. Out-of-range pages are empty.
pub fn paginate<T>(rows: &[T], page: usize, page_size: PageSize) -> &[T] {
    let size = page_size.get();
    let start = page.saturating_sub(1).saturating_mul(size);
    if start >= rows.len() {
        return &[];
    }
    let end = std::cmp::min(start + size, rows.len());
    &rows[start..end]
}

pub fn pages<T>(rows: &[T], page_size: PageSize) -> Vec<&[T]> {
    rows.chunks(page_size.get()).collect()
}

/// Filter candidates for `field`, taken from the full data set so options
/// never disappear while other filters narrow the table.
pub fn unique_values(rows: &[Company], field: Field) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|c| c.value(field).into_owned())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Everything the table needs to render one state.
#[derive(Debug, Clone, Default)]
pub struct DerivedView {
    pub processed: Vec<Company>,
    pub page: usize,
    pub total_pages: usize,
    pub page_size: usize,
}

impl DerivedView {
    pub fn compute(rows: &[Company], state: &ViewState) -> Self {
        let processed = process(rows, state);
        let total_pages = total_pages(processed.len(), state.page_size);
        DerivedView {
            processed,
            page: state.page.clamp(1, total_pages),
            total_pages,
            page_size: state.page_size.get(),
        }
    }

    pub fn page_rows(&self) -> &[Company] {
        match PageSize::new(self.page_size) {
            Some(size) => paginate(&self.processed, self.page, size),
            None => &[],
        }
    }
}
