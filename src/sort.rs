use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use std::cmp::Ordering;

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: [&str; 8] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%a %b %d %Y",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

/// Column and direction the view is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub column: usize,
    pub direction: SortDirection,
}

impl SortState {
    /// Activating the sorted column reverses it, any other column starts ascending.
    pub fn activate(current: Option<SortState>, column: usize) -> SortState {
        match current {
            Some(state) if state.column == column => SortState {
                column,
                direction: state.direction.toggled(),
            },
            _ => SortState {
                column,
                direction: SortDirection::Ascending,
            },
        }
    }
}

/// Parses a number after dropping currency signs and thousands separators.
/// The whole remaining text has to be a decimal number.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != '$' && *c != ',').collect();
    let cleaned = cleaned.trim();
    let valid = cleaned.chars().any(|c| c.is_ascii_digit())
        && cleaned
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if !valid {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

fn case_rank(c: char) -> u8 {
    if c.is_uppercase() { 1 } else { 0 }
}

/// Case insensitive order first, lower case before upper case on ties.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| a.chars().map(case_rank).cmp(b.chars().map(case_rank)))
        .then_with(|| a.cmp(b))
}

/// How the cells of one column compare. Decided once over all cells of the column,
/// so that every pair inside a sort uses the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Number,
    Date,
    Text,
}

impl ColumnKind {
    /// Numbers if every non empty cell is a number, dates if every one is a date, text otherwise.
    pub fn detect<'a>(cells: impl IntoIterator<Item = &'a str> + Clone) -> ColumnKind {
        let mut filled = cells
            .clone()
            .into_iter()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .peekable();
        if filled.peek().is_none() {
            return ColumnKind::Text;
        }
        if filled.all(|c| parse_number(c).is_some()) {
            return ColumnKind::Number;
        }
        let all_dates = cells
            .into_iter()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .all(|c| parse_date(c).is_some());
        if all_dates { ColumnKind::Date } else { ColumnKind::Text }
    }

    /// Ascending order of two cells of a column of this kind. Empty cells come first.
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        let a = a.trim();
        let b = b.trim();
        match self {
            ColumnKind::Number => cmp_parsed(a, b, parse_number, f64::total_cmp),
            ColumnKind::Date => cmp_parsed(a, b, parse_date, |x, y| x.cmp(y)),
            ColumnKind::Text => locale_cmp(a, b),
        }
    }
}

fn cmp_parsed<T>(
    a: &str,
    b: &str,
    parse: impl Fn(&str) -> Option<T>,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
    match (parse(a), parse(b)) {
        (Some(x), Some(y)) => cmp(&x, &y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => locale_cmp(a, b),
    }
}

/// Ascending order of two displayed cell texts: numeric, then chronological, then by string.
pub fn compare_cells(a: &str, b: &str) -> Ordering {
    ColumnKind::detect([a, b]).compare(a, b)
}
