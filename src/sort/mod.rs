use std::cmp::Ordering;

use crate::dataset::{Row, SortColumn, SortDirection};

/// Literal cell value meaning "not applicable".
pub const NOT_APPLICABLE: &str = "n/a";

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SortKey {
    NotApplicable,
    Number(f64),
}

impl SortKey {
    pub fn from_value(value: &str) -> Self {
        if value == NOT_APPLICABLE {
            return Self::NotApplicable;
        }
        Self::Number(parse_number(value))
    }

    /// `NotApplicable` is below every number, including `-inf`; numbers use IEEE total order.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::NotApplicable, Self::NotApplicable) => Ordering::Equal,
            (Self::NotApplicable, Self::Number(_)) => Ordering::Less,
            (Self::Number(_), Self::NotApplicable) => Ordering::Greater,
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
        }
    }
}

fn parse_number(value: &str) -> f64 {
    value.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// The fixed set of named column renderers a column descriptor may refer to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Renderer {
    NaSortsLow,
    Numeric,
}

impl Renderer {
    pub const ALL: [Renderer; 2] = [Renderer::NaSortsLow, Renderer::Numeric];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "na_sorts_low" | "naSortsLow" => Some(Self::NaSortsLow),
            "numeric" => Some(Self::Numeric),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::NaSortsLow => "na_sorts_low",
            Self::Numeric => "numeric",
        }
    }

    /// Comma-separated config names, for error messages.
    pub fn known_names() -> String {
        Self::ALL.iter().map(|r| r.name()).collect::<Vec<_>>().join(", ")
    }

    /// Name of the function the page script defines for this renderer.
    pub fn js_function(self) -> &'static str {
        match self {
            Self::NaSortsLow => "naSortsLow",
            Self::Numeric => "numericSort",
        }
    }

    pub fn sort_key(self, value: &str) -> SortKey {
        match self {
            Self::NaSortsLow => SortKey::from_value(value),
            Self::Numeric => SortKey::Number(parse_number(value)),
        }
    }

    pub fn compare(self, a: &str, b: &str) -> Ordering {
        self.sort_key(a).total_cmp(&self.sort_key(b))
    }
}

pub fn compare_cells(renderer: Option<Renderer>, a: &str, b: &str) -> Ordering {
    match renderer {
        Some(r) => r.compare(a, b),
        None => a.cmp(b),
    }
}

/// Stable multi-column sort; `renderer_for` resolves a column index to its comparator.
pub fn sort_rows<F>(rows: &mut [Row], order: &[SortColumn], renderer_for: F)
where
    F: Fn(usize) -> Option<Renderer>,
{
    if order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for SortColumn(column, direction) in order {
            let left = a.get(*column).map(String::as_str).unwrap_or_default();
            let right = b.get(*column).map(String::as_str).unwrap_or_default();
            let ord = compare_cells(renderer_for(*column), left, right);
            let ord = match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}
