use std::collections::HashSet;

/// Immutable set of allowed names for one filter kind.
///
/// Matching is exact and case-sensitive. An empty snapshot matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSnapshot {
    names: HashSet<String>,
}

impl FilterSnapshot {
    /// Parse a comma-separated list.
    ///
    /// Tokens are taken verbatim: surrounding whitespace is part of the name.
    /// Empty tokens (`"a,,b"`, leading or trailing commas) are dropped.
    pub fn parse(csv: &str) -> Self {
        Self {
            names: tokens(csv).map(str::to_string).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in sorted order, for diagnostics.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Non-empty comma-separated tokens of `csv`.
pub(crate) fn tokens(csv: &str) -> impl Iterator<Item = &str> {
    csv.split(',').filter(|t| !t.is_empty())
}
