//! Multi-row query requests.

use crate::error::{StoreError, StoreResult};
use std::fmt;

/// A predicate plus an optional limit/offset window.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query {
    predicate: String,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl Query {
    /// Creates an unwindowed query.
    pub fn new(predicate: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            limit: None,
            offset: None,
        }
    }

    /// Builds a query from positional parts: `[predicate]`,
    /// `[predicate, limit]` or `[predicate, limit, offset]`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidQuery`] for any other number of parts or
    /// when limit/offset are not non-negative integers.
    pub fn from_parts<S: AsRef<str>>(parts: &[S]) -> StoreResult<Self> {
        match parts {
            [predicate] => Ok(Self::new(predicate.as_ref())),
            [predicate, limit] => {
                Ok(Self::new(predicate.as_ref()).with_limit(parse_count("limit", limit)?))
            }
            [predicate, limit, offset] => Ok(Self::new(predicate.as_ref())
                .with_limit(parse_count("limit", limit)?)
                .with_offset(parse_count("offset", offset)?)),
            _ => Err(StoreError::invalid_query(format!(
                "expected 1 to 3 query parts, got {}",
                parts.len()
            ))),
        }
    }

    /// Sets the maximum number of rows returned.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the number of leading rows skipped.
    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns the predicate text.
    #[must_use]
    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    /// Returns the limit, if any.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns the offset, if any.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    /// Applies offset then limit to an ordered result set.
    pub fn window<T>(&self, rows: Vec<T>) -> Vec<T> {
        let skip = self.offset.unwrap_or(0);
        let take = self.limit.unwrap_or(usize::MAX);
        rows.into_iter().skip(skip).take(take).collect()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.predicate)?;
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}

fn parse_count(what: &str, raw: impl AsRef<str>) -> StoreResult<usize> {
    let raw = raw.as_ref();
    raw.trim().parse().map_err(|_| {
        StoreError::invalid_query(format!("{what} must be a non-negative integer, got {raw:?}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_map_to_window() {
        let q = Query::from_parts(&["name = 'Franco'"]).unwrap();
        assert_eq!(q.limit(), None);
        assert_eq!(q.offset(), None);

        let q = Query::from_parts(&["name = 'Franco'", "1"]).unwrap();
        assert_eq!(q.limit(), Some(1));

        let q = Query::from_parts(&["name = 'Franco'", "1", " 2 "]).unwrap();
        assert_eq!(q.limit(), Some(1));
        assert_eq!(q.offset(), Some(2));
        assert_eq!(q.to_string(), "name = 'Franco' LIMIT 1 OFFSET 2");
    }

    #[test]
    fn wrong_part_count_is_invalid() {
        let none: [&str; 0] = [];
        assert!(Query::from_parts(&none).is_err());
        assert!(Query::from_parts(&["a", "1", "2", "3"]).is_err());
    }

    #[test]
    fn non_numeric_window_is_invalid() {
        let err = Query::from_parts(&["a", "ten"]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery { .. }));
        assert!(Query::from_parts(&["a", "1", "-1"]).is_err());
    }

    #[test]
    fn window_skips_then_takes() {
        let rows = vec![1, 2, 3, 4, 5];
        assert_eq!(Query::new("").window(rows.clone()), rows);
        assert_eq!(Query::new("").with_limit(2).window(rows.clone()), vec![1, 2]);
        assert_eq!(
            Query::new("").with_limit(2).with_offset(3).window(rows.clone()),
            vec![4, 5]
        );
        assert!(Query::new("").with_offset(9).window(rows).is_empty());
    }
}
