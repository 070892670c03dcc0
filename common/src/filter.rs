//! Filter expressions for range queries.
//!
//! A [`Filter`] combines comparison conditions on row properties with logical
//! `and`/`or`. Filters render to the table-service query syntax, e.g.
//!
//! ```text
//! ((RowKey gt '2517...') and (RowKey lt '2517...')) and (PartitionKey eq 'orders')
//! ```
//!
//! and can be evaluated directly against a [`TableRow`], which is what the
//! bundled stores do. Comparisons are ordinal string comparisons.

use std::fmt;

use crate::entity::{PARTITION_KEY, ROW_KEY, TableRow};

/// Comparison operator of a filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Comparison {
    fn keyword(&self) -> &'static str {
        match self {
            Comparison::Equal => "eq",
            Comparison::NotEqual => "ne",
            Comparison::LessThan => "lt",
            Comparison::LessThanOrEqual => "le",
            Comparison::GreaterThan => "gt",
            Comparison::GreaterThanOrEqual => "ge",
        }
    }

    fn holds(&self, lhs: &str, rhs: &str) -> bool {
        match self {
            Comparison::Equal => lhs == rhs,
            Comparison::NotEqual => lhs != rhs,
            Comparison::LessThan => lhs < rhs,
            Comparison::LessThanOrEqual => lhs <= rhs,
            Comparison::GreaterThan => lhs > rhs,
            Comparison::GreaterThanOrEqual => lhs >= rhs,
        }
    }
}

/// A filter over table rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Condition {
        property: String,
        op: Comparison,
        value: String,
    },
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
}

impl Filter {
    /// Creates a condition on an arbitrary string property.
    pub fn condition(property: impl Into<String>, op: Comparison, value: impl Into<String>) -> Self {
        Filter::Condition {
            property: property.into(),
            op,
            value: value.into(),
        }
    }

    /// Creates a condition on the partition key.
    pub fn partition_key(op: Comparison, value: impl Into<String>) -> Self {
        Self::condition(PARTITION_KEY, op, value)
    }

    /// Creates a condition on the row key.
    pub fn row_key(op: Comparison, value: impl Into<String>) -> Self {
        Self::condition(ROW_KEY, op, value)
    }

    /// Combines two filters with a logical AND.
    pub fn and(self, other: Filter) -> Self {
        Filter::And(Box::new(self), Box::new(other))
    }

    /// Combines two filters with a logical OR.
    pub fn or(self, other: Filter) -> Self {
        Filter::Or(Box::new(self), Box::new(other))
    }

    /// Evaluates the filter against a row.
    ///
    /// A condition on a property the row does not carry (or that is not a
    /// string column) never matches.
    pub fn matches(&self, row: &TableRow) -> bool {
        match self {
            Filter::Condition {
                property,
                op,
                value,
            } => row
                .filter_value(property)
                .is_some_and(|actual| op.holds(actual, value)),
            Filter::And(lhs, rhs) => lhs.matches(row) && rhs.matches(row),
            Filter::Or(lhs, rhs) => lhs.matches(row) || rhs.matches(row),
        }
    }

    /// Returns the partition key this filter is pinned to, if any.
    ///
    /// A filter is pinned when every row it can match must carry the same
    /// partition key, i.e. an equality on `PartitionKey` reachable through
    /// `and` nodes only. Stores use this to narrow scans to one partition.
    pub fn pinned_partition_key(&self) -> Option<&str> {
        match self {
            Filter::Condition {
                property,
                op: Comparison::Equal,
                value,
            } if property == PARTITION_KEY => Some(value),
            Filter::Condition { .. } => None,
            Filter::And(lhs, rhs) => lhs
                .pinned_partition_key()
                .or_else(|| rhs.pinned_partition_key()),
            Filter::Or(_, _) => None,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Condition {
                property,
                op,
                value,
            } => write!(
                f,
                "{} {} '{}'",
                property,
                op.keyword(),
                value.replace('\'', "''")
            ),
            Filter::And(lhs, rhs) => write!(f, "({}) and ({})", lhs, rhs),
            Filter::Or(lhs, rhs) => write!(f, "({}) or ({})", lhs, rhs),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rstest::rstest;

    use super::*;
    use crate::entity::EntityProperty;

    fn row(pk: &str, rk: &str) -> TableRow {
        TableRow::new(pk, rk, Utc::now())
    }

    #[test]
    fn should_render_combined_filter() {
        // given
        let filter = Filter::row_key(Comparison::GreaterThan, "100")
            .and(Filter::row_key(Comparison::LessThan, "200"))
            .and(Filter::partition_key(Comparison::Equal, "orders"));

        // when
        let rendered = filter.to_string();

        // then
        assert_eq!(
            rendered,
            "((RowKey gt '100') and (RowKey lt '200')) and (PartitionKey eq 'orders')"
        );
    }

    #[test]
    fn should_escape_single_quotes() {
        let filter = Filter::partition_key(Comparison::Equal, "o'brien");
        assert_eq!(filter.to_string(), "PartitionKey eq 'o''brien'");
    }

    #[rstest]
    #[case(Comparison::Equal, "150", true)]
    #[case(Comparison::NotEqual, "150", false)]
    #[case(Comparison::LessThan, "151", true)]
    #[case(Comparison::LessThan, "150", false)]
    #[case(Comparison::LessThanOrEqual, "150", true)]
    #[case(Comparison::GreaterThan, "149", true)]
    #[case(Comparison::GreaterThanOrEqual, "151", false)]
    fn should_compare_row_keys_ordinally(
        #[case] op: Comparison,
        #[case] operand: &str,
        #[case] expected: bool,
    ) {
        let filter = Filter::row_key(op, operand);
        assert_eq!(filter.matches(&row("pk", "150")), expected);
    }

    #[test]
    fn should_evaluate_and_or() {
        // given
        let in_range = Filter::row_key(Comparison::GreaterThan, "100")
            .and(Filter::row_key(Comparison::LessThan, "200"));
        let either = Filter::partition_key(Comparison::Equal, "a")
            .or(Filter::partition_key(Comparison::Equal, "b"));

        // when/then
        assert!(in_range.matches(&row("pk", "150")));
        assert!(!in_range.matches(&row("pk", "250")));
        assert!(either.matches(&row("b", "1")));
        assert!(!either.matches(&row("c", "1")));
    }

    #[test]
    fn should_match_string_columns_only() {
        // given
        let r = row("pk", "rk")
            .with_property("level", EntityProperty::String("warn".into()))
            .with_property("code", EntityProperty::Int32(3));

        // when/then
        assert!(Filter::condition("level", Comparison::Equal, "warn").matches(&r));
        assert!(!Filter::condition("code", Comparison::Equal, "3").matches(&r));
        assert!(!Filter::condition("missing", Comparison::NotEqual, "x").matches(&r));
    }

    #[test]
    fn should_find_pinned_partition_key_through_and() {
        // given
        let pinned = Filter::row_key(Comparison::GreaterThan, "1")
            .and(Filter::partition_key(Comparison::Equal, "orders"));
        let unpinned = Filter::partition_key(Comparison::Equal, "a")
            .or(Filter::partition_key(Comparison::Equal, "b"));

        // when/then
        assert_eq!(pinned.pinned_partition_key(), Some("orders"));
        assert_eq!(unpinned.pinned_partition_key(), None);
        assert_eq!(
            Filter::partition_key(Comparison::GreaterThan, "a").pinned_partition_key(),
            None
        );
    }
}
