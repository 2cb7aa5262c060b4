//! Row filters and ordering, in PostgREST-style `column=eq.value` syntax.

use crate::bookmark::{Bookmark, BookmarkId};
use crate::error::{ProtocolError, ProtocolResult};
use crate::identity::UserId;
use std::fmt;

/// Filterable bookmark columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// `owner`
    Owner,
    /// `id`
    Id,
}

impl Column {
    /// Returns the column name.
    pub fn name(&self) -> &'static str {
        match self {
            Column::Owner => "owner",
            Column::Id => "id",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "owner" => Some(Column::Owner),
            "id" => Some(Column::Id),
            _ => None,
        }
    }
}

/// Equality filter on a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Rows owned by the given user.
    OwnerEq(UserId),
    /// The row with the given id.
    IdEq(BookmarkId),
}

impl Filter {
    /// Filter for rows owned by `owner`.
    pub fn owner(owner: UserId) -> Self {
        Filter::OwnerEq(owner)
    }

    /// Filter for the row with `id`.
    pub fn id(id: BookmarkId) -> Self {
        Filter::IdEq(id)
    }

    /// Returns the filtered column.
    pub fn column(&self) -> Column {
        match self {
            Filter::OwnerEq(_) => Column::Owner,
            Filter::IdEq(_) => Column::Id,
        }
    }

    /// Returns the right-hand side as a query parameter value (`eq.<value>`).
    pub fn query_value(&self) -> String {
        match self {
            Filter::OwnerEq(owner) => format!("eq.{owner}"),
            Filter::IdEq(id) => format!("eq.{id}"),
        }
    }

    /// Returns true if the record passes the filter.
    pub fn matches(&self, record: &Bookmark) -> bool {
        match self {
            Filter::OwnerEq(owner) => record.owner == *owner,
            Filter::IdEq(id) => record.id == *id,
        }
    }

    /// Builds a filter from a query parameter pair (`owner`, `eq.<uuid>`).
    pub fn from_query(column: &str, value: &str) -> ProtocolResult<Self> {
        let column = Column::from_name(column)
            .ok_or_else(|| ProtocolError::InvalidFilter(format!("{column}={value}")))?;
        let operand = value
            .strip_prefix("eq.")
            .ok_or_else(|| ProtocolError::InvalidFilter(format!("{}={value}", column.name())))?;

        match column {
            Column::Owner => Ok(Filter::OwnerEq(operand.parse()?)),
            Column::Id => Ok(Filter::IdEq(operand.parse()?)),
        }
    }

    /// Parses `column=eq.value`.
    pub fn parse(expr: &str) -> ProtocolResult<Self> {
        let (column, value) = expr
            .split_once('=')
            .ok_or_else(|| ProtocolError::InvalidFilter(expr.to_string()))?;
        Self::from_query(column, value)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.column().name(), self.query_value())
    }
}

/// Result ordering on `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Newest first.
    #[default]
    CreatedAtDesc,
    /// Oldest first.
    CreatedAtAsc,
}

impl Order {
    /// Returns the query parameter value.
    pub fn query_value(&self) -> &'static str {
        match self {
            Order::CreatedAtDesc => "created_at.desc",
            Order::CreatedAtAsc => "created_at.asc",
        }
    }

    /// Parses a query parameter value.
    pub fn parse(value: &str) -> ProtocolResult<Self> {
        match value {
            "created_at.desc" => Ok(Order::CreatedAtDesc),
            "created_at.asc" => Ok(Order::CreatedAtAsc),
            other => Err(ProtocolError::InvalidOrder(other.to_string())),
        }
    }

    /// Sorts rows in place.
    pub fn sort(&self, rows: &mut [Bookmark]) {
        rows.sort_by_key(Bookmark::newest_first_key);
        if *self == Order::CreatedAtAsc {
            rows.reverse();
        }
    }
}
