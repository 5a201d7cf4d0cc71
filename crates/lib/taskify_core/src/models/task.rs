//! Task domain models and listing parameters.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default page size for task listings.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest accepted page size; larger requests fall back to the default.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown task priority '{other}'")),
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task, owned by exactly one user. `user_id` never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
}

/// Partial update; `None` leaves the field untouched. There is deliberately no owner field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

/// Sortable task columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortField {
    Title,
    Status,
    Priority,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    /// Parse a sort field, falling back to `created_at` for anything unknown.
    pub fn parse_or_default(s: Option<&str>) -> Self {
        match s {
            Some("title") => Self::Title,
            Some("status") => Self::Status,
            Some("priority") => Self::Priority,
            Some("updated_at") => Self::UpdatedAt,
            _ => Self::CreatedAt,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Status => "status",
            Self::Priority => "priority",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Parse a sort order, falling back to `desc` for anything unknown.
    pub fn parse_or_default(s: Option<&str>) -> Self {
        match s {
            Some("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Raw listing parameters as received from a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskListParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Normalized listing query: every parameter that affects the result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskQuery {
    pub page: u32,
    pub page_size: u32,
    pub search: String,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Default for TaskQuery {
    fn default() -> Self {
        TaskListParams::default().into()
    }
}

impl From<TaskListParams> for TaskQuery {
    fn from(p: TaskListParams) -> Self {
        let page = p.page.filter(|&n| n >= 1).unwrap_or(1);
        let page_size = p
            .page_size
            .filter(|n| (1..=MAX_PAGE_SIZE).contains(n))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self {
            page,
            page_size,
            search: p.search.map(|s| s.trim().to_string()).unwrap_or_default(),
            status: p.status,
            priority: p.priority,
            sort_by: SortField::parse_or_default(p.sort_by.as_deref()),
            sort_order: SortOrder::parse_or_default(p.sort_order.as_deref()),
        }
    }
}

impl TaskQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

/// Storage-level filter: a `TaskQuery` scoped to an optional owner.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    /// `None` means all owners (admin view).
    pub owner: Option<Uuid>,
    pub query: TaskQuery,
}

/// Pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// One page of tasks plus pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPage {
    pub data: Vec<Task>,
    pub pagination: Pagination,
}

impl TaskPage {
    pub fn new(data: Vec<Task>, total: i64, query: &TaskQuery) -> Self {
        let size = i64::from(query.page_size);
        let total_pages = (total + size - 1) / size;
        let page = i64::from(query.page);
        Self {
            data,
            pagination: Pagination {
                page: query.page,
                page_size: query.page_size,
                total,
                total_pages,
                has_next: page < total_pages,
                has_prev: page > 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_defaults_match_listing_contract() {
        let q = TaskQuery::default();
        assert_eq!(q.page, 1);
        assert_eq!(q.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(q.sort_by, SortField::CreatedAt);
        assert_eq!(q.sort_order, SortOrder::Desc);
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn out_of_range_params_fall_back() {
        let q: TaskQuery = TaskListParams {
            page: Some(0),
            page_size: Some(500),
            sort_by: Some("password_hash".into()),
            sort_order: Some("sideways".into()),
            ..Default::default()
        }
        .into();
        assert_eq!(q.page, 1);
        assert_eq!(q.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(q.sort_by, SortField::CreatedAt);
        assert_eq!(q.sort_order, SortOrder::Desc);
    }

    #[test]
    fn page_metadata() {
        let q: TaskQuery = TaskListParams {
            page: Some(2),
            page_size: Some(5),
            ..Default::default()
        }
        .into();
        assert_eq!(q.offset(), 5);
        let page = TaskPage::new(vec![], 11, &q);
        assert_eq!(page.pagination.total_pages, 3);
        assert!(page.pagination.has_next);
        assert!(page.pagination.has_prev);
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in [TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Completed] {
            assert_eq!(s.as_str().parse::<TaskStatus>().unwrap(), s);
        }
        assert!("archived".parse::<TaskStatus>().is_err());
    }
}
