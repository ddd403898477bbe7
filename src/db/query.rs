//! Equality filtering, ordering and pagination shared by every list endpoint.
//!
//! Each listable entity exposes a closed set of columns through the [`Column`]
//! trait. Requests name columns by string; names outside that set never reach
//! SQL. Ordering always ends on `updated_at` so that pages stay stable when the
//! primary sort column has duplicate values.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Default number of items returned per page.
pub const DEFAULT_LIMIT: i64 = 10;

/// Maximum number of items a single page may hold.
pub const MAX_LIMIT: i64 = 100;

/// Query keys with a fixed meaning; every other key is a filter.
pub const RESERVED_PARAMS: &[&str] = &["sort", "direction", "skip", "limit"];

/// How a raw filter value is parsed for a column.
#[derive(Debug, Clone, Copy)]
pub enum ColumnKind {
    Uuid,
    Text,
    Integer,
    Timestamp,
    /// Text restricted to a fixed set of labels
    Enum(&'static [&'static str]),
}

/// A filterable and sortable column of a listable entity.
pub trait Column: Copy + Eq + std::fmt::Debug + Send + Sync + 'static {
    /// Every column that may appear in a filter or sort request.
    const ALL: &'static [Self];

    /// The column used as the default sort and as the final tiebreaker.
    const UPDATED_AT: Self;

    fn name(self) -> &'static str;

    fn kind(self) -> ColumnKind;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|column| column.name() == name)
    }
}

/// A typed column value, used both for bound filter parameters and for
/// ordering records held in memory.
///
/// `Null` is the last variant so that it sorts after every other value, as
/// Postgres does for ascending order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    Integer(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Null,
}

impl Value {
    pub fn parse(kind: ColumnKind, raw: &str) -> std::result::Result<Self, String> {
        match kind {
            ColumnKind::Uuid => raw
                .parse::<Uuid>()
                .map(Value::Uuid)
                .map_err(|e| e.to_string()),
            ColumnKind::Text => Ok(Value::Text(raw.to_string())),
            ColumnKind::Integer => raw
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| e.to_string()),
            ColumnKind::Timestamp => DateTime::parse_from_rfc3339(raw)
                .map(|t| Value::Timestamp(t.with_timezone(&Utc)))
                .map_err(|e| e.to_string()),
            ColumnKind::Enum(labels) => {
                if labels.contains(&raw) {
                    Ok(Value::Text(raw.to_string()))
                } else {
                    Err(format!("expected one of {}", labels.join(", ")))
                }
            }
        }
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Value::Uuid(id)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(at: DateTime<Utc>) -> Self {
        Value::Timestamp(at)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter<C> {
    pub column: C,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl Direction {
    /// Only the exact string `asc` sorts ascending; anything else is `desc`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("asc") => Direction::Asc,
            _ => Direction::Desc,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

/// A single-column sort request. `Sort::default()` is `updated_at desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<C> {
    column: C,
    direction: Direction,
}

impl<C: Column> Default for Sort<C> {
    fn default() -> Self {
        Self {
            column: C::UPDATED_AT,
            direction: Direction::Desc,
        }
    }
}

impl<C: Column> Sort<C> {
    pub fn new(column: C, direction: Direction) -> Self {
        Self { column, direction }
    }

    /// Resolves an untrusted sort request. Unknown or missing fields fall back
    /// to `updated_at`; unknown directions fall back to `desc`.
    pub fn parse(field: Option<&str>, direction: Option<&str>) -> Self {
        let column = field
            .and_then(C::from_name)
            .unwrap_or(C::UPDATED_AT);
        Self::new(column, Direction::parse(direction))
    }

    /// The effective ordering terms, including the `updated_at desc`
    /// tiebreaker when the primary column is something else.
    pub fn terms(&self) -> Vec<(C, Direction)> {
        if self.column == C::UPDATED_AT {
            vec![(self.column, self.direction)]
        } else {
            vec![(self.column, self.direction), (C::UPDATED_AT, Direction::Desc)]
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    skip: i64,
    limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    /// Negative skips become 0 and the limit is clamped to `1..=MAX_LIMIT`.
    pub fn new(skip: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            skip: skip.unwrap_or(0).max(0),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    #[inline]
    pub fn skip(&self) -> i64 {
        self.skip
    }

    #[inline]
    pub fn limit(&self) -> i64 {
        self.limit
    }
}

/// One page of an ordered record set.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_count: i64,
    pub skip: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total_count: self.total_count,
            skip: self.skip,
            limit: self.limit,
        }
    }
}

/// Filters, sort and pagination for one list request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery<C> {
    pub filters: Vec<Filter<C>>,
    pub sort: Sort<C>,
    pub pagination: Pagination,
}

impl<C: Column> Default for ListQuery<C> {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: Sort::default(),
            pagination: Pagination::default(),
        }
    }
}

impl<C: Column> ListQuery<C> {
    /// Builds a query from raw request parameters.
    ///
    /// `sort`, `direction`, `skip` and `limit` are reserved; every other key
    /// must name a column of the entity and becomes an equality filter.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let mut filters = Vec::new();
        for (key, raw) in params {
            if RESERVED_PARAMS.contains(&key.as_str()) {
                continue;
            }
            let column = C::from_name(key).ok_or_else(|| AppError::InvalidParameter {
                name: key.clone(),
                message: "unknown filter field".to_string(),
            })?;
            let value = Value::parse(column.kind(), raw).map_err(|message| {
                AppError::InvalidParameter {
                    name: key.clone(),
                    message,
                }
            })?;
            filters.push(Filter { column, value });
        }
        // HashMap iteration order is random; keep generated SQL deterministic
        filters.sort_by_key(|f| f.column.name());

        let sort = Sort::parse(
            params.get("sort").map(String::as_str),
            params.get("direction").map(String::as_str),
        );

        let skip = parse_number(params, "skip")?;
        let limit = parse_number(params, "limit")?;

        Ok(Self {
            filters,
            sort,
            pagination: Pagination::new(skip, limit),
        })
    }

    /// Restricts the base set, e.g. to the records of one owner.
    pub fn scoped(mut self, column: C, value: impl Into<Value>) -> Self {
        self.filters.retain(|f| f.column != column);
        self.filters.insert(
            0,
            Filter {
                column,
                value: value.into(),
            },
        );
        self
    }

    /// Appends ` AND column = $n` for every filter. The builder must already
    /// hold a `WHERE` clause.
    pub fn push_filters(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        for filter in &self.filters {
            builder.push(" AND ").push(filter.column.name());
            match &filter.value {
                Value::Null => {
                    builder.push(" IS NULL");
                }
                Value::Integer(v) => {
                    builder.push(" = ").push_bind(*v);
                }
                Value::Text(v) => {
                    builder.push(" = ").push_bind(v.clone());
                }
                Value::Timestamp(v) => {
                    builder.push(" = ").push_bind(*v);
                }
                Value::Uuid(v) => {
                    builder.push(" = ").push_bind(*v);
                }
            }
        }
    }

    /// Appends `ORDER BY ... LIMIT ... OFFSET ...`.
    pub fn push_order_and_page(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" ORDER BY ");
        for (i, (column, direction)) in self.sort.terms().into_iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push(column.name()).push(" ").push(direction.sql());
        }
        builder
            .push(" LIMIT ")
            .push_bind(self.pagination.limit())
            .push(" OFFSET ")
            .push_bind(self.pagination.skip());
    }

    pub fn matches<R: Record<C>>(&self, record: &R) -> bool {
        self.filters
            .iter()
            .all(|f| record.value(f.column) == f.value)
    }

    pub fn compare<R: Record<C>>(&self, a: &R, b: &R) -> Ordering {
        self.sort
            .terms()
            .into_iter()
            .map(|(column, direction)| direction.apply(a.value(column).cmp(&b.value(column))))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Filters, orders and paginates records already held in memory, with the
    /// same semantics as the generated SQL.
    pub fn apply<R: Record<C> + Clone>(&self, records: impl IntoIterator<Item = R>) -> Page<R> {
        let mut matching: Vec<R> = records.into_iter().filter(|r| self.matches(r)).collect();
        matching.sort_by(|a, b| self.compare(a, b));
        let total_count = matching.len() as i64;
        let data = matching
            .into_iter()
            .skip(self.pagination.skip() as usize)
            .take(self.pagination.limit() as usize)
            .collect();
        Page {
            data,
            total_count,
            skip: self.pagination.skip(),
            limit: self.pagination.limit(),
        }
    }
}

/// Access to column values of a record for in-memory filtering and ordering.
pub trait Record<C: Column> {
    fn value(&self, column: C) -> Value;
}

fn parse_number(params: &HashMap<String, String>, key: &str) -> Result<Option<i64>> {
    params
        .get(key)
        .map(|raw| {
            raw.trim().parse::<i64>().map_err(|e| AppError::InvalidParameter {
                name: key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum ItemColumn {
        Id,
        Name,
        State,
        Rank,
        UpdatedAt,
    }

    impl Column for ItemColumn {
        const ALL: &'static [Self] = &[
            ItemColumn::Id,
            ItemColumn::Name,
            ItemColumn::State,
            ItemColumn::Rank,
            ItemColumn::UpdatedAt,
        ];
        const UPDATED_AT: Self = ItemColumn::UpdatedAt;

        fn name(self) -> &'static str {
            match self {
                ItemColumn::Id => "id",
                ItemColumn::Name => "name",
                ItemColumn::State => "state",
                ItemColumn::Rank => "rank",
                ItemColumn::UpdatedAt => "updated_at",
            }
        }

        fn kind(self) -> ColumnKind {
            match self {
                ItemColumn::Id => ColumnKind::Uuid,
                ItemColumn::Name => ColumnKind::Text,
                ItemColumn::State => ColumnKind::Enum(&["inactive", "active"]),
                ItemColumn::Rank => ColumnKind::Integer,
                ItemColumn::UpdatedAt => ColumnKind::Timestamp,
            }
        }
    }

    #[derive(Debug, Clone)]
    struct Item {
        id: Uuid,
        name: &'static str,
        state: &'static str,
        rank: i64,
        updated_at: DateTime<Utc>,
    }

    impl Record<ItemColumn> for Item {
        fn value(&self, column: ItemColumn) -> Value {
            match column {
                ItemColumn::Id => self.id.into(),
                ItemColumn::Name => self.name.into(),
                ItemColumn::State => self.state.into(),
                ItemColumn::Rank => Value::Integer(self.rank),
                ItemColumn::UpdatedAt => self.updated_at.into(),
            }
        }
    }

    fn items() -> Vec<Item> {
        let base = Utc::now();
        vec![
            Item {
                id: Uuid::new_v4(),
                name: "beta",
                state: "active",
                rank: 2,
                updated_at: base - Duration::minutes(3),
            },
            Item {
                id: Uuid::new_v4(),
                name: "alpha",
                state: "inactive",
                rank: 1,
                updated_at: base - Duration::minutes(1),
            },
            Item {
                id: Uuid::new_v4(),
                name: "beta",
                state: "active",
                rank: 3,
                updated_at: base,
            },
            Item {
                id: Uuid::new_v4(),
                name: "gamma",
                state: "active",
                rank: 4,
                updated_at: base - Duration::minutes(2),
            },
        ]
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn ranks(page: &Page<Item>) -> Vec<i64> {
        page.data.iter().map(|i| i.rank).collect()
    }

    #[test]
    fn test_default_sort_is_updated_at_desc() {
        let sort = Sort::<ItemColumn>::default();
        assert_eq!(sort.terms(), vec![(ItemColumn::UpdatedAt, Direction::Desc)]);
    }

    #[test]
    fn test_unknown_sort_falls_back_to_default() {
        let fallback = Sort::<ItemColumn>::parse(Some("nonexistent"), Some("bogus"));
        assert_eq!(fallback, Sort::default());

        let query = ListQuery::<ItemColumn>::from_params(&params(&[
            ("sort", "nonexistent"),
            ("direction", "bogus"),
        ]))
        .unwrap();
        let default_query = ListQuery::<ItemColumn>::default();
        assert_eq!(ranks(&query.apply(items())), ranks(&default_query.apply(items())));
        assert_eq!(ranks(&default_query.apply(items())), vec![3, 1, 4, 2]);
    }

    #[test]
    fn test_updated_at_direction_is_respected() {
        let query = ListQuery::<ItemColumn> {
            sort: Sort::parse(Some("updated_at"), Some("asc")),
            ..Default::default()
        };
        assert_eq!(query.sort.terms(), vec![(ItemColumn::UpdatedAt, Direction::Asc)]);
        assert_eq!(ranks(&query.apply(items())), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_direction_must_be_exactly_asc() {
        assert_eq!(Direction::parse(Some("asc")), Direction::Asc);
        for raw in ["ASC", "Asc", " asc ", "asc\n", "desc", ""] {
            assert_eq!(Direction::parse(Some(raw)), Direction::Desc, "{raw:?}");
        }
        assert_eq!(Direction::parse(None), Direction::Desc);

        // Sort fields are matched exactly as well
        let sort = Sort::<ItemColumn>::parse(Some(" name"), Some("asc"));
        assert_eq!(sort.terms(), vec![(ItemColumn::UpdatedAt, Direction::Asc)]);
    }

    #[test]
    fn test_ties_broken_by_updated_at_desc() {
        let query = ListQuery::<ItemColumn> {
            sort: Sort::parse(Some("name"), Some("asc")),
            ..Default::default()
        };
        assert_eq!(
            query.sort.terms(),
            vec![
                (ItemColumn::Name, Direction::Asc),
                (ItemColumn::UpdatedAt, Direction::Desc)
            ]
        );
        // Both "beta" rows: the more recently updated one (rank 3) comes first
        assert_eq!(ranks(&query.apply(items())), vec![1, 3, 2, 4]);

        let descending = ListQuery::<ItemColumn> {
            sort: Sort::parse(Some("name"), Some("desc")),
            ..Default::default()
        };
        assert_eq!(ranks(&descending.apply(items())), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_filters_are_combined_with_and() {
        let query =
            ListQuery::<ItemColumn>::from_params(&params(&[("state", "active"), ("name", "beta")]))
                .unwrap();
        assert_eq!(query.filters.len(), 2);
        assert_eq!(ranks(&query.apply(items())), vec![3, 2]);
    }

    #[test]
    fn test_empty_filter_returns_everything() {
        let query = ListQuery::<ItemColumn>::from_params(&HashMap::new()).unwrap();
        assert!(query.filters.is_empty());
        assert_eq!(query.apply(items()).total_count, 4);
    }

    #[test]
    fn test_unknown_filter_field_rejected() {
        let err = ListQuery::<ItemColumn>::from_params(&params(&[("deleted_at", "x")])).unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter { ref name, .. } if name == "deleted_at"));
    }

    #[test]
    fn test_filter_values_parsed_by_kind() {
        assert!(ListQuery::<ItemColumn>::from_params(&params(&[("id", "not-a-uuid")])).is_err());
        assert!(ListQuery::<ItemColumn>::from_params(&params(&[("rank", "x")])).is_err());
        assert!(ListQuery::<ItemColumn>::from_params(&params(&[("state", "deleted")])).is_err());
        assert!(ListQuery::<ItemColumn>::from_params(&params(&[("updated_at", "yesterday")])).is_err());
        assert!(ListQuery::<ItemColumn>::from_params(&params(&[(
            "updated_at",
            "2025-06-18T07:19:58Z"
        )]))
        .is_ok());
    }

    #[test]
    fn test_pagination_clamping() {
        let p = Pagination::new(Some(-4), Some(0));
        assert_eq!((p.skip(), p.limit()), (0, 1));
        let p = Pagination::new(None, Some(1000));
        assert_eq!(p.limit(), MAX_LIMIT);
        let p = Pagination::new(None, None);
        assert_eq!((p.skip(), p.limit()), (0, DEFAULT_LIMIT));

        assert!(ListQuery::<ItemColumn>::from_params(&params(&[("limit", "ten")])).is_err());
    }

    #[test]
    fn test_page_window() {
        let query = ListQuery::<ItemColumn> {
            pagination: Pagination::new(Some(1), Some(2)),
            ..Default::default()
        };
        let page = query.apply(items());
        assert_eq!(page.total_count, 4);
        assert_eq!(ranks(&page), vec![1, 4]);
    }

    #[test]
    fn test_scoped_replaces_client_supplied_filter() {
        let owner = Uuid::new_v4();
        let query = ListQuery::<ItemColumn>::from_params(&params(&[(
            "id",
            &Uuid::new_v4().to_string(),
        )]))
        .unwrap()
        .scoped(ItemColumn::Id, owner);
        assert_eq!(
            query.filters,
            vec![Filter {
                column: ItemColumn::Id,
                value: Value::Uuid(owner)
            }]
        );
    }

    #[test]
    fn test_generated_sql() {
        let query = ListQuery::<ItemColumn>::from_params(&params(&[
            ("state", "active"),
            ("sort", "name"),
            ("direction", "asc"),
        ]))
        .unwrap();
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM items WHERE deleted_at IS NULL");
        query.push_filters(&mut builder);
        query.push_order_and_page(&mut builder);
        assert_eq!(
            builder.sql(),
            "SELECT * FROM items WHERE deleted_at IS NULL AND state = $1 \
             ORDER BY name ASC, updated_at DESC LIMIT $2 OFFSET $3"
        );
    }

    #[test]
    fn test_nulls_sort_last_ascending() {
        assert!(Value::Null > Value::Text("zzz".to_string()));
        assert!(Value::from(None::<Uuid>) == Value::Null);
    }
}
