use serde::Serialize;
use serde_json::Value;

/// Comparison applied to a single field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Operator the builder does not understand. Forwarded untouched; the store decides.
    Other(String),
}

impl FilterOp {
    /// Maps a query-string operator key (`price[gte]=5`) to a comparison.
    pub fn from_key(key: &str) -> Self {
        match key {
            "gte" => FilterOp::Gte,
            "gt" => FilterOp::Gt,
            "lte" => FilterOp::Lte,
            "lt" => FilterOp::Lt,
            other => FilterOp::Other(other.to_string()),
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Other(op) => op,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Ne, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }
}

/// Which fields of each document are returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Projection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    pub fn apply(&self, doc: &mut serde_json::Map<String, Value>) {
        match self {
            Projection::Include(fields) => {
                doc.retain(|key, _| key == "id" || fields.iter().any(|f| f == key));
            }
            Projection::Exclude(fields) => {
                for field in fields {
                    doc.remove(field);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub skip: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page,
            limit,
            skip: u64::from(page.saturating_sub(1)) * u64::from(limit),
        }
    }
}

/// Filter, sort, projection and pagination for one list request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySpec {
    /// Always-on conditions of the collection (hidden entities), applied first.
    pub base: Vec<Condition>,
    pub filter: Vec<Condition>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub pagination: Pagination,
}

impl QuerySpec {
    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.base.iter().chain(self.filter.iter())
    }

    /// Predicate for `field`, looked up among the caller supplied conditions.
    pub fn condition_for(&self, field: &str) -> Option<&Condition> {
        self.filter.iter().find(|c| c.field == field)
    }
}
