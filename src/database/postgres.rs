use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::{Query, QueryScalar};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::{DatabaseManager, DOCUMENTS_TABLE};
use crate::database::models::Collection;
use crate::database::query::typed_conditions;
use crate::database::store::{Document, Store, StoreError};
use crate::filter::filter_order::FilterOrder;
use crate::filter::{Condition, FilterOp, QuerySpec};

/// Positional parameter for generated SQL.
#[derive(Debug, Clone, PartialEq)]
enum SqlParam {
    Text(String),
    Json(Value),
    Int(i64),
    Uuid(Uuid),
}

/// Accumulates `$n` parameters while a statement is assembled.
#[derive(Debug, Default)]
struct SqlParams {
    params: Vec<SqlParam>,
}

impl SqlParams {
    fn push(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    /// `data -> $n` for a document field.
    fn field(&mut self, name: &str) -> String {
        format!("(data -> {}::text)", self.push(SqlParam::Text(name.to_string())))
    }

    fn json(&mut self, value: &Value) -> String {
        format!("{}::jsonb", self.push(SqlParam::Json(value.clone())))
    }
}

/// Renders typed conditions as a conjunction of JSONB predicates.
fn where_clause(conditions: &[Condition], params: &mut SqlParams) -> Result<Vec<String>, StoreError> {
    conditions
        .iter()
        .map(|condition| {
            let field = params.field(&condition.field);
            let value = params.json(&condition.value);
            let equals = format!(
                "({field} = {value} OR (jsonb_typeof({field}) = 'array' AND {field} @> jsonb_build_array({value})))"
            );
            Ok(match &condition.op {
                FilterOp::Eq => equals,
                FilterOp::Ne => format!("({field} IS NULL OR NOT {equals})"),
                FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => format!(
                    "(jsonb_typeof({field}) = jsonb_typeof({value}) AND {field} {} {value})",
                    condition.op.symbol()
                ),
                FilterOp::Other(op) => {
                    return Err(StoreError::UnsupportedOperator {
                        field: condition.field.clone(),
                        op: op.clone(),
                    })
                }
            })
        })
        .collect()
}

fn bind_query<'q>(mut q: Query<'q, Postgres, PgArguments>, params: &'q [SqlParam]) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        q = match p {
            SqlParam::Text(s) => q.bind(s.as_str()),
            SqlParam::Json(v) => q.bind(v),
            SqlParam::Int(i) => q.bind(*i),
            SqlParam::Uuid(id) => q.bind(*id),
        };
    }
    q
}

fn bind_scalar<'q>(
    mut q: QueryScalar<'q, Postgres, Value, PgArguments>,
    params: &'q [SqlParam],
) -> QueryScalar<'q, Postgres, Value, PgArguments> {
    for p in params {
        q = match p {
            SqlParam::Text(s) => q.bind(s.as_str()),
            SqlParam::Json(v) => q.bind(v),
            SqlParam::Int(i) => q.bind(*i),
            SqlParam::Uuid(id) => q.bind(*id),
        };
    }
    q
}

fn into_document(value: Value) -> Result<Document, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Backend(format!("stored document is not an object: {}", other))),
    }
}

/// PostgreSQL adapter storing each document as a JSONB row of the `documents` table.
pub struct PgStore {
    pool: PgPool,
    log_queries: bool,
}

impl PgStore {
    pub fn new(pool: PgPool, log_queries: bool) -> Self {
        Self { pool, log_queries }
    }

    fn parse_id(collection: &Collection, id: &str) -> Result<Uuid, StoreError> {
        let cast = || StoreError::Cast { field: "id".to_string(), value: id.to_string() };
        typed_conditions(collection, &[Condition::eq("id", id)])?;
        Uuid::parse_str(id).map_err(|_| cast())
    }

    /// `collection = $1 AND id = $2 AND <base filter>`
    fn by_id(collection: &Collection, id: Uuid, params: &mut SqlParams) -> Result<String, StoreError> {
        let name = params.push(SqlParam::Text(collection.name.to_string()));
        let id = params.push(SqlParam::Uuid(id));
        let base = typed_conditions(collection, &collection.base_filter)?;
        let mut clauses = vec![format!("collection = {name}"), format!("id = {id}")];
        clauses.extend(where_clause(&base, params)?);
        Ok(clauses.join(" AND "))
    }

    fn select_sql(collection: &Collection, conditions: &[Condition], params: &mut SqlParams) -> Result<String, StoreError> {
        let name = params.push(SqlParam::Text(collection.name.to_string()));
        let mut clauses = vec![format!("collection = {name}")];
        clauses.extend(where_clause(conditions, params)?);
        Ok(format!("SELECT data FROM {} WHERE {}", DOCUMENTS_TABLE, clauses.join(" AND ")))
    }

    fn log(&self, op: &str, collection: &Collection, sql: &str, started: Instant) {
        if self.log_queries {
            tracing::debug!(collection = collection.name, sql, "postgres {}", op);
        }
        tracing::debug!(
            collection = collection.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "postgres {}",
            op
        );
    }

    /// Maps a unique index violation back to the offending field set.
    fn map_write_error(collection: &Collection, doc: &Document, err: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some("23505") {
                let constraint = db.constraint().unwrap_or_default();
                let fields = collection
                    .unique
                    .iter()
                    .find(|fields| DatabaseManager::unique_index_name(collection, fields) == constraint)
                    .copied()
                    .unwrap_or(&["id"]);
                let value = fields
                    .iter()
                    .map(|f| match doc.get(*f) {
                        Some(Value::String(s)) => s.clone(),
                        Some(other) => other.to_string(),
                        None => String::new(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                return StoreError::Duplicate { field: fields.join(", "), value };
            }
        }
        StoreError::Sqlx(err)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find(&self, collection: &Collection, spec: &QuerySpec) -> Result<Vec<Document>, StoreError> {
        let started = Instant::now();
        let conditions = typed_conditions(collection, spec.conditions())?;

        let mut params = SqlParams::default();
        let mut sql = Self::select_sql(collection, &conditions, &mut params)?;
        let order = FilterOrder::generate_sql(&spec.sort, |field| params.field(field));
        if !order.is_empty() {
            sql.push(' ');
            sql.push_str(&order);
        }
        let limit = params.push(SqlParam::Int(i64::from(spec.pagination.limit)));
        let offset = params.push(SqlParam::Int(i64::try_from(spec.pagination.skip).unwrap_or(i64::MAX)));
        sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));

        let rows = bind_scalar(sqlx::query_scalar::<_, Value>(&sql), &params.params)
            .fetch_all(&self.pool)
            .await?;

        self.log("find", collection, &sql, started);
        rows.into_iter().map(into_document).collect()
    }

    async fn find_one(&self, collection: &Collection, conditions: &[Condition]) -> Result<Option<Document>, StoreError> {
        let started = Instant::now();
        let conditions = typed_conditions(collection, collection.base_filter.iter().chain(conditions))?;

        let mut params = SqlParams::default();
        let sql = format!("{} LIMIT 1", Self::select_sql(collection, &conditions, &mut params)?);
        let row = bind_scalar(sqlx::query_scalar::<_, Value>(&sql), &params.params)
            .fetch_optional(&self.pool)
            .await?;

        self.log("find_one", collection, &sql, started);
        row.map(into_document).transpose()
    }

    async fn find_by_id(&self, collection: &Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let started = Instant::now();
        let id = Self::parse_id(collection, id)?;

        let mut params = SqlParams::default();
        let sql = format!("SELECT data FROM {} WHERE {}", DOCUMENTS_TABLE, Self::by_id(collection, id, &mut params)?);
        let row = bind_scalar(sqlx::query_scalar::<_, Value>(&sql), &params.params)
            .fetch_optional(&self.pool)
            .await?;

        self.log("find_by_id", collection, &sql, started);
        row.map(into_document).transpose()
    }

    async fn create(&self, collection: &Collection, attrs: Document) -> Result<Document, StoreError> {
        let started = Instant::now();
        let doc = collection.prepare_create(attrs)?;
        let id = doc
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| StoreError::Backend("prepared document has no id".to_string()))?;

        let sql = format!("INSERT INTO {} (collection, id, data) VALUES ($1, $2, $3)", DOCUMENTS_TABLE);
        let data = Value::Object(doc.clone());
        sqlx::query(&sql)
            .bind(collection.name)
            .bind(id)
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(collection, &doc, e))?;

        self.log("create", collection, &sql, started);
        Ok(doc)
    }

    async fn update_by_id(&self, collection: &Collection, id: &str, patch: Document) -> Result<Option<Document>, StoreError> {
        let started = Instant::now();
        let uuid = Self::parse_id(collection, id)?;
        let mut tx = self.pool.begin().await?;

        let mut params = SqlParams::default();
        let select = format!(
            "SELECT data FROM {} WHERE {} FOR UPDATE",
            DOCUMENTS_TABLE,
            Self::by_id(collection, uuid, &mut params)?
        );
        let Some(existing) = bind_scalar(sqlx::query_scalar::<_, Value>(&select), &params.params)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let mut updated = collection.prepare_update(&into_document(existing)?, patch)?;
        let version = updated.get("__v").and_then(Value::as_i64).unwrap_or(0);
        updated.insert("__v".to_string(), Value::from(version + 1));

        let sql = format!("UPDATE {} SET data = $1 WHERE collection = $2 AND id = $3", DOCUMENTS_TABLE);
        let update_params = [
            SqlParam::Json(Value::Object(updated.clone())),
            SqlParam::Text(collection.name.to_string()),
            SqlParam::Uuid(uuid),
        ];
        bind_query(sqlx::query(&sql), &update_params)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::map_write_error(collection, &updated, e))?;
        tx.commit().await?;

        self.log("update_by_id", collection, &sql, started);
        Ok(Some(updated))
    }

    async fn delete_by_id(&self, collection: &Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let started = Instant::now();
        let id = Self::parse_id(collection, id)?;

        let mut params = SqlParams::default();
        let sql = format!(
            "DELETE FROM {} WHERE {} RETURNING data",
            DOCUMENTS_TABLE,
            Self::by_id(collection, id, &mut params)?
        );
        let row = bind_scalar(sqlx::query_scalar::<_, Value>(&sql), &params.params)
            .fetch_optional(&self.pool)
            .await?;

        self.log("delete_by_id", collection, &sql, started);
        row.map(into_document).transpose()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        DatabaseManager::health_check(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
