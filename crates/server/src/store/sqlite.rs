use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{
  QueryBuilder,
  Sqlite,
  SqlitePool
};

use super::{
  IssueStore,
  StoreError
};
use crate::models::{
  Issue,
  IssueFilter,
  IssuePatch
};

const SCHEMA_SQL: &str = include_str!(
  "../../res/sql/sqlite/schema.sql"
);

const SELECT_ISSUES: &str =
  "SELECT id, issue_title, issue_text, \
   created_by, assigned_to, \
   status_text, open, created_on, \
   updated_on FROM issues";

#[derive(Debug, sqlx::FromRow)]

struct IssueRow {
  id:          String,
  issue_title: String,
  issue_text:  String,
  created_by:  String,
  assigned_to: Option<String>,
  status_text: Option<String>,
  open:        bool,
  created_on:  String,
  updated_on:  String
}

impl From<IssueRow> for Issue {
  fn from(row: IssueRow) -> Self {
    Issue {
      id:          row.id,
      issue_title: row.issue_title,
      issue_text:  row.issue_text,
      created_by:  row.created_by,
      assigned_to: row
        .assigned_to
        .unwrap_or_default(),
      status_text: row
        .status_text
        .unwrap_or_default(),
      open:        row.open,
      created_on:  row.created_on,
      updated_on:  row.updated_on
    }
  }
}

/// Issues kept in a single SQLite table.
#[derive(Clone)]

pub struct SqliteIssueStore {
  pool: SqlitePool
}

impl SqliteIssueStore {
  /// Opens (creating if needed) the database file and applies the
  /// schema.
  pub async fn open(
    path: &Path
  ) -> Result<Self, StoreError> {
    let url = format!(
      "sqlite://{}?mode=rwc",
      path.display()
    );

    let pool = SqlitePool::connect(&url)
      .await
      .map_err(|e| {
        StoreError::Connection(format!(
          "sqlite connect failed: {e}"
        ))
      })?;

    Self::with_pool(pool).await
  }

  /// Private in-memory database. A single connection keeps every
  /// query on the same database.
  pub async fn in_memory(
  ) -> Result<Self, StoreError> {
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect("sqlite::memory:")
      .await
      .map_err(|e| {
        StoreError::Connection(format!(
          "sqlite connect failed: {e}"
        ))
      })?;

    Self::with_pool(pool).await
  }

  pub async fn with_pool(
    pool: SqlitePool
  ) -> Result<Self, StoreError> {
    apply_schema(&pool).await?;
    Ok(Self { pool })
  }
}

async fn apply_schema(
  pool: &SqlitePool
) -> Result<(), StoreError> {
  for stmt in SCHEMA_SQL.split(';') {
    let trimmed = stmt.trim();
    if trimmed.is_empty() {
      continue;
    }
    sqlx::query(trimmed)
      .execute(pool)
      .await
      .map_err(|e| {
        StoreError::Query(format!(
          "schema apply error: {e}"
        ))
      })?;
  }
  Ok(())
}

fn select_query<'a>(
  project: &'a str,
  filter: &'a IssueFilter
) -> QueryBuilder<'a, Sqlite> {
  let mut builder =
    QueryBuilder::<Sqlite>::new(
      SELECT_ISSUES
    );
  builder.push(" WHERE project = ");
  builder.push_bind(project);

  for (column, value) in
    filter.text_fields()
  {
    match column {
      | "assigned_to" | "status_text" => {
        builder.push(format!(
          " AND COALESCE({column}, '') = "
        ));
      }
      | _ => {
        builder.push(format!(
          " AND {column} = "
        ));
      }
    }
    builder.push_bind(value);
  }

  if let Some(open) = filter.open {
    builder.push(" AND open = ");
    builder.push_bind(open);
  }

  builder.push(" ORDER BY rowid");
  builder
}

fn update_query<'a>(
  id: &'a str,
  patch: &'a IssuePatch,
  updated_on: &'a str
) -> QueryBuilder<'a, Sqlite> {
  let mut builder =
    QueryBuilder::<Sqlite>::new(
      "UPDATE issues SET updated_on = "
    );
  builder.push_bind(updated_on);

  for (column, value) in
    patch.text_fields()
  {
    builder.push(format!(
      ", {column} = "
    ));
    builder.push_bind(value);
  }

  if let Some(open) = patch.open {
    builder.push(", open = ");
    builder.push_bind(open);
  }

  builder.push(" WHERE id = ");
  builder.push_bind(id);
  builder
}

#[async_trait]
impl IssueStore for SqliteIssueStore {
  async fn insert(
    &self,
    project: &str,
    issue: &Issue
  ) -> Result<(), StoreError> {
    sqlx::query(
      "INSERT INTO issues (id, project, \
       issue_title, issue_text, \
       created_by, assigned_to, \
       status_text, open, created_on, \
       updated_on) VALUES (?1, ?2, ?3, \
       ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
    )
    .bind(&issue.id)
    .bind(project)
    .bind(&issue.issue_title)
    .bind(&issue.issue_text)
    .bind(&issue.created_by)
    .bind(&issue.assigned_to)
    .bind(&issue.status_text)
    .bind(issue.open)
    .bind(&issue.created_on)
    .bind(&issue.updated_on)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn find(
    &self,
    project: &str,
    filter: &IssueFilter
  ) -> Result<Vec<Issue>, StoreError> {
    let rows = select_query(project, filter)
      .build_query_as::<IssueRow>()
      .fetch_all(&self.pool)
      .await?;

    Ok(
      rows
        .into_iter()
        .map(Issue::from)
        .collect()
    )
  }

  async fn exists(
    &self,
    id: &str
  ) -> Result<bool, StoreError> {
    let found: Option<i32> =
      sqlx::query_scalar(
        "SELECT 1 FROM issues WHERE id \
         = ?1 LIMIT 1"
      )
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;

    Ok(found.is_some())
  }

  async fn update(
    &self,
    id: &str,
    patch: &IssuePatch,
    updated_on: &str
  ) -> Result<bool, StoreError> {
    let result =
      update_query(id, patch, updated_on)
        .build()
        .execute(&self.pool)
        .await?;

    Ok(result.rows_affected() > 0)
  }

  async fn delete(
    &self,
    id: &str
  ) -> Result<bool, StoreError> {
    let result = sqlx::query(
      "DELETE FROM issues WHERE id = ?1"
    )
    .bind(id)
    .execute(&self.pool)
    .await?;

    Ok(result.rows_affected() > 0)
  }

  async fn clear(
    &self
  ) -> Result<u64, StoreError> {
    let result =
      sqlx::query("DELETE FROM issues")
        .execute(&self.pool)
        .await?;

    Ok(result.rows_affected())
  }
}
