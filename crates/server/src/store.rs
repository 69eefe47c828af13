//! Issue persistence port and its MongoDB / SQLite backends.
mod mongo;
mod sqlite;

pub use mongo::MongoIssueStore;
pub use sqlite::SqliteIssueStore;
use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
  Issue,
  IssueFilter,
  IssuePatch
};

#[derive(Debug, Error)]

pub enum StoreError {
  #[error("store connection failed: {0}")]
  Connection(String),
  #[error("store query failed: {0}")]
  Query(String),
  #[error("store returned malformed issue: {0}")]
  Decode(String)
}

impl From<sqlx::Error> for StoreError {
  fn from(err: sqlx::Error) -> Self {
    match err {
      | sqlx::Error::ColumnDecode {
        ..
      }
      | sqlx::Error::Decode(_) => {
        StoreError::Decode(err.to_string())
      }
      | sqlx::Error::PoolTimedOut
      | sqlx::Error::PoolClosed
      | sqlx::Error::Io(_) => {
        StoreError::Connection(
          err.to_string()
        )
      }
      | other => {
        StoreError::Query(other.to_string())
      }
    }
  }
}

impl From<mongodb::error::Error>
  for StoreError
{
  fn from(
    err: mongodb::error::Error
  ) -> Self {
    use mongodb::error::ErrorKind;

    match err.kind.as_ref() {
      | ErrorKind::BsonDeserialization(
        _
      ) => StoreError::Decode(err.to_string()),
      | ErrorKind::ServerSelection {
        ..
      }
      | ErrorKind::Io(_)
      | ErrorKind::DnsResolve {
        ..
      } => StoreError::Connection(
        err.to_string()
      ),
      | _ => {
        StoreError::Query(err.to_string())
      }
    }
  }
}

/// One collection of issues, partitioned by project name.
///
/// `update` and `delete` address records by `_id` alone and report
/// whether a record matched, so the handlers never need a separate
/// existence check before writing.
#[async_trait]
pub trait IssueStore: Send + Sync {
  async fn insert(
    &self,
    project: &str,
    issue: &Issue
  ) -> Result<(), StoreError>;

  /// Matching issues in insertion order.
  async fn find(
    &self,
    project: &str,
    filter: &IssueFilter
  ) -> Result<Vec<Issue>, StoreError>;

  async fn exists(
    &self,
    id: &str
  ) -> Result<bool, StoreError>;

  async fn update(
    &self,
    id: &str,
    patch: &IssuePatch,
    updated_on: &str
  ) -> Result<bool, StoreError>;

  async fn delete(
    &self,
    id: &str
  ) -> Result<bool, StoreError>;

  /// Removes every issue in every project.
  async fn clear(
    &self
  ) -> Result<u64, StoreError>;
}

/// 24-hex ObjectId text, shared by both backends.
pub fn new_issue_id() -> String {
  mongodb::bson::oid::ObjectId::new()
    .to_hex()
}
