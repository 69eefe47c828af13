use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{
  doc,
  Document
};
use mongodb::{
  Client,
  Collection
};
use serde::{
  Deserialize,
  Serialize
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

/// Stored shape. Older documents may lack `assigned_to` /
/// `status_text`, so both decode as optional.
#[derive(Debug, Serialize, Deserialize)]

struct IssueDocument {
  #[serde(rename = "_id")]
  id:          String,
  project:     String,
  issue_title: String,
  issue_text:  String,
  created_by:  String,
  #[serde(default)]
  assigned_to: Option<String>,
  #[serde(default)]
  status_text: Option<String>,
  open:        bool,
  created_on:  String,
  updated_on:  String
}

impl IssueDocument {
  fn from_issue(
    project: &str,
    issue: &Issue
  ) -> Self {
    Self {
      id:          issue.id.clone(),
      project:     project.to_string(),
      issue_title: issue.issue_title.clone(),
      issue_text:  issue.issue_text.clone(),
      created_by:  issue.created_by.clone(),
      assigned_to: Some(
        issue.assigned_to.clone()
      ),
      status_text: Some(
        issue.status_text.clone()
      ),
      open:        issue.open,
      created_on:  issue.created_on.clone(),
      updated_on:  issue.updated_on.clone()
    }
  }

  fn into_issue(self) -> Issue {
    Issue {
      id:          self.id,
      issue_title: self.issue_title,
      issue_text:  self.issue_text,
      created_by:  self.created_by,
      assigned_to: self
        .assigned_to
        .unwrap_or_default(),
      status_text: self
        .status_text
        .unwrap_or_default(),
      open:        self.open,
      created_on:  self.created_on,
      updated_on:  self.updated_on
    }
  }
}

/// Issues kept in one MongoDB collection. The driver pools
/// connections internally, so clones share one `Client`.
#[derive(Clone)]

pub struct MongoIssueStore {
  issues: Collection<IssueDocument>
}

impl MongoIssueStore {
  /// Connects and pings the server so an unreachable store fails at
  /// startup rather than on the first request.
  pub async fn connect(
    uri: &str,
    database: &str,
    collection: &str
  ) -> Result<Self, StoreError> {
    let client =
      Client::with_uri_str(uri)
        .await
        .map_err(|e| {
          StoreError::Connection(
            e.to_string()
          )
        })?;

    let db = client.database(database);

    db.run_command(doc! { "ping": 1 })
      .await
      .map_err(|e| {
        StoreError::Connection(format!(
          "ping failed: {e}"
        ))
      })?;

    tracing::info!(
      database,
      collection,
      "mongodb connected"
    );

    Ok(Self {
      issues: db.collection(collection)
    })
  }
}

fn filter_document(
  project: &str,
  filter: &IssueFilter
) -> Document {
  let mut selector =
    doc! { "project": project };

  for (field, value) in
    filter.text_fields()
  {
    let key = match field {
      | "id" => "_id",
      | other => other
    };
    selector.insert(key, value);
  }

  if let Some(open) = filter.open {
    selector.insert("open", open);
  }

  selector
}

fn update_document(
  patch: &IssuePatch,
  updated_on: &str
) -> Document {
  let mut set =
    doc! { "updated_on": updated_on };

  for (field, value) in
    patch.text_fields()
  {
    set.insert(field, value);
  }

  if let Some(open) = patch.open {
    set.insert("open", open);
  }

  doc! { "$set": set }
}

#[async_trait]
impl IssueStore for MongoIssueStore {
  async fn insert(
    &self,
    project: &str,
    issue: &Issue
  ) -> Result<(), StoreError> {
    self
      .issues
      .insert_one(
        IssueDocument::from_issue(
          project, issue
        )
      )
      .await?;
    Ok(())
  }

  async fn find(
    &self,
    project: &str,
    filter: &IssueFilter
  ) -> Result<Vec<Issue>, StoreError> {
    // ObjectId text sorts by creation time.
    let cursor = self
      .issues
      .find(filter_document(
        project, filter
      ))
      .sort(doc! { "_id": 1 })
      .await?;

    let docs: Vec<IssueDocument> =
      cursor.try_collect().await?;

    Ok(
      docs
        .into_iter()
        .map(IssueDocument::into_issue)
        .collect()
    )
  }

  async fn exists(
    &self,
    id: &str
  ) -> Result<bool, StoreError> {
    let count = self
      .issues
      .count_documents(doc! { "_id": id })
      .limit(1)
      .await?;
    Ok(count > 0)
  }

  async fn update(
    &self,
    id: &str,
    patch: &IssuePatch,
    updated_on: &str
  ) -> Result<bool, StoreError> {
    let result = self
      .issues
      .update_one(
        doc! { "_id": id },
        update_document(patch, updated_on)
      )
      .await?;
    Ok(result.matched_count > 0)
  }

  async fn delete(
    &self,
    id: &str
  ) -> Result<bool, StoreError> {
    let result = self
      .issues
      .delete_one(doc! { "_id": id })
      .await?;
    Ok(result.deleted_count > 0)
  }

  async fn clear(
    &self
  ) -> Result<u64, StoreError> {
    let result = self
      .issues
      .delete_many(doc! {})
      .await?;
    Ok(result.deleted_count)
  }
}

#[cfg(test)]
mod tests {
  use mongodb::bson::Bson;

  use super::*;

  #[test]
  fn filter_starts_from_project() {
    let selector = filter_document(
      "apitest",
      &IssueFilter::default()
    );
    assert_eq!(
      selector,
      doc! { "project": "apitest" }
    );
  }

  #[test]
  fn filter_maps_id_and_types_open() {
    let filter = IssueFilter {
      id: Some("65f0c0ffee".into()),
      created_by: Some("alice".into()),
      open: Some(false),
      ..Default::default()
    };
    let selector =
      filter_document("apitest", &filter);

    assert_eq!(
      selector.get("_id"),
      Some(&Bson::String(
        "65f0c0ffee".into()
      ))
    );
    assert_eq!(
      selector.get("open"),
      Some(&Bson::Boolean(false))
    );
    assert!(selector.get("id").is_none());
  }

  #[test]
  fn update_always_refreshes_updated_on() {
    let patch = IssuePatch {
      assigned_to: Some("bob".into()),
      ..Default::default()
    };
    let update = update_document(
      &patch,
      "2024-03-09T14:05:07.000Z"
    );

    assert_eq!(
      update,
      doc! {
        "$set": {
          "updated_on": "2024-03-09T14:05:07.000Z",
          "assigned_to": "bob",
        }
      }
    );
  }

  #[test]
  fn legacy_documents_default_optional_fields() {
    let stored = IssueDocument {
      id:          "abc".into(),
      project:     "p".into(),
      issue_title: "t".into(),
      issue_text:  "x".into(),
      created_by:  "me".into(),
      assigned_to: None,
      status_text: None,
      open:        true,
      created_on:  "2024-03-09T14:05:07.000Z"
        .into(),
      updated_on:  "2024-03-09T14:05:07.000Z"
        .into()
    };

    let issue = stored.into_issue();
    assert_eq!(issue.assigned_to, "");
    assert_eq!(issue.status_text, "");
  }
}
