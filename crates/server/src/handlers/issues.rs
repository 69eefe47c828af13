//! `/api/issues/:project` handlers.
use axum::Json;
use axum::extract::{
  Path as AxumPath,
  Query,
  State
};

use super::IssueBody;
use crate::app_state::AppState;
use crate::errors::ServerError;
use crate::models::{
  format_timestamp,
  CreateIssueRequest,
  DeleteIssueRequest,
  Issue,
  IssueActionResponse,
  IssueFilter,
  IssueListQuery,
  UpdateIssueRequest
};
use crate::store::new_issue_id;

const REQUIRED_MISSING: &str =
  "required field(s) missing";
const MISSING_ID: &str = "missing _id";
const NO_UPDATE_FIELDS: &str =
  "no update field(s) sent";
const COULD_NOT_UPDATE: &str =
  "could not update";
const COULD_NOT_DELETE: &str =
  "could not delete";

pub async fn list_issues(
  State(state): State<AppState>,
  AxumPath(project): AxumPath<String>,
  Query(pairs): Query<
    Vec<(String, String)>
  >
) -> Result<Json<Vec<Issue>>, ServerError>
{
  let filter = IssueFilter::from(
    pairs
      .into_iter()
      .collect::<IssueListQuery>()
  );

  let issues = state
    .store
    .find(&project, &filter)
    .await?;

  tracing::debug!(
    project = %project,
    count = issues.len(),
    "issues listed"
  );

  Ok(Json(issues))
}

pub async fn create_issue(
  State(state): State<AppState>,
  AxumPath(project): AxumPath<String>,
  IssueBody(payload): IssueBody<
    CreateIssueRequest
  >
) -> Result<Json<Issue>, ServerError> {
  let Some(new) = payload.validate()
  else {
    tracing::debug!(
      project = %project,
      "create rejected: required field missing"
    );
    return Err(ServerError::bad_request(
      REQUIRED_MISSING
    ));
  };

  let issue = Issue::create(
    new,
    new_issue_id(),
    state.clock.now()
  );

  state
    .store
    .insert(&project, &issue)
    .await?;

  tracing::info!(
    project = %project,
    _id = %issue.id,
    open = issue.open,
    "issue created"
  );

  Ok(Json(issue))
}

/// Applies a partial update. The `_id`, existence and empty-set
/// checks run in that order; an empty set costs one existence
/// lookup, any other update is a single conditional write.
pub async fn update_issue(
  State(state): State<AppState>,
  AxumPath(project): AxumPath<String>,
  IssueBody(payload): IssueBody<
    UpdateIssueRequest
  >
) -> Result<
  Json<IssueActionResponse>,
  ServerError
> {
  let (id, patch) = payload.into_parts();

  let Some(id) = id else {
    tracing::debug!(
      project = %project,
      "update rejected: missing _id"
    );
    return Err(ServerError::bad_request(
      MISSING_ID
    ));
  };

  if patch.is_empty() {
    let reason =
      if state.store.exists(&id).await? {
        NO_UPDATE_FIELDS
      } else {
        COULD_NOT_UPDATE
      };
    tracing::debug!(
      project = %project,
      _id = %id,
      reason,
      "update rejected"
    );
    return Err(ServerError::for_issue(
      reason, id
    ));
  }

  let patch = patch.with_derived_open();
  let updated_on =
    format_timestamp(state.clock.now());

  let matched = state
    .store
    .update(&id, &patch, &updated_on)
    .await?;

  if !matched {
    tracing::debug!(
      project = %project,
      _id = %id,
      "update rejected: no such issue"
    );
    return Err(ServerError::for_issue(
      COULD_NOT_UPDATE,
      id
    ));
  }

  tracing::info!(
    project = %project,
    _id = %id,
    "issue updated"
  );

  Ok(Json(IssueActionResponse {
    result: "successfully updated",
    id
  }))
}

pub async fn delete_issue(
  State(state): State<AppState>,
  AxumPath(project): AxumPath<String>,
  IssueBody(payload): IssueBody<
    DeleteIssueRequest
  >
) -> Result<
  Json<IssueActionResponse>,
  ServerError
> {
  let Some(id) = payload.into_id() else {
    tracing::debug!(
      project = %project,
      "delete rejected: missing _id"
    );
    return Err(ServerError::bad_request(
      MISSING_ID
    ));
  };

  if !state.store.delete(&id).await? {
    tracing::debug!(
      project = %project,
      _id = %id,
      "delete rejected: no such issue"
    );
    return Err(ServerError::for_issue(
      COULD_NOT_DELETE,
      id
    ));
  }

  tracing::info!(
    project = %project,
    _id = %id,
    "issue deleted"
  );

  Ok(Json(IssueActionResponse {
    result: "successfully deleted",
    id
  }))
}
