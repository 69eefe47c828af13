use chrono::{
  DateTime,
  NaiveDate,
  SecondsFormat,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};

/// Query values that turn the `open` flag off. Anything else is on.
const FALSE_FLAGS: [&str; 4] =
  ["0", "false", "off", "no"];

const CLOSED_STATUS: &str = "closed";

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]

pub struct Issue {
  #[serde(rename = "_id")]
  pub id:          String,
  pub issue_title: String,
  pub issue_text:  String,
  pub created_by:  String,
  #[serde(default)]
  pub assigned_to: String,
  #[serde(default)]
  pub status_text: String,
  pub open:        bool,
  pub created_on:  String,
  pub updated_on:  String
}

impl Issue {
  /// Stamps a validated payload with its id and timestamps.
  pub fn create(
    new: NewIssue,
    id: String,
    now: DateTime<Utc>
  ) -> Self {
    let created_on =
      format_timestamp(now);
    let assigned_to =
      new.assigned_to.unwrap_or_default();
    let status_text =
      new.status_text.unwrap_or_default();

    Self {
      id,
      issue_title: new.issue_title,
      issue_text: new.issue_text,
      created_by: new.created_by,
      assigned_to,
      open: is_open(&status_text),
      status_text,
      updated_on: created_on.clone(),
      created_on
    }
  }
}

/// Raw create body. Every field is optional until validated.
#[derive(Debug, Default, Deserialize)]

pub struct CreateIssueRequest {
  pub issue_title: Option<String>,
  pub issue_text:  Option<String>,
  pub created_by:  Option<String>,
  pub assigned_to: Option<String>,
  pub status_text: Option<String>
}

#[derive(Debug, Clone, PartialEq, Eq)]

pub struct NewIssue {
  pub issue_title: String,
  pub issue_text:  String,
  pub created_by:  String,
  pub assigned_to: Option<String>,
  pub status_text: Option<String>
}

impl CreateIssueRequest {
  /// `None` when a required field is absent or empty.
  pub fn validate(
    self
  ) -> Option<NewIssue> {
    Some(NewIssue {
      issue_title: required(
        self.issue_title
      )?,
      issue_text:  required(
        self.issue_text
      )?,
      created_by:  required(
        self.created_by
      )?,
      assigned_to: self.assigned_to,
      status_text: self.status_text
    })
  }
}

fn required(
  value: Option<String>
) -> Option<String> {
  value.filter(|v| !v.is_empty())
}

/// `open` arrives as a JSON boolean or as a form/query string.
#[derive(
  Debug, Clone, PartialEq, Eq, Deserialize,
)]
#[serde(untagged)]

pub enum FlagValue {
  Bool(bool),
  Text(String)
}

impl FlagValue {
  pub fn as_bool(&self) -> bool {
    match self {
      | FlagValue::Bool(value) => *value,
      | FlagValue::Text(raw) => {
        parse_flag(raw)
      }
    }
  }
}

#[derive(Debug, Default, Deserialize)]

pub struct UpdateIssueRequest {
  #[serde(rename = "_id")]
  pub id:          Option<String>,
  pub issue_title: Option<String>,
  pub issue_text:  Option<String>,
  pub created_by:  Option<String>,
  pub assigned_to: Option<String>,
  pub status_text: Option<String>,
  pub open:        Option<FlagValue>
}

impl UpdateIssueRequest {
  /// Splits the body into the target id and the fields to set.
  pub fn into_parts(
    self
  ) -> (Option<String>, IssuePatch) {
    let id = non_empty_id(self.id);
    let patch = IssuePatch {
      issue_title: self.issue_title,
      issue_text:  self.issue_text,
      created_by:  self.created_by,
      assigned_to: self.assigned_to,
      status_text: self.status_text,
      open:        self
        .open
        .as_ref()
        .map(FlagValue::as_bool)
    };

    (id, patch)
  }
}

#[derive(Debug, Default, Deserialize)]

pub struct DeleteIssueRequest {
  #[serde(rename = "_id")]
  pub id: Option<String>
}

impl DeleteIssueRequest {
  pub fn into_id(
    self
  ) -> Option<String> {
    non_empty_id(self.id)
  }
}

fn non_empty_id(
  id: Option<String>
) -> Option<String> {
  id.filter(|v| !v.is_empty())
}

/// Fields written by an update. `updated_on` is stamped separately.
#[derive(
  Debug, Default, Clone, PartialEq, Eq,
)]

pub struct IssuePatch {
  pub issue_title: Option<String>,
  pub issue_text:  Option<String>,
  pub created_by:  Option<String>,
  pub assigned_to: Option<String>,
  pub status_text: Option<String>,
  pub open:        Option<bool>
}

impl IssuePatch {
  pub fn is_empty(&self) -> bool {
    self.issue_title.is_none()
      && self.issue_text.is_none()
      && self.created_by.is_none()
      && self.assigned_to.is_none()
      && self.status_text.is_none()
      && self.open.is_none()
  }

  /// A new `status_text` decides `open`, overriding any sent value.
  pub fn with_derived_open(
    mut self
  ) -> Self {
    if let Some(status) =
      self.status_text.as_deref()
    {
      self.open = Some(is_open(status));
    }
    self
  }

  /// String-valued fields in storage column order.
  pub fn text_fields(
    &self
  ) -> Vec<(&'static str, &str)> {
    [
      ("issue_title", &self.issue_title),
      ("issue_text", &self.issue_text),
      ("created_by", &self.created_by),
      ("assigned_to", &self.assigned_to),
      ("status_text", &self.status_text)
    ]
    .into_iter()
    .filter_map(|(name, value)| {
      value
        .as_deref()
        .map(|v| (name, v))
    })
    .collect()
  }
}

/// Query string for listing. Keys outside these fields are dropped
/// and a repeated key keeps its last value.
#[derive(Debug, Default)]

pub struct IssueListQuery {
  pub id:          Option<String>,
  pub issue_title: Option<String>,
  pub issue_text:  Option<String>,
  pub created_by:  Option<String>,
  pub assigned_to: Option<String>,
  pub status_text: Option<String>,
  pub open:        Option<String>,
  pub created_on:  Option<String>,
  pub updated_on:  Option<String>
}

impl FromIterator<(String, String)>
  for IssueListQuery
{
  fn from_iter<I>(pairs: I) -> Self
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    let mut query = Self::default();

    for (key, value) in pairs {
      let slot = match key.as_str() {
        | "_id" => &mut query.id,
        | "issue_title" => {
          &mut query.issue_title
        }
        | "issue_text" => {
          &mut query.issue_text
        }
        | "created_by" => {
          &mut query.created_by
        }
        | "assigned_to" => {
          &mut query.assigned_to
        }
        | "status_text" => {
          &mut query.status_text
        }
        | "open" => &mut query.open,
        | "created_on" => {
          &mut query.created_on
        }
        | "updated_on" => {
          &mut query.updated_on
        }
        | _ => continue
      };
      *slot = Some(value);
    }

    query
  }
}

/// Typed equality constraints applied on top of the project.
#[derive(
  Debug, Default, Clone, PartialEq, Eq,
)]

pub struct IssueFilter {
  pub id:          Option<String>,
  pub issue_title: Option<String>,
  pub issue_text:  Option<String>,
  pub created_by:  Option<String>,
  pub assigned_to: Option<String>,
  pub status_text: Option<String>,
  pub open:        Option<bool>,
  pub created_on:  Option<String>,
  pub updated_on:  Option<String>
}

impl From<IssueListQuery> for IssueFilter {
  fn from(query: IssueListQuery) -> Self {
    Self {
      id:          query.id,
      issue_title: query.issue_title,
      issue_text:  query.issue_text,
      created_by:  query.created_by,
      assigned_to: query.assigned_to,
      status_text: query.status_text,
      open:        query
        .open
        .as_deref()
        .map(parse_flag),
      created_on:  query
        .created_on
        .as_deref()
        .map(normalize_date),
      updated_on:  query
        .updated_on
        .as_deref()
        .map(normalize_date)
    }
  }
}

impl IssueFilter {
  /// Equality constraints on string columns, `_id` reported as `id`.
  pub fn text_fields(
    &self
  ) -> Vec<(&'static str, &str)> {
    [
      ("id", &self.id),
      ("issue_title", &self.issue_title),
      ("issue_text", &self.issue_text),
      ("created_by", &self.created_by),
      ("assigned_to", &self.assigned_to),
      ("status_text", &self.status_text),
      ("created_on", &self.created_on),
      ("updated_on", &self.updated_on)
    ]
    .into_iter()
    .filter_map(|(name, value)| {
      value
        .as_deref()
        .map(|v| (name, v))
    })
    .collect()
  }
}

#[derive(Debug, Serialize)]

pub struct IssueActionResponse {
  pub result: &'static str,
  #[serde(rename = "_id")]
  pub id:     String
}

pub fn is_open(status_text: &str) -> bool {
  status_text != CLOSED_STATUS
}

pub fn parse_flag(raw: &str) -> bool {
  !FALSE_FLAGS.contains(&raw)
}

/// `YYYY-MM-DDTHH:MM:SS.mmmZ`
pub fn format_timestamp(
  at: DateTime<Utc>
) -> String {
  at.to_rfc3339_opts(
    SecondsFormat::Millis,
    true
  )
}

/// Canonical timestamp for a date filter, or the raw value when it
/// does not parse.
pub fn normalize_date(raw: &str) -> String {
  let trimmed = raw.trim();

  if let Ok(at) =
    DateTime::parse_from_rfc3339(trimmed)
  {
    return format_timestamp(
      at.with_timezone(&Utc)
    );
  }

  if let Some(midnight) =
    NaiveDate::parse_from_str(
      trimmed, "%Y-%m-%d"
    )
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
  {
    return format_timestamp(
      midnight.and_utc()
    );
  }

  raw.to_string()
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn fixed_now() -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
      .unwrap()
  }

  #[test]
  fn flag_truth_table() {
    for raw in ["0", "false", "off", "no"] {
      assert!(!parse_flag(raw), "{raw}");
    }
    for raw in
      ["1", "true", "yes", "on", "", "garbage", "FALSE"]
    {
      assert!(parse_flag(raw), "{raw}");
    }
  }

  #[test]
  fn timestamps_have_millisecond_precision() {
    assert_eq!(
      format_timestamp(fixed_now()),
      "2024-03-09T14:05:07.000Z"
    );
  }

  #[test]
  fn date_filters_are_canonicalized() {
    assert_eq!(
      normalize_date("2024-03-09T14:05:07Z"),
      "2024-03-09T14:05:07.000Z"
    );
    assert_eq!(
      normalize_date(
        "2024-03-09T16:05:07.250+02:00"
      ),
      "2024-03-09T14:05:07.250Z"
    );
    assert_eq!(
      normalize_date("2024-03-09"),
      "2024-03-09T00:00:00.000Z"
    );
    assert_eq!(
      normalize_date("last tuesday"),
      "last tuesday"
    );
  }

  #[test]
  fn create_requires_non_empty_fields() {
    let missing = CreateIssueRequest {
      issue_title: Some("title".into()),
      issue_text: Some("text".into()),
      ..Default::default()
    };
    assert!(missing.validate().is_none());

    let empty = CreateIssueRequest {
      issue_title: Some("title".into()),
      issue_text: Some(String::new()),
      created_by: Some("me".into()),
      ..Default::default()
    };
    assert!(empty.validate().is_none());

    let blank = CreateIssueRequest {
      issue_title: Some("title".into()),
      issue_text: Some("  ".into()),
      created_by: Some("me".into()),
      ..Default::default()
    }
    .validate()
    .unwrap();
    assert_eq!(blank.issue_text, "  ");
  }

  #[test]
  fn create_defaults_optional_fields() {
    let new = CreateIssueRequest {
      issue_title: Some("title".into()),
      issue_text: Some("text".into()),
      created_by: Some("me".into()),
      ..Default::default()
    }
    .validate()
    .unwrap();

    let issue = Issue::create(
      new,
      "abc".into(),
      fixed_now()
    );

    assert_eq!(issue.assigned_to, "");
    assert_eq!(issue.status_text, "");
    assert!(issue.open);
    assert_eq!(
      issue.created_on,
      issue.updated_on
    );
  }

  #[test]
  fn closed_status_creates_closed_issue() {
    let new = CreateIssueRequest {
      issue_title: Some("title".into()),
      issue_text: Some("text".into()),
      created_by: Some("me".into()),
      status_text: Some("closed".into()),
      ..Default::default()
    }
    .validate()
    .unwrap();

    let issue = Issue::create(
      new,
      "abc".into(),
      fixed_now()
    );
    assert!(!issue.open);
  }

  #[test]
  fn issue_serializes_id_key() {
    let issue = Issue {
      id:          "abc".into(),
      issue_title: "t".into(),
      issue_text:  "x".into(),
      created_by:  "me".into(),
      assigned_to: String::new(),
      status_text: String::new(),
      open:        true,
      created_on:  "2024-03-09T14:05:07.000Z"
        .into(),
      updated_on:  "2024-03-09T14:05:07.000Z"
        .into()
    };

    let value =
      serde_json::to_value(&issue).unwrap();
    assert_eq!(value["_id"], "abc");
    assert_eq!(value["open"], true);
    assert!(value.get("id").is_none());
  }

  #[test]
  fn status_text_overrides_sent_open() {
    let patch = IssuePatch {
      status_text: Some("closed".into()),
      open: Some(true),
      ..Default::default()
    }
    .with_derived_open();
    assert_eq!(patch.open, Some(false));

    let reopened = IssuePatch {
      status_text: Some("in progress".into()),
      ..Default::default()
    }
    .with_derived_open();
    assert_eq!(reopened.open, Some(true));
  }

  #[test]
  fn update_body_accepts_bool_or_text_open() {
    let json: UpdateIssueRequest =
      serde_json::from_value(
        serde_json::json!({
          "_id": "abc",
          "open": false
        })
      )
      .unwrap();
    let (id, patch) = json.into_parts();
    assert_eq!(id.as_deref(), Some("abc"));
    assert_eq!(patch.open, Some(false));

    let text: UpdateIssueRequest =
      serde_json::from_value(
        serde_json::json!({
          "_id": "abc",
          "open": "no"
        })
      )
      .unwrap();
    assert_eq!(
      text.into_parts().1.open,
      Some(false)
    );
  }

  #[test]
  fn empty_id_counts_as_missing() {
    let body = DeleteIssueRequest {
      id: Some(String::new())
    };
    assert!(body.into_id().is_none());
  }

  #[test]
  fn filter_keeps_only_known_fields() {
    let query: IssueListQuery = [
      ("open", "false"),
      ("created_by", "xyz-user-3"),
      ("password", "hunter2"),
      ("project", "other")
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let filter = IssueFilter::from(query);

    assert_eq!(filter.open, Some(false));
    assert_eq!(
      filter.text_fields(),
      vec![("created_by", "xyz-user-3")]
    );
  }

  #[test]
  fn repeated_query_key_keeps_last_value() {
    let query: IssueListQuery = [
      ("open", "false"),
      ("open", "true")
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    assert_eq!(
      IssueFilter::from(query).open,
      Some(true)
    );
  }
}
