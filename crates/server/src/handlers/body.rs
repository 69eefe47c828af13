use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{
  Form,
  FromRequest,
  Request
};
use axum::http::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;

use crate::errors::ServerError;

const INVALID_BODY: &str =
  "invalid request body";

/// Request body decoded from JSON or from a urlencoded form,
/// depending on `Content-Type`. An empty body decodes as
/// `T::default()`.
#[derive(Debug)]

pub struct IssueBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for IssueBody<T>
where
  T: DeserializeOwned + Default,
  S: Send + Sync
{
  type Rejection = ServerError;

  async fn from_request(
    req: Request,
    state: &S
  ) -> Result<Self, Self::Rejection> {
    if is_form(&req) {
      let Form(value) =
        Form::<T>::from_request(
          req, state
        )
        .await
        .map_err(|e| {
          tracing::debug!(
            error = %e,
            "form body rejected"
          );
          ServerError::bad_request(
            INVALID_BODY
          )
        })?;

      return Ok(Self(value));
    }

    let bytes =
      Bytes::from_request(req, state)
        .await
        .map_err(|e| {
          tracing::debug!(
            error = %e,
            "body read failed"
          );
          ServerError::bad_request(
            INVALID_BODY
          )
        })?;

    decode_json(&bytes).map(Self)
  }
}

fn is_form(req: &Request) -> bool {
  req
    .headers()
    .get(CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| {
      v.starts_with(
        "application/x-www-form-urlencoded"
      )
    })
}

fn decode_json<T>(
  bytes: &[u8]
) -> Result<T, ServerError>
where
  T: DeserializeOwned + Default
{
  if bytes
    .iter()
    .all(u8::is_ascii_whitespace)
  {
    return Ok(T::default());
  }

  serde_json::from_slice(bytes).map_err(
    |e| {
      tracing::debug!(
        error = %e,
        "json body rejected"
      );
      ServerError::bad_request(
        INVALID_BODY
      )
    }
  )
}
