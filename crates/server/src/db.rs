use std::path::Path;
use std::sync::Arc;

use crate::app_state::AppState;
use crate::config::{
  ConfigError,
  ServerConfig,
  StoreBackend
};
use crate::store::{
  IssueStore,
  MongoIssueStore,
  SqliteIssueStore
};

/// Builds the configured issue store. Any connection failure is
/// fatal to startup.
pub async fn connect_db(
  config: &ServerConfig,
  config_path: &Path
) -> Result<AppState, ConfigError> {
  let store: Arc<dyn IssueStore> =
    match config.backend()? {
      | StoreBackend::MongoDb => {
        let mongo = config.mongodb()?;
        let uri = mongo.uri()?;

        let store = MongoIssueStore::connect(
          &uri,
          &mongo.database,
          &mongo.collection
        )
        .await
        .map_err(|e| {
          tracing::error!(
            error = %e,
            "could not connect to mongodb"
          );
          ConfigError::Invalid(format!(
            "mongodb connect failed: {e}"
          ))
        })?;

        Arc::new(store)
      }
      | StoreBackend::Sqlite => {
        let base_dir = config_path
          .parent()
          .ok_or_else(|| {
            ConfigError::Invalid(
              "config path has no parent"
                .into()
            )
          })?;

        let path =
          config.sqlite_path(base_dir);

        let store =
          SqliteIssueStore::open(&path)
            .await
            .map_err(|e| {
              tracing::error!(
                error = %e,
                path = %path.display(),
                "could not open sqlite store"
              );
              ConfigError::Invalid(
                format!(
                  "sqlite connect \
                   failed: {e}"
                )
              )
            })?;

        tracing::info!(
          path = %path.display(),
          "sqlite store opened"
        );

        Arc::new(store)
      }
    };

  Ok(AppState::new(store))
}

pub async fn reset_server_data(
  state: &AppState
) -> Result<(), ConfigError> {
  let removed = state
    .store
    .clear()
    .await
    .map_err(|e| {
      ConfigError::Invalid(format!(
        "cleanup issues failed: {e}"
      ))
    })?;

  tracing::warn!(
    removed,
    "dev reset cleared all issues"
  );

  Ok(())
}
