use std::path::{
  Path,
  PathBuf
};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_URI_ENV: &str =
  "MONGO_URI";
pub const DEFAULT_COLLECTION: &str =
  "issues";

#[derive(Debug, Error)]

pub enum ConfigError {
  #[error("config IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("config parse error: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("config invalid: {0}")]
  Invalid(String)
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]

pub enum AppMode {
  Dev,
  Prod
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]

pub enum StoreBackend {
  MongoDb,
  Sqlite
}

#[derive(Debug, Deserialize)]

pub struct ServerConfig {
  pub app:      AppConfig,
  pub http:     HttpConfig,
  pub database: DatabaseConfig,
  pub mongodb:  Option<MongoConfig>,
  #[serde(default)]
  pub sqlite:   SqliteConfig,
  pub logging:  LoggingConfig,
  pub dev:      DevConfig
}

#[derive(Debug, Deserialize)]

pub struct AppConfig {
  pub mode: AppMode
}

#[derive(Debug, Deserialize)]

pub struct HttpConfig {
  pub host: String,
  pub port: u16
}

#[derive(Debug, Deserialize)]

pub struct DatabaseConfig {
  pub backend: String
}

#[derive(Debug, Deserialize)]

pub struct MongoConfig {
  #[serde(default = "default_uri_env")]
  pub uri_env:    String,
  pub database:   String,
  #[serde(
    default = "default_collection"
  )]
  pub collection: String
}

#[derive(Debug, Default, Deserialize)]

pub struct SqliteConfig {
  #[serde(default)]
  pub path: String
}

#[derive(Debug, Deserialize)]

pub struct LoggingConfig {
  pub level: Option<String>
}

#[derive(Debug, Deserialize)]

pub struct DevConfig {
  pub reset_on_start: bool
}

fn default_uri_env() -> String {
  DEFAULT_URI_ENV.to_string()
}

fn default_collection() -> String {
  DEFAULT_COLLECTION.to_string()
}

impl ServerConfig {
  /// Reads the TOML at `path` and validates it against
  /// `schemas/server.schema.json` in the same directory before
  /// deserializing.
  pub async fn load(
    path: &Path
  ) -> Result<Self, ConfigError> {
    let base_dir = path
      .parent()
      .ok_or_else(|| {
        ConfigError::Invalid(
          "config path has no parent"
            .into()
        )
      })?;

    let schema_path = base_dir
      .join("schemas")
      .join("server.schema.json");

    let schema =
      load_schema(&schema_path).await?;

    let content =
      tokio::fs::read_to_string(path)
        .await?;

    validate_toml(
      &schema,
      &content,
      &path.display().to_string()
    )?;

    let config: ServerConfig =
      toml::from_str(&content)?;

    Ok(config)
  }

  pub fn backend(
    &self
  ) -> Result<StoreBackend, ConfigError>
  {
    match self
      .database
      .backend
      .trim()
      .to_lowercase()
      .as_str()
    {
      | "mongodb" => {
        Ok(StoreBackend::MongoDb)
      }
      | "sqlite" => {
        Ok(StoreBackend::Sqlite)
      }
      | other => {
        Err(ConfigError::Invalid(
          format!(
            "invalid database.backend \
             '{other}'"
          )
        ))
      }
    }
  }

  pub fn mongodb(
    &self
  ) -> Result<&MongoConfig, ConfigError>
  {
    self.mongodb.as_ref().ok_or_else(
      || {
        ConfigError::Invalid(
          "mongodb section missing"
            .into()
        )
      }
    )
  }

  pub fn sqlite_path(
    &self,
    base_dir: &Path
  ) -> PathBuf {
    let raw = self.sqlite.path.trim();

    if raw.is_empty() {
      return base_dir
        .join("server.sqlite");
    }

    base_dir.join(raw)
  }
}

impl MongoConfig {
  /// Connection string from the environment variable named by
  /// `uri_env`. Absence is fatal to startup.
  pub fn uri(
    &self
  ) -> Result<String, ConfigError> {
    read_uri(&self.uri_env, |key| {
      std::env::var(key).ok()
    })
  }
}

fn read_uri(
  key: &str,
  lookup: impl Fn(&str) -> Option<String>
) -> Result<String, ConfigError> {
  match lookup(key) {
    | Some(value)
      if !value.trim().is_empty() =>
    {
      Ok(value.trim().to_string())
    }
    | _ => {
      Err(ConfigError::Invalid(format!(
        "environment variable {key} \
         is not set"
      )))
    }
  }
}

async fn load_schema(
  path: &Path
) -> Result<String, ConfigError> {
  let content =
    tokio::fs::read_to_string(path)
      .await
      .map_err(|_| {
        ConfigError::Invalid(format!(
          "schema not found at {}",
          path.display()
        ))
      })?;

  Ok(content)
}

fn validate_toml(
  schema: &str,
  toml_input: &str,
  name: &str
) -> Result<(), ConfigError> {
  let schema_json: serde_json::Value =
    serde_json::from_str(schema)
      .map_err(|e| {
        ConfigError::Invalid(format!(
          "schema parse error: {e}"
        ))
      })?;

  let compiled =
    jsonschema::validator_for(
      &schema_json
    )
    .map_err(|e| {
      ConfigError::Invalid(format!(
        "schema compile error: {e}"
      ))
    })?;

  let toml_value: toml::Value =
    toml::from_str(toml_input)
      .map_err(|e| {
        ConfigError::Invalid(format!(
          "{name}: {e}"
        ))
      })?;

  let json_value =
    serde_json::to_value(toml_value)
      .map_err(|e| {
        ConfigError::Invalid(
          e.to_string()
        )
      })?;

  let mut errors =
    compiled.iter_errors(&json_value);

  if let Some(err) = errors.next() {
    let mut messages =
      vec![err.to_string()];

    for e in errors.take(4) {
      messages.push(e.to_string());
    }

    return Err(ConfigError::Invalid(
      format!(
        "schema validation failed for \
         {name}: {}",
        messages.join("; ")
      )
    ));
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  const SCHEMA: &str = include_str!(
    "../res/schemas/server.schema.json"
  );

  const SAMPLE: &str = include_str!(
    "../res/config.toml"
  );

  async fn write_config(
    dir: &Path,
    content: &str
  ) -> PathBuf {
    let schemas = dir.join("schemas");
    tokio::fs::create_dir_all(&schemas)
      .await
      .unwrap();
    tokio::fs::write(
      schemas.join("server.schema.json"),
      SCHEMA
    )
    .await
    .unwrap();

    let path = dir.join("config.toml");
    tokio::fs::write(&path, content)
      .await
      .unwrap();
    path
  }

  #[tokio::test]
  async fn loads_bundled_config() {
    let dir = tempfile::tempdir().unwrap();
    let path =
      write_config(dir.path(), SAMPLE).await;

    let config =
      ServerConfig::load(&path).await.unwrap();

    assert_eq!(config.app.mode, AppMode::Dev);
    assert_eq!(
      config.backend().unwrap(),
      StoreBackend::MongoDb
    );
    let mongo = config.mongodb().unwrap();
    assert_eq!(mongo.uri_env, "MONGO_URI");
    assert_eq!(mongo.collection, "issues");
  }

  #[tokio::test]
  async fn rejects_unknown_backend() {
    let dir = tempfile::tempdir().unwrap();
    let content = SAMPLE.replace(
      "backend = \"mongodb\"",
      "backend = \"redis\""
    );
    let path =
      write_config(dir.path(), &content).await;

    let err = ServerConfig::load(&path)
      .await
      .unwrap_err();

    assert!(
      err
        .to_string()
        .contains("schema validation failed")
    );
  }

  #[tokio::test]
  async fn missing_schema_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    tokio::fs::write(&path, SAMPLE)
      .await
      .unwrap();

    let err = ServerConfig::load(&path)
      .await
      .unwrap_err();

    assert!(
      err.to_string().contains("schema not found")
    );
  }

  #[tokio::test]
  async fn sqlite_path_defaults_next_to_config() {
    let dir = tempfile::tempdir().unwrap();
    let content = SAMPLE.replace(
      "path = \"server.sqlite\"",
      "path = \"\""
    );
    let path =
      write_config(dir.path(), &content).await;
    let config =
      ServerConfig::load(&path).await.unwrap();

    assert_eq!(
      config.sqlite_path(dir.path()),
      dir.path().join("server.sqlite")
    );
  }

  #[test]
  fn uri_requires_non_empty_value() {
    let missing =
      read_uri("MONGO_URI", |_| None);
    assert!(missing.is_err());

    let blank = read_uri("MONGO_URI", |_| {
      Some("   ".to_string())
    });
    assert!(blank.is_err());

    let found = read_uri("MONGO_URI", |_| {
      Some(
        "mongodb://localhost:27017"
          .to_string()
      )
    })
    .unwrap();
    assert_eq!(
      found,
      "mongodb://localhost:27017"
    );
  }
}
