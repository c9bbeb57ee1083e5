use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::commands::Command;
use crate::config::Mode;
use crate::connection::run_once;
use crate::core::errors::GatewayError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureRequest {
    pub connection_string: Option<String>,
    pub database_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub connection_string: Option<String>,
    pub database_name: Option<String>,
    pub command: Option<Value>,
}

type JsonBody<T> = Result<Json<T>, JsonRejection>;

/// `POST /configure`: `{connectionString, databaseName}` -> `{message}`.
pub async fn configure(
    State(state): State<Arc<AppState>>,
    body: JsonBody<ConfigureRequest>,
) -> Result<Json<Value>, GatewayError> {
    let Json(req) = body.map_err(invalid_body)?;
    let (Some(connection_string), Some(database_name)) = (
        present(req.connection_string),
        present(req.database_name),
    ) else {
        return Err(GatewayError::MissingFields);
    };

    state
        .connections
        .configure(&connection_string, &database_name)
        .await?;

    Ok(Json(json!({
        "message": format!("Connected to database '{database_name}'"),
    })))
}

/// `POST /query`: runs one command and answers `{result}`.
pub async fn query(
    State(state): State<Arc<AppState>>,
    body: JsonBody<QueryRequest>,
) -> Result<Json<Value>, GatewayError> {
    let Json(req) = body.map_err(invalid_body)?;

    let result = match state.mode {
        Mode::Stateless => {
            let (Some(connection_string), Some(database_name), Some(command)) = (
                present(req.connection_string),
                present(req.database_name),
                req.command.filter(is_truthy),
            ) else {
                return Err(GatewayError::MissingFields);
            };
            let command = Command::from_json(command)?;
            run_once(&connection_string, &database_name, command).await?
        }
        Mode::Stateful => {
            let Some(command) = req.command.filter(is_truthy) else {
                return Err(GatewayError::MissingFields);
            };
            if !state.connections.is_configured().await {
                return Err(GatewayError::NotConfigured);
            }
            let command = Command::from_json(command)?;
            state.connections.execute(command).await?
        }
    };

    Ok(Json(json!({ "result": result })))
}

/// Empty strings count as missing.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// `false`, `0` and `""` count as a missing command, like `null`.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn invalid_body(rejection: JsonRejection) -> GatewayError {
    GatewayError::InvalidBody(rejection.body_text())
}
