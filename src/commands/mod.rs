use bson::Document;
use serde_json::Value;

use crate::core::document::{json_to_document, json_to_documents};
use crate::core::errors::GatewayError;

mod dispatch;

pub use dispatch::execute;

/// Number of documents a `query` returns when the caller gives no limit.
pub const DEFAULT_QUERY_LIMIT: i64 = 10;

/// One database operation against a single collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub collection: String,
    pub action: Action,
}

/// The supported operations, each with its defaults already applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Query {
        filter: Document,
        projection: Document,
        limit: i64,
    },
    Aggregate {
        pipeline: Vec<Document>,
    },
    Insert {
        documents: Vec<Document>,
    },
    Update {
        filter: Document,
        update: UpdateSpec,
    },
    Delete {
        filter: Document,
    },
}

/// The second argument of an update: either an operator document
/// (`{"$set": ...}`) or an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateSpec {
    Document(Document),
    Pipeline(Vec<Document>),
}

impl UpdateSpec {
    pub fn is_noop(&self) -> bool {
        match self {
            UpdateSpec::Document(doc) => doc.is_empty(),
            UpdateSpec::Pipeline(stages) => stages.is_empty(),
        }
    }
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Query { .. } => "query",
            Action::Aggregate { .. } => "aggregate",
            Action::Insert { .. } => "insert",
            Action::Update { .. } => "update",
            Action::Delete { .. } => "delete",
        }
    }
}

impl Command {
    /// Parses a command from the JSON value found under `command` in a
    /// request body.
    ///
    /// The action is read before anything else, so an unknown or missing
    /// action is reported as such whatever else the value holds.
    pub fn from_json(value: Value) -> Result<Self, GatewayError> {
        let field = |name: &str| value.get(name);

        let action = match field("action").and_then(Value::as_str) {
            Some("query") => Action::Query {
                filter: object_or_empty(field("filter"), "filter")?,
                projection: object_or_empty(field("projection"), "projection")?,
                limit: query_limit(field("limit"))?,
            },
            Some("aggregate") => Action::Aggregate {
                pipeline: objects_or_empty(field("pipeline"), "pipeline")?,
            },
            Some("insert") => Action::Insert {
                documents: objects_or_empty(field("documents"), "documents")?,
            },
            Some("update") => Action::Update {
                filter: object_or_empty(field("filter"), "filter")?,
                update: update_spec(field("update"))?,
            },
            Some("delete") => Action::Delete {
                filter: object_or_empty(field("filter"), "filter")?,
            },
            _ => return Err(GatewayError::UnknownAction),
        };

        let collection = match field("collection") {
            Some(Value::String(name)) if !name.is_empty() => name.clone(),
            Some(Value::String(_)) | Some(Value::Null) | None => {
                return Err(GatewayError::InvalidCommand(
                    "missing collection name".to_string(),
                ))
            }
            Some(other) => {
                return Err(GatewayError::InvalidCommand(format!(
                    "collection: expected a string, found {other}"
                )))
            }
        };

        Ok(Command { collection, action })
    }
}

fn object_or_empty(value: Option<&Value>, field: &str) -> Result<Document, GatewayError> {
    match value {
        None | Some(Value::Null) => Ok(Document::new()),
        Some(v) => json_to_document(v).map_err(|e| in_field(field, e)),
    }
}

fn objects_or_empty(value: Option<&Value>, field: &str) -> Result<Vec<Document>, GatewayError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(v) => json_to_documents(v).map_err(|e| in_field(field, e)),
    }
}

fn query_limit(value: Option<&Value>) -> Result<i64, GatewayError> {
    match value {
        None | Some(Value::Null) => Ok(DEFAULT_QUERY_LIMIT),
        Some(v) => match v.as_i64() {
            Some(0) => Ok(DEFAULT_QUERY_LIMIT),
            Some(n) => Ok(n),
            None => Err(GatewayError::InvalidCommand(format!(
                "limit: expected an integer, found {v}"
            ))),
        },
    }
}

fn update_spec(value: Option<&Value>) -> Result<UpdateSpec, GatewayError> {
    match value {
        Some(Value::Array(_)) => objects_or_empty(value, "update").map(UpdateSpec::Pipeline),
        other => object_or_empty(other, "update").map(UpdateSpec::Document),
    }
}

fn in_field(field: &str, err: GatewayError) -> GatewayError {
    match err {
        GatewayError::InvalidCommand(msg) => GatewayError::InvalidCommand(format!("{field}: {msg}")),
        other => other,
    }
}
