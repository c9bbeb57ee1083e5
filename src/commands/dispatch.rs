use std::collections::HashMap;

use bson::{Bson, Document};
use futures_util::TryStreamExt;
use mongodb::options::UpdateModifications;
use mongodb::Database;
use serde_json::{json, Map, Value};

use super::{Action, Command, UpdateSpec};
use crate::core::document::{bson_to_json, document_to_json};
use crate::core::errors::GatewayError;

/// Runs one command against `db` and returns the driver's answer as JSON.
///
/// Reads come back as an array of documents, writes as the acknowledgement
/// object a JavaScript client would see (`insertedCount`, `matchedCount`,
/// `deletedCount`, ...).
pub async fn execute(db: &Database, command: Command) -> Result<Value, GatewayError> {
    let coll = db.collection::<Document>(&command.collection);
    tracing::debug!(
        database = db.name(),
        collection = %command.collection,
        action = command.action.name(),
        "dispatching command"
    );

    match command.action {
        Action::Query {
            filter,
            projection,
            limit,
        } => {
            let cursor = coll.find(filter).projection(projection).limit(limit).await?;
            let docs: Vec<Document> = cursor.try_collect().await?;
            Ok(documents_to_json(&docs))
        }
        Action::Aggregate { pipeline } => {
            let cursor = coll.aggregate(pipeline).await?;
            let docs: Vec<Document> = cursor.try_collect().await?;
            Ok(documents_to_json(&docs))
        }
        Action::Insert { documents } => {
            // The driver refuses an empty batch; nothing to insert is not an error here.
            if documents.is_empty() {
                return Ok(insert_ack(&HashMap::new()));
            }
            let result = coll.insert_many(documents).await?;
            Ok(insert_ack(&result.inserted_ids))
        }
        Action::Update { filter, update } => {
            if update.is_noop() {
                let matched = coll.count_documents(filter).await?;
                return Ok(update_ack(matched, 0, None));
            }
            let modifications: UpdateModifications = match update {
                UpdateSpec::Document(doc) => doc.into(),
                UpdateSpec::Pipeline(stages) => stages.into(),
            };
            let result = coll.update_many(filter, modifications).await?;
            Ok(update_ack(
                result.matched_count,
                result.modified_count,
                result.upserted_id.as_ref(),
            ))
        }
        Action::Delete { filter } => {
            let result = coll.delete_many(filter).await?;
            Ok(delete_ack(result.deleted_count))
        }
    }
}

fn documents_to_json(docs: &[Document]) -> Value {
    Value::Array(docs.iter().map(document_to_json).collect())
}

fn insert_ack(inserted_ids: &HashMap<usize, Bson>) -> Value {
    let mut indexes: Vec<_> = inserted_ids.keys().copied().collect();
    indexes.sort_unstable();

    let mut ids = Map::new();
    for idx in indexes {
        ids.insert(idx.to_string(), bson_to_json(&inserted_ids[&idx]));
    }

    json!({
        "acknowledged": true,
        "insertedCount": ids.len(),
        "insertedIds": Value::Object(ids),
    })
}

fn update_ack(matched: u64, modified: u64, upserted_id: Option<&Bson>) -> Value {
    json!({
        "acknowledged": true,
        "matchedCount": matched,
        "modifiedCount": modified,
        "upsertedCount": u64::from(upserted_id.is_some()),
        "upsertedId": upserted_id.map(bson_to_json).unwrap_or(Value::Null),
    })
}

fn delete_ack(deleted: u64) -> Value {
    json!({
        "acknowledged": true,
        "deletedCount": deleted,
    })
}
