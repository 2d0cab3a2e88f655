//! Knowledge store backed by Qdrant.

use std::collections::HashMap;

use chrono::Utc;
use qdrant_client::qdrant::{
    value::Kind, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::Result;
use crate::knowledge::record::KnowledgeRecord;

/// A search hit: the stored record plus its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub id: Option<Uuid>,
    pub record: KnowledgeRecord,
    pub score: f32,
}

/// Vector store holding one point per ingested knowledge record.
pub struct VectorStore {
    client: Qdrant,
    collection: String,
    dimension: u64,
}

impl VectorStore {
    /// Build a store handle without touching the server.
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Qdrant::from_url(&settings.qdrant_url).build()?;
        Ok(Self {
            client,
            collection: settings.collection_name.clone(),
            dimension: settings.embedding_dimension,
        })
    }

    /// Connect and make sure the collection exists (idempotent).
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let store = Self::new(settings)?;
        store.init_collection().await?;
        Ok(store)
    }

    /// Create the collection with cosine distance if it is missing.
    pub async fn init_collection(&self) -> Result<()> {
        let collections = self.client.list_collections().await?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if !exists {
            info!("Creating collection '{}'", self.collection);

            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection).vectors_config(
                        VectorParamsBuilder::new(self.dimension, Distance::Cosine),
                    ),
                )
                .await?;

            info!("Collection created successfully");
        } else {
            debug!("Collection '{}' already exists", self.collection);
        }

        Ok(())
    }

    /// Store one record with its embedding. Vector and metadata are
    /// written as a single point; the generated id is never reused.
    pub async fn upsert(&self, record: &KnowledgeRecord, vector: Vec<f32>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let mut payload = metadata_to_payload(&record.to_metadata());
        payload.insert(
            "created_at".to_string(),
            QdrantValue::from(Utc::now().to_rfc3339()),
        );

        debug!("Upserting knowledge point {}", id);

        self.client
            .upsert_points(UpsertPointsBuilder::new(
                self.collection.clone(),
                vec![PointStruct::new(id.to_string(), vector, payload)],
            ))
            .await?;

        info!("Stored knowledge entry {}", id);
        Ok(id)
    }

    /// Nearest-neighbour search, best match first, at most `top_k` hits.
    ///
    /// An empty query vector yields an empty result without a network
    /// call. Backing-store failures surface as `Err`; the retrieval
    /// path downgrades them to "no results".
    pub async fn search(
        &self,
        vector: Vec<f32>,
        top_k: u64,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredRecord>> {
        if vector.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder =
            SearchPointsBuilder::new(self.collection.clone(), vector, top_k).with_payload(true);
        if let Some(threshold) = score_threshold {
            builder = builder.score_threshold(threshold);
        }

        let results = self.client.search_points(builder).await?;

        let records = results
            .result
            .into_iter()
            .filter_map(|point| {
                let metadata = payload_to_metadata(&point.payload);
                let record = match KnowledgeRecord::from_metadata(&metadata) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!("Skipping unreadable stored point: {}", e);
                        return None;
                    }
                };

                let id = point.id.and_then(|id| {
                    if let qdrant_client::qdrant::point_id::PointIdOptions::Uuid(uuid_str) =
                        id.point_id_options?
                    {
                        Uuid::parse_str(&uuid_str).ok()
                    } else {
                        None
                    }
                });

                Some(ScoredRecord {
                    id,
                    record,
                    score: point.score,
                })
            })
            .collect();

        Ok(records)
    }
}

/// Convert the flat metadata map into a Qdrant payload.
fn metadata_to_payload(metadata: &Map<String, Value>) -> HashMap<String, QdrantValue> {
    metadata
        .iter()
        .map(|(key, value)| {
            let qdrant_value = match value {
                Value::String(s) => QdrantValue::from(s.clone()),
                // Absent info is stored as an explicit null
                _ => QdrantValue {
                    kind: Some(Kind::NullValue(0)),
                },
            };
            (key.clone(), qdrant_value)
        })
        .collect()
}

/// Convert a Qdrant payload back into the flat metadata map.
fn payload_to_metadata(payload: &HashMap<String, QdrantValue>) -> Map<String, Value> {
    payload
        .iter()
        .map(|(key, value)| {
            let json_value = match &value.kind {
                Some(Kind::StringValue(s)) => Value::String(s.clone()),
                _ => Value::Null,
            };
            (key.clone(), json_value)
        })
        .collect()
}
