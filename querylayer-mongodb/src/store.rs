use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Bson, Document, doc};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    options::{ClientOptions, FindOptions, IndexOptions},
};
use tracing::{debug, info};

use querylayer_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    index::{ExecutionStats, IndexAck, IndexSpec, PlanStage},
    pipeline::Pipeline,
    query::{Expr, Query, SortDirection},
};

use crate::{
    error::{classify, is_namespace_not_found},
    pipeline::MongoPipelineTranslator,
    query::{MongoQueryTranslator, projection_document, sort_document},
};


#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(uri: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(uri, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let mut options = FindOptions::default();

        options.limit = query.effective_limit().map(|limit| limit as i64);
        options.skip = query.skip.map(|skip| skip as u64);
        if !query.sort.is_empty() {
            options.sort = Some(sort_document(&query.sort));
        }
        if let Some(projection) = &query.projection {
            options.projection = Some(projection_document(projection));
        }

        Ok(
            self.get_collection(collection)
                .find(MongoQueryTranslator::filter(query.filter.as_ref())?)
                .with_options(options)
                .await
                .map_err(classify)?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(classify)?
                .into_iter()
                .map(Bson::Document)
                .collect()
        )
    }

    async fn aggregate(&self, pipeline: Pipeline, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let stages = MongoPipelineTranslator::translate(&pipeline)?;
        debug!(collection, ?stages, "running aggregation");

        Ok(
            self.get_collection(collection)
                .aggregate(stages)
                .await
                .map_err(classify)?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(classify)?
                .into_iter()
                .map(Bson::Document)
                .collect()
        )
    }

    async fn count(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::filter(filter.as_ref())?)
            .await
            .map_err(classify)
    }

    async fn create_index(&self, spec: IndexSpec, collection: &str) -> DocumentStoreResult<IndexAck> {
        let name = spec.name();

        // The server accepts identical requests silently; report them as existing.
        let existing = self.list_indexes(collection).await?;
        if existing
            .iter()
            .any(|index| index.name() == name && index.same_definition(&spec))
        {
            return Ok(IndexAck { name, created: false });
        }

        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                    .keys(index_keys(&spec))
                    .options(
                        IndexOptions::builder()
                            .name(name.clone())
                            .unique(spec.unique)
                            .build()
                    )
                    .build()
            )
            .await
            .map_err(classify)?;

        Ok(IndexAck { name, created: true })
    }

    async fn drop_index(&self, name: &str, collection: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .drop_index(name)
            .await
            .map_err(classify)?;

        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexSpec>> {
        let cursor = match self.get_collection(collection).list_indexes().await {
            Ok(cursor) => cursor,
            Err(error) if is_namespace_not_found(&error) => return Ok(vec![]),
            Err(error) => return Err(classify(error)),
        };

        Ok(
            cursor
                .try_collect::<Vec<IndexModel>>()
                .await
                .map_err(classify)?
                .into_iter()
                .map(index_spec)
                .filter(|spec| spec.name() != "_id_")
                .collect()
        )
    }

    async fn explain(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<ExecutionStats> {
        let reply = self.client
            .database(&self.database)
            .run_command(doc! {
                "explain": {
                    "find": collection,
                    "filter": MongoQueryTranslator::filter(filter.as_ref())?,
                },
                "verbosity": "executionStats",
            })
            .await
            .map_err(classify)?;

        parse_explain(&reply)
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(classify)?;

        names.sort();
        Ok(names)
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;
        info!(database = %self.database, "mongodb client closed");

        Ok(())
    }
}

fn index_keys(spec: &IndexSpec) -> Document {
    spec.keys
        .iter()
        .map(|(field, direction)| (field.clone(), Bson::Int32(direction.signum())))
        .collect()
}

fn index_spec(model: IndexModel) -> IndexSpec {
    let keys = model
        .keys
        .iter()
        .map(|(field, value)| {
            let direction = match value {
                Bson::Int32(n) if *n < 0 => SortDirection::Desc,
                Bson::Int64(n) if *n < 0 => SortDirection::Desc,
                Bson::Double(n) if *n < 0.0 => SortDirection::Desc,
                _ => SortDirection::Asc,
            };
            (field.clone(), direction)
        })
        .collect();

    let (name, unique) = match model.options {
        Some(options) => (options.name, options.unique.unwrap_or(false)),
        None => (None, false),
    };

    IndexSpec { keys, unique, name }
}

/// Reads execution statistics and the access stage from an `explain` reply.
pub(crate) fn parse_explain(reply: &Document) -> DocumentStoreResult<ExecutionStats> {
    let stats = reply
        .get_document("executionStats")
        .map_err(|_| DocumentStoreError::Backend("explain reply has no executionStats".to_string()))?;

    let winning_plan = reply
        .get_document("queryPlanner")
        .and_then(|planner| planner.get_document("winningPlan"))
        .ok();

    let (stage, index_name) = match winning_plan.and_then(access_stage) {
        Some(access) => (
            PlanStage::from(access.get_str("stage").unwrap_or_default().to_string()),
            access.get_str("indexName").ok().map(str::to_string),
        ),
        None => (
            PlanStage::Other(
                winning_plan
                    .and_then(|plan| plan.get_str("stage").ok())
                    .unwrap_or("UNKNOWN")
                    .to_string(),
            ),
            None,
        ),
    };

    Ok(ExecutionStats {
        n_returned: number(stats, "nReturned"),
        total_docs_examined: number(stats, "totalDocsExamined"),
        total_keys_examined: number(stats, "totalKeysExamined"),
        execution_time_millis: number(stats, "executionTimeMillis"),
        stage,
        index_name,
    })
}

// Walks down the plan tree to the collection or index scan.
fn access_stage(plan: &Document) -> Option<&Document> {
    if matches!(plan.get_str("stage"), Ok("COLLSCAN" | "IXSCAN")) {
        return Some(plan);
    }

    ["queryPlan", "inputStage"]
        .iter()
        .find_map(|key| plan.get_document(*key).ok())
        .or_else(|| {
            plan.get_array("inputStages")
                .ok()
                .and_then(|stages| stages.first())
                .and_then(Bson::as_document)
        })
        .and_then(access_stage)
}

fn number(document: &Document, key: &str) -> u64 {
    match document.get(key) {
        Some(Bson::Int32(n)) => (*n).max(0) as u64,
        Some(Bson::Int64(n)) => (*n).max(0) as u64,
        Some(Bson::Double(n)) => n.max(0.0) as u64,
        _ => 0,
    }
}


pub struct MongoDbStoreBuilder {
    uri: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(uri: &str, database: &str) -> Self {
        Self {
            uri: uri.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    /// Parses the URI, creates the client and pings the server.
    ///
    /// # Errors
    ///
    /// An unparsable URI is an `Initialization` error; an unreachable server is
    /// a `Connection` error.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let client = Client::with_options(
            ClientOptions::parse(&self.uri)
                .await
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
        )
        .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| DocumentStoreError::Connection(e.to_string()))?;

        info!(database = %self.database, "connected to mongodb");

        Ok(MongoDbStore::new(client, self.database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explain_reads_the_index_scan_below_a_fetch() {
        let reply = doc! {
            "queryPlanner": {
                "winningPlan": {
                    "stage": "FETCH",
                    "inputStage": { "stage": "IXSCAN", "indexName": "title_1" },
                },
            },
            "executionStats": {
                "nReturned": 1,
                "executionTimeMillis": 0,
                "totalKeysExamined": 1,
                "totalDocsExamined": 1,
            },
        };

        let stats = parse_explain(&reply).unwrap();

        assert_eq!(stats.stage, PlanStage::IxScan);
        assert_eq!(stats.index_name.as_deref(), Some("title_1"));
        assert_eq!(stats.n_returned, 1);
        assert_eq!(stats.total_keys_examined, 1);
    }

    #[test]
    fn explain_reads_slot_based_plans() {
        let reply = doc! {
            "queryPlanner": {
                "winningPlan": {
                    "queryPlan": { "stage": "COLLSCAN" },
                    "slotBasedPlan": {},
                },
            },
            "executionStats": {
                "nReturned": 3i64,
                "executionTimeMillis": 2,
                "totalKeysExamined": 0,
                "totalDocsExamined": 10,
            },
        };

        let stats = parse_explain(&reply).unwrap();

        assert_eq!(stats.stage, PlanStage::CollScan);
        assert_eq!(stats.index_name, None);
        assert_eq!(stats.total_docs_examined, 10);
        assert_eq!(stats.execution_time_millis, 2);
    }

    #[test]
    fn explain_without_stats_is_an_error() {
        assert!(parse_explain(&doc! { "ok": 1 }).is_err());
    }

    #[test]
    fn index_models_round_trip_their_definition() {
        let spec = IndexSpec::on("price").key("title", SortDirection::Desc).unique();

        let model = IndexModel::builder()
            .keys(index_keys(&spec))
            .options(IndexOptions::builder().name(spec.name()).unique(true).build())
            .build();

        let listed = index_spec(model);
        assert!(listed.same_definition(&spec));
        assert_eq!(listed.name(), "price_1_title_-1");
    }
}
