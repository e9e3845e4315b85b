//! Long-term retrieval and administration integration tests.

use async_trait::async_trait;
use mneme_config::{LongTermConfig, MnemeConfig};
use mneme_core::{MemoryEngine, MnemeError};
use mneme_memory::{
    Emphasis, LongTermRecord, MemoryCategory, MemoryError, NewRecord, RetrievalResult,
    SqliteMemoryStore, VectorStore,
};
use mneme_protocol::{CollaboratorError, Embedder};
use mneme_test_utils::{FailingCompleter, FailingEmbedder, MapEmbedder};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use uuid::Uuid;

const DIM: usize = 3;

fn build_engine(
    long_term: LongTermConfig,
    embedder: Arc<dyn Embedder>,
) -> (MemoryEngine, Arc<SqliteMemoryStore>) {
    let store = Arc::new(SqliteMemoryStore::open_in_memory(DIM).expect("store"));
    let config = MnemeConfig::builder()
        .long_term(LongTermConfig {
            embedding_dim: DIM,
            ..long_term
        })
        .build();
    let engine = MemoryEngine::builder(Arc::new(FailingCompleter::new("unused")), embedder)
        .config(config)
        .sqlite_store(store.clone())
        .build()
        .expect("engine");
    (engine, store)
}

async fn insert(
    store: &SqliteMemoryStore,
    owner: &str,
    content: &str,
    importance: u8,
    embedding: [f32; 3],
) {
    store
        .insert(
            owner,
            NewRecord {
                content: content.to_string(),
                category: MemoryCategory::Fact,
                importance,
                embedding: embedding.to_vec(),
            },
        )
        .await
        .expect("insert");
}

/// Similarity 0.60 with importance 10 ranks at 0.72, a medium-tier memory.
#[tokio::test]
async fn blends_importance_into_relevance() {
    let embedder = Arc::new(MapEmbedder::new(DIM).with("query", vec![1.0, 0.0, 0.0]));
    let (engine, store) = build_engine(
        LongTermConfig {
            min_similarity: 0.5,
            ..LongTermConfig::default()
        },
        embedder,
    );
    insert(&store, "alice", "Owns a boat", 10, [0.6, 0.8, 0.0]).await;

    let results = engine.retrieve_for_query("alice", "query").await.expect("retrieve");
    assert_eq!(results.len(), 1);
    assert!((results[0].similarity - 0.6).abs() < 1e-6);
    assert!((results[0].relevance - 0.72).abs() < 1e-6);
    assert_eq!(results[0].emphasis, Emphasis::Medium);
}

/// Retrieval honours the similarity floor and top-k, ranked by relevance.
#[tokio::test]
async fn respects_floor_top_k_and_ranking() {
    let embedder = Arc::new(MapEmbedder::new(DIM).with("query", vec![1.0, 0.0, 0.0]));
    let (engine, store) = build_engine(
        LongTermConfig {
            top_k: 2,
            min_similarity: 0.7,
            ..LongTermConfig::default()
        },
        embedder,
    );
    insert(&store, "alice", "exact but trivial", 1, [1.0, 0.0, 0.0]).await;
    insert(&store, "alice", "close and vital", 10, [0.9, 0.3, 0.0]).await;
    insert(&store, "alice", "close enough", 5, [0.8, 0.5, 0.0]).await;
    insert(&store, "alice", "unrelated", 10, [0.0, 1.0, 0.0]).await;
    insert(&store, "bob", "someone else", 10, [1.0, 0.0, 0.0]).await;

    let results = engine.retrieve_for_query("alice", "query").await.expect("retrieve");
    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(result.similarity >= 0.7);
        assert_eq!(result.record.owner_id, "alice");
    }
    let order: Vec<_> = results.iter().map(|r| r.record.content.as_str()).collect();
    assert_eq!(order, vec!["close and vital", "exact but trivial"]);
    assert!(results[0].relevance >= results[1].relevance);
}

/// Returned records are touched; filtered-out records are not.
#[tokio::test]
async fn touches_returned_records() {
    let embedder = Arc::new(MapEmbedder::new(DIM).with("query", vec![1.0, 0.0, 0.0]));
    let (engine, store) = build_engine(LongTermConfig::default(), embedder);
    insert(&store, "alice", "hit", 5, [1.0, 0.0, 0.0]).await;
    insert(&store, "alice", "miss", 5, [0.0, 1.0, 0.0]).await;

    engine.retrieve_for_query("alice", "query").await.expect("retrieve");
    engine.retrieve_for_query("alice", "query").await.expect("retrieve");

    let records = engine.list_memories("alice").await.expect("list");
    let hit = records.iter().find(|r| r.content == "hit").expect("hit");
    let miss = records.iter().find(|r| r.content == "miss").expect("miss");
    assert_eq!(hit.access_count, 2);
    assert_eq!(miss.access_count, 0);
}

/// Long-term store whose batch touch always fails.
struct BrokenTouches(Arc<SqliteMemoryStore>);

#[async_trait]
impl VectorStore for BrokenTouches {
    fn dimension(&self) -> usize {
        self.0.dimension()
    }

    async fn insert(&self, owner_id: &str, record: NewRecord) -> Result<Uuid, MemoryError> {
        self.0.insert(owner_id, record).await
    }

    async fn search(
        &self,
        owner_id: &str,
        query_embedding: &[f32],
        k: usize,
        min_similarity: f64,
    ) -> Result<Vec<RetrievalResult>, MemoryError> {
        self.0.search(owner_id, query_embedding, k, min_similarity).await
    }

    async fn touch_many(&self, _ids: &[Uuid]) -> Result<usize, MemoryError> {
        Err(MemoryError::InvalidParameter("touch rejected".to_string()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<LongTermRecord>, MemoryError> {
        self.0.get(id).await
    }

    async fn list_all(&self, owner_id: &str) -> Result<Vec<LongTermRecord>, MemoryError> {
        self.0.list_all(owner_id).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, MemoryError> {
        self.0.delete(id).await
    }

    async fn purge_owner(&self, owner_id: &str) -> Result<usize, MemoryError> {
        self.0.purge_owner(owner_id).await
    }

    async fn count(&self, owner_id: &str) -> Result<usize, MemoryError> {
        VectorStore::count(self.0.as_ref(), owner_id).await
    }
}

/// Access counts move together: a failed batch touch leaves every hit as it was.
#[tokio::test]
async fn failed_touch_leaves_no_partial_updates() {
    let store = Arc::new(SqliteMemoryStore::open_in_memory(DIM).expect("store"));
    let embedder = Arc::new(MapEmbedder::new(DIM).with("query", vec![1.0, 0.0, 0.0]));
    let engine = MemoryEngine::builder(Arc::new(FailingCompleter::new("unused")), embedder)
        .config(
            MnemeConfig::builder()
                .long_term(LongTermConfig {
                    embedding_dim: DIM,
                    ..LongTermConfig::default()
                })
                .build(),
        )
        .vector_store(Arc::new(BrokenTouches(store.clone())))
        .conversation_store(store.clone())
        .build()
        .expect("engine");
    insert(&store, "alice", "first hit", 5, [1.0, 0.0, 0.0]).await;
    insert(&store, "alice", "second hit", 5, [0.9, 0.1, 0.0]).await;

    let err = engine.retrieve_for_query("alice", "query").await.unwrap_err();
    assert!(matches!(err, MnemeError::StorageUnavailable(_)));
    let counts: Vec<u64> = store
        .list_all("alice")
        .await
        .expect("list")
        .into_iter()
        .map(|record| record.access_count)
        .collect();
    assert_eq!(counts, vec![0, 0]);
}

/// No match is an empty result, not an error.
#[tokio::test]
async fn empty_results_when_nothing_clears_floor() {
    let embedder = Arc::new(MapEmbedder::new(DIM).with("query", vec![1.0, 0.0, 0.0]));
    let (engine, store) = build_engine(LongTermConfig::default(), embedder);
    insert(&store, "alice", "orthogonal", 9, [0.0, 0.0, 1.0]).await;
    let results = engine.retrieve_for_query("alice", "query").await.expect("retrieve");
    assert!(results.is_empty());
}

/// Embedding failures surface as external call failures.
#[tokio::test]
async fn embed_failure_surfaces() {
    let (engine, _store) = build_engine(LongTermConfig::default(), Arc::new(FailingEmbedder::new()));
    let err = engine.retrieve_for_query("alice", "query").await.unwrap_err();
    assert!(matches!(
        err,
        MnemeError::ExternalCallFailed(CollaboratorError::Embedding(_))
    ));
}

/// Wrong-sized query embeddings are reported as embedder faults.
#[tokio::test]
async fn wrong_dimension_embedding_surfaces() {
    let embedder = Arc::new(MapEmbedder::new(DIM).with("query", vec![1.0, 0.0]));
    let (engine, _store) = build_engine(LongTermConfig::default(), embedder);
    let err = engine.retrieve_for_query("alice", "query").await.unwrap_err();
    assert!(matches!(err, MnemeError::ExternalCallFailed(_)));
}

/// Purging one owner leaves concurrent inserts for other owners intact.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn purge_owner_isolated_from_other_owners() {
    let (engine, store) = build_engine(LongTermConfig::default(), Arc::new(MapEmbedder::new(DIM)));
    for idx in 0..5 {
        insert(&store, "alice", &format!("alice {idx}"), 5, [1.0, 0.0, 0.0]).await;
    }
    let engine = Arc::new(engine);

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for idx in 0..10 {
                insert(&store, "bob", &format!("bob {idx}"), 5, [0.0, 1.0, 0.0]).await;
                tokio::task::yield_now().await;
            }
        })
    };
    let purged = engine.purge_owner("alice").await.expect("purge");
    writer.await.expect("writer");

    assert_eq!(purged, 5);
    assert!(engine.list_memories("alice").await.expect("list").is_empty());
    assert_eq!(engine.list_memories("bob").await.expect("list").len(), 10);
    let stats = engine.stats("bob", "any-session").await.expect("stats");
    assert_eq!(stats.long_term, 10);
}

/// Deleting a memory reports whether it existed.
#[tokio::test]
async fn delete_memory_reports_existence() {
    let (engine, store) = build_engine(LongTermConfig::default(), Arc::new(MapEmbedder::new(DIM)));
    insert(&store, "alice", "temporary", 5, [1.0, 0.0, 0.0]).await;
    let id = engine.list_memories("alice").await.expect("list")[0].id;
    assert!(engine.delete_memory(id).await.expect("delete"));
    assert!(!engine.delete_memory(id).await.expect("delete again"));
}

/// Empty owner ids are rejected.
#[tokio::test]
async fn rejects_empty_owner_id() {
    let (engine, _store) = build_engine(LongTermConfig::default(), Arc::new(MapEmbedder::new(DIM)));
    let err = engine.retrieve_for_query("", "query").await.unwrap_err();
    assert!(matches!(err, MnemeError::InvariantViolation(_)));
    assert!(engine.list_memories("").await.is_err());
}

/// An embedder whose dimension disagrees with config is rejected up front.
#[test]
fn rejects_mismatched_embedder_dimension() {
    let err = MemoryEngine::builder(
        Arc::new(FailingCompleter::new("unused")),
        Arc::new(MapEmbedder::new(DIM + 1)),
    )
    .config(
        MnemeConfig::builder()
            .long_term(LongTermConfig {
                embedding_dim: DIM,
                ..LongTermConfig::default()
            })
            .build(),
    )
    .build()
    .unwrap_err();
    assert!(matches!(err, MnemeError::InvariantViolation(_)));
}
