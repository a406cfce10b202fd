use std::time::Duration;

use siteask_vector::{
    EmbeddingProvider, HashedNgramEmbedding, IndexParams, NswIndex, RemoteVectorStore,
    ShardMetadata, VectorStore,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Build a small shard the way the ETL step would: embed documents,
/// index them, persist both halves of the artifact.
#[tokio::test]
async fn test_shard_artifact_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let bin = tmp.path().join("shard.bin");
    let json = tmp.path().join("shard.json");

    let embedder = HashedNgramEmbedding::new(64);
    let docs = [
        "cast iron skillet care",
        "sourdough starter feeding schedule",
        "trail running shoes for wet terrain",
        "four season tent reviews",
    ];

    let mut entries = Vec::new();
    for (i, doc) in docs.iter().enumerate() {
        entries.push((i as u64, embedder.embed(doc).await.unwrap()));
    }

    let index = NswIndex::build(&entries, &IndexParams::default()).unwrap();
    index.save(&bin).unwrap();
    ShardMetadata {
        domains: vec![
            "kitchen.example.com".into(),
            "kitchen.example.com".into(),
            "outdoors.example.com".into(),
            "outdoors.example.com".into(),
        ],
        dim: 64,
        count: 4,
    }
    .save(&json)
    .unwrap();

    let meta = ShardMetadata::load(&json).unwrap();
    let reloaded = NswIndex::load(&bin).unwrap();
    meta.validate(&reloaded).unwrap();

    let probe = embedder.embed("feeding a sourdough starter").await.unwrap();
    assert_eq!(
        index.query(&probe, 3).unwrap(),
        reloaded.query(&probe, 3).unwrap()
    );
    assert_eq!(reloaded.query(&probe, 3).unwrap()[0].0, 1);
}

#[tokio::test]
async fn test_metadata_mismatch_fails_fast() {
    let tmp = tempfile::tempdir().unwrap();
    let bin = tmp.path().join("shard.bin");

    let entries = vec![(0u64, vec![1.0, 0.0]), (1u64, vec![0.0, 1.0])];
    let index = NswIndex::build(&entries, &IndexParams::default()).unwrap();
    index.save(&bin).unwrap();

    let meta = ShardMetadata {
        domains: vec!["a.example.com".into(), "b.example.com".into()],
        dim: 3,
        count: 2,
    };
    let reloaded = NswIndex::load(&bin).unwrap();
    let err = meta.validate(&reloaded).unwrap_err();
    assert!(err.to_string().contains("dim"));
}

#[tokio::test]
async fn test_remote_store_happy_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                {"id": 9, "distance": 0.4},
                {"id": 3, "distance": 0.1},
            ]
        })))
        .mount(&server)
        .await;

    let store = RemoteVectorStore::new(format!("{}/query", server.uri()), Duration::from_secs(2));
    let hits = store.query(&[0.5, 0.5], 5).await.unwrap();

    // The adapter re-sorts ascending even if the service does not.
    assert_eq!(hits, vec![(3, 0.1), (9, 0.4)]);
}

#[tokio::test]
async fn test_remote_store_server_error_is_retrieval_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = RemoteVectorStore::new(format!("{}/query", server.uri()), Duration::from_secs(2));
    let err = store.query(&[1.0], 3).await.unwrap_err();
    assert!(matches!(err, siteask_core::SiteaskError::Retrieval(_)));
}
