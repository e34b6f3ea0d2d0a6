/// End-to-end integration tests for the ragdex pipeline.
///
/// Tests the complete flow:
///   Config → Store → Embedder → Indexer → Retriever → Answer
use std::sync::Arc;

use ragdex::RagError;
use ragdex::answer::{self, Answer, SynthError, Synthesizer};
use ragdex::config::Config;
use ragdex::embedder::Embedder;
use ragdex::embedder::mock::MockEmbedder;
use ragdex::indexer::chunker::{Chunker, chunk_text};
use ragdex::indexer::core::Indexer;
use ragdex::retrieval::Retriever;
use ragdex::store::models::Page;
use ragdex::store::{SharedStore, Store, StorePaths};
use tempfile::tempdir;

fn open(dir: &std::path::Path) -> (SharedStore, Indexer, Retriever) {
    let store = Store::open(StorePaths::in_dir(dir)).unwrap().into_shared();
    let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(128));
    let indexer = Indexer::new(store.clone(), embedder.clone(), Chunker::default());
    let retriever = Retriever::new(store.clone(), embedder);
    (store, indexer, retriever)
}

fn filler(len: usize) -> String {
    "lorem ipsum dolor sit amet "
        .chars()
        .cycle()
        .take(len)
        .collect()
}

struct Echo;

impl Synthesizer for Echo {
    fn synthesize(&self, prompt: &str) -> Result<String, SynthError> {
        Ok(format!("saw {} chars", prompt.len()))
    }

    fn model(&self) -> &str {
        "echo"
    }
}

/// A single 1000-character page is exactly one window.
#[tokio::test]
async fn test_exact_window_page() {
    let dir = tempdir().unwrap();
    let (store, indexer, _) = open(dir.path());

    let report = indexer
        .ingest("doc-a", &[Page::new(1, filler(1000))])
        .await
        .unwrap();
    assert_eq!(report.page_count, 1);
    assert_eq!(report.chunk_count, 1);
    assert_eq!(store.read().await.index().size(), 1);
}

/// 2400 characters give windows at 0, 800 and 1600.
#[tokio::test]
async fn test_overlapping_windows() {
    let text = filler(2400);
    let chunks = chunk_text(&text, 1000, 200).unwrap();
    assert_eq!(chunks.len(), 3);
    let chars: Vec<char> = text.chars().collect();
    for (chunk, start) in chunks.iter().zip([0usize, 800, 1600]) {
        let expected: String = chars[start..(start + 1000).min(chars.len())].iter().collect();
        assert_eq!(chunk, &expected);
    }

    let dir = tempdir().unwrap();
    let (store, indexer, _) = open(dir.path());
    let report = indexer.ingest("doc-b", &[Page::new(1, text)]).await.unwrap();
    assert_eq!(report.chunk_count, 3);
    assert_eq!(store.read().await.metadata().len(), 3);
}

/// Blank pages count but index nothing.
#[tokio::test]
async fn test_blank_document() {
    let dir = tempdir().unwrap();
    let (store, indexer, _) = open(dir.path());
    indexer
        .ingest("seed", &[Page::new(1, "something to start with")])
        .await
        .unwrap();

    let report = indexer
        .ingest(
            "blank",
            &[Page::new(1, ""), Page::new(2, ""), Page::new(3, "")],
        )
        .await
        .unwrap();
    assert_eq!(report.page_count, 3);

    let guard = store.read().await;
    assert_eq!(guard.index().size(), 1);
    assert_eq!(guard.metadata().len(), 1);
}

/// `k` larger than the index returns everything that resolves.
#[tokio::test]
async fn test_k_larger_than_index() {
    let dir = tempdir().unwrap();
    let (_, indexer, retriever) = open(dir.path());
    indexer
        .ingest(
            "three",
            &[
                Page::new(1, "apples are red"),
                Page::new(2, "bananas are yellow"),
                Page::new(3, "grapes are purple"),
            ],
        )
        .await
        .unwrap();

    let passages = retriever.retrieve("bananas are yellow", 5).await.unwrap();
    assert_eq!(passages.len(), 3);
    assert_eq!(passages[0].page_number, 2);
    assert!(passages.windows(2).all(|w| w[0].distance <= w[1].distance));
}

/// A store that was never created answers with nothing.
#[tokio::test]
async fn test_never_created_store() {
    let dir = tempdir().unwrap();
    let (store, _, retriever) = open(&dir.path().join("does/not/exist"));
    assert!(retriever.retrieve("hello?", 3).await.unwrap().is_empty());
    assert!(!store.read().await.exists());
}

/// Ids added by an ingestion are exactly `[old_size, new_size)`.
#[tokio::test]
async fn test_ingest_extends_both_stores_in_step() {
    let dir = tempdir().unwrap();
    let (store, indexer, _) = open(dir.path());
    indexer
        .ingest("first", &[Page::new(1, filler(1700))])
        .await
        .unwrap();

    let old_size = store.read().await.index().size();
    let old_entries = store.read().await.metadata().len();
    indexer
        .ingest(
            "second",
            &[Page::new(1, filler(900)), Page::new(2, filler(2500))],
        )
        .await
        .unwrap();

    let guard = store.read().await;
    let new_size = guard.index().size();
    let added = &guard.metadata().entries()[old_entries..];
    assert_eq!(new_size - old_size, added.len() as u64);
    let ids: Vec<u64> = added.iter().map(|e| e.ordinal_id).collect();
    assert_eq!(ids, (old_size..new_size).collect::<Vec<_>>());
    assert!(added.iter().all(|e| e.document_id == "second"));
    assert!(guard.alignment_check());
}

/// Re-ingesting the same document id appends a second copy.
#[tokio::test]
async fn test_reingest_appends() {
    let dir = tempdir().unwrap();
    let (store, indexer, _) = open(dir.path());
    let pages = [Page::new(1, "same text twice")];
    indexer.ingest("dup", &pages).await.unwrap();
    indexer.ingest("dup", &pages).await.unwrap();

    let guard = store.read().await;
    let docs = guard.metadata().documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].chunks, 2);
    assert_eq!(guard.index().size(), 2);
}

/// Everything written by one process is visible after reopening.
#[tokio::test]
async fn test_persisted_across_reopen() {
    let dir = tempdir().unwrap();
    {
        let (_, indexer, _) = open(dir.path());
        indexer
            .ingest(
                "manual",
                &[
                    Page::new(1, "Press the red button to start."),
                    Page::new(2, "Hold the blue button to stop."),
                ],
            )
            .await
            .unwrap();
    }

    let (store, _, retriever) = open(dir.path());
    {
        let guard = store.read().await;
        assert!(guard.exists());
        assert_eq!(guard.index().size(), 2);
        assert!(guard.alignment_check());
    }
    let passages = retriever.retrieve("blue button stop", 1).await.unwrap();
    assert_eq!(passages.len(), 1);
    assert_eq!(passages[0].document_id, "manual");
    assert_eq!(passages[0].page_number, 2);
}

/// Vectors without metadata (a crash between the two writes) are skipped
/// at query time and flagged by the alignment check.
#[tokio::test]
async fn test_lost_metadata_is_tolerated() {
    let dir = tempdir().unwrap();
    let paths = StorePaths::in_dir(dir.path());
    {
        let (_, indexer, _) = open(dir.path());
        indexer
            .ingest("doc", &[Page::new(1, "kept passage")])
            .await
            .unwrap();
    }

    // Append one vector to the index artifact only.
    let mut index = ragdex::store::vectors::VectorIndex::load(&paths.index).unwrap();
    let orphan = MockEmbedder::new(128).embed("orphan passage").unwrap();
    index.insert_batch(&[orphan]).unwrap();
    index.save(&paths.index).unwrap();

    let (store, _, retriever) = open(dir.path());
    assert!(!store.read().await.alignment_check());

    let passages = retriever.retrieve("orphan passage", 5).await.unwrap();
    assert_eq!(passages.len(), 1);
    assert_eq!(passages[0].text, "kept passage");
}

#[tokio::test]
async fn test_invalid_chunking_is_rejected() {
    assert!(matches!(
        Chunker::new(200, 200),
        Err(RagError::InvalidConfiguration(_))
    ));

    let mut config = Config::default();
    config.chunking.overlap = 1500;
    assert!(config.validate().is_err());
}

#[tokio::test]
async fn test_ask_end_to_end() {
    let dir = tempdir().unwrap();
    let (_, indexer, retriever) = open(dir.path());
    indexer
        .ingest(
            "guide",
            &[
                Page::new(1, "Chapter one covers setup."),
                Page::new(2, "Chapter two covers backups and restore."),
                Page::new(3, "Backups run nightly at two."),
            ],
        )
        .await
        .unwrap();

    let answer = answer::answer_question(&retriever, Arc::new(Echo), "when do backups run", 2)
        .await
        .unwrap();
    match answer {
        Answer::Answered { text, pages } => {
            assert!(text.starts_with("saw "));
            assert_eq!(pages.len(), 2);
            assert!(pages.windows(2).all(|w| w[0] < w[1]));
        }
        other => panic!("expected an answer, got {other:?}"),
    }
}

/// Test config defaults and validation
#[test]
fn test_config_defaults_and_validation() {
    let config = Config::default();
    assert_eq!(config.chunking.window, 1000);
    assert_eq!(config.chunking.overlap, 200);
    assert_eq!(config.search_top_k, 5);
    assert!(config.validate().is_ok());

    let mut bad_config = Config::default();
    bad_config.search_top_k = 0;
    assert!(bad_config.validate().is_err());
}
