use super::*;
use crate::config::{Config, ConfluenceConfig, GroqConfig, OllamaConfig, RetrievalConfig};
use crate::embeddings::ChunkingConfig;
use crate::index::{ChunkRecord, DocMetadata, SourceKind};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn result_with(content: &str, source: &str, link: &str) -> SearchResult {
    SearchResult {
        content: content.to_string(),
        chunk_index: 0,
        metadata: DocMetadata {
            source: source.to_string(),
            kind: SourceKind::Page,
            space_key: "ENG".to_string(),
            page_id: "1001".to_string(),
            link: link.to_string(),
        },
        similarity_score: 0.9,
        distance: 0.1,
    }
}

#[test]
fn refusal_phrases_are_detected_case_insensitively() {
    assert!(is_low_confidence("I don't know the answer to that."));
    assert!(is_low_confidence("The documentation DOES NOT MENTION this."));
    assert!(is_low_confidence("No relevant section exists."));
    assert!(is_low_confidence("The page was Not Found."));
}

#[test]
fn confident_answers_pass_the_heuristic() {
    assert!(!is_low_confidence(
        "Run the installer and follow the setup steps on the Setup Guide page."
    ));
    assert!(!is_low_confidence("The service listens on port 8000."));
}

#[test]
fn refusal_detection_is_substring_based() {
    // Known limitation: a legitimate answer containing a phrase still
    // trips the heuristic.
    assert!(is_low_confidence(
        "The 404 page shows \"not found\" to the visitor."
    ));
}

#[test]
fn prompt_contains_context_and_question() {
    let results = vec![
        result_with("Install steps here.", "Setup Guide", "https://w/1"),
        result_with("Use port 8000.", "Ops Manual", "https://w/2"),
    ];

    let prompt = build_prompt(&results, "How do I install?");

    assert!(prompt.contains("Install steps here.\n\nUse port 8000."));
    assert!(prompt.contains("Question: How do I install?"));
    assert!(prompt.contains("answering questions from Confluence documentation"));
    assert!(prompt.ends_with("Answer (with brief explanation):"));
}

#[test]
fn sources_are_deduplicated_in_first_seen_order() {
    let results = vec![
        result_with("chunk a", "Setup Guide", "https://w/1"),
        result_with("chunk b", "Ops Manual", "https://w/2"),
        result_with("chunk c", "Setup Guide", "https://w/1"),
    ];

    let sources = collect_sources(&results);
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].link, "https://w/1");
    assert_eq!(sources[0].title, "Setup Guide");
    assert_eq!(sources[1].link, "https://w/2");
}

#[test]
fn fallback_answer_has_no_sources() {
    let answer = Answer::fallback();
    assert!(answer.fallback);
    assert!(answer.sources.is_empty());
    assert!(answer.links().is_empty());
    assert_eq!(answer.text, FALLBACK_MESSAGE);
}

fn test_config(ollama_port: u16, temp_dir: &TempDir) -> Config {
    Config {
        confluence: ConfluenceConfig {
            base_url: "https://wiki.example.com".to_string(),
            username: "user@example.com".to_string(),
            api_token: "token".to_string(),
        },
        ollama: OllamaConfig {
            protocol: "http".to_string(),
            host: "127.0.0.1".to_string(),
            port: ollama_port,
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
        },
        groq: GroqConfig {
            api_key: "gsk_test".to_string(),
            model: "llama3-8b-8192".to_string(),
            temperature: 0.2,
        },
        chunking: ChunkingConfig::default(),
        retrieval: RetrievalConfig::default(),
        index_dir: temp_dir.path().join("faiss_index"),
    }
}

async fn mount_embedding_stub(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "nomic-embed-text:latest",
            "embeddings": [[0.1, 0.2, 0.3]]
        })))
        .mount(server)
        .await;
}

async fn mount_groq_stub(server: &MockServer, reply: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": reply}}]
        })))
        .mount(server)
        .await;
}

fn indexed_record(id: &str, source: &str, link: &str) -> ChunkRecord {
    ChunkRecord {
        id: id.to_string(),
        vector: vec![0.1, 0.2, 0.3],
        content: "Install steps here.".to_string(),
        chunk_index: 0,
        metadata: DocMetadata {
            source: source.to_string(),
            kind: SourceKind::Page,
            space_key: "ENG".to_string(),
            page_id: "1001".to_string(),
            link: link.to_string(),
        },
    }
}

async fn pipeline_over_one_page(
    ollama: &MockServer,
    groq: &MockServer,
    temp_dir: &TempDir,
) -> QaPipeline {
    let config = test_config(ollama.address().port(), temp_dir);

    let store = VectorStore::open(&config).await.expect("store opens");
    let records = vec![
        indexed_record("a", "Setup Guide", "https://wiki.example.com/pages/viewpage.action?pageId=1001"),
        indexed_record("b", "Setup Guide", "https://wiki.example.com/pages/viewpage.action?pageId=1001"),
    ];
    store.rebuild(&records).await.expect("rebuild succeeds");

    let groq_url = format!("{}/chat/completions", groq.uri());
    QaPipeline::build(&config)
        .await
        .expect("pipeline builds")
        .with_groq_url(&groq_url)
}

#[tokio::test(flavor = "multi_thread")]
async fn answer_grounds_reply_in_retrieved_chunks() {
    let ollama = MockServer::start().await;
    let groq = MockServer::start().await;
    mount_embedding_stub(&ollama).await;
    mount_groq_stub(&groq, "Run the installer as described on the Setup Guide page.").await;

    let temp_dir = TempDir::new().expect("temp dir");
    let pipeline = pipeline_over_one_page(&ollama, &groq, &temp_dir).await;

    let answer = pipeline
        .answer("How do I install?")
        .await
        .expect("answer succeeds");

    assert!(!answer.fallback);
    assert_eq!(
        answer.text,
        "Run the installer as described on the Setup Guide page."
    );
    // Both retrieved chunks come from the same page, so the link list
    // collapses to one entry.
    assert_eq!(
        answer.links(),
        vec!["https://wiki.example.com/pages/viewpage.action?pageId=1001".to_string()]
    );
    assert_eq!(answer.sources[0].title, "Setup Guide");
}

#[tokio::test(flavor = "multi_thread")]
async fn refusal_reply_falls_back_and_suppresses_links() {
    let ollama = MockServer::start().await;
    let groq = MockServer::start().await;
    mount_embedding_stub(&ollama).await;
    mount_groq_stub(
        &groq,
        "I don't know the answer to that. Please ask a question based on the Confluence documents.",
    )
    .await;

    let temp_dir = TempDir::new().expect("temp dir");
    let pipeline = pipeline_over_one_page(&ollama, &groq, &temp_dir).await;

    let answer = pipeline
        .answer("What is the meaning of life?")
        .await
        .expect("answer succeeds");

    assert!(answer.fallback);
    assert_eq!(answer.text, FALLBACK_MESSAGE);
    assert!(answer.links().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn blank_reply_falls_back() {
    let ollama = MockServer::start().await;
    let groq = MockServer::start().await;
    mount_embedding_stub(&ollama).await;
    mount_groq_stub(&groq, "   \n  ").await;

    let temp_dir = TempDir::new().expect("temp dir");
    let pipeline = pipeline_over_one_page(&ollama, &groq, &temp_dir).await;

    let answer = pipeline
        .answer("How do I install?")
        .await
        .expect("answer succeeds");

    assert!(answer.fallback);
    assert_eq!(answer.text, FALLBACK_MESSAGE);
}

#[test]
fn links_preserve_source_order() {
    let answer = Answer {
        text: "grounded".to_string(),
        sources: vec![
            SourceRef {
                title: "A".to_string(),
                link: "https://w/a".to_string(),
            },
            SourceRef {
                title: "B".to_string(),
                link: "https://w/b".to_string(),
            },
        ],
        fallback: false,
    };

    assert_eq!(answer.links(), vec!["https://w/a", "https://w/b"]);
}
