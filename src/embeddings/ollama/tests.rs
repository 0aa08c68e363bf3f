use super::*;
use crate::config::OllamaConfig;

#[test]
fn client_from_default_config() {
    let config = OllamaConfig::default();
    let client = OllamaClient::new(&config).expect("default config should build a client");
    assert_eq!(client.model(), "nomic-embed-text:latest");
}

#[test]
fn embed_request_serializes_inputs() {
    let request = EmbedRequest {
        model: "nomic-embed-text:latest".to_string(),
        input: vec!["first".to_string(), "second".to_string()],
    };

    let json = serde_json::to_value(&request).expect("request serializes");
    assert_eq!(json["model"], "nomic-embed-text:latest");
    assert_eq!(json["input"][1], "second");
}

#[test]
fn embed_response_parses_batch() {
    let body = r#"{"model":"nomic-embed-text:latest","embeddings":[[0.1,0.2],[0.3,0.4]]}"#;
    let response: EmbedResponse = serde_json::from_str(body).expect("response parses");
    assert_eq!(response.embeddings.len(), 2);
    assert_eq!(response.embeddings[0], vec![0.1, 0.2]);
}

#[test]
fn models_response_parses_tags_payload() {
    let body = r#"{
        "models": [
            {"name": "nomic-embed-text:latest", "size": 274302450, "digest": "abc123"},
            {"name": "llama3:8b"}
        ]
    }"#;

    let response: ModelsResponse = serde_json::from_str(body).expect("tags payload parses");
    assert_eq!(response.models.len(), 2);
    assert_eq!(response.models[0].name, "nomic-embed-text:latest");
    assert_eq!(response.models[1].size, None);
}

#[test]
fn embed_batch_with_no_texts_is_empty() {
    let config = OllamaConfig::default();
    let client = OllamaClient::new(&config).expect("client builds");
    let vectors = client.embed_batch(&[]).expect("empty batch short-circuits");
    assert!(vectors.is_empty());
}
