use super::*;
use serial_test::serial;

fn clear_env() {
    for var in [
        "CONFLUENCE_BASE_URL",
        "CONFLUENCE_USERNAME",
        "CONFLUENCE_API_TOKEN",
        "GROQ_API_KEY",
        "GROQ_MODEL",
        "OLLAMA_HOST",
        "OLLAMA_PORT",
        "EMBEDDING_MODEL",
        "INDEX_DIR",
    ] {
        // SAFETY: tests marked #[serial] so no concurrent env access
        unsafe { env::remove_var(var) };
    }
}

#[test]
#[serial]
fn from_env_defaults() {
    clear_env();

    let config = Config::from_env().expect("defaults should validate");

    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.model, "nomic-embed-text:latest");
    assert_eq!(config.groq.model, "llama3-8b-8192");
    assert_eq!(config.retrieval.top_k, 3);
    assert_eq!(config.index_dir, PathBuf::from("faiss_index"));
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.chunking.overlap, 100);
}

#[test]
#[serial]
fn from_env_overrides() {
    clear_env();
    // SAFETY: tests marked #[serial] so no concurrent env access
    unsafe {
        env::set_var("OLLAMA_HOST", "embedder.internal");
        env::set_var("OLLAMA_PORT", "12345");
        env::set_var("EMBEDDING_MODEL", "mxbai-embed-large");
        env::set_var("INDEX_DIR", "/tmp/qa-index");
    }

    let config = Config::from_env().expect("overrides should validate");

    assert_eq!(config.ollama.host, "embedder.internal");
    assert_eq!(config.ollama.port, 12345);
    assert_eq!(config.ollama.model, "mxbai-embed-large");
    assert_eq!(config.index_dir, PathBuf::from("/tmp/qa-index"));

    clear_env();
}

#[test]
#[serial]
fn invalid_port_rejected() {
    clear_env();
    // SAFETY: tests marked #[serial] so no concurrent env access
    unsafe { env::set_var("OLLAMA_PORT", "not-a-port") };

    let result = Config::from_env();
    assert!(matches!(
        result,
        Err(ConfigError::InvalidEnvValue { var: "OLLAMA_PORT", .. })
    ));

    clear_env();
}

#[test]
#[serial]
fn ingest_requires_confluence_credentials() {
    clear_env();

    let config = Config::from_env().expect("config should load");
    assert!(matches!(
        config.validate_for_ingest(),
        Err(ConfigError::MissingEnv("CONFLUENCE_BASE_URL"))
    ));
}

#[test]
#[serial]
fn ingest_rejects_malformed_base_url() {
    clear_env();
    // SAFETY: tests marked #[serial] so no concurrent env access
    unsafe {
        env::set_var("CONFLUENCE_BASE_URL", "not a url");
        env::set_var("CONFLUENCE_USERNAME", "user@example.com");
        env::set_var("CONFLUENCE_API_TOKEN", "token");
    }

    let config = Config::from_env().expect("config should load");
    assert!(matches!(
        config.validate_for_ingest(),
        Err(ConfigError::InvalidBaseUrl(_))
    ));

    clear_env();
}

#[test]
#[serial]
fn ingest_accepts_full_credentials() {
    clear_env();
    // SAFETY: tests marked #[serial] so no concurrent env access
    unsafe {
        env::set_var("CONFLUENCE_BASE_URL", "https://wiki.example.com");
        env::set_var("CONFLUENCE_USERNAME", "user@example.com");
        env::set_var("CONFLUENCE_API_TOKEN", "token");
    }

    let config = Config::from_env().expect("config should load");
    assert!(config.validate_for_ingest().is_ok());

    clear_env();
}

#[test]
#[serial]
fn query_requires_groq_key() {
    clear_env();

    let config = Config::from_env().expect("config should load");
    assert!(matches!(
        config.validate_for_query(),
        Err(ConfigError::MissingEnv("GROQ_API_KEY"))
    ));

    // SAFETY: tests marked #[serial] so no concurrent env access
    unsafe { env::set_var("GROQ_API_KEY", "gsk_test") };
    let config = Config::from_env().expect("config should load");
    assert!(config.validate_for_query().is_ok());

    clear_env();
}

#[test]
fn validate_rejects_zero_top_k() {
    let mut config = Config {
        confluence: ConfluenceConfig {
            base_url: String::new(),
            username: String::new(),
            api_token: String::new(),
        },
        ollama: OllamaConfig::default(),
        groq: GroqConfig {
            api_key: String::new(),
            model: "llama3-8b-8192".to_string(),
            temperature: 0.2,
        },
        chunking: ChunkingConfig::default(),
        retrieval: RetrievalConfig::default(),
        index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
    };

    config.retrieval.top_k = 0;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidTopK(0))));
}

#[test]
fn validate_rejects_overlap_at_least_chunk_size() {
    let mut config = Config {
        confluence: ConfluenceConfig {
            base_url: String::new(),
            username: String::new(),
            api_token: String::new(),
        },
        ollama: OllamaConfig::default(),
        groq: GroqConfig {
            api_key: String::new(),
            model: "llama3-8b-8192".to_string(),
            temperature: 0.2,
        },
        chunking: ChunkingConfig { chunk_size: 500, overlap: 500 },
        retrieval: RetrievalConfig::default(),
        index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
    };

    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(500, 500))
    ));

    config.chunking.overlap = 100;
    assert!(config.validate().is_ok());
}

#[test]
fn ollama_url_built_from_parts() {
    let ollama = OllamaConfig::default();
    let url = ollama.ollama_url().expect("default config produces a URL");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn ollama_config_rejects_bad_protocol() {
    let ollama = OllamaConfig {
        protocol: "ftp".to_string(),
        ..OllamaConfig::default()
    };
    assert!(matches!(
        ollama.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));
}
