use super::*;

#[test]
fn empty_input_produces_no_chunks() {
    let config = ChunkingConfig::default();
    assert!(chunk_text("", &config).is_empty());
    assert!(chunk_text("   \n\n  ", &config).is_empty());
}

#[test]
fn short_text_is_a_single_chunk() {
    let config = ChunkingConfig::default();
    let chunks = chunk_text("Install steps here.", &config);
    assert_eq!(chunks, vec!["Install steps here.".to_string()]);
}

#[test]
fn text_at_exact_chunk_size_is_a_single_chunk() {
    let config = ChunkingConfig::default();
    let text = "a".repeat(500);
    let chunks = chunk_text(&text, &config);
    assert_eq!(chunks.len(), 1);
}

#[test]
fn all_chunks_are_nonempty_and_bounded() {
    let config = ChunkingConfig::default();
    let sentence = "The quick brown fox jumps over the lazy dog. ";
    let text = sentence.repeat(200);

    let chunks = chunk_text(&text, &config);
    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert!(!chunk.trim().is_empty());
        assert!(chunk.chars().count() <= config.chunk_size);
    }
}

#[test]
fn chunk_count_tracks_stride() {
    let config = ChunkingConfig::default();
    let sentence = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ";
    let text = sentence.repeat(150);
    let len = text.trim().chars().count();

    let chunks = chunk_text(&text, &config);

    // Effective stride is chunk_size - overlap = 400, modulo boundary
    // snapping, so the count stays near ceil(len / 400).
    let expected = len.div_ceil(config.chunk_size - config.overlap);
    assert!(
        chunks.len() >= expected && chunks.len() <= expected * 2,
        "got {} chunks for {} chars (expected about {})",
        chunks.len(),
        len,
        expected
    );
}

#[test]
fn adjacent_chunks_overlap() {
    let config = ChunkingConfig::default();
    let word = "alpha bravo charlie delta echo foxtrot golf hotel india ";
    let text = word.repeat(40);

    let chunks = chunk_text(&text, &config);
    assert!(chunks.len() >= 2);

    // The start of each subsequent chunk must re-appear near the end of the
    // previous one.
    for pair in chunks.windows(2) {
        let head: String = pair[1].chars().take(20).collect();
        assert!(
            pair[0].contains(head.trim()),
            "chunk overlap missing: {:?} not in previous chunk",
            head
        );
    }
}

#[test]
fn prefers_paragraph_boundaries() {
    let config = ChunkingConfig {
        chunk_size: 100,
        overlap: 20,
    };
    let para = "This paragraph is about forty characters.";
    let text = format!("{para}\n\n{para}\n\n{para}\n\n{para}");

    let chunks = chunk_text(&text, &config);
    assert!(chunks.len() >= 2);
    // The first cut should snap to the paragraph break, not land mid-word.
    assert!(chunks[0].ends_with("characters."));
}

#[test]
fn hard_cut_when_no_boundaries_exist() {
    let config = ChunkingConfig {
        chunk_size: 100,
        overlap: 10,
    };
    let text = "x".repeat(350);

    let chunks = chunk_text(&text, &config);
    assert!(chunks.len() >= 3);
    for chunk in &chunks {
        assert!(chunk.chars().count() <= 100);
    }
}

#[test]
fn multibyte_input_splits_on_char_boundaries() {
    let config = ChunkingConfig {
        chunk_size: 100,
        overlap: 10,
    };
    let text = "héllo wörld ünïcode tèxt ".repeat(30);

    // Must not panic on UTF-8 boundaries.
    let chunks = chunk_text(&text, &config);
    assert!(!chunks.is_empty());
}
