//! Assertion helpers for program text, block links and engine transcripts.

use blocksynth::{BlockId, BlockStore, EngineCall, RecordingEngine};

/// Assert that all strings in `keys` are present in `text`.
///
/// # Panics
/// Panics with a helpful message if any key is missing.
pub fn assert_all_present(text: &str, keys: &[&str]) {
    for key in keys {
        assert!(text.contains(key), "{key} not found in {text}");
    }
}

/// Assert that all strings in `keys` are absent from `text`.
///
/// # Panics
/// Panics with a helpful message if any key is found.
pub fn assert_all_absent(text: &str, keys: &[&str]) {
    for key in keys {
        assert!(!text.contains(key), "{key} should not be present in {text}");
    }
}

/// Assert the `prev` and `next` links of a live block.
///
/// # Panics
/// Panics if the block is missing or either link differs.
pub fn assert_links(store: &BlockStore, id: &str, prev: Option<&str>, next: Option<&str>) {
    let block = store
        .get(&BlockId::from(id))
        .unwrap_or_else(|| panic!("block {id} is not live"));
    assert_eq!(
        block.prev.as_ref().map(BlockId::as_str),
        prev,
        "prev of {id}"
    );
    assert_eq!(
        block.next.as_ref().map(BlockId::as_str),
        next,
        "next of {id}"
    );
}

/// Assert that the engine's transcript ends with a single-output dispatch:
/// `execute(program)` followed by `render(Some(output))`.
///
/// # Panics
/// Panics if the last two calls differ.
pub fn assert_single_dispatch(engine: &RecordingEngine, program: &str, output: &str) {
    let expected = [
        EngineCall::Execute(program.to_owned()),
        EngineCall::Render(Some(BlockId::from(output))),
    ];
    assert!(
        engine.calls().ends_with(&expected),
        "expected {expected:?} at the end of {:?}",
        engine.calls()
    );
}
