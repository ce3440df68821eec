// Unit tests for logger module initialization logic
// The init guards latch process-wide on the first call, so every
// assertion about initialize() lives in one test body to keep the
// ordering deterministic.

use crate::logger::initialize;

/// **VALUE**: Verifies first-call initialization and that the guards absorb
/// every later call.
///
/// **WHY THIS MATTERS**: The logger is initialized from main, but library
/// consumers may also call it defensively. If a second call errors or panics
/// (fern rejects a second global logger), startup crashes on a code path that
/// is harmless by contract.
///
/// **BUG THIS CATCHES**: Would catch if the Once or AtomicBool guards are
/// removed, causing fern to panic when setting the global logger twice, or if
/// the log file stops being created in the given directory.
#[test]
fn given_logger_when_initialized_then_file_created_and_reinit_absorbed() {
    // GIVEN: A valid temporary directory
    let temp_dir = tempfile::tempdir().unwrap();

    // WHEN: Calling initialize for the first time
    let first = initialize(temp_dir.path());

    // THEN: Initialization succeeds and the log file exists
    assert!(first.is_ok(), "First initialization should succeed");
    assert!(
        temp_dir.path().join("feedwatch.log").exists(),
        "Log file should be created in the given directory"
    );

    // WHEN: Calling initialize again, even with an unusable directory
    let second = initialize(temp_dir.path());
    let third = initialize(std::path::Path::new("/dev/null/not-a-dir"));

    // THEN: The guards absorb both calls
    assert!(second.is_ok(), "Second initialization should be a no-op");
    assert!(third.is_ok(), "Guarded calls never re-run initialization");
}
