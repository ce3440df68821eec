// Unit tests for ErrorLocation
// Tests caller capture and the display format log lines rely on

use crate::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Verifies `caller()` records the position of the call site,
/// not of `error_location.rs` itself.
///
/// **WHY THIS MATTERS**: Every error in the workspace embeds one of these.
/// If `#[track_caller]` propagation breaks, every log line points at the
/// error plumbing instead of the code that failed.
///
/// **BUG THIS CATCHES**: Would catch removal of `#[track_caller]` from
/// `caller()`, which silently degrades every error message.
#[test]
fn given_caller_capture_when_invoked_then_records_this_file() {
    // GIVEN / WHEN: Capturing from this test
    let location = ErrorLocation::caller();

    // THEN: The location points at this file
    assert!(
        location.file.ends_with("error_location.rs"),
        "Expected this test file, got {}",
        location.file
    );
    assert!(location.line > 0, "Line should be populated");
    assert!(location.column > 0, "Column should be populated");
}

/// **VALUE**: Pins the `[file:line:column]` display format.
///
/// **WHY THIS MATTERS**: Error Display impls append this value to their
/// messages; changing the shape breaks log greppability.
///
/// **BUG THIS CATCHES**: Would catch accidental reformatting of the
/// Display impl (missing brackets, reordered fields).
#[test]
fn given_location_when_displayed_then_formats_as_bracketed_triple() {
    // GIVEN: A location captured here
    let location = ErrorLocation::from(Location::caller());

    // WHEN: Formatting it
    let rendered = location.to_string();

    // THEN: It matches [file:line:column]
    let expected = format!("[{}:{}:{}]", location.file, location.line, location.column);
    assert_eq!(rendered, expected);
    assert!(rendered.starts_with('['), "Should open with bracket");
    assert!(rendered.ends_with(']'), "Should close with bracket");
}

/// **VALUE**: Verifies `caller()` and `from(Location::caller())` agree.
///
/// **WHY THIS MATTERS**: Both constructors appear in the codebase (the
/// shorthand in `From` impls, the explicit form in `map_err` closures).
/// They must capture identically or error locations become inconsistent.
///
/// **BUG THIS CATCHES**: Would catch `caller()` capturing its own body
/// rather than propagating to the call site.
#[test]
fn given_both_constructors_when_called_on_adjacent_lines_then_same_file() {
    let via_caller = ErrorLocation::caller();
    let via_from = ErrorLocation::from(Location::caller());

    assert_eq!(via_caller.file, via_from.file);
    assert_eq!(via_from.line, via_caller.line + 1, "Captured one line apart");
}
