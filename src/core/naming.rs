//! Conventional handler and event names.
//!
//! Handlers are registered in typed tables, but the names below are what the
//! machine reports in its diagnostics and what it triggers on event emitters.

/// Upper-case the first word character of the string and every word character
/// that follows a colon, dropping that colon.
///
/// ```rust
/// use deferred_fsm::core::pascal_case;
///
/// assert_eq!(pascal_case("openDoor"), "OpenDoor");
/// assert_eq!(pascal_case("playing:to:paused"), "PlayingToPaused");
/// ```
pub fn pascal_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    let mut at_boundary = true;

    while let Some(c) = chars.next() {
        if c == ':' {
            if chars.peek().copied().is_some_and(is_word_char) {
                at_boundary = true;
                continue;
            }
            out.push(c);
            at_boundary = false;
            continue;
        }
        if at_boundary && is_word_char(c) {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
        at_boundary = false;
    }
    out
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `onBefore<Method>`
pub fn before_hook_label(method: &str) -> String {
    format!("onBefore{}", pascal_case(method))
}

/// Event emitted for a specific edge: `<from>:to:<to>`.
pub fn route_event(from: &str, to: &str) -> String {
    format!("{from}:to:{to}")
}

/// `on<From>To<To>`
pub fn route_label(from: &str, to: &str) -> String {
    format!("on{}", pascal_case(&route_event(from, to)))
}

/// `on<To>`
pub fn state_label(to: &str) -> String {
    format!("on{}", pascal_case(to))
}
