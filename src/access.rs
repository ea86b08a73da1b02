//! Title and access-code lookup over the cached tree.
//!
//! This is a convenience filter, not access control: every client can read
//! every event, and the code is compared as plain text.

use crate::model::Event;

/// Events whose title and access code both match, ignoring case and
/// surrounding whitespace.
///
/// Returns nothing if either input is blank after trimming.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use gventos::{EventFields, find_events};
///
/// let event = EventFields {
///     title: "Reunião Anual".into(),
///     location: String::new(),
///     start_date: Utc::now(),
///     end_date: Utc::now(),
///     description: String::new(),
///     access_code: "AB12".into(),
/// }
/// .into_event("ev-1");
///
/// let events = [event];
/// assert_eq!(find_events(&events, " reunião anual ", "ab12").len(), 1);
/// assert!(find_events(&events, "Reunião Anual", "  ").is_empty());
/// ```
pub fn find_events<'a>(events: &'a [Event], title: &str, access_code: &str) -> Vec<&'a Event> {
    let title = normalize(title);
    let access_code = normalize(access_code);
    if title.is_empty() || access_code.is_empty() {
        return Vec::new();
    }
    events
        .iter()
        .filter(|e| normalize(&e.title) == title && normalize(&e.access_code) == access_code)
        .collect()
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}
