//! Cached view of the remote entity tree and its transition function.

use serde::{Deserialize, Serialize};

use crate::model::Event;

/// Message recorded in [`EventsState::error`] when a refresh fails.
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch events";

/// Client-side cache of the remote entity tree.
///
/// The remote store is authoritative. This state is replaced wholesale by
/// each successful refresh and otherwise only touched by the single-event
/// transitions of the create/update/delete event operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventsState {
    /// Events ordered by start date, newest first.
    pub events: Vec<Event>,
    /// Whether a refresh is in flight.
    pub loading: bool,
    /// Message from the last failed refresh, cleared when a new one starts.
    pub error: Option<String>,
}

/// A change to [`EventsState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Transition {
    /// A refresh started.
    FetchStarted,
    /// A refresh produced a complete tree.
    FetchSucceeded(Vec<Event>),
    /// A refresh failed; the message is user-facing.
    FetchFailed(String),
    /// An event was created remotely.
    EventAdded(Event),
    /// An event's scalar fields were written remotely.
    EventUpdated(Event),
    /// An event record was deleted remotely.
    EventRemoved(String),
}

impl EventsState {
    /// Apply a transition and return the next state.
    ///
    /// Pure and total: transitions naming an unknown event key leave the
    /// event list unchanged.
    pub fn apply(mut self, transition: Transition) -> Self {
        match transition {
            Transition::FetchStarted => {
                self.loading = true;
                self.error = None;
            }
            Transition::FetchSucceeded(events) => {
                self.events = events;
                self.loading = false;
            }
            Transition::FetchFailed(message) => {
                // Prior tree stays in place.
                self.loading = false;
                self.error = Some(message);
            }
            Transition::EventAdded(event) => self.events.push(event),
            Transition::EventUpdated(event) => {
                if let Some(slot) = self.events.iter_mut().find(|e| e.id == event.id) {
                    *slot = event;
                }
            }
            Transition::EventRemoved(id) => self.events.retain(|e| e.id != id),
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventFields;
    use chrono::{TimeZone, Utc};

    fn event(id: &str, title: &str) -> Event {
        EventFields {
            title: title.into(),
            location: "Lisboa".into(),
            start_date: Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2025, 9, 3, 18, 0, 0).unwrap(),
            description: String::new(),
            access_code: "1234".into(),
        }
        .into_event(id)
    }

    #[test]
    fn fetch_started_sets_loading_and_clears_error() {
        let state = EventsState {
            error: Some("old".into()),
            ..EventsState::default()
        }
        .apply(Transition::FetchStarted);
        assert!(state.loading);
        assert_eq!(state.error, None);
    }

    #[test]
    fn fetch_succeeded_replaces_tree() {
        let state = EventsState::default()
            .apply(Transition::EventAdded(event("stale", "Old")))
            .apply(Transition::FetchStarted)
            .apply(Transition::FetchSucceeded(vec![event("ev-1", "Retreat")]));
        assert!(!state.loading);
        assert_eq!(state.events.len(), 1);
        assert_eq!(state.events[0].id, "ev-1");
    }

    #[test]
    fn fetch_failed_preserves_prior_tree() {
        let state = EventsState::default()
            .apply(Transition::FetchSucceeded(vec![event("ev-1", "Retreat")]))
            .apply(Transition::FetchStarted)
            .apply(Transition::FetchFailed(FETCH_FAILED_MESSAGE.into()));
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some(FETCH_FAILED_MESSAGE));
        assert_eq!(state.events.len(), 1, "prior tree must survive a failed refresh");
    }

    #[test]
    fn event_added_appends() {
        let state = EventsState::default()
            .apply(Transition::EventAdded(event("a", "A")))
            .apply(Transition::EventAdded(event("b", "B")));
        let ids: Vec<&str> = state.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn event_updated_replaces_by_key() {
        let state = EventsState::default()
            .apply(Transition::EventAdded(event("a", "A")))
            .apply(Transition::EventAdded(event("b", "B")))
            .apply(Transition::EventUpdated(event("b", "B2")));
        assert_eq!(state.events[1].title, "B2");
        assert_eq!(state.events[0].title, "A");
    }

    #[test]
    fn unknown_keys_leave_events_unchanged() {
        let before = EventsState::default().apply(Transition::EventAdded(event("a", "A")));
        let after = before
            .clone()
            .apply(Transition::EventUpdated(event("zzz", "Z")))
            .apply(Transition::EventRemoved("zzz".into()));
        assert_eq!(before, after);
    }

    #[test]
    fn event_removed_drops_only_that_event() {
        let state = EventsState::default()
            .apply(Transition::EventAdded(event("a", "A")))
            .apply(Transition::EventAdded(event("b", "B")))
            .apply(Transition::EventRemoved("a".into()));
        assert_eq!(state.events.len(), 1);
        assert_eq!(state.events[0].id, "b");
    }

    #[test]
    fn transitions_serialize_adjacently_tagged() {
        let json = serde_json::to_value(Transition::EventRemoved("a".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "EventRemoved", "data": "a" }));
        let json = serde_json::to_value(Transition::FetchStarted).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "FetchStarted" }));
    }
}
