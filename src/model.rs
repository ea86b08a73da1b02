//! Entity tree types and their document encodings.
//!
//! The tree is `Event -> Program -> Activity`, with photos hanging off each
//! program and, derived in memory, off the activity they belong to. Every
//! child carries a back-reference key to its parent; the remote store does
//! not enforce these references.
//!
//! Encoding and decoding are pure functions so they can be tested without a
//! backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{Document, FieldValue, Fields};
use crate::error::StoreError;

/// Remote field names, shared by encoders, decoders, and queries.
pub(crate) mod field {
    pub const TITLE: &str = "title";
    pub const LOCATION: &str = "location";
    pub const START_DATE: &str = "startDate";
    pub const END_DATE: &str = "endDate";
    pub const DESCRIPTION: &str = "description";
    pub const ACCESS_CODE: &str = "accessCode";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
    pub const EVENT_ID: &str = "eventId";
    pub const DATE: &str = "date";
    pub const PROGRAM_ID: &str = "programId";
    pub const TIME: &str = "time";
    pub const ACTIVITY_ID: &str = "activityId";
    pub const URI: &str = "uri";
    pub const PUBLIC_ID: &str = "publicId";
    pub const TIMESTAMP: &str = "timestamp";
}

/// A multi-day gathering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Backend-assigned key.
    pub id: String,
    pub title: String,
    pub location: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub description: String,
    /// Shared lookup code. Compared as plain text; not a credential.
    pub access_code: String,
    /// Days of the event, in the order the store returned them.
    pub programs: Vec<Program>,
}

/// One calendar day within an [`Event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: String,
    /// Key of the owning event.
    pub event_id: String,
    pub date: DateTime<Utc>,
    pub activities: Vec<Activity>,
    /// Every photo recorded against this day, regardless of activity.
    pub photos: Vec<Photo>,
}

/// A scheduled item within a [`Program`] day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    /// Key of the owning program.
    pub program_id: String,
    /// Free-form time of day, e.g. `"09:00"`.
    pub time: String,
    pub title: String,
    pub description: Option<String>,
    /// Photos whose `activity_id` is this activity. Derived from the owning
    /// program's photo list on refresh.
    pub photos: Vec<Photo>,
}

/// Metadata for an image stored on the remote image host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub program_id: String,
    pub activity_id: String,
    /// Public HTTPS URL reported by the image host.
    pub uri: String,
    /// Image host identifier used for signed deletion.
    pub public_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Scalar fields of an [`Event`], used to create one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFields {
    pub title: String,
    pub location: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub description: String,
    pub access_code: String,
}

impl EventFields {
    /// Attach a key and an empty program list.
    pub fn into_event(self, id: impl Into<String>) -> Event {
        Event {
            id: id.into(),
            title: self.title,
            location: self.location,
            start_date: self.start_date,
            end_date: self.end_date,
            description: self.description,
            access_code: self.access_code,
            programs: Vec::new(),
        }
    }
}

/// Fields of an [`Activity`] supplied on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub time: String,
    pub title: String,
    pub description: Option<String>,
}

fn scalar_event_fields(
    title: &str,
    location: &str,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    description: &str,
    access_code: &str,
) -> Fields {
    Fields::from([
        (field::TITLE.to_owned(), title.into()),
        (field::LOCATION.to_owned(), location.into()),
        (field::START_DATE.to_owned(), start_date.into()),
        (field::END_DATE.to_owned(), end_date.into()),
        (field::DESCRIPTION.to_owned(), description.into()),
        (field::ACCESS_CODE.to_owned(), access_code.into()),
    ])
}

/// Document body for a new event.
pub(crate) fn encode_new_event(fields: &EventFields, now: DateTime<Utc>) -> Fields {
    let mut doc = scalar_event_fields(
        &fields.title,
        &fields.location,
        fields.start_date,
        fields.end_date,
        &fields.description,
        &fields.access_code,
    );
    doc.insert(field::CREATED_AT.to_owned(), now.into());
    doc
}

/// Document patch for an event update. Only scalar fields are written.
pub(crate) fn encode_event_update(event: &Event, now: DateTime<Utc>) -> Fields {
    let mut doc = scalar_event_fields(
        &event.title,
        &event.location,
        event.start_date,
        event.end_date,
        &event.description,
        &event.access_code,
    );
    doc.insert(field::UPDATED_AT.to_owned(), now.into());
    doc
}

pub(crate) fn encode_new_program(event_id: &str, date: DateTime<Utc>, now: DateTime<Utc>) -> Fields {
    Fields::from([
        (field::EVENT_ID.to_owned(), event_id.into()),
        (field::DATE.to_owned(), date.into()),
        (field::CREATED_AT.to_owned(), now.into()),
    ])
}

pub(crate) fn encode_program_update(program: &Program, now: DateTime<Utc>) -> Fields {
    Fields::from([
        (field::DATE.to_owned(), program.date.into()),
        (field::UPDATED_AT.to_owned(), now.into()),
    ])
}

/// Document body for a new activity. An absent description is omitted
/// rather than written as null.
pub(crate) fn encode_new_activity(
    program_id: &str,
    activity: &NewActivity,
    now: DateTime<Utc>,
) -> Fields {
    let mut doc = Fields::from([
        (field::PROGRAM_ID.to_owned(), program_id.into()),
        (field::TIME.to_owned(), activity.time.as_str().into()),
        (field::TITLE.to_owned(), activity.title.as_str().into()),
        (field::CREATED_AT.to_owned(), now.into()),
    ]);
    if let Some(description) = &activity.description {
        doc.insert(field::DESCRIPTION.to_owned(), description.as_str().into());
    }
    doc
}

/// Document patch for an activity update: time, title and description only.
pub(crate) fn encode_activity_update(activity: &Activity, now: DateTime<Utc>) -> Fields {
    Fields::from([
        (field::TIME.to_owned(), activity.time.as_str().into()),
        (field::TITLE.to_owned(), activity.title.as_str().into()),
        (
            field::DESCRIPTION.to_owned(),
            FieldValue::from(activity.description.clone()),
        ),
        (field::UPDATED_AT.to_owned(), now.into()),
    ])
}

pub(crate) fn encode_new_photo(
    program_id: &str,
    activity_id: &str,
    uri: &str,
    public_id: &str,
    now: DateTime<Utc>,
) -> Fields {
    Fields::from([
        (field::PROGRAM_ID.to_owned(), program_id.into()),
        (field::ACTIVITY_ID.to_owned(), activity_id.into()),
        (field::URI.to_owned(), uri.into()),
        (field::PUBLIC_ID.to_owned(), public_id.into()),
        (field::TIMESTAMP.to_owned(), now.into()),
        (field::CREATED_AT.to_owned(), now.into()),
    ])
}

/// Decode an event document. Children are attached by the caller.
///
/// `description` and `accessCode` default to empty strings when absent;
/// older documents were written without them.
pub(crate) fn decode_event(doc: &Document) -> Result<Event, StoreError> {
    Ok(Event {
        id: doc.id.clone(),
        title: doc.string(field::TITLE)?.to_owned(),
        location: doc.opt_string(field::LOCATION)?.unwrap_or_default().to_owned(),
        start_date: doc.timestamp(field::START_DATE)?,
        end_date: doc.timestamp(field::END_DATE)?,
        description: doc
            .opt_string(field::DESCRIPTION)?
            .unwrap_or_default()
            .to_owned(),
        access_code: doc
            .opt_string(field::ACCESS_CODE)?
            .unwrap_or_default()
            .to_owned(),
        programs: Vec::new(),
    })
}

pub(crate) fn decode_program(doc: &Document) -> Result<Program, StoreError> {
    Ok(Program {
        id: doc.id.clone(),
        event_id: doc.string(field::EVENT_ID)?.to_owned(),
        date: doc.timestamp(field::DATE)?,
        activities: Vec::new(),
        photos: Vec::new(),
    })
}

pub(crate) fn decode_activity(doc: &Document) -> Result<Activity, StoreError> {
    Ok(Activity {
        id: doc.id.clone(),
        program_id: doc.string(field::PROGRAM_ID)?.to_owned(),
        time: doc.string(field::TIME)?.to_owned(),
        title: doc.string(field::TITLE)?.to_owned(),
        description: doc.opt_string(field::DESCRIPTION)?.map(str::to_owned),
        photos: Vec::new(),
    })
}

pub(crate) fn decode_photo(doc: &Document) -> Result<Photo, StoreError> {
    Ok(Photo {
        id: doc.id.clone(),
        program_id: doc.string(field::PROGRAM_ID)?.to_owned(),
        activity_id: doc.string(field::ACTIVITY_ID)?.to_owned(),
        uri: doc.string(field::URI)?.to_owned(),
        public_id: doc.string(field::PUBLIC_ID)?.to_owned(),
        timestamp: doc.timestamp(field::TIMESTAMP)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 10, h, 0, 0).unwrap()
    }

    fn retreat() -> EventFields {
        EventFields {
            title: "Retreat".into(),
            location: "Serra".into(),
            start_date: at(8),
            end_date: at(18),
            description: "Annual retreat".into(),
            access_code: "AB12".into(),
        }
    }

    #[test]
    fn new_event_carries_created_at_and_scalars() {
        let doc = encode_new_event(&retreat(), at(1));
        assert_eq!(doc[field::TITLE], FieldValue::String("Retreat".into()));
        assert_eq!(doc[field::ACCESS_CODE], FieldValue::String("AB12".into()));
        assert_eq!(doc[field::START_DATE], FieldValue::Timestamp(at(8)));
        assert_eq!(doc[field::CREATED_AT], FieldValue::Timestamp(at(1)));
        assert!(!doc.contains_key(field::UPDATED_AT));
    }

    #[test]
    fn event_update_writes_updated_at_not_programs() {
        let event = retreat().into_event("ev-1");
        let doc = encode_event_update(&event, at(2));
        assert_eq!(doc[field::UPDATED_AT], FieldValue::Timestamp(at(2)));
        assert!(!doc.contains_key(field::CREATED_AT));
        assert!(!doc.contains_key("programs"));
    }

    #[test]
    fn decoded_event_matches_encoded_fields() {
        let fields = encode_new_event(&retreat(), at(1));
        let event = decode_event(&Document {
            id: "ev-1".into(),
            fields,
        })
        .expect("decode event");
        assert_eq!(event, retreat().into_event("ev-1"));
    }

    #[test]
    fn event_without_access_code_decodes_empty() {
        let mut fields = encode_new_event(&retreat(), at(1));
        fields.remove(field::ACCESS_CODE);
        fields.remove(field::DESCRIPTION);
        let event = decode_event(&Document {
            id: "ev-1".into(),
            fields,
        })
        .unwrap();
        assert_eq!(event.access_code, "");
        assert_eq!(event.description, "");
    }

    #[test]
    fn event_without_start_date_is_malformed() {
        let mut fields = encode_new_event(&retreat(), at(1));
        fields.remove(field::START_DATE);
        let err = decode_event(&Document {
            id: "ev-1".into(),
            fields,
        })
        .unwrap_err();
        assert!(err.to_string().contains("startDate"), "got: {err}");
    }

    #[test]
    fn new_activity_omits_absent_description() {
        let activity = NewActivity {
            time: "09:00".into(),
            title: "Opening".into(),
            description: None,
        };
        let doc = encode_new_activity("p-1", &activity, at(1));
        assert!(!doc.contains_key(field::DESCRIPTION));
        assert_eq!(doc[field::PROGRAM_ID], FieldValue::String("p-1".into()));

        let decoded = decode_activity(&Document {
            id: "a-1".into(),
            fields: doc,
        })
        .unwrap();
        assert_eq!(decoded.description, None);
        assert_eq!(decoded.time, "09:00");
    }

    #[test]
    fn activity_update_touches_only_editable_fields() {
        let activity = Activity {
            id: "a-1".into(),
            program_id: "p-1".into(),
            time: "10:30".into(),
            title: "Walk".into(),
            description: None,
            photos: Vec::new(),
        };
        let doc = encode_activity_update(&activity, at(3));
        let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["description", "time", "title", "updatedAt"]);
        assert_eq!(doc[field::DESCRIPTION], FieldValue::Null);
    }

    #[test]
    fn photo_document_has_both_back_references() {
        let doc = encode_new_photo("p-1", "a-1", "https://img/x.jpg", "x", at(4));
        let photo = decode_photo(&Document {
            id: "ph-1".into(),
            fields: doc,
        })
        .unwrap();
        assert_eq!(photo.program_id, "p-1");
        assert_eq!(photo.activity_id, "a-1");
        assert_eq!(photo.public_id, "x");
        assert_eq!(photo.timestamp, at(4));
    }

    #[test]
    fn event_serializes_camel_case_for_presentation() {
        let event = retreat().into_event("ev-1");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["accessCode"], "AB12");
        assert!(json["programs"].as_array().unwrap().is_empty());
    }
}
