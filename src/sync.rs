//! Full read of the entity tree from a [`DocumentStore`].

use crate::document::{Collection, DocumentStore, Query, SortDirection};
use crate::error::StoreError;
use crate::model::{self, Event, Program, field};

/// Read every event with its programs, activities and photos.
///
/// Events come back newest start date first. Programs, activities and
/// photos keep the order the store returned them in. Reads are issued one
/// after another: one for events, one per event for programs, and two per
/// program for activities and photos.
///
/// # Errors
///
/// Returns the first [`StoreError`] encountered. Nothing partial is
/// returned; the caller keeps whatever tree it had.
pub async fn fetch_tree(store: &dyn DocumentStore) -> Result<Vec<Event>, StoreError> {
    let event_docs = store
        .query(
            Collection::Events,
            &Query::all().order_by(field::START_DATE, SortDirection::Descending),
        )
        .await?;

    let mut events = Vec::with_capacity(event_docs.len());
    for doc in &event_docs {
        let mut event = model::decode_event(doc)?;
        let program_docs = store
            .query(
                Collection::Programs,
                &Query::where_eq(field::EVENT_ID, event.id.as_str()),
            )
            .await?;
        for program_doc in &program_docs {
            let program = model::decode_program(program_doc)?;
            event.programs.push(fetch_program_children(store, program).await?);
        }
        events.push(event);
    }

    tracing::debug!(
        events = events.len(),
        programs = events.iter().map(|e| e.programs.len()).sum::<usize>(),
        "entity tree fetched"
    );
    Ok(events)
}

async fn fetch_program_children(
    store: &dyn DocumentStore,
    mut program: Program,
) -> Result<Program, StoreError> {
    let by_program = Query::where_eq(field::PROGRAM_ID, program.id.as_str());

    for doc in store.query(Collection::Activities, &by_program).await? {
        program.activities.push(model::decode_activity(&doc)?);
    }
    for doc in store.query(Collection::Photos, &by_program).await? {
        program.photos.push(model::decode_photo(&doc)?);
    }

    attach_activity_photos(&mut program);
    Ok(program)
}

/// Copy each of the program's photos onto the activity it names.
///
/// Photos naming an activity that no longer exists stay on the program only.
pub(crate) fn attach_activity_photos(program: &mut Program) {
    for activity in &mut program.activities {
        activity.photos = program
            .photos
            .iter()
            .filter(|p| p.activity_id == activity.id)
            .cloned()
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FieldValue, Fields};
    use crate::memory::MemoryDocumentStore;
    use chrono::{DateTime, TimeZone, Utc};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, d, 0, 0, 0).unwrap()
    }

    async fn add_event(store: &MemoryDocumentStore, title: &str, start: DateTime<Utc>) -> String {
        let fields = Fields::from([
            (field::TITLE.to_owned(), FieldValue::from(title)),
            (field::START_DATE.to_owned(), start.into()),
            (field::END_DATE.to_owned(), start.into()),
        ]);
        store.add(Collection::Events, fields).await.unwrap()
    }

    async fn add_program(store: &MemoryDocumentStore, event_id: &str, date: DateTime<Utc>) -> String {
        let fields = model::encode_new_program(event_id, date, date);
        store.add(Collection::Programs, fields).await.unwrap()
    }

    async fn add_activity(store: &MemoryDocumentStore, program_id: &str, title: &str) -> String {
        let fields = model::encode_new_activity(
            program_id,
            &model::NewActivity {
                time: "09:00".into(),
                title: title.into(),
                description: None,
            },
            day(1),
        );
        store.add(Collection::Activities, fields).await.unwrap()
    }

    async fn add_photo(store: &MemoryDocumentStore, program_id: &str, activity_id: &str) -> String {
        let fields = model::encode_new_photo(program_id, activity_id, "https://img/1.jpg", "img-1", day(1));
        store.add(Collection::Photos, fields).await.unwrap()
    }

    #[tokio::test]
    async fn empty_store_yields_empty_tree() {
        let store = MemoryDocumentStore::new();
        assert!(fetch_tree(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn events_are_ordered_newest_first() {
        let store = MemoryDocumentStore::new();
        add_event(&store, "early", day(1)).await;
        add_event(&store, "late", day(20)).await;
        add_event(&store, "middle", day(10)).await;

        let titles: Vec<String> = fetch_tree(&store)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["late", "middle", "early"]);
    }

    #[tokio::test]
    async fn children_nest_under_their_parents() {
        let store = MemoryDocumentStore::new();
        let ev = add_event(&store, "Retreat", day(1)).await;
        let other = add_event(&store, "Other", day(2)).await;
        let p1 = add_program(&store, &ev, day(1)).await;
        add_program(&store, &other, day(2)).await;
        let a1 = add_activity(&store, &p1, "Opening").await;
        let a2 = add_activity(&store, &p1, "Closing").await;
        let ph = add_photo(&store, &p1, &a1).await;

        let tree = fetch_tree(&store).await.unwrap();
        let retreat = tree.iter().find(|e| e.id == ev).expect("event present");
        assert_eq!(retreat.programs.len(), 1);

        let program = &retreat.programs[0];
        assert_eq!(program.id, p1);
        assert_eq!(program.activities.len(), 2);
        assert_eq!(program.photos.len(), 1);

        let opening = program.activities.iter().find(|a| a.id == a1).unwrap();
        let closing = program.activities.iter().find(|a| a.id == a2).unwrap();
        assert_eq!(opening.photos.len(), 1);
        assert_eq!(opening.photos[0].id, ph);
        assert!(closing.photos.is_empty());
    }

    #[tokio::test]
    async fn orphan_photo_stays_on_program_only() {
        let store = MemoryDocumentStore::new();
        let ev = add_event(&store, "Retreat", day(1)).await;
        let p1 = add_program(&store, &ev, day(1)).await;
        add_activity(&store, &p1, "Opening").await;
        add_photo(&store, &p1, "deleted-activity").await;

        let tree = fetch_tree(&store).await.unwrap();
        let program = &tree[0].programs[0];
        assert_eq!(program.photos.len(), 1);
        assert!(program.activities[0].photos.is_empty());
    }

    #[tokio::test]
    async fn malformed_child_fails_the_whole_read() {
        let store = MemoryDocumentStore::new();
        let ev = add_event(&store, "Retreat", day(1)).await;
        store
            .add(
                Collection::Programs,
                Fields::from([(field::EVENT_ID.to_owned(), FieldValue::from(ev.as_str()))]),
            )
            .await
            .unwrap();

        let err = fetch_tree(&store).await.unwrap_err();
        assert!(
            matches!(err, StoreError::Malformed { ref field, .. } if field == "date"),
            "expected Malformed(date), got: {err}"
        );
    }
}
