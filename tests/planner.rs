//! End-to-end flows through the public API against the in-memory store.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use gventos::{
    Collection, CascadeStep, EventFields, ImageHost, ImageHostError, MemoryDocumentStore,
    NewActivity, PlannerError, PlannerStore, UploadedImage, local_image_path,
};

#[derive(Debug, Default)]
struct RecordingHost {
    uploaded: Mutex<Vec<String>>,
    destroyed: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageHost for RecordingHost {
    async fn upload(&self, path: &Path) -> Result<UploadedImage, ImageHostError> {
        let bytes = tokio::fs::read(path).await?;
        let mut uploaded = self.uploaded.lock().unwrap();
        let public_id = format!("events/{}-{}", uploaded.len() + 1, bytes.len());
        uploaded.push(public_id.clone());
        Ok(UploadedImage {
            secure_url: format!("https://res.example.test/image/upload/{public_id}.jpg"),
            public_id,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<(), ImageHostError> {
        self.destroyed.lock().unwrap().push(public_id.to_owned());
        Ok(())
    }
}

async fn open() -> (PlannerStore, Arc<MemoryDocumentStore>, Arc<RecordingHost>) {
    let documents = Arc::new(MemoryDocumentStore::new());
    let images = Arc::new(RecordingHost::default());
    let store = PlannerStore::builder()
        .document_store(documents.clone())
        .image_host(images.clone())
        .open()
        .await
        .expect("store should open");
    (store, documents, images)
}

fn event_fields(title: &str, code: &str, day: u32) -> EventFields {
    EventFields {
        title: title.into(),
        location: "Porto".into(),
        start_date: Utc.with_ymd_and_hms(2025, 11, day, 9, 0, 0).unwrap(),
        end_date: Utc.with_ymd_and_hms(2025, 11, day + 2, 17, 0, 0).unwrap(),
        description: String::new(),
        access_code: code.into(),
    }
}

#[tokio::test]
async fn plan_an_event_then_tear_it_down() {
    let (mut store, documents, images) = open().await;
    let dir = tempfile::tempdir().unwrap();
    let picked = dir.path().join("picked.jpg");
    std::fs::write(&picked, [0xFF, 0xD8, 0xFF, 0xD9]).unwrap();

    let event = store
        .create_event(event_fields("Retreat", "AB12", 3))
        .await
        .unwrap();
    let program_id = store
        .create_program(&event.id, Utc.with_ymd_and_hms(2025, 11, 3, 0, 0, 0).unwrap())
        .await
        .unwrap();
    let activity_id = store
        .create_activity(
            &event.id,
            &program_id,
            NewActivity {
                time: "09:00".into(),
                title: "Opening".into(),
                description: None,
            },
        )
        .await
        .unwrap();
    let uri = format!("file://{}", picked.display());
    let photo_id = store
        .add_photo(&event.id, &program_id, &activity_id, &local_image_path(&uri))
        .await
        .unwrap();

    let found = store.find_events("  RETREAT", "ab12");
    assert_eq!(found.len(), 1);
    let program = &found[0].programs[0];
    assert_eq!(program.activities[0].title, "Opening");
    assert_eq!(program.activities[0].photos[0].id, photo_id);
    assert_eq!(
        program.photos[0].uri,
        "https://res.example.test/image/upload/events/1-4.jpg"
    );

    let report = store.delete_event(&event.id).await.unwrap();
    assert_eq!(
        report.target,
        CascadeStep::Event {
            event_id: event.id.clone()
        }
    );
    assert!(documents.is_empty());
    assert_eq!(*images.destroyed.lock().unwrap(), vec!["events/1-4".to_owned()]);
    assert!(store.events().is_empty());
}

#[tokio::test]
async fn refresh_orders_events_by_start_date() {
    let (mut store, _documents, _images) = open().await;
    store.create_event(event_fields("First", "1", 1)).await.unwrap();
    store.create_event(event_fields("Third", "3", 20)).await.unwrap();
    store.create_event(event_fields("Second", "2", 10)).await.unwrap();

    let appended: Vec<&str> = store.events().iter().map(|e| e.title.as_str()).collect();
    assert_eq!(appended, vec!["First", "Third", "Second"]);

    store.fetch_all().await.unwrap();
    let refreshed: Vec<&str> = store.events().iter().map(|e| e.title.as_str()).collect();
    assert_eq!(refreshed, vec!["Third", "Second", "First"]);
}

#[tokio::test]
async fn deleting_an_activity_keeps_its_photo_until_the_program_goes() {
    let (mut store, documents, images) = open().await;
    let dir = tempfile::tempdir().unwrap();
    let picked = dir.path().join("a.jpg");
    std::fs::write(&picked, b"jpeg").unwrap();

    let event = store
        .create_event(event_fields("Reunião Anual", "1234", 5))
        .await
        .unwrap();
    let program_id = store
        .create_program(&event.id, Utc.with_ymd_and_hms(2025, 11, 5, 0, 0, 0).unwrap())
        .await
        .unwrap();
    let activity_id = store
        .create_activity(
            &event.id,
            &program_id,
            NewActivity {
                time: "14:00".into(),
                title: "Workshop".into(),
                description: Some("Hands-on".into()),
            },
        )
        .await
        .unwrap();
    store
        .add_photo(&event.id, &program_id, &activity_id, &picked)
        .await
        .unwrap();

    store
        .delete_activity(&event.id, &program_id, &activity_id)
        .await
        .unwrap();
    assert_eq!(documents.len(Collection::Photos), 1);
    assert!(images.destroyed.lock().unwrap().is_empty());

    let report = store.delete_program(&event.id, &program_id).await.unwrap();
    assert_eq!(report.completed.len(), 2);
    assert_eq!(documents.len(Collection::Photos), 0);
    assert_eq!(images.destroyed.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_image_is_reported_without_side_effects() {
    let (mut store, documents, images) = open().await;
    let event = store
        .create_event(event_fields("Retreat", "AB12", 3))
        .await
        .unwrap();

    let err = store
        .add_photo(&event.id, "p", "a", Path::new("/definitely/not/here.jpg"))
        .await
        .unwrap_err();

    assert!(matches!(err, PlannerError::ImageHost(ImageHostError::Io(_))));
    assert_eq!(documents.len(Collection::Photos), 0);
    assert!(images.uploaded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn tree_serializes_for_presentation() {
    let (mut store, _documents, _images) = open().await;
    store
        .create_event(event_fields("Retreat", "AB12", 3))
        .await
        .unwrap();

    let json = serde_json::to_value(store.state()).unwrap();
    assert_eq!(json["loading"], false);
    assert_eq!(json["events"][0]["accessCode"], "AB12");
    assert!(json["error"].is_null());
}
