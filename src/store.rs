//! The event aggregate store: cached entity tree plus every mutating
//! operation against the remote document store and image host.
//!
//! The store is opened via [`PlannerStoreBuilder`], either from a
//! [`PlannerConfig`] (remote backends) or from explicitly supplied
//! [`DocumentStore`] / [`ImageHost`] trait objects.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::access;
use crate::cascade::{self, CascadePlan, CascadeReport, CascadeStep};
use crate::cloudinary::CloudinaryClient;
use crate::config::PlannerConfig;
use crate::document::{Collection, DocumentStore};
use crate::error::{ConfigError, PlannerError};
use crate::firestore::FirestoreClient;
use crate::image_host::ImageHost;
use crate::model::{self, Activity, Event, EventFields, NewActivity, Program};
use crate::state::{EventsState, FETCH_FAILED_MESSAGE, Transition};
use crate::sync;

/// Client-side owner of the event tree.
///
/// Every mutation takes `&mut self`: at most one operation can be changing
/// the cache at a time, and readers never observe a half-applied
/// transition. The remote store stays authoritative; after each write the
/// cache is re-read in full (except for `create_event` and `update_event`,
/// which patch the single affected event).
///
/// A refresh that fails after a successful write does not fail the write.
/// It is logged and recorded in [`EventsState::error`], and the previous
/// tree is kept.
pub struct PlannerStore {
    documents: Arc<dyn DocumentStore>,
    images: Arc<dyn ImageHost>,
    state: EventsState,
}

impl std::fmt::Debug for PlannerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannerStore")
            .field("events", &self.state.events.len())
            .field("loading", &self.state.loading)
            .field("error", &self.state.error)
            .finish()
    }
}

impl PlannerStore {
    /// Start building a store.
    pub fn builder() -> PlannerStoreBuilder {
        PlannerStoreBuilder::new()
    }

    /// The full cached state.
    pub fn state(&self) -> &EventsState {
        &self.state
    }

    /// Cached events, newest start date first.
    pub fn events(&self) -> &[Event] {
        &self.state.events
    }

    /// A cached event by key.
    pub fn event(&self, event_id: &str) -> Option<&Event> {
        self.state.events.iter().find(|e| e.id == event_id)
    }

    /// A cached program by event and program key.
    pub fn program(&self, event_id: &str, program_id: &str) -> Option<&Program> {
        self.event(event_id)?
            .programs
            .iter()
            .find(|p| p.id == program_id)
    }

    /// Cached events matching both title and access code.
    /// See [`find_events`](crate::find_events).
    pub fn find_events(&self, title: &str, access_code: &str) -> Vec<&Event> {
        access::find_events(&self.state.events, title, access_code)
    }

    fn transition(&mut self, transition: Transition) {
        self.state = std::mem::take(&mut self.state).apply(transition);
    }

    /// Re-read the whole tree from the document store.
    ///
    /// On success the cache is replaced. On failure the previous tree is
    /// kept and [`FETCH_FAILED_MESSAGE`] is recorded in
    /// [`EventsState::error`]. No retry is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Store`] if any read fails or any document
    /// cannot be decoded.
    pub async fn fetch_all(&mut self) -> Result<(), PlannerError> {
        self.transition(Transition::FetchStarted);
        match sync::fetch_tree(self.documents.as_ref()).await {
            Ok(events) => {
                self.transition(Transition::FetchSucceeded(events));
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch events");
                self.transition(Transition::FetchFailed(FETCH_FAILED_MESSAGE.to_owned()));
                Err(e.into())
            }
        }
    }

    /// Re-read the tree if the last refresh failed. Cascades are planned
    /// from the cache, so a stale cache would miss children.
    async fn ensure_fresh(&mut self) -> Result<(), PlannerError> {
        if self.state.error.is_some() {
            tracing::debug!("cache is stale; refreshing before planning cascade");
            self.fetch_all().await?;
        }
        Ok(())
    }

    async fn refresh(&mut self) {
        if let Err(e) = self.fetch_all().await {
            tracing::warn!(error = %e, "refresh after write failed; cached tree may be stale");
        }
    }

    /// Create an event and append it to the cache.
    ///
    /// The cache is not re-read; the new event is appended as-is with no
    /// programs, so it sits after existing events regardless of its start
    /// date until the next refresh.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Store`] if the write fails. The cache is
    /// unchanged in that case.
    pub async fn create_event(&mut self, fields: EventFields) -> Result<Event, PlannerError> {
        let doc = model::encode_new_event(&fields, Utc::now());
        let id = self
            .documents
            .add(Collection::Events, doc)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "failed to create event"))?;

        let event = fields.into_event(id);
        tracing::info!(event_id = %event.id, title = %event.title, "event created");
        self.transition(Transition::EventAdded(event.clone()));
        Ok(event)
    }

    /// Overwrite an event's scalar fields and replace its cached entry.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Store`] if the write fails, including
    /// [`StoreError::NotFound`](crate::StoreError::NotFound) for an event
    /// that no longer exists remotely.
    pub async fn update_event(&mut self, event: &Event) -> Result<(), PlannerError> {
        let doc = model::encode_event_update(event, Utc::now());
        self.documents
            .update(Collection::Events, &event.id, doc)
            .await
            .inspect_err(|e| tracing::error!(event_id = %event.id, error = %e, "failed to update event"))?;

        tracing::info!(event_id = %event.id, "event updated");
        self.transition(Transition::EventUpdated(event.clone()));
        Ok(())
    }

    /// Delete an event and everything beneath it.
    ///
    /// Each cached program is cascaded in turn (activities, then photos,
    /// then the program record) before the event record is deleted. An
    /// event missing from the cache is deleted on its own. If the last
    /// refresh failed, the tree is re-read first.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Store`] if the tree is stale and cannot be
    /// re-read; nothing is deleted in that case. Returns
    /// [`PlannerError::Cascade`] if any step fails. Earlier steps are not
    /// rolled back; the cache is refreshed to show what remains.
    pub async fn delete_event(&mut self, event_id: &str) -> Result<CascadeReport, PlannerError> {
        self.ensure_fresh().await?;
        let plan = match self.event(event_id) {
            Some(event) => CascadePlan::for_event(event),
            None => {
                tracing::warn!(%event_id, "event not cached; deleting its record only");
                single_step(CascadeStep::Event {
                    event_id: event_id.to_owned(),
                })
            }
        };
        let has_children = plan.has_children();

        match cascade::execute(plan, self.documents.as_ref(), self.images.as_ref()).await {
            Ok(report) => {
                tracing::info!(%event_id, steps = report.completed.len(), "event deleted");
                self.transition(Transition::EventRemoved(event_id.to_owned()));
                if has_children {
                    self.refresh().await;
                }
                Ok(report)
            }
            Err(e) => {
                if !e.completed.is_empty() {
                    self.refresh().await;
                }
                Err(e.into())
            }
        }
    }

    /// Create a program day under an event and return its key.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Store`] if the write fails.
    pub async fn create_program(
        &mut self,
        event_id: &str,
        date: DateTime<Utc>,
    ) -> Result<String, PlannerError> {
        let doc = model::encode_new_program(event_id, date, Utc::now());
        let id = self
            .documents
            .add(Collection::Programs, doc)
            .await
            .inspect_err(|e| tracing::error!(%event_id, error = %e, "failed to create program"))?;

        tracing::info!(%event_id, program_id = %id, "program created");
        self.refresh().await;
        Ok(id)
    }

    /// Overwrite a program's date.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Store`] if the write fails.
    pub async fn update_program(&mut self, program: &Program) -> Result<(), PlannerError> {
        let doc = model::encode_program_update(program, Utc::now());
        self.documents
            .update(Collection::Programs, &program.id, doc)
            .await
            .inspect_err(|e| {
                tracing::error!(program_id = %program.id, error = %e, "failed to update program")
            })?;

        tracing::info!(program_id = %program.id, "program updated");
        self.refresh().await;
        Ok(())
    }

    /// Delete a program: its activities, then its photos (image first,
    /// then record), then the program record. If the last refresh failed,
    /// the tree is re-read first.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Store`] if the tree is stale and cannot be
    /// re-read; nothing is deleted in that case.
    /// Returns [`PlannerError::Cascade`] if any step fails. Completed steps
    /// stay deleted; calling again finishes the job.
    pub async fn delete_program(
        &mut self,
        event_id: &str,
        program_id: &str,
    ) -> Result<CascadeReport, PlannerError> {
        self.ensure_fresh().await?;
        let plan = match self.program(event_id, program_id) {
            Some(program) => CascadePlan::for_program(program),
            None => {
                tracing::warn!(%event_id, %program_id, "program not cached; deleting its record only");
                single_step(CascadeStep::Program {
                    program_id: program_id.to_owned(),
                })
            }
        };

        let result = cascade::execute(plan, self.documents.as_ref(), self.images.as_ref()).await;
        match result {
            Ok(report) => {
                tracing::info!(%event_id, %program_id, steps = report.completed.len(), "program deleted");
                self.refresh().await;
                Ok(report)
            }
            Err(e) => {
                if !e.completed.is_empty() {
                    self.refresh().await;
                }
                Err(e.into())
            }
        }
    }

    /// Create an activity within a program day and return its key.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Store`] if the write fails.
    pub async fn create_activity(
        &mut self,
        event_id: &str,
        program_id: &str,
        activity: NewActivity,
    ) -> Result<String, PlannerError> {
        let doc = model::encode_new_activity(program_id, &activity, Utc::now());
        let id = self
            .documents
            .add(Collection::Activities, doc)
            .await
            .inspect_err(|e| {
                tracing::error!(%event_id, %program_id, error = %e, "failed to create activity")
            })?;

        tracing::info!(%event_id, %program_id, activity_id = %id, "activity created");
        self.refresh().await;
        Ok(id)
    }

    /// Overwrite an activity's time, title and description.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Store`] if the write fails.
    pub async fn update_activity(
        &mut self,
        event_id: &str,
        program_id: &str,
        activity: &Activity,
    ) -> Result<(), PlannerError> {
        let doc = model::encode_activity_update(activity, Utc::now());
        self.documents
            .update(Collection::Activities, &activity.id, doc)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    %event_id,
                    %program_id,
                    activity_id = %activity.id,
                    error = %e,
                    "failed to update activity"
                )
            })?;

        tracing::info!(%event_id, %program_id, activity_id = %activity.id, "activity updated");
        self.refresh().await;
        Ok(())
    }

    /// Delete an activity record.
    ///
    /// Photos attached to the activity are left in place, both remotely and
    /// on the image host. They remain on the program's photo list and are
    /// removed when the program is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Store`] if the delete fails.
    pub async fn delete_activity(
        &mut self,
        event_id: &str,
        program_id: &str,
        activity_id: &str,
    ) -> Result<(), PlannerError> {
        let kept_photos = self
            .program(event_id, program_id)
            .map_or(0, |p| p.photos.iter().filter(|ph| ph.activity_id == activity_id).count());

        self.documents
            .delete(Collection::Activities, activity_id)
            .await
            .inspect_err(|e| {
                tracing::error!(%event_id, %program_id, %activity_id, error = %e, "failed to delete activity")
            })?;

        if kept_photos > 0 {
            tracing::warn!(%activity_id, photos = kept_photos, "activity deleted; its photos were kept");
        }
        tracing::info!(%event_id, %program_id, %activity_id, "activity deleted");
        self.refresh().await;
        Ok(())
    }

    /// Upload a local image and record it against an activity. Returns the
    /// new photo key.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::ImageHost`] if reading or uploading the image
    /// fails, or [`PlannerError::Store`] if the record write fails. In the
    /// latter case the uploaded image stays on the host.
    pub async fn add_photo(
        &mut self,
        event_id: &str,
        program_id: &str,
        activity_id: &str,
        image: &Path,
    ) -> Result<String, PlannerError> {
        let uploaded = self.images.upload(image).await.inspect_err(|e| {
            tracing::error!(%event_id, %program_id, %activity_id, error = %e, "failed to upload photo")
        })?;

        let doc = model::encode_new_photo(
            program_id,
            activity_id,
            &uploaded.secure_url,
            &uploaded.public_id,
            Utc::now(),
        );
        let id = match self.documents.add(Collection::Photos, doc).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(
                    %activity_id,
                    public_id = %uploaded.public_id,
                    error = %e,
                    "photo record write failed; uploaded image left orphaned"
                );
                return Err(e.into());
            }
        };

        tracing::info!(%event_id, %program_id, %activity_id, photo_id = %id, "photo added");
        self.refresh().await;
        Ok(id)
    }

    /// Destroy a photo's hosted image, then delete its record.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::ImageHost`] if the host does not confirm the
    /// image deletion; the record is kept. Returns [`PlannerError::Store`]
    /// if the record delete fails after the image is gone.
    pub async fn delete_photo(
        &mut self,
        event_id: &str,
        program_id: &str,
        activity_id: &str,
        photo_id: &str,
        public_id: &str,
    ) -> Result<(), PlannerError> {
        cascade::delete_photo(
            photo_id,
            public_id,
            self.documents.as_ref(),
            self.images.as_ref(),
        )
        .await?;

        tracing::info!(%event_id, %program_id, %activity_id, %photo_id, "photo deleted");
        self.refresh().await;
        Ok(())
    }
}

fn single_step(target: CascadeStep) -> CascadePlan {
    CascadePlan {
        steps: vec![target.clone()],
        target,
    }
}

/// Builder for [`PlannerStore`].
///
/// Explicit backends take precedence over those derived from the
/// configuration.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> Result<(), gventos::PlannerError> {
/// use gventos::{PlannerConfig, PlannerStore};
///
/// let store = PlannerStore::builder()
///     .config(PlannerConfig::from_env()?)
///     .open()
///     .await?;
/// println!("{} events", store.events().len());
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct PlannerStoreBuilder {
    config: Option<PlannerConfig>,
    documents: Option<Arc<dyn DocumentStore>>,
    images: Option<Arc<dyn ImageHost>>,
    firestore_base_url: Option<String>,
    cloudinary_base_url: Option<String>,
}

impl PlannerStoreBuilder {
    /// Create a builder with no backends.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive any backend not supplied explicitly from `config`.
    pub fn config(mut self, config: PlannerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use `store` for entity documents.
    pub fn document_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.documents = Some(store);
        self
    }

    /// Use `host` for photo images.
    pub fn image_host(mut self, host: Arc<dyn ImageHost>) -> Self {
        self.images = Some(host);
        self
    }

    /// Point the configured document store at a different API root.
    ///
    /// Only applies to a document store derived from [`config`](Self::config);
    /// [`build`](Self::build) rejects it otherwise.
    pub fn firestore_base_url(mut self, url: impl Into<String>) -> Self {
        self.firestore_base_url = Some(url.into());
        self
    }

    /// Point the configured image host at a different API root.
    ///
    /// Only applies to an image host derived from [`config`](Self::config);
    /// [`build`](Self::build) rejects it otherwise.
    pub fn cloudinary_base_url(mut self, url: impl Into<String>) -> Self {
        self.cloudinary_base_url = Some(url.into());
        self
    }

    /// Assemble the store with an empty cache. No remote call is made.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoBackend`] if a backend is neither supplied
    /// nor derivable from configuration, [`ConfigError::UnusedOverride`] if
    /// a base URL override has no configured backend to apply to, or
    /// [`ConfigError::HttpClient`] if the HTTP client cannot be built.
    pub fn build(self) -> Result<PlannerStore, ConfigError> {
        let derives_documents = self.config.is_some() && self.documents.is_none();
        if self.firestore_base_url.is_some() && !derives_documents {
            return Err(ConfigError::UnusedOverride("document store"));
        }
        let derives_images = self.config.is_some() && self.images.is_none();
        if self.cloudinary_base_url.is_some() && !derives_images {
            return Err(ConfigError::UnusedOverride("image host"));
        }

        let mut documents = self.documents;
        let mut images = self.images;

        if let Some(mut config) = self.config {
            let http = crate::config::http_client(config.request_timeout)?;
            if documents.is_none() {
                if let Some(url) = self.firestore_base_url {
                    config.firestore.base_url = url;
                }
                documents = Some(Arc::new(FirestoreClient::with_http(
                    http.clone(),
                    &config.firestore,
                )));
            }
            if images.is_none() {
                if let Some(url) = self.cloudinary_base_url {
                    config.cloudinary.base_url = url;
                }
                images = Some(Arc::new(CloudinaryClient::with_http(http, &config.cloudinary)));
            }
        }

        Ok(PlannerStore {
            documents: documents.ok_or(ConfigError::NoBackend("document store"))?,
            images: images.ok_or(ConfigError::NoBackend("image host"))?,
            state: EventsState::default(),
        })
    }

    /// Assemble the store and perform the initial full read.
    ///
    /// A failed initial read does not fail `open`; it is recorded in
    /// [`EventsState::error`] and [`PlannerStore::fetch_all`] can be called
    /// again.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::Config`] under the same conditions as
    /// [`build`](PlannerStoreBuilder::build).
    pub async fn open(self) -> Result<PlannerStore, PlannerError> {
        let mut store = self.build()?;
        if let Err(e) = store.fetch_all().await {
            tracing::warn!(error = %e, "initial fetch failed");
        }
        Ok(store)
    }
}
