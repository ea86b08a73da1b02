//! Event-planning client over a remote document store and image host.
//!
//! [`PlannerStore`] caches the `Event -> Program -> Activity -> Photo` tree
//! and performs every write against the backends, re-reading the tree after
//! each one. Backends sit behind the [`DocumentStore`] and [`ImageHost`]
//! traits; [`FirestoreClient`] and [`CloudinaryClient`] talk to the real
//! services and [`MemoryDocumentStore`] runs in-process.

mod access;
pub use access::find_events;
mod auth;
pub use auth::BearerToken;
mod cascade;
pub use cascade::{CascadePlan, CascadeReport, CascadeStep};
mod cloudinary;
pub use cloudinary::{CloudinaryClient, destroy_signature};
mod config;
mod document;
mod error;
mod firestore;
mod image_host;
mod memory;
mod model;
mod state;
mod store;
mod sync;

pub use config::{
    CloudinaryConfig, DEFAULT_CLOUDINARY_BASE_URL, DEFAULT_DATABASE_ID,
    DEFAULT_FIRESTORE_BASE_URL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_UPLOAD_PRESET, FirestoreConfig,
    PlannerConfig,
};
pub use document::{Collection, Document, DocumentStore, FieldValue, Fields, Query, SortDirection};
pub use error::{CascadeError, ConfigError, ImageHostError, PlannerError, StoreError};
pub use firestore::FirestoreClient;
pub use image_host::{ImageHost, UploadedImage, local_image_path};
pub use memory::MemoryDocumentStore;
pub use model::{Activity, Event, EventFields, NewActivity, Photo, Program};
pub use state::{EventsState, FETCH_FAILED_MESSAGE, Transition};
pub use store::{PlannerStore, PlannerStoreBuilder};
pub use sync::fetch_tree;
