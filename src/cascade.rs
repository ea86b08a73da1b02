//! Ordered, non-transactional cascade deletes.
//!
//! A parent is deleted only after every child beneath it. The steps are
//! planned up front from the cached tree and executed strictly in order,
//! each one awaited before the next starts. A failure stops the run and
//! reports exactly which steps already took effect.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::{Collection, DocumentStore};
use crate::error::{CascadeError, PlannerError};
use crate::image_host::ImageHost;
use crate::model::{Event, Program};

/// One remote deletion within a cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CascadeStep {
    /// Delete an event record.
    Event { event_id: String },
    /// Delete a program record.
    Program { program_id: String },
    /// Delete an activity record.
    Activity { activity_id: String },
    /// Destroy the hosted image, then delete the photo record.
    Photo { photo_id: String, public_id: String },
}

impl fmt::Display for CascadeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event { event_id } => write!(f, "event {event_id}"),
            Self::Program { program_id } => write!(f, "program {program_id}"),
            Self::Activity { activity_id } => write!(f, "activity {activity_id}"),
            Self::Photo { photo_id, .. } => write!(f, "photo {photo_id}"),
        }
    }
}

/// The ordered deletions needed to remove one parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadePlan {
    /// The parent being removed. Always the last element of `steps`.
    pub target: CascadeStep,
    /// Every deletion, children first.
    pub steps: Vec<CascadeStep>,
}

impl CascadePlan {
    /// Activities, then photos, then the program itself.
    ///
    /// Photos are taken from the program's own list, so photos whose
    /// activity is already gone are still cleaned up.
    pub fn for_program(program: &Program) -> Self {
        let target = CascadeStep::Program {
            program_id: program.id.clone(),
        };
        let mut steps: Vec<CascadeStep> = program
            .activities
            .iter()
            .map(|a| CascadeStep::Activity {
                activity_id: a.id.clone(),
            })
            .collect();
        steps.extend(program.photos.iter().map(|p| CascadeStep::Photo {
            photo_id: p.id.clone(),
            public_id: p.public_id.clone(),
        }));
        steps.push(target.clone());
        Self { target, steps }
    }

    /// Each program's cascade in turn, then the event itself.
    pub fn for_event(event: &Event) -> Self {
        let target = CascadeStep::Event {
            event_id: event.id.clone(),
        };
        let mut steps: Vec<CascadeStep> = event
            .programs
            .iter()
            .flat_map(|p| Self::for_program(p).steps)
            .collect();
        steps.push(target.clone());
        Self { target, steps }
    }

    /// Whether the plan deletes anything besides the target.
    pub fn has_children(&self) -> bool {
        self.steps.len() > 1
    }
}

/// Outcome of a cascade that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeReport {
    /// The parent that was removed.
    pub target: CascadeStep,
    /// Every step executed, in order. Ends with `target`.
    pub completed: Vec<CascadeStep>,
}

/// Execute `plan` step by step.
///
/// # Errors
///
/// Returns [`CascadeError`] at the first failing step, carrying the steps
/// already completed and those never attempted.
pub(crate) async fn execute(
    plan: CascadePlan,
    documents: &dyn DocumentStore,
    images: &dyn ImageHost,
) -> Result<CascadeReport, CascadeError> {
    let CascadePlan { target, steps } = plan;
    let mut completed = Vec::with_capacity(steps.len());
    let mut remaining = steps.into_iter();

    while let Some(step) = remaining.next() {
        match execute_step(&step, documents, images).await {
            Ok(()) => {
                tracing::debug!(%step, "cascade step executed");
                completed.push(step);
            }
            Err(source) => {
                let pending: Vec<CascadeStep> = remaining.collect();
                tracing::error!(
                    %target,
                    %step,
                    completed = completed.len(),
                    pending = pending.len(),
                    error = %source,
                    "cascade delete stopped"
                );
                return Err(CascadeError {
                    target,
                    completed,
                    failed: step,
                    pending,
                    source: Box::new(source),
                });
            }
        }
    }

    Ok(CascadeReport { target, completed })
}

async fn execute_step(
    step: &CascadeStep,
    documents: &dyn DocumentStore,
    images: &dyn ImageHost,
) -> Result<(), PlannerError> {
    match step {
        CascadeStep::Event { event_id } => documents.delete(Collection::Events, event_id).await?,
        CascadeStep::Program { program_id } => {
            documents.delete(Collection::Programs, program_id).await?
        }
        CascadeStep::Activity { activity_id } => {
            documents.delete(Collection::Activities, activity_id).await?
        }
        CascadeStep::Photo {
            photo_id,
            public_id,
        } => delete_photo(photo_id, public_id, documents, images).await?,
    }
    Ok(())
}

/// Destroy the hosted image, then delete the record. The record is kept if
/// the image host does not confirm the deletion.
pub(crate) async fn delete_photo(
    photo_id: &str,
    public_id: &str,
    documents: &dyn DocumentStore,
    images: &dyn ImageHost,
) -> Result<(), PlannerError> {
    if let Err(e) = images.destroy(public_id).await {
        tracing::error!(%photo_id, %public_id, error = %e, "image deletion failed; photo record kept");
        return Err(e.into());
    }
    documents.delete(Collection::Photos, photo_id).await?;
    Ok(())
}
