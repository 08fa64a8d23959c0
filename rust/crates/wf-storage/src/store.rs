//! MongoDB-backed implementation of the State Store (spec.md §4.1).

use bson::{doc, Bson, Document};
use futures::stream::TryStreamExt;
use mongodb::options::{FindOptions, IndexOptions, UpdateOptions};
use mongodb::{Collection, Database, IndexModel};

use wf_core::{Error, Workflow, WorkflowStatus};

/// Thin wrapper around a single `workflows` collection. Cloning is cheap —
/// `mongodb::Collection` is an `Arc`-backed handle, matching the teacher's
/// `#[derive(Clone)]` repo pattern.
#[derive(Clone)]
pub struct WorkflowStore {
    collection: Collection<Workflow>,
}

fn status_str(status: WorkflowStatus) -> String {
    status.to_string()
}

impl WorkflowStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("workflows"),
        }
    }

    /// Creates the unique index on `workflow_id` (spec.md §4.1, §6). Call
    /// once at startup; safe to call repeatedly (idempotent on the server).
    pub async fn ensure_indexes(&self) -> Result<(), Error> {
        let index = IndexModel::builder()
            .keys(doc! { "workflow_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    /// `save(doc)` (spec.md §4.1): insert, failing with `DuplicateWorkflowId`
    /// on a duplicate `workflow_id`.
    pub async fn save(&self, workflow: &Workflow) -> Result<(), Error> {
        match self.collection.insert_one(workflow).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(Error::DuplicateWorkflowId {
                workflow_id: workflow.workflow_id.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// `get(workflow_id) -> doc | NotFound` (spec.md §4.1).
    pub async fn get(&self, workflow_id: &str) -> Result<Workflow, Error> {
        self.collection
            .find_one(doc! { "workflow_id": workflow_id })
            .await?
            .ok_or_else(|| Error::NotFound {
                entity: "workflow",
                id: workflow_id.to_string(),
            })
    }

    /// `list_by_status(status) -> [docs]`, newest-first (spec.md §4.1).
    pub async fn list_by_status(&self, status: WorkflowStatus) -> Result<Vec<Workflow>, Error> {
        self.find_sorted(doc! { "status": status_str(status) }).await
    }

    /// `list_active() -> [docs where status in {pending, queued, running}]`,
    /// newest-first (spec.md §4.1).
    pub async fn list_active(&self) -> Result<Vec<Workflow>, Error> {
        self.find_sorted(doc! {
            "status": { "$in": ["pending", "queued", "running"] }
        })
        .await
    }

    async fn find_sorted(&self, filter: Document) -> Result<Vec<Workflow>, Error> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self.collection.find(filter).with_options(options).await?;
        let docs: Vec<Workflow> = cursor.try_collect().await?;
        Ok(docs)
    }

    /// `update_workflow_fields(workflow_id, updates)` (spec.md §4.1): set
    /// selected top-level fields plus `updated_at`, which the store owns.
    pub async fn update_workflow_fields(&self, workflow_id: &str, mut updates: Document) -> Result<(), Error> {
        updates.insert("updated_at", Bson::DateTime(bson::DateTime::now()));
        self.apply_update(doc! { "workflow_id": workflow_id }, doc! { "$set": updates })
            .await
    }

    /// `update_step_fields(workflow_id, step_id, updates)` (spec.md §4.1):
    /// positional update addressing the step whose `step_id` matches.
    pub async fn update_step_fields(&self, workflow_id: &str, step_id: &str, updates: Document) -> Result<(), Error> {
        self.update_step_positional(workflow_id, doc! { "steps.step_id": step_id }, "steps.$", updates)
            .await
    }

    /// `update_step_by_name(workflow_id, step_name, updates)` (spec.md
    /// §4.1): same, addressed by `step_name`.
    pub async fn update_step_by_name(&self, workflow_id: &str, step_name: &str, updates: Document) -> Result<(), Error> {
        self.update_step_positional(
            workflow_id,
            doc! { "steps.step_name": step_name },
            "steps.$",
            updates,
        )
        .await
    }

    async fn update_step_positional(
        &self,
        workflow_id: &str,
        mut filter: Document,
        positional_prefix: &str,
        updates: Document,
    ) -> Result<(), Error> {
        filter.insert("workflow_id", workflow_id);
        let mut set_doc = Document::new();
        for (k, v) in updates {
            set_doc.insert(format!("{positional_prefix}.{k}"), v);
        }
        set_doc.insert("updated_at", Bson::DateTime(bson::DateTime::now()));
        self.apply_update(filter, doc! { "$set": set_doc }).await
    }

    /// `add_to_running_steps(workflow_id, step_id)` (spec.md §4.1): atomic
    /// set-membership plus counter adjustment on `execution_metadata`.
    pub async fn add_to_running_steps(&self, workflow_id: &str, step_id: &str) -> Result<(), Error> {
        self.apply_update(
            doc! { "workflow_id": workflow_id },
            doc! {
                "$addToSet": { "execution_metadata.currently_running_step_ids": step_id },
                "$inc": { "execution_metadata.running_steps": 1, "execution_metadata.pending_steps": -1 },
                "$set": { "updated_at": Bson::DateTime(bson::DateTime::now()) },
            },
        )
        .await
    }

    /// `remove_from_running_steps(workflow_id, step_id)` (spec.md §4.1).
    pub async fn remove_from_running_steps(&self, workflow_id: &str, step_id: &str) -> Result<(), Error> {
        self.apply_update(
            doc! { "workflow_id": workflow_id },
            doc! {
                "$pull": { "execution_metadata.currently_running_step_ids": step_id },
                "$inc": { "execution_metadata.running_steps": -1 },
                "$set": { "updated_at": Bson::DateTime(bson::DateTime::now()) },
            },
        )
        .await
    }

    /// `add_to_completed_steps(workflow_id, step_id)` (spec.md §4.1).
    pub async fn add_to_completed_steps(&self, workflow_id: &str, step_id: &str) -> Result<(), Error> {
        self.apply_update(
            doc! { "workflow_id": workflow_id },
            doc! {
                "$addToSet": { "execution_metadata.completed_step_ids": step_id },
                "$inc": { "execution_metadata.completed_steps": 1 },
                "$set": { "updated_at": Bson::DateTime(bson::DateTime::now()) },
            },
        )
        .await
    }

    /// `increment_workflow_field(workflow_id, path, delta)` (spec.md §4.1):
    /// atomic counter increment, e.g. `execution_metadata.failed_steps`.
    pub async fn increment_workflow_field(&self, workflow_id: &str, path: &str, delta: i64) -> Result<(), Error> {
        self.apply_update(
            doc! { "workflow_id": workflow_id },
            doc! {
                "$inc": { path: delta },
                "$set": { "updated_at": Bson::DateTime(bson::DateTime::now()) },
            },
        )
        .await
    }

    async fn apply_update(&self, filter: Document, update: Document) -> Result<(), Error> {
        let options = UpdateOptions::builder().build();
        let result = self
            .collection
            .update_one(filter.clone(), update)
            .with_options(options)
            .await?;
        if result.matched_count == 0 {
            let workflow_id = filter
                .get_str("workflow_id")
                .unwrap_or("<unknown>")
                .to_string();
            return Err(Error::NotFound {
                entity: "workflow",
                id: workflow_id,
            });
        }
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(we)) if we.code == 11000
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // Exercises the pure helper logic only; the collection itself requires
    // a live MongoDB instance and is covered by integration tests run
    // against a test deployment, not unit tests.
    #[test]
    fn status_str_matches_wire_format() {
        assert_eq!(status_str(WorkflowStatus::Pending), "pending");
        assert_eq!(status_str(WorkflowStatus::Running), "running");
    }
}
