use serde::{Deserialize, Serialize};

/// Workflow step a document is waiting in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: i64,
    pub name: String,
    pub display_name: String,
}

/// Page document owning attachments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub name: String,
    /// Pending workflow step, `None` when the document is not under workflow
    pub workflow_step: Option<WorkflowStep>,
}

impl Document {
    pub fn has_pending_workflow(&self) -> bool {
        self.workflow_step.is_some()
    }
}
