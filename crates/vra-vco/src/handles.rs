//! [`ResourceHandle`] implementations for orchestrator objects.

use crate::models::{Action, ConfigurationElement, Workflow};
use vra_core::uuid::{ActionId, CategoryId, ConfigElementId, WorkflowId};
use vra_lifecycle::ResourceHandle;

const ACTIONS: &str = "vco/api/actions";
const WORKFLOWS: &str = "vco/api/workflows";
const CONFIGURATIONS: &str = "vco/api/configurations";

/// Handle for an action.
///
/// The server only assigns an id on create. Until then the action is locked
/// and addressed by `module/name`; once the id is known it is used for both,
/// so renaming an existing action keeps its lock.
///
/// Module and name are percent-encoded as single path segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionHandle {
    module: String,
    name: String,
    id: Option<ActionId>,
    force_delete: bool,
}

impl ActionHandle {
    /// Handle for the action `module/name`.
    #[must_use]
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            id: None,
            force_delete: false,
        }
    }

    /// Handle for an action as configured or last read.
    #[must_use]
    pub fn for_action(action: &Action) -> Self {
        Self {
            id: action.id,
            ..Self::new(action.module.clone(), action.name.clone())
        }
    }

    /// Record the server-assigned id.
    #[must_use]
    pub const fn with_id(mut self, id: ActionId) -> Self {
        self.id = Some(id);
        self
    }

    /// Delete even if workflows still call the action.
    #[must_use]
    pub const fn with_force_delete(mut self, force: bool) -> Self {
        self.force_delete = force;
        self
    }

    /// Server-assigned id, if known.
    #[must_use]
    pub const fn id(&self) -> Option<ActionId> {
        self.id
    }

    fn object_path(&self) -> String {
        match self.id {
            Some(id) => format!("{ACTIONS}/{id}"),
            None => format!(
                "{ACTIONS}/{}/{}",
                urlencoding::encode(&self.module),
                urlencoding::encode(&self.name)
            ),
        }
    }
}

impl ResourceHandle for ActionHandle {
    fn identity_key(&self) -> String {
        match self.id {
            Some(id) => format!("action:{id}"),
            None => format!("action:{}/{}", self.module, self.name),
        }
    }

    fn create_path(&self) -> String {
        ACTIONS.to_string()
    }

    fn read_path(&self) -> String {
        self.object_path()
    }

    fn update_path(&self) -> String {
        self.object_path()
    }

    fn delete_path(&self) -> String {
        self.object_path()
    }

    fn force_delete(&self) -> bool {
        self.force_delete
    }
}

/// Handle for a workflow. The id is chosen client-side, so it is always known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowHandle {
    id: WorkflowId,
    category_id: Option<CategoryId>,
    force_delete: bool,
}

impl WorkflowHandle {
    /// Handle for workflow `id`.
    #[must_use]
    pub const fn new(id: WorkflowId) -> Self {
        Self {
            id,
            category_id: None,
            force_delete: false,
        }
    }

    /// Handle for a workflow as configured or last read.
    #[must_use]
    pub const fn for_workflow(workflow: &Workflow) -> Self {
        Self {
            id: workflow.id,
            category_id: workflow.category_id,
            force_delete: false,
        }
    }

    /// Folder to create the workflow in.
    #[must_use]
    pub const fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Delete even if other workflows still reference this one.
    #[must_use]
    pub const fn with_force_delete(mut self, force: bool) -> Self {
        self.force_delete = force;
        self
    }

    fn object_path(&self) -> String {
        format!("{WORKFLOWS}/{}", self.id)
    }
}

impl ResourceHandle for WorkflowHandle {
    fn identity_key(&self) -> String {
        format!("workflow:{}", self.id)
    }

    fn create_path(&self) -> String {
        match self.category_id {
            Some(category) => format!("{WORKFLOWS}?categoryId={category}"),
            None => WORKFLOWS.to_string(),
        }
    }

    fn read_path(&self) -> String {
        self.object_path()
    }

    fn update_path(&self) -> String {
        self.object_path()
    }

    fn delete_path(&self) -> String {
        self.object_path()
    }

    fn force_delete(&self) -> bool {
        self.force_delete
    }
}

/// Handle for a configuration element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationHandle {
    id: ConfigElementId,
    force_delete: bool,
}

impl ConfigurationHandle {
    /// Handle for configuration element `id`.
    #[must_use]
    pub const fn new(id: ConfigElementId) -> Self {
        Self {
            id,
            force_delete: false,
        }
    }

    /// Handle for an element as configured or last read.
    #[must_use]
    pub const fn for_element(element: &ConfigurationElement) -> Self {
        Self::new(element.id)
    }

    /// Delete even if workflows still bind the element's attributes.
    #[must_use]
    pub const fn with_force_delete(mut self, force: bool) -> Self {
        self.force_delete = force;
        self
    }
}

impl ResourceHandle for ConfigurationHandle {
    fn identity_key(&self) -> String {
        format!("configuration:{}", self.id)
    }

    fn create_path(&self) -> String {
        CONFIGURATIONS.to_string()
    }

    fn read_path(&self) -> String {
        format!("{CONFIGURATIONS}/{}", self.id)
    }

    fn update_path(&self) -> String {
        self.read_path()
    }

    fn delete_path(&self) -> String {
        self.read_path()
    }

    fn force_delete(&self) -> bool {
        self.force_delete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vra_lifecycle::Operation;

    #[test]
    fn action_paths_follow_id() {
        let handle = ActionHandle::new("com.acme.util", "notify");
        assert_eq!(handle.identity_key(), "action:com.acme.util/notify");
        assert_eq!(handle.create_path(), "vco/api/actions");
        assert_eq!(
            handle.read_path(),
            "vco/api/actions/com.acme.util/notify"
        );

        let id = ActionId::new_v4();
        let handle = handle.with_id(id);
        assert_eq!(handle.identity_key(), format!("action:{id}"));
        assert_eq!(handle.path_for(Operation::Delete), format!("vco/api/actions/{id}"));
        assert!(!handle.force_delete());
    }

    #[test]
    fn renamed_action_keeps_its_key() {
        let id = ActionId::new_v4();
        let before = ActionHandle::new("com.acme.util", "notify").with_id(id);
        let after = ActionHandle::new("com.acme.util", "notify_v2").with_id(id);
        assert_eq!(before.identity_key(), after.identity_key());
        assert_eq!(before.update_path(), after.update_path());
    }

    #[test]
    fn action_name_is_encoded_as_one_segment() {
        let handle = ActionHandle::new("com.acme", "notify#v2");
        assert_eq!(handle.read_path(), "vco/api/actions/com.acme/notify%23v2");

        let handle = ActionHandle::new("com.acme/extra", "a b?c");
        assert_eq!(
            handle.delete_path(),
            "vco/api/actions/com.acme%2Fextra/a%20b%3Fc"
        );
    }

    #[test]
    fn action_handle_from_model() {
        let id = ActionId::new_v4();
        let action = Action {
            id: Some(id),
            ..Action::new("com.acme.util", "notify")
        };
        let handle = ActionHandle::for_action(&action).with_force_delete(true);
        assert_eq!(handle.id(), Some(id));
        assert!(handle.force_delete());
    }

    #[test]
    fn workflow_create_path_carries_category() {
        let id = WorkflowId::new_v4();
        let category = CategoryId::new_v4();
        let handle = WorkflowHandle::new(id).with_category(category);

        assert_eq!(handle.identity_key(), format!("workflow:{id}"));
        assert_eq!(
            handle.create_path(),
            format!("vco/api/workflows?categoryId={category}")
        );
        assert_eq!(handle.update_path(), format!("vco/api/workflows/{id}"));
        assert_eq!(WorkflowHandle::new(id).create_path(), "vco/api/workflows");
    }

    #[test]
    fn configuration_paths() {
        let id = ConfigElementId::new_v4();
        let handle = ConfigurationHandle::new(id);
        assert_eq!(handle.identity_key(), format!("configuration:{id}"));
        assert_eq!(handle.create_path(), "vco/api/configurations");
        assert_eq!(handle.delete_path(), format!("vco/api/configurations/{id}"));
    }
}
