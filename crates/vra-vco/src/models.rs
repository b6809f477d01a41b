//! Orchestrator objects as the lifecycle layer sends and decodes them.
//!
//! Only the fields the lifecycle needs to identify an object and carry its
//! content are modelled; anything else the server returns is ignored on
//! decode.

use serde::{Deserialize, Serialize};
use vra_core::uuid::{ActionId, CategoryId, ConfigElementId, WorkflowId};

/// Typed input parameter of an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Orchestrator type, e.g. `string` or `Array/string`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Scriptable action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Action {
    /// Server-assigned identifier, absent until created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ActionId>,
    /// Action name within its module.
    pub name: String,
    /// Dotted module name, e.g. `com.acme.util`.
    pub module: String,
    /// `module/name`, filled in by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqn: Option<String>,
    /// Version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Script body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Declared inputs.
    #[serde(
        rename = "input-parameters",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub input_parameters: Vec<Parameter>,
    /// Declared return type.
    #[serde(rename = "output-type", default, skip_serializing_if = "Option::is_none")]
    pub output_type: Option<String>,
}

impl Action {
    /// Action with no body, inputs or return type.
    #[must_use]
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            module: module.into(),
            fqn: None,
            version: None,
            description: None,
            script: None,
            input_parameters: Vec::new(),
            output_type: None,
        }
    }

    /// `module/name`, computed locally when the server has not sent it.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        self.fqn
            .clone()
            .unwrap_or_else(|| format!("{}/{}", self.module, self.name))
    }
}

/// Workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workflow {
    /// Identifier, chosen by the client at creation.
    pub id: WorkflowId,
    /// Display name.
    pub name: String,
    /// Folder holding the workflow.
    #[serde(rename = "category-id", default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Typed value stored in a configuration element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Orchestrator type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Raw value as the server encodes it.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub value: serde_json::Value,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Configuration element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigurationElement {
    /// Identifier, chosen by the client at creation.
    pub id: ConfigElementId,
    /// Display name.
    pub name: String,
    /// Folder holding the element.
    #[serde(rename = "categoryId")]
    pub category_id: CategoryId,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Stored attributes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_decodes_server_shape() {
        let id = ActionId::new_v4();
        let action: Action = serde_json::from_value(json!({
            "id": id,
            "name": "notify",
            "module": "com.acme.util",
            "fqn": "com.acme.util/notify",
            "version": "1.0.0",
            "script": "System.log(msg);",
            "input-parameters": [
                {"name": "msg", "type": "string", "description": "text to log"}
            ],
            "output-type": "void",
            "href": "https://vra.example.com/vco/api/actions/ignored"
        }))
        .unwrap();

        assert_eq!(action.id, Some(id));
        assert_eq!(action.qualified_name(), "com.acme.util/notify");
        assert_eq!(action.input_parameters[0].kind, "string");
        assert_eq!(action.output_type.as_deref(), Some("void"));
    }

    #[test]
    fn new_action_omits_server_fields() {
        let action = Action::new("com.acme.util", "notify");
        assert_eq!(action.qualified_name(), "com.acme.util/notify");
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({"name": "notify", "module": "com.acme.util"})
        );
    }

    #[test]
    fn configuration_element_round_trips_attributes() {
        let element: ConfigurationElement = serde_json::from_value(json!({
            "id": ConfigElementId::new_v4(),
            "name": "endpoints",
            "categoryId": CategoryId::new_v4(),
            "attributes": [
                {"name": "url", "type": "string", "value": {"string": {"value": "https://x"}}},
                {"name": "unset", "type": "number"}
            ]
        }))
        .unwrap();

        assert_eq!(element.attributes.len(), 2);
        assert!(element.attributes[1].value.is_null());
        let encoded = serde_json::to_value(&element).unwrap();
        assert!(encoded["attributes"][1].get("value").is_none());
    }
}
