//! Static descriptor of the virtual machine resource's configuration.
//!
//! Hosts hand configuration over as a field-keyed map. [`ResourceSchema`]
//! checks it against the declared fields and produces a typed
//! [`CloneRequest`] before any remote call is made.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::resource::{CloneRequest, ResourceError};

/// Value type accepted by a field.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// UTF-8 string.
    String,
    /// Boolean flag.
    Bool,
}

impl FieldType {
    fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::String, Value::String(_)) | (Self::Bool, Value::Bool(_))
        )
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
        }
    }
}

/// Default applied to an optional field left unset.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldDefault {
    /// Boolean default.
    Bool(bool),
}

/// Declaration of one configuration field.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct FieldSchema {
    /// Field name as it appears in configuration.
    pub name: &'static str,
    /// Accepted value type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether configuration must provide the field.
    pub required: bool,
    /// Value used when an optional field is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldDefault>,
    /// Short human readable description.
    pub description: &'static str,
}

impl FieldSchema {
    const fn required_string(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::String,
            required: true,
            default: None,
            description,
        }
    }

    const fn optional_bool(name: &'static str, default: bool, description: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::Bool,
            required: false,
            default: Some(FieldDefault::Bool(default)),
            description,
        }
    }
}

/// Declared configuration surface of a resource type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct ResourceSchema {
    /// Resource type name.
    pub type_name: &'static str,
    /// Declared fields.
    pub fields: &'static [FieldSchema],
}

/// Descriptor of the cloned virtual machine resource.
pub const VIRTUAL_MACHINE: ResourceSchema = ResourceSchema {
    type_name: "vsphere_virtual_machine",
    fields: &[
        FieldSchema::required_string("name", "Display name of the new virtual machine"),
        FieldSchema::required_string("source", "Template virtual machine to clone"),
        FieldSchema::required_string("datacenter", "Datacenter holding all referenced objects"),
        FieldSchema::required_string("folder", "Folder receiving the clone"),
        FieldSchema::required_string("host", "Host or cluster owning the resource pool"),
        FieldSchema::required_string("pool", "Resource pool receiving the clone"),
        FieldSchema::optional_bool(
            "linked_clone",
            false,
            "Back the clone's disks with the template snapshot",
        ),
        FieldSchema::optional_bool("power_on", true, "Power the clone on once created"),
    ],
};

/// Errors raised while decoding configuration against a descriptor.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SchemaError {
    /// Raised when a required field is absent or null.
    #[error("missing required field: {0}")]
    MissingField(String),
    /// Raised when a field holds a value of the wrong type.
    #[error("field {field} must be a {expected}")]
    TypeMismatch {
        /// Offending field.
        field: String,
        /// Declared type name.
        expected: &'static str,
    },
    /// Raised when configuration names a field the descriptor does not know.
    #[error("unknown field: {0}")]
    UnknownField(String),
    /// Raised when the decoded request fails validation.
    #[error(transparent)]
    Invalid(#[from] ResourceError),
}

impl ResourceSchema {
    /// Returns the declaration of `name`, if declared.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static FieldSchema> {
        let fields: &'static [FieldSchema] = self.fields;
        fields.iter().find(|field| field.name == name)
    }

    /// Decodes a field-keyed configuration map into a [`CloneRequest`].
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when a required field is missing, a value has
    /// the wrong type, an undeclared field is present, or a required string
    /// is blank.
    pub fn decode(&self, values: &Map<String, Value>) -> Result<CloneRequest, SchemaError> {
        if let Some(unknown) = values.keys().find(|key| self.field(key).is_none()) {
            return Err(SchemaError::UnknownField(unknown.clone()));
        }

        CloneRequest::builder()
            .name(self.string(values, "name")?)
            .source(self.string(values, "source")?)
            .datacenter(self.string(values, "datacenter")?)
            .folder(self.string(values, "folder")?)
            .host(self.string(values, "host")?)
            .pool(self.string(values, "pool")?)
            .linked_clone(self.boolean(values, "linked_clone")?)
            .power_on(self.boolean(values, "power_on")?)
            .build()
            .map_err(SchemaError::from)
    }

    fn lookup<'v>(
        &self,
        values: &'v Map<String, Value>,
        name: &str,
    ) -> Result<(&'static FieldSchema, Option<&'v Value>), SchemaError> {
        let field = self
            .field(name)
            .ok_or_else(|| SchemaError::UnknownField(name.to_owned()))?;
        match values.get(name) {
            None | Some(Value::Null) if field.required => {
                Err(SchemaError::MissingField(name.to_owned()))
            }
            None | Some(Value::Null) => Ok((field, None)),
            Some(value) if field.field_type.accepts(value) => Ok((field, Some(value))),
            Some(_) => Err(SchemaError::TypeMismatch {
                field: name.to_owned(),
                expected: field.field_type.as_str(),
            }),
        }
    }

    fn string(&self, values: &Map<String, Value>, name: &str) -> Result<String, SchemaError> {
        let (_, value) = self.lookup(values, name)?;
        Ok(value
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned())
    }

    fn boolean(&self, values: &Map<String, Value>, name: &str) -> Result<bool, SchemaError> {
        let (field, value) = self.lookup(values, name)?;
        let fallback = field.default.is_some_and(|FieldDefault::Bool(flag)| flag);
        Ok(value.and_then(Value::as_bool).unwrap_or(fallback))
    }
}
