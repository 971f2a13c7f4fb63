//! Schema model: field and base definitions
//!
//! Every object base carries a fixed set of built-in fields followed by
//! its custom fields. Built-in field ids are reserved and listed in
//! [`builtin`]; custom fields must use ids above [`builtin::LAST`].
//!
//! Embedded bases (objects that only exist inside a container object)
//! carry a single built-in field, the container reference.

use crate::error::{Error, Result};
use crate::types::{BaseId, FieldId};
use serde::{Deserialize, Serialize};

/// Reserved field ids shared by every non-embedded base
pub mod builtin {
    use crate::types::FieldId;

    /// Owner groups of the object (vector of invids)
    pub const OWNER_LIST: FieldId = FieldId(0);
    /// Date after which the object is considered expired
    pub const EXPIRATION_DATE: FieldId = FieldId(1);
    /// Date after which the object is scheduled for removal
    pub const REMOVAL_DATE: FieldId = FieldId(2);
    /// Free-form notes
    pub const NOTES: FieldId = FieldId(3);
    /// Stamped when the object is first committed
    pub const CREATION_DATE: FieldId = FieldId(4);
    /// Label of the session that created the object
    pub const CREATOR_INFO: FieldId = FieldId(5);
    /// Stamped on every committed change
    pub const MODIFICATION_DATE: FieldId = FieldId(6);
    /// Label of the session that last changed the object
    pub const MODIFIER_INFO: FieldId = FieldId(7);

    /// Reference from an embedded object to its container
    pub const CONTAINER: FieldId = FieldId(0);

    /// Highest reserved built-in id
    pub const LAST: FieldId = MODIFIER_INFO;
}

/// The type of value a field stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// true / false
    Boolean,
    /// 32-bit signed integer
    Numeric,
    /// Timestamp
    Date,
    /// Text
    String,
    /// Reference to another object
    Invid,
    /// IPv4 or IPv6 address
    #[serde(rename = "ip")]
    IpAddr,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::Boolean => "boolean",
            FieldType::Numeric => "numeric",
            FieldType::Date => "date",
            FieldType::String => "string",
            FieldType::Invid => "invid",
            FieldType::IpAddr => "ip",
        };
        write!(f, "{}", name)
    }
}

/// Definition of one field of a base
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field id, unique within the base
    pub id: FieldId,
    /// Field name, unique within the base
    pub name: String,
    /// Element type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether the field holds a vector of values
    #[serde(default)]
    pub array: bool,
    /// Unique-value namespace constraining this field, if any
    #[serde(default)]
    pub namespace: Option<String>,
    /// Whether this is one of the reserved built-in fields
    #[serde(skip)]
    pub builtin: bool,
}

impl FieldDef {
    /// Define a scalar custom field
    pub fn scalar(id: i16, name: impl Into<String>, field_type: FieldType) -> Self {
        FieldDef {
            id: FieldId(id),
            name: name.into(),
            field_type,
            array: false,
            namespace: None,
            builtin: false,
        }
    }

    /// Define a vector custom field
    pub fn vector(id: i16, name: impl Into<String>, field_type: FieldType) -> Self {
        FieldDef {
            array: true,
            ..FieldDef::scalar(id, name, field_type)
        }
    }

    /// Constrain the field's values to be unique within `namespace`
    pub fn unique_in(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    fn builtin(id: FieldId, name: &str, field_type: FieldType, array: bool) -> Self {
        FieldDef {
            id,
            name: name.to_string(),
            field_type,
            array,
            namespace: None,
            builtin: true,
        }
    }
}

/// Definition of an object base (one object type)
///
/// # Examples
///
/// ```
/// use dirstore_core::schema::{builtin, BaseDef, FieldDef, FieldType};
/// use dirstore_core::types::BaseId;
///
/// let users = BaseDef::new(BaseId(3), "User")
///     .with_field(FieldDef::scalar(100, "username", FieldType::String))
///     .unwrap()
///     .with_label("username")
///     .unwrap();
///
/// assert!(users.field(builtin::OWNER_LIST).is_some());
/// assert_eq!(users.field_by_name("username").unwrap().field_type, FieldType::String);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseDef {
    /// Base id
    #[serde(rename = "id")]
    pub type_id: BaseId,
    /// Display name
    pub name: String,
    /// Field whose value serves as the object label
    #[serde(default)]
    pub label_field: Option<crate::types::FieldId>,
    /// Whether objects of this base live inside a container object
    #[serde(default)]
    pub embedded: bool,
    /// Field definitions, built-ins first
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl BaseDef {
    /// Create a base definition carrying the built-in fields
    pub fn new(type_id: BaseId, name: impl Into<String>) -> Self {
        let mut def = BaseDef {
            type_id,
            name: name.into(),
            label_field: None,
            embedded: false,
            fields: Vec::new(),
        };
        def.install_builtins();
        def
    }

    /// Create an embedded base definition
    pub fn embedded(type_id: BaseId, name: impl Into<String>) -> Self {
        let mut def = BaseDef {
            type_id,
            name: name.into(),
            label_field: None,
            embedded: true,
            fields: Vec::new(),
        };
        def.install_builtins();
        def
    }

    /// Replace whatever built-ins are present with the reserved set
    ///
    /// Used after deserializing a definition, which only lists custom fields.
    pub fn install_builtins(&mut self) {
        self.fields.retain(|f| !f.builtin);
        let builtins = if self.embedded {
            vec![FieldDef::builtin(
                builtin::CONTAINER,
                "Containing Object",
                FieldType::Invid,
                false,
            )]
        } else {
            vec![
                FieldDef::builtin(builtin::OWNER_LIST, "Owner list", FieldType::Invid, true),
                FieldDef::builtin(builtin::EXPIRATION_DATE, "Expiration Date", FieldType::Date, false),
                FieldDef::builtin(builtin::REMOVAL_DATE, "Removal Date", FieldType::Date, false),
                FieldDef::builtin(builtin::NOTES, "Notes", FieldType::String, false),
                FieldDef::builtin(builtin::CREATION_DATE, "Creation Date", FieldType::Date, false),
                FieldDef::builtin(builtin::CREATOR_INFO, "Creator Info", FieldType::String, false),
                FieldDef::builtin(
                    builtin::MODIFICATION_DATE,
                    "Modification Date",
                    FieldType::Date,
                    false,
                ),
                FieldDef::builtin(builtin::MODIFIER_INFO, "Modifier Info", FieldType::String, false),
            ]
        };
        self.fields.splice(0..0, builtins);
    }

    /// Add a custom field
    ///
    /// # Errors
    ///
    /// Fails when the id is reserved or already used, or the name is taken.
    pub fn add_field(&mut self, field: FieldDef) -> Result<()> {
        if field.id <= builtin::LAST {
            return Err(Error::ReservedField {
                base: self.type_id,
                field: field.id,
            });
        }
        if self.field(field.id).is_some() || self.field_by_name(&field.name).is_some() {
            return Err(Error::DuplicateField {
                base: self.type_id,
                name: field.name,
            });
        }
        self.fields.push(field);
        Ok(())
    }

    /// Builder form of [`BaseDef::add_field`]
    pub fn with_field(mut self, field: FieldDef) -> Result<Self> {
        self.add_field(field)?;
        Ok(self)
    }

    /// Use the named field as the label of this base's objects
    pub fn with_label(mut self, field_name: &str) -> Result<Self> {
        let id = self
            .field_by_name(field_name)
            .map(|f| f.id)
            .ok_or_else(|| Error::UnknownFieldName {
                base: self.type_id,
                name: field_name.to_string(),
            })?;
        self.label_field = Some(id);
        Ok(self)
    }

    /// Look up a field definition by id
    pub fn field(&self, id: FieldId) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Look up a field definition by name
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Custom (non built-in) fields
    pub fn custom_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.builtin)
    }
}

/// Definition of a unique-value namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceDef {
    /// Namespace name referenced by field definitions
    pub name: String,
    /// Whether string values are compared without regard to case
    #[serde(default)]
    pub case_insensitive: bool,
}

impl NamespaceDef {
    /// Case-sensitive namespace
    pub fn new(name: impl Into<String>) -> Self {
        NamespaceDef {
            name: name.into(),
            case_insensitive: false,
        }
    }

    /// Case-insensitive namespace
    pub fn case_insensitive(name: impl Into<String>) -> Self {
        NamespaceDef {
            name: name.into(),
            case_insensitive: true,
        }
    }
}
