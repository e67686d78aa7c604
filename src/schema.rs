//! Schemas of the provider configuration, resources and data sources.
//!
//! A schema drives three things: configuration validation, plan diffs and
//! the `GetSchema` answer. Attributes and blocks are kept in name order so
//! all three see them in the same order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::generated::provider as proto;
use crate::validation::Validator;

/// Value type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A string.
    String,
    /// A 64-bit integer.
    Int64,
    /// A boolean.
    Bool,
    /// An ordered list of one element type.
    List(Box<AttributeType>),
}

impl AttributeType {
    /// A list of strings.
    pub fn string_list() -> Self {
        Self::List(Box::new(Self::String))
    }
}

/// Who sets an attribute: the user, the API or either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// Must be configured.
    Required,
    /// May be configured.
    Optional,
    /// Set by the API only.
    Computed,
    /// May be configured, otherwise filled in by the API.
    OptionalComputed,
}

/// Rule deciding when a difference between prior and proposed value is
/// not a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffSuppress {
    /// An unset display name equal to the value of `fallback` (usually
    /// `name`) in prior state is not a change. The API defaults the display
    /// name to that value.
    DisplayName {
        /// Attribute the API copies into the display name.
        fallback: &'static str,
    },
    /// Strings holding semantically equal JSON documents are not a change.
    Json,
}

/// One attribute of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    pub presence: Presence,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Changing the value replaces the object.
    #[serde(default)]
    pub force_new: bool,
    /// Value planned when the attribute is not configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip)]
    pub validators: Vec<Validator>,
    /// Attributes that must not be configured together with this one.
    #[serde(skip)]
    pub conflicts_with: Vec<String>,
    #[serde(skip)]
    pub diff_suppress: Option<DiffSuppress>,
}

impl Attribute {
    pub fn new(attr_type: AttributeType, presence: Presence) -> Self {
        Self {
            attr_type,
            presence,
            sensitive: false,
            description: None,
            force_new: false,
            default: None,
            validators: Vec::new(),
            conflicts_with: Vec::new(),
            diff_suppress: None,
        }
    }

    pub fn required_string() -> Self {
        Self::new(AttributeType::String, Presence::Required)
    }

    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, Presence::Optional)
    }

    pub fn optional_computed_string() -> Self {
        Self::new(AttributeType::String, Presence::OptionalComputed)
    }

    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, Presence::Computed)
    }

    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, Presence::Optional)
    }

    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, Presence::Optional)
    }

    pub fn required_string_list() -> Self {
        Self::new(AttributeType::string_list(), Presence::Required)
    }

    pub fn optional_string_list() -> Self {
        Self::new(AttributeType::string_list(), Presence::Optional)
    }

    pub fn computed_string_list() -> Self {
        Self::new(AttributeType::string_list(), Presence::Computed)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn with_conflict(mut self, other: impl Into<String>) -> Self {
        self.conflicts_with.push(other.into());
        self
    }

    pub fn with_diff_suppress(mut self, rule: DiffSuppress) -> Self {
        self.diff_suppress = Some(rule);
        self
    }

    /// Hide the value in logs and plan output.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn is_required(&self) -> bool {
        self.presence == Presence::Required
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.presence, Presence::Optional | Presence::OptionalComputed)
    }

    pub fn is_computed(&self) -> bool {
        matches!(self.presence, Presence::Computed | Presence::OptionalComputed)
    }

    /// Read-only: the user can never set it.
    pub fn is_computed_only(&self) -> bool {
        self.presence == Presence::Computed
    }
}

/// How repeated a nested block is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// At most one object.
    #[default]
    Single,
    /// Zero or more objects, in order.
    List,
}

/// Attributes and nested blocks, keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A block nested inside another, with item count bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    #[serde(flatten)]
    pub block: Block,
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    #[serde(default)]
    pub min_items: u32,
    /// Zero means unlimited.
    #[serde(default)]
    pub max_items: u32,
    /// Any change inside the block replaces the object.
    #[serde(default)]
    pub force_new: bool,
}

impl NestedBlock {
    /// At most one object, sent as a plain object.
    pub fn single(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::Single,
            min_items: 0,
            max_items: 1,
            force_new: false,
        }
    }

    /// Any number of objects, sent as a list.
    pub fn list(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::List,
            min_items: 0,
            max_items: 0,
            force_new: false,
        }
    }

    pub fn with_min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }

    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }
}

/// Versioned schema of one resource or data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Bumped when stored state needs an upgrade.
    #[serde(default)]
    pub version: u64,
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    pub fn v0() -> Self {
        Self::new(0)
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block.description = Some(description.into());
        self
    }

    /// Look up a top-level attribute.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.get(name)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// Everything the provider answers to `GetSchema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// Schema of the `provider` block.
    #[serde(default)]
    pub provider: Schema,
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
    #[serde(default)]
    pub data_sources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

impl From<&Schema> for proto::Schema {
    fn from(schema: &Schema) -> Self {
        Self {
            version: schema.version as i64,
            block: Some(proto::Block::from(&schema.block)),
        }
    }
}

impl From<&Block> for proto::Block {
    fn from(block: &Block) -> Self {
        let attributes = block
            .attributes
            .iter()
            .map(|(name, attr)| proto::Attribute {
                name: name.clone(),
                r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
                required: attr.is_required(),
                optional: attr.is_optional(),
                computed: attr.is_computed(),
                sensitive: attr.sensitive,
                description: attr.description.clone().unwrap_or_default(),
                force_new: attr.force_new,
                default_value: attr
                    .default
                    .as_ref()
                    .and_then(|v| serde_json::to_vec(v).ok())
                    .unwrap_or_default(),
            })
            .collect();

        let block_types = block
            .blocks
            .iter()
            .map(|(name, nested)| proto::NestedBlock {
                type_name: name.clone(),
                block: Some(proto::Block::from(&nested.block)),
                nesting_mode: match nested.nesting_mode {
                    BlockNestingMode::Single => proto::nested_block::NestingMode::Single,
                    BlockNestingMode::List => proto::nested_block::NestingMode::List,
                } as i32,
                min_items: nested.min_items as i32,
                max_items: nested.max_items as i32,
            })
            .collect();

        Self {
            attributes,
            block_types,
            description: block.description.clone().unwrap_or_default(),
        }
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// A problem reported back to the host, optionally tied to an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Dotted path such as `db_connection.0.url`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn with_severity(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    pub fn error(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, summary)
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, summary)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl From<Diagnostic> for proto::Diagnostic {
    fn from(d: Diagnostic) -> Self {
        Self {
            severity: match d.severity {
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
            } as i32,
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_presence() {
        let region = Attribute::required_string();
        assert!(region.is_required());
        assert!(!region.is_optional());
        assert!(!region.is_computed());

        let display_name = Attribute::optional_computed_string();
        assert!(display_name.is_optional());
        assert!(display_name.is_computed());
        assert!(!display_name.is_computed_only());

        assert!(Attribute::computed_string().is_computed_only());
    }

    #[test]
    fn test_attribute_builders() {
        let attr = Attribute::required_string()
            .with_description("Region of the application space")
            .with_force_new()
            .with_validator(Validator::one_of(["europe-west1", "us-east1"]));
        assert_eq!(attr.attr_type, AttributeType::String);
        assert!(attr.force_new);
        assert_eq!(attr.validators.len(), 1);

        let pem = Attribute::optional_string().with_conflict("public_key_jwk");
        assert_eq!(pem.conflicts_with, vec!["public_key_jwk".to_string()]);
    }

    #[test]
    fn test_serialization_skips_validators() {
        let attr = Attribute::required_string().with_validator(Validator::Name);
        let json = serde_json::to_value(&attr).unwrap();
        assert_eq!(json["type"], "string");
        assert_eq!(json["presence"], "required");
        assert!(json.get("validators").is_none());
    }

    #[test]
    fn test_schema_to_proto_is_name_ordered() {
        let schema = Schema::v0()
            .with_attribute("region", Attribute::required_string().with_force_new())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("ikg_size", Attribute::optional_string().with_default(json!("2GB")))
            .with_block(
                "db_connection",
                NestedBlock::list(
                    Block::new().with_attribute("password", Attribute::required_string().sensitive()),
                )
                .with_max_items(1),
            );

        let wire = proto::Schema::from(&schema);
        let block = wire.block.unwrap();
        let names: Vec<&str> = block.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["ikg_size", "name", "region"]);
        assert_eq!(block.attributes[0].default_value, br#""2GB""#.to_vec());
        assert!(block.attributes[2].force_new);

        let db = &block.block_types[0];
        assert_eq!(db.type_name, "db_connection");
        assert_eq!(db.max_items, 1);
        assert_eq!(db.nesting_mode, proto::nested_block::NestingMode::List as i32);
        assert!(db.block.as_ref().unwrap().attributes[0].sensitive);
    }

    #[test]
    fn test_string_list_type_encoding() {
        let wire = proto::Block::from(
            &Block::new().with_attribute("api_permissions", Attribute::required_string_list()),
        );
        assert_eq!(wire.attributes[0].r#type, br#"{"list":"string"}"#.to_vec());
    }

    #[test]
    fn test_diagnostic_to_proto() {
        let wire = proto::Diagnostic::from(
            Diagnostic::error("Invalid ID value")
                .with_detail("expected to have 'gid:' prefix")
                .with_attribute("customer_id"),
        );
        assert_eq!(wire.severity, proto::diagnostic::Severity::Error as i32);
        assert_eq!(wire.attribute, "customer_id");
        assert_eq!(wire.detail, "expected to have 'gid:' prefix");

        let warning = proto::Diagnostic::from(Diagnostic::warning("display_name defaults to name"));
        assert_eq!(warning.severity, proto::diagnostic::Severity::Warning as i32);
        assert!(warning.attribute.is_empty());
    }

    #[test]
    fn test_nested_block_modes() {
        let single = NestedBlock::single(Block::new());
        assert_eq!(single.nesting_mode, BlockNestingMode::Single);
        assert_eq!(single.max_items, 1);

        let list = NestedBlock::list(Block::new()).with_min_items(1).with_force_new();
        assert_eq!(list.nesting_mode, BlockNestingMode::List);
        assert_eq!(list.min_items, 1);
        assert_eq!(list.max_items, 0);
        assert!(list.force_new);
    }
}
