//! Answer-bearing nodes: scalar/list items and file references

use regex::Regex;
use regform_schema::{value_text, NodeType, OptionsSource, Reference, SchemaError, SchemaNode, Template};
use serde_json::{json, Value};

/// Validation rule with its pattern compiled
#[derive(Debug, Clone)]
pub struct CompiledRule {
    regex: Regex,
    message: String,
}

impl CompiledRule {
    fn compile(id: &str, pattern: &str, message: &str) -> Result<Self, SchemaError> {
        let regex = Regex::new(pattern).map_err(|e| SchemaError::InvalidRegex {
            id: id.to_string(),
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            regex,
            message: message.to_string(),
        })
    }

    #[inline]
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Choice list of an item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOptions {
    /// Declared inline
    Static(Vec<Value>),
    /// Derived from another node's children or list value
    Derived(Reference),
}

/// Whether an answer counts as empty for the required check
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Scalar or list answer holder
#[derive(Debug, Clone)]
pub struct Item {
    node_type: NodeType,
    value: Value,
    list: bool,
    required: bool,
    rules: Vec<CompiledRule>,
    options: Option<ItemOptions>,
    default: Option<Template>,
}

impl Item {
    pub(crate) fn from_schema(schema: &SchemaNode) -> Result<Self, SchemaError> {
        let list = schema.is_list();

        let rules = schema
            .validation
            .iter()
            .map(|rule| CompiledRule::compile(&schema.id, &rule.regex, &rule.message))
            .collect::<Result<Vec<_>, _>>()?;

        let options = schema.options.as_ref().map(|options| match options {
            OptionsSource::List(values) => ItemOptions::Static(values.clone()),
            OptionsSource::Reference(raw) => ItemOptions::Derived(Reference::parse(raw)),
        });

        let mut item = Self {
            node_type: schema.node_type.clone(),
            value: empty_value(list),
            list,
            required: schema.required,
            rules,
            options,
            default: None,
        };

        let invalid = |reason| SchemaError::InvalidDefault {
            id: schema.id.clone(),
            reason,
        };
        match &schema.value {
            Some(Value::String(text)) => match Template::parse(text) {
                Some(template) => item.default = Some(template),
                None => item.value = normalize(Value::String(text.clone()), list).map_err(invalid)?,
            },
            Some(value) => item.value = normalize(value.clone(), list).map_err(invalid)?,
            None => {}
        }

        Ok(item)
    }

    #[inline]
    #[must_use]
    pub fn node_type(&self) -> &NodeType {
        &self.node_type
    }

    /// Stored answer, without template defaults applied
    #[inline]
    #[must_use]
    pub fn raw_value(&self) -> &Value {
        &self.value
    }

    #[inline]
    #[must_use]
    pub fn is_list(&self) -> bool {
        self.list
    }

    #[inline]
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    #[inline]
    #[must_use]
    pub fn options(&self) -> Option<&ItemOptions> {
        self.options.as_ref()
    }

    /// Templated default, if the schema value was a template
    #[inline]
    #[must_use]
    pub fn default_template(&self) -> Option<&Template> {
        self.default.as_ref()
    }

    /// Answer as seen by readers: the stored value, or the rendered default
    /// while nothing has been stored
    pub(crate) fn current_value(&self, render: impl FnOnce(&Template) -> String) -> Value {
        match &self.default {
            Some(template) if is_empty_value(&self.value) => Value::String(render(template)),
            _ => self.value.clone(),
        }
    }

    /// Stored answer, as persisted
    #[inline]
    #[must_use]
    pub fn serialize(&self) -> Value {
        self.value.clone()
    }

    /// Store an answer
    ///
    /// Lists accept an array, a scalar (wrapped) or null (cleared); scalars
    /// accept any non-container value.
    ///
    /// # Errors
    /// Returns the reason the value does not fit this item
    pub fn set(&mut self, value: Value) -> Result<(), String> {
        self.value = normalize(value, self.list)?;
        Ok(())
    }

    /// Restore a persisted answer; reports whether it was accepted
    pub fn unserialize(&mut self, value: Value) -> bool {
        match normalize(value, self.list) {
            Ok(normalized) => {
                self.value = normalized;
                true
            }
            Err(_) => false,
        }
    }

    /// Message of the first failing rule, or empty
    #[must_use]
    pub fn validate_text(&self, value: &Value) -> String {
        if is_empty_value(value) {
            return String::new();
        }
        let texts: Vec<String> = match value {
            Value::Array(items) => items.iter().map(value_text).collect(),
            other => vec![value_text(other)],
        };
        self.rules
            .iter()
            .find(|rule| texts.iter().any(|text| !rule.regex.is_match(text)))
            .map(|rule| rule.message.clone())
            .unwrap_or_default()
    }

    /// Validity: advisory unless `strict`
    #[must_use]
    pub fn is_valid(&self, value: &Value, strict: bool) -> bool {
        !strict || self.validate_text(value).is_empty()
    }
}

fn empty_value(list: bool) -> Value {
    if list {
        Value::Array(Vec::new())
    } else {
        Value::Null
    }
}

fn normalize(value: Value, list: bool) -> Result<Value, String> {
    match (list, value) {
        (true, Value::Null) => Ok(Value::Array(Vec::new())),
        (true, Value::Array(items)) => Ok(Value::Array(items)),
        (true, Value::Object(_)) => Err("expected a list of values".to_string()),
        (true, scalar) => Ok(Value::Array(vec![scalar])),
        (false, Value::Array(_) | Value::Object(_)) => Err("expected a single value".to_string()),
        (false, scalar) => Ok(scalar),
    }
}

/// File reference answer: a container selection plus a path within it
#[derive(Debug, Clone)]
pub struct FileItem {
    item: Item,
    container: Option<String>,
}

impl FileItem {
    pub(crate) fn from_schema(schema: &SchemaNode) -> Result<Self, SchemaError> {
        let mut scalar = schema.clone();
        scalar.multiple = false;
        scalar.value = None;

        let mut file = Self {
            item: Item::from_schema(&scalar)?,
            container: None,
        };
        if let Some(value) = &schema.value {
            file.unserialize(value.clone())
                .map_err(|reason| SchemaError::InvalidDefault {
                    id: schema.id.clone(),
                    reason,
                })?;
        }
        Ok(file)
    }

    /// Shared item behaviour (required flag, rules) over the path
    #[inline]
    #[must_use]
    pub fn item(&self) -> &Item {
        &self.item
    }

    /// Selected container id
    #[inline]
    #[must_use]
    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }

    /// Selected path, empty when none
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        self.item.value.as_str().unwrap_or_default()
    }

    /// Whether no path has been chosen
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        is_empty_value(&self.item.value)
    }

    /// `[containerId, path]`
    #[must_use]
    pub fn serialize(&self) -> Value {
        json!([self.container, self.path()])
    }

    /// Restore `[containerId, path]`; returns the container on success
    ///
    /// # Errors
    /// Returns the reason the payload is malformed
    pub fn unserialize(&mut self, value: Value) -> Result<String, String> {
        let Value::Array(parts) = value else {
            return Err("expected [containerId, path]".to_string());
        };
        match parts.as_slice() {
            [Value::String(container), Value::String(path)] => {
                self.container = Some(container.clone());
                self.item.value = Value::String(path.clone());
                Ok(container.clone())
            }
            _ => Err("expected [containerId, path] of strings".to_string()),
        }
    }

    /// Change the container; a different container clears the path
    pub(crate) fn select(&mut self, container: &str) {
        if self.container.as_deref() != Some(container) {
            self.container = Some(container.to_string());
            self.item.value = Value::Null;
        }
    }

    pub(crate) fn set_path(&mut self, path: &str) {
        self.item.value = Value::String(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values() {
        assert!(is_empty_value(&Value::Null));
        assert!(is_empty_value(&json!("  ")));
        assert!(is_empty_value(&json!([])));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(false)));
        assert!(!is_empty_value(&json!(["x"])));
    }

    #[test]
    fn list_items_normalize_scalars() {
        let mut item = Item::from_schema(&SchemaNode::item("tags").multiple()).unwrap();
        assert_eq!(item.raw_value(), &json!([]));
        item.set(json!("a")).unwrap();
        assert_eq!(item.serialize(), json!(["a"]));
        assert!(item.set(json!({"k": 1})).is_err());
    }

    #[test]
    fn checkbox_is_list() {
        let node = SchemaNode::new("c", NodeType::Checkbox);
        let item = Item::from_schema(&node).unwrap();
        assert!(item.is_list());
    }

    #[test]
    fn scalar_items_reject_lists() {
        let mut item = Item::from_schema(&SchemaNode::item("q")).unwrap();
        assert!(!item.unserialize(json!(["a"])));
        assert!(item.unserialize(json!("a")));
        assert_eq!(item.serialize(), json!("a"));
    }

    #[test]
    fn validation_reports_first_failing_rule() {
        let node = SchemaNode::item("doi")
            .validated_by("^10\\.", "must start with 10.")
            .validated_by("/", "must contain a slash");
        let item = Item::from_schema(&node).unwrap();
        assert_eq!(item.validate_text(&json!("11.1/x")), "must start with 10.");
        assert_eq!(item.validate_text(&json!("10.1x")), "must contain a slash");
        assert_eq!(item.validate_text(&json!("10.1/x")), "");
        assert_eq!(item.validate_text(&Value::Null), "");
    }

    #[test]
    fn validation_is_advisory_unless_strict() {
        let node = SchemaNode::item("n").validated_by("^[0-9]+$", "digits only");
        let item = Item::from_schema(&node).unwrap();
        assert!(item.is_valid(&json!("abc"), false));
        assert!(!item.is_valid(&json!("abc"), true));
        assert!(item.is_valid(&json!("123"), true));
    }

    #[test]
    fn invalid_pattern_is_schema_error() {
        let node = SchemaNode::item("n").validated_by("(", "broken");
        assert!(matches!(
            Item::from_schema(&node),
            Err(SchemaError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn templated_default_renders_until_answered() {
        let mut node = SchemaNode::item("greeting");
        node.value = Some(json!("Hello {{$ctx.user}}"));
        let mut item = Item::from_schema(&node).unwrap();
        assert!(item.default_template().is_some());
        assert_eq!(item.current_value(|_| "Hello Ada".into()), json!("Hello Ada"));
        item.set(json!("custom")).unwrap();
        assert_eq!(item.current_value(|_| "Hello Ada".into()), json!("custom"));
    }

    #[test]
    fn malformed_default_is_schema_error() {
        let mut node = SchemaNode::item("q");
        node.value = Some(json!(["a", "b"]));
        assert!(matches!(
            Item::from_schema(&node),
            Err(SchemaError::InvalidDefault { ref id, .. }) if id == "q"
        ));

        let mut tags = SchemaNode::item("tags").multiple();
        tags.value = Some(json!({"k": 1}));
        assert!(matches!(
            Item::from_schema(&tags),
            Err(SchemaError::InvalidDefault { .. })
        ));

        tags.value = Some(json!(["a"]));
        assert_eq!(Item::from_schema(&tags).unwrap().raw_value(), &json!(["a"]));
    }

    #[test]
    fn file_default_must_be_container_and_path() {
        let mut node = SchemaNode::file("data");
        node.value = Some(json!("/raw/data.csv"));
        assert!(matches!(
            FileItem::from_schema(&node),
            Err(SchemaError::InvalidDefault { ref id, .. }) if id == "data"
        ));

        node.value = Some(json!(["abc12", "/raw/data.csv"]));
        let file = FileItem::from_schema(&node).unwrap();
        assert_eq!(file.container(), Some("abc12"));
        assert_eq!(file.path(), "/raw/data.csv");
    }

    #[test]
    fn file_item_round_trip() {
        let mut file = FileItem::from_schema(&SchemaNode::file("data")).unwrap();
        assert!(file.is_empty());
        assert_eq!(file.serialize(), json!([null, ""]));

        let container = file.unserialize(json!(["abc12", "/raw/data.csv"])).unwrap();
        assert_eq!(container, "abc12");
        assert_eq!(file.container(), Some("abc12"));
        assert_eq!(file.path(), "/raw/data.csv");
        assert_eq!(file.serialize(), json!(["abc12", "/raw/data.csv"]));
    }

    #[test]
    fn file_item_rejects_malformed_payload() {
        let mut file = FileItem::from_schema(&SchemaNode::file("data")).unwrap();
        assert!(file.unserialize(json!("/raw/data.csv")).is_err());
        assert!(file.unserialize(json!(["abc12"])).is_err());
        assert!(file.unserialize(json!([1, "/x"])).is_err());
    }

    #[test]
    fn selecting_other_container_clears_path() {
        let mut file = FileItem::from_schema(&SchemaNode::file("data")).unwrap();
        file.unserialize(json!(["a", "/x"])).unwrap();
        file.select("a");
        assert_eq!(file.path(), "/x");
        file.select("b");
        assert_eq!(file.path(), "");
        assert_eq!(file.container(), Some("b"));
    }
}
