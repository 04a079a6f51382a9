//! Canonical schema model and schema building
//!
//! Structured-output and function-declaration schemas all funnel through
//! [`Schema`]. Three entry points produce one: explicit [`TypeDecl`]
//! registration, reflection over a Rust type via `schemars`, or ingestion of
//! a raw JSON-Schema-shaped value (tool schemas from MCP servers and the
//! like). Building always succeeds for supported types on either backend;
//! backend capability (`any_of`, nested defaults) is enforced later, at
//! wire conversion time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// OpenAPI-style data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
}

/// Canonical schema object.
///
/// Property maps keep insertion order (`serde_json/preserve_order`), so
/// reflection order survives into `properties` without extra bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<JsonType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// Default value; Vertex-only at conversion time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub r#enum: Option<Vec<String>>,
    /// Ordered property name to sub-schema map. Values are serialized
    /// [`Schema`] objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Union branches; Vertex-only at conversion time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<Schema>>,
    /// Explicit property ordering. Preserved verbatim when the caller set
    /// it; populated from declaration order for reflected records only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_ordering: Option<Vec<String>>,
}

impl Schema {
    pub fn new(r#type: JsonType) -> Self {
        Schema {
            r#type: Some(r#type),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_items(mut self, items: Schema) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    pub fn with_enum(mut self, values: Vec<String>) -> Self {
        self.r#enum = Some(values);
        self
    }

    /// Append a named property, keeping insertion order.
    pub fn with_property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        let map = self.properties.get_or_insert_with(Map::new);
        // Schema serialization is infallible: every field is a plain
        // data type.
        map.insert(
            name.into(),
            serde_json::to_value(schema).unwrap_or(Value::Null),
        );
        self
    }

    pub(crate) fn property(&self, name: &str) -> Option<Schema> {
        let value = self.properties.as_ref()?.get(name)?;
        serde_json::from_value(value.clone()).ok()
    }
}

/// Explicit type declaration, the registration-based analogue of a host
/// language's type annotations.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDecl {
    Integer,
    Number,
    Boolean,
    String,
    /// Homogeneous list; `None` element type means an untyped array.
    List(Option<Box<TypeDecl>>),
    /// String-keyed map. Only untyped values (`None` or [`TypeDecl::Any`])
    /// are expressible; a concrete value type has no schema equivalent.
    Map(Option<Box<TypeDecl>>),
    /// Union of alternatives. `Null` members fold into `nullable`.
    Union(Vec<TypeDecl>),
    /// Fixed set of allowed values; must all be strings.
    Literal(Vec<Value>),
    /// Structured record with declared fields.
    Record(RecordDecl),
    /// Pre-built schema, passed through untouched.
    Schema(Schema),
    /// Unconstrained value.
    Any,
    Null,
    /// A host type with no schema representation (sets, raw bytes,
    /// abstract iterables). Carries the type's name for the error.
    Unsupported(&'static str),
}

/// One field of a [`RecordDecl`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub decl: TypeDecl,
    /// Declared default; recorded as `Schema.default` and removes the
    /// field from `required`.
    pub default: Option<Value>,
    /// Optional fields become `nullable` and are not required.
    pub optional: bool,
    pub description: Option<String>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, decl: TypeDecl) -> Self {
        FieldDecl {
            name: name.into(),
            decl,
            default: None,
            optional: false,
            description: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A structured record: named fields in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordDecl {
    pub title: Option<String>,
    pub fields: Vec<FieldDecl>,
}

impl RecordDecl {
    pub fn new(fields: Vec<FieldDecl>) -> Self {
        RecordDecl {
            title: None,
            fields,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Build the canonical schema for a type declaration.
///
/// Fails only for declarations with no schema representation; backend
/// capability is not checked here.
pub fn build_schema(decl: &TypeDecl) -> Result<Schema> {
    match decl {
        TypeDecl::Integer => Ok(Schema::new(JsonType::Integer)),
        TypeDecl::Number => Ok(Schema::new(JsonType::Number)),
        TypeDecl::Boolean => Ok(Schema::new(JsonType::Boolean)),
        TypeDecl::String => Ok(Schema::new(JsonType::String)),
        TypeDecl::List(element) => {
            let mut schema = Schema::new(JsonType::Array);
            if let Some(element) = element {
                schema.items = Some(Box::new(build_schema(element)?));
            }
            Ok(schema)
        }
        TypeDecl::Map(value) => match value.as_deref() {
            None | Some(TypeDecl::Any) => Ok(Schema::new(JsonType::Object)),
            Some(concrete) => Err(Error::Schema(format!(
                "maps with a concrete value type are not supported for schema generation: {concrete:?}"
            ))),
        },
        TypeDecl::Union(members) => build_union_schema(members),
        TypeDecl::Literal(values) => {
            let mut variants = Vec::with_capacity(values.len());
            for value in values {
                match value.as_str() {
                    Some(s) => variants.push(s.to_string()),
                    None => {
                        return Err(Error::Schema(format!(
                            "literal values must be strings, got {value}"
                        )))
                    }
                }
            }
            Ok(Schema::new(JsonType::String).with_enum(variants))
        }
        TypeDecl::Record(record) => build_record_schema(record),
        TypeDecl::Schema(schema) => Ok(schema.clone()),
        TypeDecl::Any => Ok(Schema::default()),
        TypeDecl::Null => Ok(Schema {
            nullable: Some(true),
            ..Default::default()
        }),
        TypeDecl::Unsupported(name) => Err(Error::Schema(format!(
            "{name} is not supported for schema generation"
        ))),
    }
}

/// Unions deduplicate by resolved schema, order-preserving. `Null` members
/// fold into `nullable`; a single remaining branch collapses (no `any_of`).
fn build_union_schema(members: &[TypeDecl]) -> Result<Schema> {
    let mut nullable = false;
    let mut branches: Vec<Schema> = Vec::new();
    for member in members {
        if matches!(member, TypeDecl::Null) {
            nullable = true;
            continue;
        }
        let schema = build_schema(member)?;
        if !branches.contains(&schema) {
            branches.push(schema);
        }
    }
    match branches.len() {
        0 => Err(Error::Schema(
            "union produced no usable branches".to_string(),
        )),
        1 => {
            let mut schema = branches.remove(0);
            if nullable {
                schema.nullable = Some(true);
            }
            Ok(schema)
        }
        _ => Ok(Schema {
            any_of: Some(branches),
            nullable: nullable.then_some(true),
            ..Default::default()
        }),
    }
}

fn build_record_schema(record: &RecordDecl) -> Result<Schema> {
    let mut schema = Schema::new(JsonType::Object);
    schema.title = record.title.clone();
    let mut required = Vec::new();
    let mut ordering = Vec::new();
    for field in &record.fields {
        let mut field_schema = build_schema(&field.decl)?;
        if field.optional {
            field_schema.nullable = Some(true);
        }
        if let Some(default) = &field.default {
            field_schema.default = Some(default.clone());
        }
        if field_schema.description.is_none() {
            field_schema.description = field.description.clone();
        }
        if field.default.is_none() && !field.optional {
            required.push(field.name.clone());
        }
        ordering.push(field.name.clone());
        schema = schema.with_property(field.name.clone(), field_schema);
    }
    if !required.is_empty() {
        schema.required = Some(required);
    }
    // Reflected records carry their declaration order; raw JSON-schema
    // input never gets an ordering synthesized.
    schema.property_ordering = Some(ordering);
    Ok(schema)
}

/// Build a canonical schema from the schema of a Rust type.
///
/// Subschemas are inlined so the result is self-contained (no `$ref`).
pub fn schema_for_type<T: schemars::JsonSchema>() -> Result<Schema> {
    let settings = schemars::gen::SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
    });
    let root = settings.into_generator().into_root_schema_for::<T>();
    let value = serde_json::to_value(root.schema)?;
    from_json_schema(&value)
}

/// Structural copy of a JSON-Schema-shaped value into the canonical form.
///
/// Only recognized keys are copied; everything else (`$schema`,
/// `additionalProperties`, vendor extensions) is dropped silently. Used for
/// ingesting tool schemas from external servers.
pub fn from_json_schema(value: &Value) -> Result<Schema> {
    let Some(obj) = value.as_object() else {
        return Err(Error::Schema(format!(
            "expected a JSON schema object, got {value}"
        )));
    };
    let mut schema = Schema::default();

    match obj.get("type") {
        Some(Value::String(s)) => schema.r#type = Some(parse_json_type(s)?),
        Some(Value::Array(types)) => {
            // Draft-07 nullable spelling: ["string", "null"].
            for t in types {
                let Some(s) = t.as_str() else { continue };
                if s.eq_ignore_ascii_case("null") {
                    schema.nullable = Some(true);
                } else {
                    schema.r#type = Some(parse_json_type(s)?);
                }
            }
        }
        _ => {}
    }
    if let Some(s) = obj.get("format").and_then(Value::as_str) {
        schema.format = Some(s.to_string());
    }
    if let Some(s) = obj.get("title").and_then(Value::as_str) {
        schema.title = Some(s.to_string());
    }
    if let Some(s) = obj.get("description").and_then(Value::as_str) {
        schema.description = Some(s.to_string());
    }
    if let Some(b) = obj.get("nullable").and_then(Value::as_bool) {
        schema.nullable = Some(b);
    }
    if let Some(d) = obj.get("default") {
        schema.default = Some(d.clone());
    }
    if let Some(items) = obj.get("items") {
        schema.items = Some(Box::new(from_json_schema(items)?));
    }
    if let Some(Value::Array(values)) = obj.get("enum") {
        schema.r#enum = Some(
            values
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        );
    }
    if let Some(Value::Object(props)) = obj.get("properties") {
        let mut out = Map::new();
        for (name, prop) in props {
            let sub = from_json_schema(prop)?;
            out.insert(name.clone(), serde_json::to_value(sub)?);
        }
        schema.properties = Some(out);
    }
    if let Some(Value::Array(required)) = obj.get("required") {
        schema.required = Some(
            required
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        );
    }
    let any_of = obj.get("anyOf").or_else(|| obj.get("any_of"));
    if let Some(Value::Array(branches)) = any_of {
        let mut out = Vec::with_capacity(branches.len());
        for branch in branches {
            out.push(from_json_schema(branch)?);
        }
        schema.any_of = Some(out);
    }
    let ordering = obj
        .get("propertyOrdering")
        .or_else(|| obj.get("property_ordering"));
    if let Some(Value::Array(names)) = ordering {
        schema.property_ordering = Some(
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        );
    }
    Ok(schema)
}

fn parse_json_type(s: &str) -> Result<JsonType> {
    match s.to_ascii_lowercase().as_str() {
        "string" => Ok(JsonType::String),
        "number" => Ok(JsonType::Number),
        "integer" => Ok(JsonType::Integer),
        "boolean" => Ok(JsonType::Boolean),
        "array" => Ok(JsonType::Array),
        "object" => Ok(JsonType::Object),
        "null" => Ok(JsonType::Null),
        other => Err(Error::Schema(format!("unrecognized schema type: {other}"))),
    }
}

/// Declaration of a callable the model may invoke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Always an OBJECT schema when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Schema>,
}

impl FunctionDeclaration {
    pub fn builder(name: impl Into<String>) -> FunctionDeclarationBuilder {
        FunctionDeclarationBuilder {
            name: name.into(),
            description: None,
            params: Vec::new(),
            response: None,
        }
    }
}

/// Builds a [`FunctionDeclaration`] from declared parameters, the
/// registration analogue of reflecting over a function signature.
#[derive(Debug, Clone)]
pub struct FunctionDeclarationBuilder {
    name: String,
    description: Option<String>,
    params: Vec<FieldDecl>,
    response: Option<TypeDecl>,
}

impl FunctionDeclarationBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// A required parameter.
    pub fn param(mut self, name: impl Into<String>, decl: TypeDecl) -> Self {
        self.params.push(FieldDecl::new(name, decl));
        self
    }

    /// A parameter with a declared default. The parameter is not required
    /// and the default is recorded on its schema.
    pub fn param_with_default(
        mut self,
        name: impl Into<String>,
        decl: TypeDecl,
        default: Value,
    ) -> Self {
        let mut field = FieldDecl::new(name, decl);
        field.default = Some(default);
        self.params.push(field);
        self
    }

    pub fn response(mut self, decl: TypeDecl) -> Self {
        self.response = Some(decl);
        self
    }

    pub fn build(self) -> Result<FunctionDeclaration> {
        let parameters = if self.params.is_empty() {
            None
        } else {
            // Defaults stay on the parameter schema; the Developer API
            // rejects them at conversion time, Vertex accepts them.
            Some(build_record_schema(&RecordDecl::new(self.params))?)
        };
        let response = match self.response {
            Some(decl) => Some(build_schema(&decl)?),
            None => None,
        };
        Ok(FunctionDeclaration {
            name: self.name,
            description: self.description,
            parameters,
            response,
        })
    }
}
