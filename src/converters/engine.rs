//! Declarative field mapping engine
//!
//! Each wire entity is described once as a table of [`FieldRule`]s mapping
//! canonical (snake_case) field names to per-backend wire paths. One
//! interpreter walks the table in both directions, so a field's two wire
//! names, its backend support and its value transform live on a single
//! line instead of being scattered across hand-written converters.

use serde_json::{Map, Value};

use crate::common::{get_value_by_path, set_value_by_path};
use crate::error::{Error, Result};

/// The two API surfaces a client can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Gemini Developer API (API-key based).
    MlDev,
    /// Vertex AI (project/location or express mode).
    Vertex,
}

impl Backend {
    /// Human-readable API name, used in unsupported-field errors.
    pub fn api_name(&self) -> &'static str {
        match self {
            Backend::MlDev => "Gemini API",
            Backend::Vertex => "Vertex AI API",
        }
    }
}

/// Conversion context, immutable for the lifetime of a client.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub backend: Backend,
    /// Express mode: an API key is used instead of project/location.
    pub has_api_key: bool,
}

/// Where a canonical field lands on one backend's wire.
#[derive(Clone, Copy)]
pub(crate) enum Target {
    /// Dotted path inside the entity's own wire object.
    Wire(&'static str),
    /// Dotted path inside the parent wire object; used by config entities
    /// whose fields scatter across the enclosing request.
    Parent(&'static str),
    /// Setting this field on this backend is an error.
    Unsupported,
    /// Local-only field, never sent.
    Skip,
}

/// Optional value transform applied on the way to the wire.
#[derive(Clone, Copy)]
pub(crate) enum Transform {
    /// Recurse into a nested entity (element-wise over arrays).
    Entity(&'static EntityMapper),
    /// One-way function; the from-wire direction copies verbatim.
    ToOnly(fn(&Context, &Value) -> Result<Value>),
}

/// One canonical field's mapping.
pub(crate) struct FieldRule {
    pub canonical: &'static str,
    pub mldev: Target,
    pub vertex: Target,
    pub transform: Option<Transform>,
}

impl FieldRule {
    fn target(&self, backend: Backend) -> Target {
        match backend {
            Backend::MlDev => self.mldev,
            Backend::Vertex => self.vertex,
        }
    }
}

/// A wire entity: its name (for errors) and its field table.
pub(crate) struct EntityMapper {
    pub name: &'static str,
    pub rules: &'static [FieldRule],
}

/// Shorthand for the common symmetric case.
pub(crate) const fn rule(canonical: &'static str, wire: &'static str) -> FieldRule {
    FieldRule {
        canonical,
        mldev: Target::Wire(wire),
        vertex: Target::Wire(wire),
        transform: None,
    }
}

/// A symmetric rule for an enum-valued field: any casing is accepted from
/// the caller, the wire always carries the canonical uppercase name.
pub(crate) const fn enum_rule(canonical: &'static str, wire: &'static str) -> FieldRule {
    FieldRule {
        canonical,
        mldev: Target::Wire(wire),
        vertex: Target::Wire(wire),
        transform: Some(Transform::ToOnly(enum_to_wire)),
    }
}

/// Uppercase enum values on the way out. Unknown values pass through
/// otherwise untouched; both backends validate them server-side.
pub(crate) fn enum_to_wire(_ctx: &Context, value: &Value) -> Result<Value> {
    Ok(uppercase_enum(value))
}

fn uppercase_enum(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_ascii_uppercase()),
        Value::Array(items) => Value::Array(items.iter().map(uppercase_enum).collect()),
        other => other.clone(),
    }
}

/// Convert a canonical entity value to its wire form.
///
/// `parent` receives fields with [`Target::Parent`] rules; passing `None`
/// for an entity whose table uses them is a programming error and panics
/// in tests via the debug assertion.
pub(crate) fn to_backend(
    ctx: &Context,
    mapper: &EntityMapper,
    from: &Value,
    mut parent: Option<&mut Value>,
) -> Result<Value> {
    let Some(obj) = from.as_object() else {
        return Ok(from.clone());
    };
    let mut out = Value::Object(Map::new());
    for rule in mapper.rules {
        let Some(value) = obj.get(rule.canonical) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        match rule.target(ctx.backend) {
            Target::Skip => {}
            Target::Unsupported => {
                return Err(Error::unsupported_field(rule.canonical, ctx.backend));
            }
            Target::Wire(path) => {
                let converted = apply_to_wire(ctx, rule, value)?;
                let keys: Vec<&str> = path.split('.').collect();
                set_value_by_path(&mut out, &keys, converted);
            }
            Target::Parent(path) => {
                let converted = apply_to_wire(ctx, rule, value)?;
                debug_assert!(parent.is_some(), "{} needs a parent tree", mapper.name);
                if let Some(parent) = parent.as_deref_mut() {
                    let keys: Vec<&str> = path.split('.').collect();
                    set_value_by_path(parent, &keys, converted);
                }
            }
        }
    }
    Ok(out)
}

fn apply_to_wire(ctx: &Context, rule: &FieldRule, value: &Value) -> Result<Value> {
    match rule.transform {
        None => Ok(value.clone()),
        Some(Transform::ToOnly(f)) => f(ctx, value),
        Some(Transform::Entity(mapper)) => match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(to_backend(ctx, mapper, item, None)?);
                }
                Ok(Value::Array(out))
            }
            single => to_backend(ctx, mapper, single, None),
        },
    }
}

/// Convert a wire entity back to canonical form.
///
/// Responses are trusted: unknown wire fields are ignored, missing ones
/// skipped, and nothing here errors. Parent-scattered and one-way fields
/// copy verbatim when present.
pub(crate) fn from_backend(ctx: &Context, mapper: &EntityMapper, from: &Value) -> Value {
    if !from.is_object() {
        return from.clone();
    }
    let mut out = Value::Object(Map::new());
    for rule in mapper.rules {
        let path = match rule.target(ctx.backend) {
            Target::Wire(path) | Target::Parent(path) => path,
            Target::Unsupported | Target::Skip => continue,
        };
        let keys: Vec<&str> = path.split('.').collect();
        let Some(value) = get_value_by_path(from, &keys) else {
            continue;
        };
        let converted = match rule.transform {
            Some(Transform::Entity(sub)) => match value {
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .map(|item| from_backend(ctx, sub, item))
                        .collect(),
                ),
                single => from_backend(ctx, sub, &single),
            },
            _ => value,
        };
        set_value_by_path(&mut out, &[rule.canonical], converted);
    }
    out
}
