// ── Template engine ──
//
// Renders `{{ ... }}` placeholders in KVS values against a per-device
// context. The language is a Go text/template compatible subset: field
// chains, `$`, literals, parenthesised pipelines, and the `index`, `len`
// and `print` functions. Missing keys are always errors.

mod eval;
mod parse;

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::CoreError;
use crate::model::DeviceIdentity;

static TEMPLATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{.*?\}\}").expect("template pattern is valid"));

// ── Errors ──────────────────────────────────────────────────────────

/// What went wrong while rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The template text does not parse.
    Syntax,
    /// A field or `index` lookup named a key the context lacks.
    MissingKey,
    /// Any other runtime failure (type mismatch, null output, bad arity).
    Evaluation,
}

/// Internal failure before the template text and context keys are attached.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Fault {
    pub kind: ErrorKind,
    pub message: String,
}

impl Fault {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A render failure, carrying the offending template and the top-level
/// keys that *were* available so the user can spot the typo.
#[derive(Debug, Clone, Error)]
#[error(
    "failed to render template '{template}': {message} (available keys: {})",
    available.join(", ")
)]
pub struct TemplateError {
    pub kind: ErrorKind,
    pub template: String,
    pub message: String,
    pub available: Vec<String>,
}

// ── Context ─────────────────────────────────────────────────────────

/// User-supplied values, loaded from a YAML mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values(Map<String, Value>);

impl Values {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Parse a YAML document whose root must be a mapping. An empty
    /// document yields no values.
    pub fn from_yaml(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(format!(
                "root must be a mapping, found {}",
                match other {
                    Value::Array(_) => "a sequence",
                    _ => "a scalar",
                }
            )),
        }
    }

    /// Load a values file.
    pub async fn load(path: &Path) -> Result<Self, CoreError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoreError::Values {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Self::from_yaml(&text).map_err(|message| CoreError::Values {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// The data a template is rendered against: the values at the root, plus
/// `device` (the device being pushed) and `devices` (every registered
/// device keyed by id). `device` and `devices` shadow same-named values.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateContext {
    root: Value,
}

impl TemplateContext {
    pub fn new(values: &Values, device: &DeviceIdentity, devices: &[DeviceIdentity]) -> Self {
        let mut root = values.as_map().clone();
        root.insert("device".into(), identity_value(device));
        root.insert(
            "devices".into(),
            Value::Object(
                devices
                    .iter()
                    .map(|d| (d.device_id.clone(), identity_value(d)))
                    .collect(),
            ),
        );
        Self {
            root: Value::Object(root),
        }
    }

    /// A context over an arbitrary mapping, without device entries.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            root: Value::Object(map),
        }
    }

    /// Sorted top-level key names.
    pub fn available_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .root
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn root(&self) -> &Value {
        &self.root
    }
}

fn identity_value(identity: &DeviceIdentity) -> Value {
    serde_json::to_value(identity).unwrap_or(Value::Null)
}

// ── Rendering ───────────────────────────────────────────────────────

/// Returns `true` if `text` contains a `{{ ... }}` placeholder.
pub fn is_templated(text: &str) -> bool {
    TEMPLATE_PATTERN.is_match(text)
}

/// Render `template` against `ctx`.
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
    parse::parse(template)
        .and_then(|nodes| eval::execute(&nodes, ctx.root()))
        .map_err(|fault| TemplateError {
            kind: fault.kind,
            template: template.to_owned(),
            message: fault.message,
            available: ctx.available_keys(),
        })
}

/// Result of [`render_value`].
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub value: Value,
    /// Whether the input was a template (and was therefore rendered).
    pub templated: bool,
}

/// Render a JSON value: templated strings are rendered, everything else
/// passes through untouched.
pub fn render_value(value: &Value, ctx: &TemplateContext) -> Result<Rendered, TemplateError> {
    match value {
        Value::String(s) if is_templated(s) => Ok(Rendered {
            value: Value::String(render(s, ctx)?),
            templated: true,
        }),
        other => Ok(Rendered {
            value: other.clone(),
            templated: false,
        }),
    }
}

/// Returns `true` if `value` is a string containing a placeholder.
pub fn is_templated_value(value: &Value) -> bool {
    value.as_str().is_some_and(is_templated)
}
