//! Schema-derived tools: the registry's second tool shape (spec §4.5).
//!
//! A schema-explicit tool ([`crate::builtin::AddTool`]) hand-writes its
//! own JSON schema. A schema-derived tool instead declares a typed
//! parameter list plus a docstring, and [`DerivedTool`] builds the schema
//! and description from those at registration time — the "derive-like
//! builder API" called for by Design Notes "Tool schema derivation",
//! standing in for reflection since there's no Rust derive macro for it
//! here.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream;
use serde_json::{Map, Value};
use turnloom_domain::{BoxStream, Error, Progress, Result, ToolContext};
use turnloom_plugins::ToolProgress;

use crate::error_envelope::error_envelope;
use crate::tool::Tool;

/// Primitive JSON-schema kinds a declared parameter can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Bool,
    Json,
}

impl ParamKind {
    fn schema_type(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Bool => "boolean",
            ParamKind::Json => "object",
        }
    }
}

/// One declared parameter of a schema-derived tool's callable.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamKind, default: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: Some(default),
        }
    }
}

/// The callable a [`DerivedTool`] wraps. Receives the correlation triple
/// unconditionally — the tool itself decides whether to look at it —
/// and the already-defaulted, already-validated argument object.
pub type Handler = Arc<
    dyn Fn(ToolContext, Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>>
        + Send
        + Sync,
>;

/// A tool whose schema is derived from [`ParamSpec`]s and a docstring
/// rather than authored by hand. Parameters named `user_id`, `thread_id`,
/// or `turn_correlation_id` are reserved — the registry rejects
/// declaring one of those in `params`, since those three are always
/// supplied out of band via `ctx`, never as model-visible arguments
/// (Design Notes "Tool schema derivation": "Optional correlation
/// parameters are detected by name ... and excluded from the schema").
pub struct DerivedTool {
    name: String,
    description: String,
    params: Vec<ParamSpec>,
    handler: Handler,
}

const RESERVED_NAMES: [&str; 3] = ["user_id", "thread_id", "turn_correlation_id"];

impl DerivedTool {
    /// `docstring`'s first paragraph (text up to the first blank line)
    /// becomes the tool description, matching how the registry is meant
    /// to read a callable's doc comment.
    pub fn new(
        name: impl Into<String>,
        docstring: &str,
        params: Vec<ParamSpec>,
        handler: Handler,
    ) -> Result<Self> {
        for p in &params {
            if RESERVED_NAMES.contains(&p.name.as_str()) {
                return Err(Error::Validation(format!(
                    "'{}' is a correlation parameter, supplied via ctx, not a declared param",
                    p.name
                )));
            }
        }
        Ok(Self {
            name: name.into(),
            description: first_paragraph(docstring),
            params,
            handler,
        })
    }

    fn fill_defaults_and_validate(&self, arguments: &Value) -> Result<Value> {
        let input = arguments.as_object().cloned().unwrap_or_default();
        let mut out = Map::new();
        for p in &self.params {
            match input.get(&p.name) {
                Some(v) => {
                    out.insert(p.name.clone(), v.clone());
                }
                None => match &p.default {
                    Some(default) => {
                        out.insert(p.name.clone(), default.clone());
                    }
                    None if p.required => {
                        return Err(Error::Validation(format!(
                            "missing required field '{}'",
                            p.name
                        )))
                    }
                    None => {}
                },
            }
        }
        Ok(Value::Object(out))
    }
}

fn first_paragraph(docstring: &str) -> String {
    docstring
        .trim()
        .split("\n\n")
        .next()
        .unwrap_or("")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Tool for DerivedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for p in &self.params {
            let mut field = serde_json::json!({ "type": p.kind.schema_type() });
            if let Some(default) = &p.default {
                field["default"] = default.clone();
            }
            properties.insert(p.name.clone(), field);
            if p.required {
                required.push(Value::String(p.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": required,
        })
    }

    async fn invoke(&self, ctx: &ToolContext, arguments: Value) -> BoxStream<'static, ToolProgress> {
        let filled = match self.fill_defaults_and_validate(&arguments) {
            Ok(v) => v,
            Err(e) => {
                let envelope = error_envelope(&self.name, &arguments, &e);
                return Box::pin(stream::once(async move { Progress::Final(envelope) }));
            }
        };
        let ctx = ctx.clone();
        let handler = self.handler.clone();
        let name = self.name.clone();
        let fut = async move {
            match handler(ctx, filled.clone()).await {
                Ok(value) => Progress::Final(value),
                Err(e) => Progress::Final(error_envelope(&name, &filled, &e)),
            }
        };
        Box::pin(stream::once(fut))
    }
}
