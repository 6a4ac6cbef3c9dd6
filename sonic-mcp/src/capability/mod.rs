//! Named tools and resources backed by the service layer.
//!
//! Capabilities are collected in a [`RegistryBuilder`] at startup and frozen
//! into a [`CapabilityRegistry`] by [`RegistryBuilder::build`]. Only the
//! builder can register, only the registry can invoke, so the namespace cannot
//! change while requests are being served.
//!
//! Tools and resources live in separate namespaces; within one namespace names
//! are unique. Inputs are validated against the declared [`InputSchema`]
//! before a handler runs.

mod resources;
mod schema;
mod tools;
mod uri;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

pub use self::resources::register_resources;
pub use self::schema::{Field, FieldType, InputSchema};
pub use self::tools::register_tools;
pub use self::uri::UriTemplate;
use crate::error::Error;
use crate::services::Services;

/// Whether a capability is a read-only resource or an invocable tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    /// URI-addressed, read-only.
    Resource,
    /// Invocable with structured input.
    Tool,
}

impl CapabilityKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Async function invoked with validated JSON input.
pub trait Handler: Send + Sync {
    /// Runs the capability.
    fn call(&self, input: Value) -> Pin<Box<dyn Future<Output = Result<Value, Error>> + Send + '_>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, Error>> + Send + 'static,
{
    fn call(&self, input: Value) -> Pin<Box<dyn Future<Output = Result<Value, Error>> + Send + '_>> {
        Box::pin(self(input))
    }
}

/// A registered capability.
pub struct CapabilityDescriptor {
    name: String,
    description: String,
    kind: CapabilityKind,
    input_schema: InputSchema,
    uri_template: Option<UriTemplate>,
    handler: Arc<dyn Handler>,
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("uri_template", &self.uri_template)
            .finish_non_exhaustive()
    }
}

impl CapabilityDescriptor {
    /// A tool with an explicit input schema.
    pub fn tool(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
        handler: impl Handler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: CapabilityKind::Tool,
            input_schema,
            uri_template: None,
            handler: Arc::new(handler),
        }
    }

    /// A resource addressed by `template`; every template parameter becomes a
    /// required string input.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if the template is malformed.
    pub fn resource(
        name: impl Into<String>,
        template: &str,
        description: impl Into<String>,
        handler: impl Handler + 'static,
    ) -> Result<Self, Error> {
        let uri_template = UriTemplate::parse(template)?;
        let fields = uri_template
            .params()
            .map(|param| Field::string(param, "URI template parameter"))
            .collect();
        Ok(Self {
            name: name.into(),
            description: description.into(),
            kind: CapabilityKind::Resource,
            input_schema: InputSchema::new(fields, Vec::new()),
            uri_template: Some(uri_template),
            handler: Arc::new(handler),
        })
    }

    fn summary(&self) -> CapabilitySummary {
        CapabilitySummary {
            name: self.name.clone(),
            description: self.description.clone(),
            kind: self.kind,
            input_schema: self.input_schema.to_json_schema(),
            uri_template: self.uri_template.as_ref().map(ToString::to_string),
        }
    }
}

/// Listing entry for a capability.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySummary {
    /// Unique name within its kind.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Resource or tool.
    pub kind: CapabilityKind,
    /// JSON Schema of the input object.
    pub input_schema: Value,
    /// URI template, for resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri_template: Option<String>,
}

#[derive(Debug, Default)]
struct Namespaces {
    tools: BTreeMap<String, CapabilityDescriptor>,
    resources: BTreeMap<String, CapabilityDescriptor>,
}

impl Namespaces {
    const fn of(&self, kind: CapabilityKind) -> &BTreeMap<String, CapabilityDescriptor> {
        match kind {
            CapabilityKind::Tool => &self.tools,
            CapabilityKind::Resource => &self.resources,
        }
    }

    fn list(&self, kind: CapabilityKind) -> Vec<CapabilitySummary> {
        self.of(kind).values().map(CapabilityDescriptor::summary).collect()
    }
}

/// Collects capabilities during startup.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    namespaces: Namespaces,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a capability.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateCapability`] if the name is taken within its kind.
    pub fn register(&mut self, descriptor: CapabilityDescriptor) -> Result<(), Error> {
        let namespace = match descriptor.kind {
            CapabilityKind::Tool => &mut self.namespaces.tools,
            CapabilityKind::Resource => &mut self.namespaces.resources,
        };
        if namespace.contains_key(&descriptor.name) {
            return Err(Error::DuplicateCapability {
                kind: descriptor.kind.as_str(),
                name: descriptor.name,
            });
        }
        namespace.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Capabilities of `kind` registered so far, sorted by name.
    pub fn list(&self, kind: CapabilityKind) -> Vec<CapabilitySummary> {
        self.namespaces.list(kind)
    }

    /// Freezes the namespace.
    #[must_use]
    pub fn build(self) -> CapabilityRegistry {
        tracing::debug!(
            tools = self.namespaces.tools.len(),
            resources = self.namespaces.resources.len(),
            "capability registry built"
        );
        CapabilityRegistry {
            namespaces: self.namespaces,
        }
    }
}

/// Frozen capability namespace serving lookups and invocations.
#[derive(Debug)]
pub struct CapabilityRegistry {
    namespaces: Namespaces,
}

impl CapabilityRegistry {
    /// Registers every tool and resource backed by `services`.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateCapability`] or a malformed resource template.
    pub fn with_services(services: &Services) -> Result<Self, Error> {
        let mut builder = RegistryBuilder::new();
        register_tools(&mut builder, services)?;
        register_resources(&mut builder, services)?;
        Ok(builder.build())
    }

    /// Capabilities of `kind`, sorted by name. A fresh snapshot per call.
    pub fn list(&self, kind: CapabilityKind) -> Vec<CapabilitySummary> {
        self.namespaces.list(kind)
    }

    /// All capabilities, resources first, each kind sorted by name.
    pub fn capabilities(&self) -> Vec<CapabilitySummary> {
        let mut all = self.list(CapabilityKind::Resource);
        all.extend(self.list(CapabilityKind::Tool));
        all
    }

    /// Validates `input` and runs the named capability.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownCapability`], [`Error::InvalidInput`] (the handler is
    /// not called), or whatever the handler returns.
    pub async fn invoke(&self, kind: CapabilityKind, name: &str, input: Value) -> Result<Value, Error> {
        let descriptor = self
            .namespaces
            .of(kind)
            .get(name)
            .ok_or_else(|| Error::UnknownCapability {
                kind: kind.as_str(),
                name: name.to_owned(),
            })?;
        let input = if input.is_null() { Value::Object(serde_json::Map::new()) } else { input };
        let result = match descriptor.input_schema.validate(&input) {
            Ok(()) => descriptor.handler.call(input).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(_) => tracing::info!(%kind, name, outcome = "success", "capability invoked"),
            Err(e) => tracing::warn!(%kind, name, outcome = e.code(), error = %e, "capability failed"),
        }
        result
    }

    /// Matches `uri` against the registered resource templates and reads the
    /// most specific match.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownCapability`] if no template matches, otherwise as
    /// [`CapabilityRegistry::invoke`].
    pub async fn read_resource(&self, uri: &str) -> Result<Value, Error> {
        let (name, params) = self
            .namespaces
            .resources
            .values()
            .filter_map(|descriptor| {
                let template = descriptor.uri_template.as_ref()?;
                let params = template.matches(uri)?;
                Some((template.specificity(), descriptor.name.as_str(), params))
            })
            .max_by_key(|(specificity, ..)| *specificity)
            .map(|(_, name, params)| (name, params))
            .ok_or_else(|| Error::UnknownCapability {
                kind: CapabilityKind::Resource.as_str(),
                name: uri.to_owned(),
            })?;
        self.invoke(CapabilityKind::Resource, name, Value::Object(params))
            .await
    }
}

/// Response envelope for a capability call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// The handler's result, verbatim.
    Success {
        /// Handler output.
        data: Value,
    },
    /// A failed call.
    Error {
        /// Stable code and message.
        error: ErrorBody,
    },
}

/// Error half of an [`Outcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable tag.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl Outcome {
    /// Whether this is the error variant.
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl From<Result<Value, Error>> for Outcome {
    fn from(result: Result<Value, Error>) -> Self {
        match result {
            Ok(data) => Self::Success { data },
            Err(e) => Self::Error {
                error: ErrorBody {
                    code: e.code(),
                    message: e.to_string(),
                },
            },
        }
    }
}

/// Deserializes validated input into typed arguments.
pub(crate) fn parse_input<T: serde::de::DeserializeOwned>(input: Value) -> Result<T, Error> {
    serde_json::from_value(input).map_err(|e| Error::invalid_input(e.to_string()))
}

/// Serializes a handler result.
pub(crate) fn to_output<T: Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|e| Error::invalid_input(format!("unserializable result: {e}")))
}
