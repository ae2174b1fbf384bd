//! Resource templates.
//!
//! Dashboards, cards and databases are addressable as
//! `metabase://{kind}/{id}`. The id is opaque and forwarded as-is.

use std::fmt;

use crate::api::MetabaseApi;
use crate::error::MetabaseError;
use crate::protocol::ResourceTemplate;

/// URI scheme prefix of every resource.
pub const URI_SCHEME: &str = "metabase://";

/// MIME type of resource contents.
pub const JSON_MIME_TYPE: &str = "application/json";

/// The kinds of object addressable as a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Dashboard,
    Card,
    Database,
}

struct TemplateSpec {
    kind: ResourceKind,
    name: &'static str,
    description: &'static str,
}

const BUILTIN_TEMPLATES: &[TemplateSpec] = &[
    TemplateSpec {
        kind: ResourceKind::Dashboard,
        name: "get_dashboard",
        description: "Get a Metabase dashboard by its ID",
    },
    TemplateSpec {
        kind: ResourceKind::Card,
        name: "get_card",
        description: "Get a Metabase question/card by its ID",
    },
    TemplateSpec {
        kind: ResourceKind::Database,
        name: "get_database",
        description: "Get a Metabase database by its ID",
    },
];

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Dashboard => "dashboard",
            ResourceKind::Card => "card",
            ResourceKind::Database => "database",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "dashboard" => Some(ResourceKind::Dashboard),
            "card" => Some(ResourceKind::Card),
            "database" => Some(ResourceKind::Database),
            _ => None,
        }
    }

    pub fn uri_template(self) -> String {
        format!("{URI_SCHEME}{}/{{id}}", self.as_str())
    }
}

/// A parsed resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAddress {
    pub kind: ResourceKind,
    pub id: String,
}

impl ResourceAddress {
    /// Parse `metabase://{kind}/{id}`. Returns `None` for anything else.
    ///
    /// Dot segments are rejected since URL normalization would resolve them
    /// even when percent-encoded.
    pub fn parse(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix(URI_SCHEME)?;
        let (kind, id) = rest.split_once('/')?;
        let kind = ResourceKind::from_segment(kind)?;
        if id.is_empty() || id.contains('/') || id == "." || id == ".." {
            return None;
        }
        Some(Self {
            kind,
            id: id.to_string(),
        })
    }

    /// Fetch the addressed object.
    pub async fn read(&self, api: &MetabaseApi) -> Result<String, MetabaseError> {
        match self.kind {
            ResourceKind::Dashboard => api.get_dashboard(&self.id).await,
            ResourceKind::Card => api.get_card(&self.id).await,
            ResourceKind::Database => api.get_database(&self.id).await,
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{URI_SCHEME}{}/{}", self.kind.as_str(), self.id)
    }
}

/// Templates advertised through `resources/templates/list`.
pub fn templates() -> Vec<ResourceTemplate> {
    BUILTIN_TEMPLATES
        .iter()
        .map(|spec| ResourceTemplate {
            uri_template: spec.kind.uri_template(),
            name: spec.name.to_string(),
            description: Some(spec.description.to_string()),
            mime_type: Some(JSON_MIME_TYPE.to_string()),
        })
        .collect()
}
