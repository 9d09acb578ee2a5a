// Declarative schema documents. Plain serde data, no closures here.
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// One schema node as written in a document, e.g.
/// `{"type": "object", "fields": {"id": {"type": "integer"}}, "mode": "strict"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDoc {
    #[serde(flatten)]
    pub kind: DocKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Substituted when the input is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub nullable: bool,
}

fn is_false(b: &bool) -> bool { !*b }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocKind {
    String {
        /// Regular expression every accepted string must match.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    Integer,
    Float,
    Bool,
    Unit,
    Unknown,
    Never,
    Json,
    Nan,
    Literal { value: LiteralDoc },
    Array { items: Box<SchemaDoc> },
    List { items: Box<SchemaDoc> },
    Dict { values: Box<SchemaDoc> },
    Tuple { items: Vec<SchemaDoc> },
    Union { variants: Vec<SchemaDoc> },
    Object {
        fields: IndexMap<String, SchemaDoc>,
        #[serde(default)]
        mode: ObjectMode,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralDoc {
    Null,
    Bool(bool),
    Number(OrderedFloat<f64>),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectMode {
    #[default]
    Passthrough,
    Strict,
    Strip,
}

impl SchemaDoc {
    pub fn new(kind: DocKind) -> Self {
        Self { kind, description: None, default: None, optional: false, nullable: false }
    }

    pub fn from_json_str(src: &str) -> anyhow::Result<Self> {
        let de = &mut serde_json::Deserializer::from_str(src);
        serde_path_to_error::deserialize::<_, Self>(de).map_err(|err| {
            let path = err.path().to_string();
            anyhow::anyhow!("at JSON path {path} → {}", err.into_inner())
        })
    }

    /// No wrapper flag is set, so the node is exactly its kind.
    pub(crate) fn is_bare(&self) -> bool {
        self.description.is_none() && self.default.is_none() && !self.optional && !self.nullable
    }
}

impl From<DocKind> for SchemaDoc {
    fn from(kind: DocKind) -> Self { SchemaDoc::new(kind) }
}
