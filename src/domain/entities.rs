//! Record shapes served by the read caches, decoded from raw store documents.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::domain::{error::DomainError, types::ArticleStatus};

/// A raw document as returned by the backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// Shapes that can be decoded from a [`Document`].
pub trait FromDocument: Sized {
    const SHAPE: &'static str;

    fn from_document(document: &Document) -> Result<Self, DomainError>;
}

/// A full article, as served on its own page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub body_html: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub status: ArticleStatus,
    #[serde(default, with = "rfc3339_option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(default, with = "rfc3339_option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub view_count: u64,
}

/// The list projection of an article used by the homepage feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub status: ArticleStatus,
    #[serde(default, with = "rfc3339_option")]
    pub published_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRecord {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub position: i32,
}

impl FromDocument for ArticleRecord {
    const SHAPE: &'static str = "article";

    fn from_document(document: &Document) -> Result<Self, DomainError> {
        decode_document(document, Self::SHAPE)
    }
}

impl FromDocument for ArticleSummary {
    const SHAPE: &'static str = "article summary";

    fn from_document(document: &Document) -> Result<Self, DomainError> {
        decode_document(document, Self::SHAPE)
    }
}

impl FromDocument for CategoryRecord {
    const SHAPE: &'static str = "category";

    fn from_document(document: &Document) -> Result<Self, DomainError> {
        decode_document(document, Self::SHAPE)
    }
}

fn decode_document<T: DeserializeOwned>(
    document: &Document,
    shape: &'static str,
) -> Result<T, DomainError> {
    if document.id.trim().is_empty() {
        return Err(DomainError::malformed("", shape, "document id is empty"));
    }

    let mut fields = document.fields.clone();
    fields.insert("id".to_string(), Value::String(document.id.clone()));

    serde_json::from_value(Value::Object(fields))
        .map_err(|err| DomainError::malformed(document.id.clone(), shape, err.to_string()))
}

mod rfc3339_option {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use time::{OffsetDateTime, format_description::well_known::Rfc3339};

    pub fn serialize<S: Serializer>(
        value: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(datetime) => {
                let formatted = datetime
                    .format(&Rfc3339)
                    .map_err(serde::ser::Error::custom)?;
                serializer.serialize_some(&formatted)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|value| OffsetDateTime::parse(&value, &Rfc3339).map_err(D::Error::custom))
            .transpose()
    }
}
