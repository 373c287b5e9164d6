use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Kind of resource a [`Metadata`] record describes.
///
/// Providers may report types beyond the four oEmbed ones; those are kept
/// verbatim in `Other`. An empty type is never accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Photo,
    Video,
    Link,
    Rich,
    Other(String),
}

impl ResourceType {
    pub fn as_str(&self) -> &str {
        match self {
            ResourceType::Photo => "photo",
            ResourceType::Video => "video",
            ResourceType::Link => "link",
            ResourceType::Rich => "rich",
            ResourceType::Other(kind) => kind,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResourceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResourceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let kind = String::deserialize(deserializer)?;
        match kind.trim() {
            "" => Err(de::Error::invalid_value(
                de::Unexpected::Str(&kind),
                &"a non-empty resource type",
            )),
            "photo" => Ok(ResourceType::Photo),
            "video" => Ok(ResourceType::Video),
            "link" => Ok(ResourceType::Link),
            "rich" => Ok(ResourceType::Rich),
            other => Ok(ResourceType::Other(other.to_string())),
        }
    }
}

/// Normalized description of a resolved URL, in oEmbed shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "type")]
    pub kind: ResourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub width: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub thumbnail_width: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub thumbnail_height: Option<u32>,
    /// Fields outside the known set (`version`, `cache_age`, ...), kept as
    /// the provider or extractor sent them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    pub fn new(kind: ResourceType) -> Self {
        Self {
            kind,
            url: None,
            title: None,
            description: None,
            author_name: None,
            author_url: None,
            provider_name: None,
            provider_url: None,
            html: None,
            width: None,
            height: None,
            thumbnail_url: None,
            thumbnail_width: None,
            thumbnail_height: None,
            extra: Map::new(),
        }
    }

    pub fn set_dimensions(&mut self, width: u32, height: u32) {
        self.width = Some(width);
        self.height = Some(height);
    }

    pub fn set_thumbnail_dimensions(&mut self, width: u32, height: u32) {
        self.thumbnail_width = Some(width);
        self.thumbnail_height = Some(height);
    }

    /// True when a thumbnail is referenced but its size is unknown or zero.
    pub fn needs_thumbnail_size(&self) -> bool {
        let has_url = self
            .thumbnail_url
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty());
        has_url && self.thumbnail_width.unwrap_or(0) == 0
    }

    /// Drops width/height values that arrived without their counterpart.
    pub fn normalize(mut self) -> Self {
        if self.width.is_none() || self.height.is_none() {
            self.width = None;
            self.height = None;
        }
        if self.thumbnail_width.is_none() || self.thumbnail_height.is_none() {
            self.thumbnail_width = None;
            self.thumbnail_height = None;
        }
        self
    }
}

// oEmbed providers disagree on whether sizes are numbers or strings.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
