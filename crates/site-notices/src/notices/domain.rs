use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Metadata key that overrides a notice title in summary copy.
pub const DISPLAY_NAME_KEY: &str = "display_name";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub String);

impl NotificationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Category tag of a notice. Only `service_disruption` is grouped into the
/// consolidated banner; every other value renders standalone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NoticeKind {
    ServiceDisruption,
    Maintenance,
    Announcement,
    Other(String),
}

impl NoticeKind {
    pub fn is_disruption(&self) -> bool {
        matches!(self, Self::ServiceDisruption)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::ServiceDisruption => "service_disruption",
            Self::Maintenance => "maintenance",
            Self::Announcement => "announcement",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for NoticeKind {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "service_disruption" => Self::ServiceDisruption,
            "maintenance" => Self::Maintenance,
            "announcement" => Self::Announcement,
            _ => Self::Other(value),
        }
    }
}

impl From<NoticeKind> for String {
    fn from(value: NoticeKind) -> Self {
        value.as_str().to_string()
    }
}

impl Default for NoticeKind {
    fn default() -> Self {
        Self::Announcement
    }
}

/// Urgency of a notice.
///
/// `Critical`, `Error`, `Warning` and `Info` are ordered from most to least
/// urgent. Anything else the backend sends is kept as a cosmetic tier: it
/// styles a standalone notice but ranks as `Info`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
    Cosmetic(String),
}

impl Severity {
    pub const fn ordered() -> [Self; 4] {
        [Self::Critical, Self::Error, Self::Warning, Self::Info]
    }

    /// Position in the urgency order; `None` for cosmetic tiers.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Critical => Some(0),
            Self::Error => Some(1),
            Self::Warning => Some(2),
            Self::Info => Some(3),
            Self::Cosmetic(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Cosmetic(raw) => raw,
        }
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "error" => Self::Error,
            "warning" => Self::Warning,
            "info" => Self::Info,
            _ => Self::Cosmetic(value),
        }
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        value.as_str().to_string()
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Info
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single advisory item as served by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: NoticeKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub severity: Severity,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "default_dismissible", deserialize_with = "null_as_dismissible")]
    pub dismissible: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn default_dismissible() -> bool {
    true
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_dismissible<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_else(default_dismissible))
}

impl Notification {
    /// Name used when the notice is listed in summary copy.
    pub fn display_name(&self) -> &str {
        match self.metadata.get(DISPLAY_NAME_KEY) {
            Some(serde_json::Value::String(name)) if !name.trim().is_empty() => name,
            _ => &self.title,
        }
    }

    pub fn is_disruption(&self) -> bool {
        self.kind.is_disruption()
    }
}

/// Response envelope of the site-notifications endpoint.
///
/// Items are kept raw so one malformed entry costs only itself.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationEnvelope {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<serde_json::Value>,
}

impl NotificationEnvelope {
    /// Decodes each item, skipping those without a usable id.
    pub fn into_notifications(self) -> Vec<Notification> {
        self.data
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| match serde_json::from_value::<Notification>(raw) {
                Ok(notification) if !notification.id.as_str().trim().is_empty() => {
                    Some(notification)
                }
                Ok(_) => {
                    warn!(index, "skipping notice without an id");
                    None
                }
                Err(err) => {
                    warn!(index, error = %err, "skipping malformed notice");
                    None
                }
            })
            .collect()
    }
}

/// Collapses repeated ids in one batch: the later entry wins and takes the
/// position of the first occurrence.
pub fn dedupe_by_id(batch: Vec<Notification>) -> Vec<Notification> {
    let mut positions: BTreeMap<NotificationId, usize> = BTreeMap::new();
    let mut unique: Vec<Notification> = Vec::with_capacity(batch.len());

    for notification in batch {
        match positions.get(&notification.id) {
            Some(&index) => unique[index] = notification,
            None => {
                positions.insert(notification.id.clone(), unique.len());
                unique.push(notification);
            }
        }
    }

    unique
}
