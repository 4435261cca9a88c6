//! Monitor records as defined locally in YAML and as returned by the Kener API.
//!
//! Enumerated fields travel over the wire as their upper-case string value
//! (`"GROUP"`, `"ACTIVE"`, ...). Decoding a string outside the closed set is an
//! error, never a silent pass-through.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),
    #[error("invalid value '{value}' for field '{field}'")]
    InvalidEnumValue { field: &'static str, value: String },
    #[error("malformed monitor record: {0}")]
    Decode(String),
}

/// Returned by the `FromStr` impls of the enumerated monitor fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized value '{0}'")]
pub struct UnknownVariant(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitorType {
    Api,
    Ping,
    Dns,
    Tcp,
    Group,
    Ssl,
    Sql,
}

impl MonitorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Api => "API",
            Self::Ping => "PING",
            Self::Dns => "DNS",
            Self::Tcp => "TCP",
            Self::Group => "GROUP",
            Self::Ssl => "SSL",
            Self::Sql => "SQL",
        }
    }
}

impl FromStr for MonitorType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "API" => Ok(Self::Api),
            "PING" => Ok(Self::Ping),
            "DNS" => Ok(Self::Dns),
            "TCP" => Ok(Self::Tcp),
            "GROUP" => Ok(Self::Group),
            "SSL" => Ok(Self::Ssl),
            "SQL" => Ok(Self::Sql),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for MonitorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a monitor on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitorStatus {
    Active,
    Inactive,
}

impl MonitorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

impl FromStr for MonitorStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status reported for a monitor before any check has produced data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DefaultStatus {
    None,
    Up,
    Degraded,
    Down,
}

impl DefaultStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Up => "UP",
            Self::Degraded => "DEGRADED",
            Self::Down => "DOWN",
        }
    }
}

impl FromStr for DefaultStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Self::None),
            "UP" => Ok(Self::Up),
            "DEGRADED" => Ok(Self::Degraded),
            "DOWN" => Ok(Self::Down),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for DefaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `include_degraded_in_downtime` is a YES/NO string on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "YES",
            Self::No => "NO",
        }
    }
}

impl FromStr for YesNo {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "YES" => Ok(Self::Yes),
            "NO" => Ok(Self::No),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for YesNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identifying subset of a remote monitor, as needed to reference it
/// from a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSummary {
    pub id: i64,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub name: String,
}

impl MonitorSummary {
    /// Reads `id`, `tag` and `name` from a remote record, ignoring every
    /// other field.
    pub fn from_remote(record: &Value) -> Result<Self, ModelError> {
        Self::deserialize(record).map_err(|e| ModelError::Decode(e.to_string()))
    }
}

/// One entry of a group monitor's `type_data.monitors` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GroupChild {
    /// Looked up on the server; this is the shape the API expects on create.
    Resolved {
        id: i64,
        tag: String,
        name: String,
        selected: bool,
    },
    /// As written in a definition file, before lookup.
    Reference {
        #[serde(skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
        selected: bool,
    },
}

impl GroupChild {
    pub fn resolved(summary: MonitorSummary) -> Self {
        Self::Resolved {
            id: summary.id,
            tag: summary.tag,
            name: summary.name,
            selected: true,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Resolved { tag, .. } => Some(tag),
            Self::Reference { tag, .. } => tag.as_deref(),
        }
    }

    fn from_value(value: &Value) -> Self {
        let tag = value
            .get("tag")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let selected = value
            .get("selected")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let id = value.get("id").and_then(Value::as_i64);
        let name = value.get("name").and_then(Value::as_str);

        match (id, tag, name) {
            (Some(id), Some(tag), Some(name)) => Self::Resolved {
                id,
                tag,
                name: name.to_string(),
                selected,
            },
            (_, tag, _) => Self::Reference { tag, selected },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupTypeData {
    pub monitors: Vec<GroupChild>,
    /// Any other group settings, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Type-specific configuration, keyed by the monitor's type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypeData {
    Group(GroupTypeData),
    Generic(Map<String, Value>),
}

impl Default for TypeData {
    fn default() -> Self {
        Self::Generic(Map::new())
    }
}

impl TypeData {
    pub fn from_value(monitor_type: MonitorType, value: Option<Value>) -> Result<Self, ModelError> {
        let mut map = match value {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            // The API stores type_data as a JSON string.
            Some(Value::String(raw)) if raw.trim().is_empty() => Map::new(),
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    return Err(ModelError::Decode(
                        "type_data string is not a JSON object".into(),
                    ))
                }
            },
            Some(_) => return Err(ModelError::Decode("type_data must be a mapping".into())),
        };

        if monitor_type != MonitorType::Group {
            return Ok(Self::Generic(map));
        }

        let monitors = match map.remove("monitors") {
            Some(Value::Array(items)) => items.iter().map(GroupChild::from_value).collect(),
            Some(other) => {
                warn!(value = %other, "Group monitor 'type_data.monitors' is not a list, treating as empty");
                Vec::new()
            }
            None => {
                warn!("Group monitor has no 'type_data.monitors', treating as empty");
                Vec::new()
            }
        };

        Ok(Self::Group(GroupTypeData {
            monitors,
            extra: map,
        }))
    }

    pub fn as_group(&self) -> Option<&GroupTypeData> {
        match self {
            Self::Group(group) => Some(group),
            Self::Generic(_) => None,
        }
    }
}

/// A monitor, the unit of reconciliation.
///
/// Every defaultable field is an `Option`: `None` means "not given" and is
/// what the defaulting engine fills in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Monitor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub tag: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub cron: Option<String>,
    pub monitor_type: MonitorType,
    pub status: Option<MonitorStatus>,
    pub default_status: Option<DefaultStatus>,
    pub day_degraded_minimum_count: Option<u32>,
    pub day_down_minimum_count: Option<u32>,
    pub include_degraded_in_downtime: Option<YesNo>,
    pub degraded_trigger: Option<Value>,
    pub down_trigger: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub type_data: TypeData,
}

/// Field names of [`Monitor`], in wire order.
pub const MONITOR_FIELDS: &[&str] = &[
    "id",
    "tag",
    "name",
    "description",
    "category_name",
    "image",
    "cron",
    "monitor_type",
    "status",
    "default_status",
    "day_degraded_minimum_count",
    "day_down_minimum_count",
    "include_degraded_in_downtime",
    "degraded_trigger",
    "down_trigger",
    "created_at",
    "updated_at",
    "type_data",
];

#[derive(Debug, Deserialize)]
struct RawMonitor {
    id: Option<i64>,
    tag: Option<String>,
    name: Option<String>,
    description: Option<String>,
    category_name: Option<String>,
    image: Option<String>,
    cron: Option<String>,
    monitor_type: Option<String>,
    status: Option<String>,
    default_status: Option<String>,
    day_degraded_minimum_count: Option<u32>,
    day_down_minimum_count: Option<u32>,
    include_degraded_in_downtime: Option<String>,
    degraded_trigger: Option<Value>,
    down_trigger: Option<Value>,
    created_at: Option<String>,
    updated_at: Option<String>,
    type_data: Option<Value>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Origin {
    Definition,
    Remote,
}

impl Monitor {
    /// Decode a record from a local definition file. `tag`, `name` and
    /// `monitor_type` are required; `id` is ignored if absent.
    pub fn from_definition(record: &Value) -> Result<Self, ModelError> {
        Self::decode(record, Origin::Definition)
    }

    /// Decode a record returned by the API. `id` and `monitor_type` are required.
    pub fn from_remote(record: &Value) -> Result<Self, ModelError> {
        Self::decode(record, Origin::Remote)
    }

    fn decode(record: &Value, origin: Origin) -> Result<Self, ModelError> {
        if !record.is_object() {
            return Err(ModelError::Decode("record is not a mapping".into()));
        }
        let raw: RawMonitor = serde_json::from_value(record.clone())
            .map_err(|e| ModelError::Decode(e.to_string()))?;

        let id = match (origin, raw.id) {
            (Origin::Remote, None) => return Err(ModelError::MissingField("id")),
            (_, id) => id,
        };
        let (tag, name) = match origin {
            Origin::Definition => (
                raw.tag.ok_or(ModelError::MissingField("tag"))?,
                raw.name.ok_or(ModelError::MissingField("name"))?,
            ),
            Origin::Remote => (raw.tag.unwrap_or_default(), raw.name.unwrap_or_default()),
        };

        let monitor_type = raw
            .monitor_type
            .ok_or(ModelError::MissingField("monitor_type"))?
            .parse::<MonitorType>()
            .map_err(|UnknownVariant(value)| ModelError::InvalidEnumValue {
                field: "monitor_type",
                value,
            })?;

        Ok(Self {
            id,
            tag,
            name,
            description: raw.description,
            category_name: raw.category_name,
            image: raw.image,
            cron: raw.cron,
            monitor_type,
            status: parse_enum("status", raw.status)?,
            default_status: parse_enum("default_status", raw.default_status)?,
            day_degraded_minimum_count: raw.day_degraded_minimum_count,
            day_down_minimum_count: raw.day_down_minimum_count,
            include_degraded_in_downtime: parse_enum(
                "include_degraded_in_downtime",
                raw.include_degraded_in_downtime,
            )?,
            degraded_trigger: trigger_id(raw.degraded_trigger),
            down_trigger: trigger_id(raw.down_trigger),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            type_data: TypeData::from_value(monitor_type, raw.type_data)?,
        })
    }

    /// Checks that the identifying fields carry a value.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.tag.trim().is_empty() {
            return Err(ModelError::EmptyField("tag"));
        }
        if self.name.trim().is_empty() {
            return Err(ModelError::EmptyField("name"));
        }
        Ok(())
    }

    pub fn summary(&self) -> Option<MonitorSummary> {
        Some(MonitorSummary {
            id: self.id?,
            tag: self.tag.clone(),
            name: self.name.clone(),
        })
    }

    pub fn is_group(&self) -> bool {
        self.monitor_type == MonitorType::Group
    }

    /// JSON body for `POST /api/monitor`.
    pub fn to_payload(&self) -> Result<Value, ModelError> {
        serde_json::to_value(self).map_err(|e| ModelError::Decode(e.to_string()))
    }
}

fn parse_enum<T>(field: &'static str, value: Option<String>) -> Result<Option<T>, ModelError>
where
    T: FromStr<Err = UnknownVariant>,
{
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|UnknownVariant(value)| ModelError::InvalidEnumValue { field, value })
        })
        .transpose()
}

fn trigger_id(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}
