//! # Resource Model
//!
//! The typed node of the resource tree. A [`Resource`] carries its identity
//! (`ri`, `rn`, `srn`, `pi`), its kind ([`ResourceType`] plus the `tpe` type tag),
//! the universal timestamps, the policy fields, and a free-form attribute map for
//! everything type-specific.
//!
//! Resources are owned by storage. The dispatcher only ever holds transient clones.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Format used for every timestamp rendered into a resource document.
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S,%6f";

/// Default lifetime of a freshly created resource when the payload has no `et`.
const DEFAULT_LIFETIME_DAYS: i64 = 365;

/// Renders a timestamp in the basic ISO 8601 form used by the protocol.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a basic ISO 8601 timestamp (`20231018T120000` with optional `,ffffff`).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let (base, fraction) = match value.split_once(',') {
        Some((base, fraction)) => (base, fraction),
        None => (value, "0"),
    };
    let naive = chrono::NaiveDateTime::parse_from_str(base, "%Y%m%dT%H%M%S").ok()?;
    let micros: i64 = format!("{fraction:0<6}").get(..6)?.parse().ok()?;
    Some(naive.and_utc() + Duration::microseconds(micros))
}

/// The enumerated resource kinds.
///
/// Protocol types carry their standard numeric code. Virtual resources, which
/// only exist as addressable projections, use codes from the `20001..` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum ResourceType {
    AccessControlPolicy,
    Ae,
    Container,
    ContentInstance,
    CseBase,
    Group,
    PollingChannel,
    RemoteCse,
    Request,
    Subscription,
    FlexContainer,
    TimeSeries,
    TimeSeriesInstance,
    FlexContainerInstance,
    ContainerOldest,
    ContainerLatest,
    GroupFanoutPoint,
    FlexContainerOldest,
    FlexContainerLatest,
    PollingChannelUri,
    TimeSeriesOldest,
    TimeSeriesLatest,
}

impl ResourceType {
    /// Numeric type code.
    pub const fn code(self) -> i32 {
        match self {
            Self::AccessControlPolicy => 1,
            Self::Ae => 2,
            Self::Container => 3,
            Self::ContentInstance => 4,
            Self::CseBase => 5,
            Self::Group => 9,
            Self::PollingChannel => 15,
            Self::RemoteCse => 16,
            Self::Request => 17,
            Self::Subscription => 23,
            Self::FlexContainer => 28,
            Self::TimeSeries => 29,
            Self::TimeSeriesInstance => 30,
            Self::FlexContainerInstance => 58,
            Self::ContainerOldest => 20001,
            Self::ContainerLatest => 20002,
            Self::GroupFanoutPoint => 20003,
            Self::FlexContainerOldest => 20004,
            Self::FlexContainerLatest => 20005,
            Self::PollingChannelUri => 20006,
            Self::TimeSeriesOldest => 20007,
            Self::TimeSeriesLatest => 20008,
        }
    }

    /// Looks up a type by its numeric code.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|ty| ty.code() == code)
    }

    const ALL: [Self; 22] = [
        Self::AccessControlPolicy,
        Self::Ae,
        Self::Container,
        Self::ContentInstance,
        Self::CseBase,
        Self::Group,
        Self::PollingChannel,
        Self::RemoteCse,
        Self::Request,
        Self::Subscription,
        Self::FlexContainer,
        Self::TimeSeries,
        Self::TimeSeriesInstance,
        Self::FlexContainerInstance,
        Self::ContainerOldest,
        Self::ContainerLatest,
        Self::GroupFanoutPoint,
        Self::FlexContainerOldest,
        Self::FlexContainerLatest,
        Self::PollingChannelUri,
        Self::TimeSeriesOldest,
        Self::TimeSeriesLatest,
    ];

    /// The default type tag, e.g. `m2m:cnt`.
    pub const fn tpe(self) -> &'static str {
        match self {
            Self::AccessControlPolicy => "m2m:acp",
            Self::Ae => "m2m:ae",
            Self::Container => "m2m:cnt",
            Self::ContentInstance => "m2m:cin",
            Self::CseBase => "m2m:cb",
            Self::Group => "m2m:grp",
            Self::PollingChannel => "m2m:pch",
            Self::RemoteCse => "m2m:csr",
            Self::Request => "m2m:req",
            Self::Subscription => "m2m:sub",
            Self::FlexContainer => "m2m:fcnt",
            Self::TimeSeries => "m2m:ts",
            Self::TimeSeriesInstance => "m2m:tsi",
            Self::FlexContainerInstance => "m2m:fci",
            Self::ContainerOldest | Self::FlexContainerOldest | Self::TimeSeriesOldest => "m2m:ol",
            Self::ContainerLatest | Self::FlexContainerLatest | Self::TimeSeriesLatest => "m2m:la",
            Self::GroupFanoutPoint => "m2m:fopt",
            Self::PollingChannelUri => "m2m:pcu",
        }
    }

    /// Short name used as a prefix for generated identifiers.
    pub fn short_name(self) -> &'static str {
        let tpe = self.tpe();
        tpe.split_once(':').map_or(tpe, |(_, short)| short)
    }

    /// Whether the resource is a computed projection rather than stored data.
    pub const fn is_virtual(self) -> bool {
        matches!(
            self,
            Self::ContainerOldest
                | Self::ContainerLatest
                | Self::GroupFanoutPoint
                | Self::FlexContainerOldest
                | Self::FlexContainerLatest
                | Self::PollingChannelUri
                | Self::TimeSeriesOldest
                | Self::TimeSeriesLatest
        )
    }

    /// The `<latest>`/`<oldest>` projections that reference lists leave out.
    pub const fn is_latest_oldest(self) -> bool {
        matches!(
            self,
            Self::ContainerOldest
                | Self::ContainerLatest
                | Self::FlexContainerOldest
                | Self::FlexContainerLatest
        )
    }

    /// Append-only types, ordered by creation time rather than by name.
    pub const fn is_instance(self) -> bool {
        matches!(
            self,
            Self::ContentInstance | Self::FlexContainerInstance | Self::TimeSeriesInstance
        )
    }

    /// Types a client may never create through a CREATE request.
    pub const fn is_client_creatable(self) -> bool {
        !matches!(
            self,
            Self::CseBase | Self::Request | Self::FlexContainerInstance
        ) && !self.is_virtual()
    }

    /// Types whose instances are immutable after creation.
    pub const fn is_update_allowed(self) -> bool {
        !self.is_instance()
    }

    /// Child types a resource of this type accepts.
    pub fn allowed_children(self) -> &'static [ResourceType] {
        use ResourceType::*;
        match self {
            CseBase => &[AccessControlPolicy, Ae, Container, Group, PollingChannel, RemoteCse, Subscription, FlexContainer, TimeSeries],
            Ae => &[AccessControlPolicy, Container, Group, PollingChannel, Subscription, FlexContainer, TimeSeries],
            RemoteCse => &[AccessControlPolicy, Container, Group, PollingChannel, Subscription, FlexContainer, TimeSeries],
            Container => &[Container, ContentInstance, Subscription, ContainerLatest, ContainerOldest],
            FlexContainer => &[Container, FlexContainer, Subscription, FlexContainerInstance, FlexContainerLatest, FlexContainerOldest],
            TimeSeries => &[TimeSeriesInstance, Subscription, TimeSeriesLatest, TimeSeriesOldest],
            Group => &[Subscription, GroupFanoutPoint],
            PollingChannel => &[PollingChannelUri],
            AccessControlPolicy => &[Subscription],
            _ => &[],
        }
    }
}

impl From<ResourceType> for i32 {
    fn from(ty: ResourceType) -> Self {
        ty.code()
    }
}

impl TryFrom<i32> for ResourceType {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown resource type: {code}"))
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.short_name(), self.code())
    }
}

/// Operations a permission check can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Create,
    Retrieve,
    Update,
    Delete,
    Notify,
    Discovery,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "CREATE",
            Self::Retrieve => "RETRIEVE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Notify => "NOTIFY",
            Self::Discovery => "DISCOVERY",
        };
        f.write_str(name)
    }
}

/// A node of the resource tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Store-wide unique identifier. Never changes once created.
    pub ri: String,
    /// Resource name, unique among siblings.
    pub rn: String,
    /// Structured path (`cse-in/ae/cnt`). Absent until the resource is placed in the tree.
    pub srn: Option<String>,
    /// Parent identifier. `None` only for the root.
    pub pi: Option<String>,
    pub ty: ResourceType,
    /// Type tag. Differs from `ty.tpe()` for specialised flex containers.
    pub tpe: String,
    pub ct: DateTime<Utc>,
    pub lt: DateTime<Utc>,
    pub et: DateTime<Utc>,
    pub acpi: Vec<String>,
    pub lbl: Vec<String>,
    /// State tag, incremented on every change of instance-bearing resources.
    pub st: Option<u64>,
    /// Content size of instances.
    pub cs: Option<u64>,
    /// Content format of content instances.
    pub cnf: Option<String>,
    /// Link to an original resource (announced or mirrored resources).
    pub lnk: Option<String>,
    /// Container definition (flex container specialisation).
    pub cnd: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    /// Type-specific attributes.
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Attribute names touched by the last update, including server-side changes.
    #[serde(skip)]
    pub modified: Vec<String>,
}

impl Resource {
    /// Creates a bare resource of the given type under `pi`.
    pub fn new(ty: ResourceType, ri: impl Into<String>, rn: impl Into<String>, pi: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            ri: ri.into(),
            rn: rn.into(),
            srn: None,
            pi,
            ty,
            tpe: ty.tpe().to_string(),
            ct: now,
            lt: now,
            et: now + Duration::days(DEFAULT_LIFETIME_DAYS),
            acpi: Vec::new(),
            lbl: Vec::new(),
            st: None,
            cs: None,
            cnf: None,
            lnk: None,
            cnd: None,
            read_only: false,
            attributes: Map::new(),
            modified: Vec::new(),
        }
    }

    /// Builds a resource in place, e.g. `Resource::new(..).with_attribute("mid", json!([]))`.
    pub fn with_attribute(mut self, name: &str, value: Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn with_srn(mut self, srn: impl Into<String>) -> Self {
        self.srn = Some(srn.into());
        self
    }

    /// The type tag without its namespace (`m2m:cnt` -> `cnt`).
    pub fn short_tpe(&self) -> &str {
        self.tpe.split_once(':').map_or(self.tpe.as_str(), |(_, short)| short)
    }

    /// Structured path of the resource, falling back to its name for detached resources.
    pub fn structured_path(&self) -> String {
        self.srn.clone().unwrap_or_else(|| self.rn.clone())
    }

    /// Looks up an attribute by its short name, universal attributes included.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "ri" => Some(Value::from(self.ri.clone())),
            "rn" => Some(Value::from(self.rn.clone())),
            "pi" => self.pi.clone().map(Value::from),
            "ty" => Some(Value::from(self.ty.code())),
            "ct" => Some(Value::from(format_timestamp(&self.ct))),
            "lt" => Some(Value::from(format_timestamp(&self.lt))),
            "et" => Some(Value::from(format_timestamp(&self.et))),
            "acpi" if !self.acpi.is_empty() => Some(Value::from(self.acpi.clone())),
            "lbl" if !self.lbl.is_empty() => Some(Value::from(self.lbl.clone())),
            "st" => self.st.map(Value::from),
            "cs" => self.cs.map(Value::from),
            "cnf" => self.cnf.clone().map(Value::from),
            "lnk" => self.lnk.clone().map(Value::from),
            "cnd" => self.cnd.clone().map(Value::from),
            _ => self.attributes.get(name).cloned(),
        }
    }

    /// Attribute map without the type-tag wrapper.
    pub fn to_attributes(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("ri".into(), Value::from(self.ri.clone()));
        map.insert("rn".into(), Value::from(self.rn.clone()));
        if let Some(pi) = &self.pi {
            map.insert("pi".into(), Value::from(pi.clone()));
        }
        map.insert("ty".into(), Value::from(self.ty.code()));
        map.insert("ct".into(), Value::from(format_timestamp(&self.ct)));
        map.insert("lt".into(), Value::from(format_timestamp(&self.lt)));
        map.insert("et".into(), Value::from(format_timestamp(&self.et)));
        for name in ["acpi", "lbl", "st", "cs", "cnf", "lnk", "cnd"] {
            if let Some(value) = self.attribute(name) {
                map.insert(name.into(), value);
            }
        }
        for (name, value) in &self.attributes {
            map.insert(name.clone(), value.clone());
        }
        map
    }

    /// The full document, `{ <tpe>: { ... } }`.
    pub fn as_document(&self) -> Value {
        let mut doc = Map::new();
        doc.insert(self.tpe.clone(), Value::Object(self.to_attributes()));
        Value::Object(doc)
    }

    /// Applies an update payload's attributes to this resource.
    ///
    /// A `null` value removes an optional attribute. Identity attributes
    /// (`ri`, `rn`, `pi`, `ty`, `ct`) are rejected. Every touched attribute is
    /// recorded in [`Resource::modified`], as is the refreshed `lt`.
    pub fn apply_update(&mut self, update: &Map<String, Value>) -> Result<(), String> {
        self.modified.clear();
        for (name, value) in update {
            match name.as_str() {
                "ri" | "rn" | "pi" | "ty" | "ct" | "lt" => {
                    return Err(format!("attribute is not updatable: {name}"));
                }
                "et" => {
                    self.et = match value {
                        Value::Null => Utc::now() + Duration::days(DEFAULT_LIFETIME_DAYS),
                        Value::String(s) => parse_timestamp(s).ok_or_else(|| format!("invalid timestamp for et: {s}"))?,
                        _ => return Err("et must be a timestamp".to_string()),
                    };
                }
                "lbl" => self.lbl = string_list(value, name)?,
                "acpi" => self.acpi = string_list(value, name)?,
                "lnk" => self.lnk = optional_string(value, name)?,
                "cnf" => self.cnf = optional_string(value, name)?,
                _ if value.is_null() => {
                    self.attributes.remove(name);
                }
                _ => {
                    self.attributes.insert(name.clone(), value.clone());
                }
            }
            self.modified.push(name.clone());
        }
        self.lt = Utc::now();
        self.modified.push("lt".to_string());
        Ok(())
    }
}

fn string_list(value: &Value, name: &str) -> Result<Vec<String>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("{name} must be a list of strings"))
            })
            .collect(),
        _ => Err(format!("{name} must be a list of strings")),
    }
}

fn optional_string(value: &Value, name: &str) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(format!("{name} must be a string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_codes_round_trip_through_serde() {
        let ty: ResourceType = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(ty, ResourceType::Container);
        assert_eq!(serde_json::to_value(ResourceType::GroupFanoutPoint).unwrap(), json!(20003));
        assert!(serde_json::from_value::<ResourceType>(json!(999)).is_err());
    }

    #[test]
    fn timestamps_parse_with_and_without_fraction() {
        let ts = parse_timestamp("20231018T120000,500000").unwrap();
        assert_eq!(format_timestamp(&ts), "20231018T120000,500000");
        assert!(parse_timestamp("20231018T120000").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn apply_update_tracks_modified_attributes() {
        let mut cnt = Resource::new(ResourceType::Container, "cnt1", "box", Some("ae1".into()))
            .with_attribute("mni", json!(10));
        let update = json!({ "lbl": ["a"], "mni": null });

        cnt.apply_update(update.as_object().unwrap()).unwrap();

        assert_eq!(cnt.lbl, vec!["a".to_string()]);
        assert!(!cnt.attributes.contains_key("mni"));
        assert_eq!(cnt.modified, vec!["lbl", "mni", "lt"]);
    }

    #[test]
    fn apply_update_rejects_identity_attributes() {
        let mut cnt = Resource::new(ResourceType::Container, "cnt1", "box", None);
        let update = json!({ "ri": "other" });
        assert!(cnt.apply_update(update.as_object().unwrap()).is_err());
    }
}
