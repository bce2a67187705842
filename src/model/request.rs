//! # Requests
//!
//! A [`Request`] is the parsed incoming operation: target, originator, operation,
//! optional payload, and the [`RequestArgs`] that steer filtering, paging and the
//! shape of the response. The wire layer builds these; the dispatcher only reads them.

use crate::model::ResourceType;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// The requested operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Retrieve,
    Update,
    Delete,
    Notify,
}

/// Negotiated shape of a successful response (`rcn`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultContent {
    Nothing,
    Attributes,
    HierarchicalAddress,
    HierarchicalAddressAttributes,
    AttributesAndChildResources,
    AttributesAndChildResourceReferences,
    ChildResourceReferences,
    OriginalResource,
    ChildResources,
    ModifiedAttributes,
    DiscoveryResultReferences,
}

impl ResultContent {
    pub const fn code(self) -> u8 {
        match self {
            Self::Nothing => 0,
            Self::Attributes => 1,
            Self::HierarchicalAddress => 2,
            Self::HierarchicalAddressAttributes => 3,
            Self::AttributesAndChildResources => 4,
            Self::AttributesAndChildResourceReferences => 5,
            Self::ChildResourceReferences => 6,
            Self::OriginalResource => 7,
            Self::ChildResources => 8,
            Self::ModifiedAttributes => 9,
            Self::DiscoveryResultReferences => 11,
        }
    }
}

/// Whether returned references use structured paths or bare identifiers (`drt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DesiredIdentifierResultType {
    #[default]
    Structured,
    Unstructured,
}

/// Discovery versus conditional retrieval (`fu`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterUsage {
    Discovery,
    #[default]
    ConditionalRetrieval,
}

/// How independent condition groups combine (`fo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterOperation {
    #[default]
    And,
    Or,
}

/// Handling parameters: paging, depth and the additional resource path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handling {
    /// 1-based offset into the discovery root's direct children (`ofst`).
    pub offset: Option<usize>,
    /// Maximum number of direct children of the discovery root (`lim`).
    pub limit: Option<usize>,
    /// Depth budget (`lvl`).
    pub level: Option<usize>,
    /// Suffix appended to every match to re-target it (`arp`).
    pub arp: Option<String>,
}

/// The filter condition set.
///
/// Multi-valued groups (`ty`, `lbl`, `cty`) match if any one value matches.
/// Every other condition is a single comparison.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub ty: Vec<ResourceType>,
    pub lbl: Vec<String>,
    pub cty: Vec<String>,
    /// Created before.
    pub crb: Option<DateTime<Utc>>,
    /// Created after.
    pub cra: Option<DateTime<Utc>>,
    /// Modified since.
    pub ms: Option<DateTime<Utc>>,
    /// Unmodified since.
    pub us: Option<DateTime<Utc>>,
    /// State tag smaller.
    pub stb: Option<u64>,
    /// State tag bigger.
    pub sts: Option<u64>,
    /// Expire before.
    pub exb: Option<DateTime<Utc>>,
    /// Expire after.
    pub exa: Option<DateTime<Utc>>,
    /// Size above (inclusive).
    pub sza: Option<u64>,
    /// Size below.
    pub szb: Option<u64>,
}

impl FilterCriteria {
    /// Total achievable weight: multi-valued groups count with their cardinality,
    /// every single-valued condition counts once.
    pub fn weight(&self) -> usize {
        let scalars = [
            self.crb.is_some(),
            self.cra.is_some(),
            self.ms.is_some(),
            self.us.is_some(),
            self.stb.is_some(),
            self.sts.is_some(),
            self.exb.is_some(),
            self.exa.is_some(),
            self.sza.is_some(),
            self.szb.is_some(),
        ];
        self.ty.len() + self.lbl.len() + self.cty.len() + scalars.iter().filter(|set| **set).count()
    }

    pub fn is_empty(&self) -> bool {
        self.weight() == 0
    }
}

/// Operation arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestArgs {
    /// `None` means "use the operation's default".
    pub rcn: Option<ResultContent>,
    pub drt: DesiredIdentifierResultType,
    pub fu: FilterUsage,
    pub fo: FilterOperation,
    pub handling: Handling,
    pub conditions: FilterCriteria,
    /// Arbitrary attribute matches. A `*` in a string value matches any run of characters.
    pub attributes: BTreeMap<String, Value>,
}

/// One incoming operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Target identifier, raw as received (structured, unstructured, hybrid or SP-relative).
    pub to: String,
    /// Authenticated originator.
    pub originator: String,
    pub operation: Operation,
    /// Type of the resource to create.
    pub resource_type: Option<ResourceType>,
    /// Payload for CREATE, UPDATE and NOTIFY.
    pub content: Option<Value>,
    pub args: RequestArgs,
    /// Scheduled execution time (`oet`).
    pub operation_execution_time: Option<DateTime<Utc>>,
    /// Absolute request expiration (`rqet`).
    pub expiration: Option<DateTime<Utc>>,
    /// `<fanOutPoint>`s this request was already re-dispatched through.
    pub(crate) fanout_trail: Vec<String>,
}

impl Request {
    fn new(operation: Operation, to: impl Into<String>, originator: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            originator: originator.into(),
            operation,
            resource_type: None,
            content: None,
            args: RequestArgs::default(),
            operation_execution_time: None,
            expiration: None,
            fanout_trail: Vec::new(),
        }
    }

    pub fn retrieve(to: impl Into<String>, originator: impl Into<String>) -> Self {
        Self::new(Operation::Retrieve, to, originator)
    }

    /// A RETRIEVE with `fu=discovery`.
    pub fn discover(to: impl Into<String>, originator: impl Into<String>) -> Self {
        let mut request = Self::new(Operation::Retrieve, to, originator);
        request.args.fu = FilterUsage::Discovery;
        request
    }

    pub fn create(to: impl Into<String>, originator: impl Into<String>, ty: ResourceType, content: Value) -> Self {
        let mut request = Self::new(Operation::Create, to, originator);
        request.resource_type = Some(ty);
        request.content = Some(content);
        request
    }

    pub fn update(to: impl Into<String>, originator: impl Into<String>, content: Value) -> Self {
        let mut request = Self::new(Operation::Update, to, originator);
        request.content = Some(content);
        request
    }

    pub fn delete(to: impl Into<String>, originator: impl Into<String>) -> Self {
        Self::new(Operation::Delete, to, originator)
    }

    pub fn notify(to: impl Into<String>, originator: impl Into<String>, content: Value) -> Self {
        let mut request = Self::new(Operation::Notify, to, originator);
        request.content = Some(content);
        request
    }

    pub fn with_rcn(mut self, rcn: ResultContent) -> Self {
        self.args.rcn = Some(rcn);
        self
    }

    /// Copy of this request addressed to another target.
    pub fn retargeted(&self, to: impl Into<String>) -> Self {
        let mut request = self.clone();
        request.to = to.into();
        request
    }

    /// The payload's inner attribute map for the given type tag, if any.
    pub fn content_attributes(&self, tpe: &str) -> Option<&serde_json::Map<String, Value>> {
        self.content.as_ref()?.get(tpe)?.as_object()
    }
}
