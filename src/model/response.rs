//! # Responses
//!
//! Successful dispatcher operations return a [`Response`]: a status code and an
//! optional payload. Failures are [`DispatchError`](crate::error::DispatchError)s
//! and never carry a payload.

use crate::model::Resource;
use serde_json::Value;
use std::fmt;

/// Stable protocol status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseStatusCode {
    Ok,
    Created,
    Deleted,
    Updated,
    BadRequest,
    NotFound,
    OperationNotAllowed,
    RequestTimeout,
    OriginatorHasNoPrivilege,
    Conflict,
    SecurityAssociationRequired,
    InvalidChildResourceType,
    InternalServerError,
    NotImplemented,
    TargetNotReachable,
    TargetNotSubscribable,
}

impl ResponseStatusCode {
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 2000,
            Self::Created => 2001,
            Self::Deleted => 2002,
            Self::Updated => 2004,
            Self::BadRequest => 4000,
            Self::NotFound => 4004,
            Self::OperationNotAllowed => 4005,
            Self::RequestTimeout => 4008,
            Self::OriginatorHasNoPrivilege => 4103,
            Self::Conflict => 4105,
            Self::SecurityAssociationRequired => 4107,
            Self::InvalidChildResourceType => 4108,
            Self::InternalServerError => 5000,
            Self::NotImplemented => 5001,
            Self::TargetNotReachable => 5103,
            Self::TargetNotSubscribable => 5203,
        }
    }
}

impl fmt::Display for ResponseStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// A single resource, rendered by the wire layer as its document.
    Resource(Box<Resource>),
    /// Any other constructed structure (trees, reference lists, URI lists, diffs).
    Document(Value),
}

impl Content {
    /// The payload as a JSON document.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Resource(resource) => resource.as_document(),
            Self::Document(value) => value.clone(),
        }
    }
}

/// A successful outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: ResponseStatusCode,
    pub content: Option<Content>,
}

impl Response {
    pub fn new(status: ResponseStatusCode) -> Self {
        Self { status, content: None }
    }

    pub fn with_resource(status: ResponseStatusCode, resource: Resource) -> Self {
        Self {
            status,
            content: Some(Content::Resource(Box::new(resource))),
        }
    }

    pub fn with_document(status: ResponseStatusCode, document: Value) -> Self {
        Self {
            status,
            content: Some(Content::Document(document)),
        }
    }

    /// The single resource carried by this response, if that is its shape.
    pub fn resource(&self) -> Option<&Resource> {
        match &self.content {
            Some(Content::Resource(resource)) => Some(resource),
            _ => None,
        }
    }

    /// Consumes the response, returning its resource.
    pub fn into_resource(self) -> Option<Resource> {
        match self.content {
            Some(Content::Resource(resource)) => Some(*resource),
            _ => None,
        }
    }

    /// The payload as a JSON document, if there is one.
    pub fn document(&self) -> Option<Value> {
        self.content.as_ref().map(Content::to_value)
    }
}
