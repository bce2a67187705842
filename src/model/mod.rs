//! Pure data structures flowing through the dispatcher: resources, requests and responses.

pub mod request;
pub mod resource;
pub mod response;

pub use request::*;
pub use resource::*;
pub use response::*;
