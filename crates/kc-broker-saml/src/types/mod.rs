//! SAML 2.0 protocol object model.
//!
//! The inbound transport adapter hands these over already deserialized
//! (and decrypted); the outbound adapter renders them. Nothing in this
//! module parses or emits XML.

mod assertion;
mod authn_request;
mod constants;
mod logout;
mod message;
mod name_id;
mod response;
mod status;

pub use assertion::*;
pub use authn_request::*;
pub use constants::*;
pub use logout::*;
pub use message::*;
pub use name_id::*;
pub use response::*;
pub use status::*;
