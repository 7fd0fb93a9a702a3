//! Exchange context.
//!
//! One [`ExchangeContext`] per SP ↔ IdP exchange leg. It owns a
//! [`ContextTree`] whose root carries binding, security and subject
//! subcontexts, and whose self/peer entity subtrees carry metadata,
//! endpoint and protocol subcontexts:
//!
//! ```text
//! root
//! ├── self-entity ── metadata, endpoint, protocol
//! ├── peer-entity ── metadata, endpoint, protocol
//! ├── binding
//! ├── security-parameters
//! └── subject-name-identifier
//! ```

mod exchange;
mod subcontext;
mod tree;

pub use exchange::{EntitySide, ExchangeContext, ValidatedSubject};
pub use subcontext::{
    BindingContext, ContextData, ContextKind, EndpointContext, MetadataContext, PeerEntityContext,
    ProtocolContext, SecurityParametersContext, SelfEntityContext, Subcontext, SubjectNameIdentifierContext,
};
pub use tree::{ContextTree, NodeId};
