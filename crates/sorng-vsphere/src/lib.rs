//! # SortOfRemote NG – vSphere Inventory
//!
//! Read-only VMware vCenter inventory over the vim25 SOAP API: folder
//! topology, folder-only structure, per-VM detail and single-VM host lookup.
//! Sessions ride on the `vmware_soap_session` cookie, persisted through a
//! pluggable cache and renewed transparently when vCenter rejects them.
//!
//! ## Modules
//!
//! - **types**: Configuration and the inventory records handed to callers
//! - **error**: Crate-specific error type
//! - **xml**: Namespace-agnostic element tree over quick-xml
//! - **envelope**: vim25 request envelopes (Login, RetrievePropertiesEx, Find*)
//! - **transport**: HTTP POST to `/sdk` with cookie capture and request jitter
//! - **cache**: Session cookie cache trait + in-memory implementation
//! - **session**: Session state, fault classification, login-and-replay
//! - **pagination**: Continuation-token paging with a page cap
//! - **props**: Typed view over `ObjectContent` property sets
//! - **inventory**: Folder / VM topology assembly
//! - **folders**: Folder tree assembly
//! - **detail**: VM detail assembly (host, cluster, NICs, snapshots)
//! - **service**: Aggregate facade exposing the public operations

pub mod cache;
pub mod detail;
pub mod envelope;
pub mod error;
pub mod folders;
pub mod inventory;
pub mod pagination;
pub mod props;
pub mod service;
pub mod session;
pub mod transport;
pub mod types;
pub mod xml;

#[cfg(test)]
mod test_support;

pub use cache::{MemoryCache, SessionCache};
pub use error::{VsphereError, VsphereResult};
pub use service::{VsphereService, VsphereServiceState};
pub use transport::{HttpTransport, SoapTransport};
pub use types::*;
