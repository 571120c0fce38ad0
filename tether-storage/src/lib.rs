//! Tether Storage - Storage Gateway
//!
//! Narrow client over the backing relational table + blob bucket service.
//! [`StorageGateway`] is constructed once at startup and shared by
//! reference with every component that talks to the store.

pub mod backend;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod rest;

pub use backend::{Session, StoreBackend};
pub use error::{GatewayError, GatewayResult};
pub use gateway::{RetryPolicy, StorageGateway};
pub use memory::{MemoryBackend, Operation};
pub use rest::{RestBackend, RestConfig};
