pub mod service;

pub use service::{NetworkService, NetworkServiceConfig};
