pub mod client;
pub mod gossipsub;
pub mod network;
pub mod pubsub;
pub mod req_resp;
pub mod sync;
pub mod types;
pub mod wire;
