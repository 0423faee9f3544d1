pub mod error;
pub mod gateway;
pub mod log;
pub mod service;

pub use error::{AccessError, Result};
pub use gateway::{ControlPlane, GatewayAction, GatewayConfig, GatewayResponse, UpstreamGateway};
pub use log::AccessLog;
pub use service::AccessService;
