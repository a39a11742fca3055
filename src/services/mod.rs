// Service modules
pub mod checkin_service;
pub mod credit_service;
pub mod dify_client;
pub mod dify_proxy_service;

pub use checkin_service::CheckinService;
pub use credit_service::CreditService;
pub use dify_client::{DifyClient, DifyGateway};
pub use dify_proxy_service::DifyProxyService;
