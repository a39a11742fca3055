// Request/Response models
pub mod checkin;
pub mod common;
pub mod credits;
pub mod usage;
