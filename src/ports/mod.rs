//! Port traits at the boundary between the analytics and its collaborators.

pub mod config_port;
pub mod data_port;
pub mod report_port;
