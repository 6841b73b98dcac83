pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod storage;

// Tabular values and the customer/complaint record shapes
pub mod domain;

pub mod pipeline;
