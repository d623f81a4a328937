pub mod generate;
pub mod health;
pub mod metrics;

pub use generate::{generate_3d, GenerateForm};
pub use health::{health_check, service_info};
pub use metrics::metrics_endpoint;
