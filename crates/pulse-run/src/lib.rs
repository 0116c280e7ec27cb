pub mod config;
pub mod device;
pub mod error;
pub mod history;
pub mod record;
pub mod remote;
pub mod sampler;
pub mod session;

pub use config::{read_config, SessionConfig};
pub use error::SessionError;
pub use record::{AnalysisKind, AutonomicIndex, MetricsRecord};
