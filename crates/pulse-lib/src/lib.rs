pub mod detectors;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod ring;
pub mod signal;
pub mod synth;

pub use detectors::*;
pub use metrics::*;
pub use pipeline::*;
pub use ring::*;
pub use signal::*;
