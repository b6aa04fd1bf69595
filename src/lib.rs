pub mod core;
pub mod harvest;
pub mod scraping;

// --- Primary exports ---
pub use core::config::{PageSelectors, ScoutConfig, ScrollTuning};
pub use core::types::{ContactRecord, RunState, StopReason};
pub use core::{ScoutError, ScoutResult};
pub use harvest::{Harvester, RunControl, RunSession, ScrollController};
pub use scraping::{PageAdapter, ScrollMethod};
