pub mod control;
pub mod controller;
pub mod export;
pub mod harvester;
pub mod run;
pub mod speed;
pub mod stats;
pub mod status;
pub mod store;

pub use control::{RunControl, RunFeed};
pub use controller::ScrollController;
pub use harvester::Harvester;
pub use run::{RunSession, ScrollState};
pub use stats::RunStats;
pub use status::{StatusEvent, StatusSink};
pub use store::ContactStore;
