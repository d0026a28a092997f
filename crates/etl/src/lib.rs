//! The pipeline's stage workers and their supervision.
//!
//! Four stages compose the extract → transform graph, each one an
//! independent OS process wired to the others only through the message
//! log: listing extract → listing transform → detail extract → detail
//! transform.

pub mod detail_extract;
pub mod detail_transform;
pub mod error;
pub mod html;
pub mod listing_extract;
pub mod listing_transform;
pub mod stage;
pub mod supervisor;

pub use detail_extract::{DetailExtractConfig, DetailExtractWorker, DetailExtractor};
pub use detail_transform::{DetailTransformWorker, DetailTransformer};
pub use error::EtlError;
pub use listing_extract::{ListingExtractWorker, ListingExtractor};
pub use listing_transform::{ListingTransformWorker, ListingTransformer};
pub use stage::{poll_loop, StageWorker, POLL_INTERVAL};
pub use supervisor::{pipeline_specs, EtlSupervisor, StageState, Supervisor, WorkerSpec};

/// Login endpoint of the authenticated source.
pub const LOGIN_URL: &str = "https://app.joinhandshake.com/login";
