pub mod config;
pub mod error;
pub mod models;
pub mod poller;
pub mod present;
pub mod resolve;
pub mod state;
pub mod traits;

#[cfg(test)]
pub mod testutil;

pub use config::PanelConfig;
pub use error::AppError;
pub use models::{
    FetchMessage, FetchOptions, FetchReply, FetchRequest, FetchedDocument, ReplyOutcome, compute_hash,
};
pub use poller::{PanelPoller, PollerEvent, PollerReporter, TracingPollerReporter, exchange};
pub use resolve::{ArrayPath, resolve_items_from_config, resolve_path};
pub use state::{ApplyOutcome, PanelSnapshot, PanelState};
pub use traits::Fetcher;
