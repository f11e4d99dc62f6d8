use jsontable_client::ReqwestFetcher;
use jsontable_core::{PanelConfig, PanelState};

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    /// Latest document, written by the background poller.
    pub panel: PanelState,
    pub config: PanelConfig,
    /// Fetcher used by the fetch channel. Ad-hoc fetches never touch `panel`.
    pub fetcher: ReqwestFetcher,
    /// Admin token protecting the fetch channel (None = channel disabled).
    pub admin_token: Option<String>,
}
