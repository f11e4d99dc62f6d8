use std::future::Future;

use crate::error::AppError;
use crate::models::{FetchRequest, FetchedDocument};

/// Fetches a JSON document over HTTP(S), following redirects.
///
/// Implementations must yield exactly one outcome per request and must not
/// retry on their own; recovery is driven by the next poll tick.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<FetchedDocument, AppError>> + Send;
}
