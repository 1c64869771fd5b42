//! Download collaborator: brings the manifest, the bundle and the server
//! tarball into a local staging directory.
//!
//! Remote sources are fetched with a blocking HTTP client and retried with
//! linear backoff. Local paths and `file://` URLs are copied, so airgapped
//! hosts can point at a mounted medium.

pub use error::{FetchError, Result};
pub use fetcher::{Fetcher, HttpFetcher, file_name_from_url};
pub use retry::retry_delay;

mod error;
mod fetcher;
mod retry;
