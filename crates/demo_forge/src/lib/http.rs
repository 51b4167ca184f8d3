use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use reqwest_retry_after::RetryAfterMiddleware;

/// Shared HTTP client: honors `Retry-After` headers and retries transient
/// failures with exponential backoff.
pub(crate) fn retrying_client() -> ClientWithMiddleware {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
    ClientBuilder::new(reqwest::Client::new())
        .with(RetryAfterMiddleware::new())
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}
