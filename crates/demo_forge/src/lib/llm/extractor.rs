use std::future::Future;

/// Finds the verification URL inside a verification email, if there is one.
pub trait VerificationExtractor {
    const EXTRACTOR_MODEL: &str;

    type Error: std::fmt::Debug;

    /// Returns the verification URL, or `None` when the email carries none.
    fn extract_verification(
        &self,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>>;
}
