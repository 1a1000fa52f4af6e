//! Status checker capability.
//!
//! The poller owns timing and attempt counting only. Everything that talks to
//! the verification provider sits behind [`StatusChecker`], supplied by the
//! caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

use crate::error::CheckError;
use crate::types::{SubjectId, VerificationStatus};

/// Asynchronous, fallible lookup of a verification's current status.
///
/// Implementations must tolerate repeated calls for the same subject. Any
/// `Err` is treated as transient: the poller retries on its normal schedule.
#[async_trait]
pub trait StatusChecker: Send + Sync {
    /// Fetches the current status for `subject`.
    async fn check_status(&self, subject: &SubjectId) -> Result<VerificationStatus, CheckError>;
}

#[async_trait]
impl<T: StatusChecker + ?Sized> StatusChecker for Arc<T> {
    async fn check_status(&self, subject: &SubjectId) -> Result<VerificationStatus, CheckError> {
        (**self).check_status(subject).await
    }
}

/// Response body of the provider's status endpoint: `{"status": "..."}`.
///
/// The status is kept as a raw string so that unknown values surface as
/// [`CheckError::UnrecognizedStatus`] instead of a decode failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    /// Decodes a JSON response body.
    pub fn from_json(body: &str) -> Result<Self, CheckError> {
        serde_json::from_str(body).map_err(|e| CheckError::Malformed(e.to_string()))
    }

    /// Converts the raw status into a [`VerificationStatus`].
    pub fn into_status(self) -> Result<VerificationStatus, CheckError> {
        self.status.trim().parse()
    }
}

/// Adapts an async closure into a [`StatusChecker`].
///
/// ```
/// use idv_core::{FnChecker, VerificationStatus};
///
/// let checker = FnChecker::new(|_subject| async { Ok(VerificationStatus::Pass) });
/// # let _ = checker;
/// ```
pub struct FnChecker<F> {
    f: F,
}

impl<F, Fut> FnChecker<F>
where
    F: Fn(SubjectId) -> Fut + Send + Sync,
    Fut: Future<Output = Result<VerificationStatus, CheckError>> + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> StatusChecker for FnChecker<F>
where
    F: Fn(SubjectId) -> Fut + Send + Sync,
    Fut: Future<Output = Result<VerificationStatus, CheckError>> + Send,
{
    async fn check_status(&self, subject: &SubjectId) -> Result<VerificationStatus, CheckError> {
        (self.f)(subject.clone()).await
    }
}

impl<F> std::fmt::Debug for FnChecker<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnChecker").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_status_response_decodes_known_status() {
        let response = StatusResponse::from_json(r#"{"status":"IN_PROGRESS"}"#).unwrap();
        assert_eq!(response.into_status().unwrap(), VerificationStatus::InProgress);
    }

    #[test]
    fn test_status_response_unknown_status() {
        let response = StatusResponse::from_json(r#"{"status":"REFERRED"}"#).unwrap();
        assert_eq!(
            response.into_status().unwrap_err(),
            CheckError::UnrecognizedStatus("REFERRED".to_string())
        );
    }

    #[test]
    fn test_status_response_malformed_body() {
        let err = StatusResponse::from_json("<html>502</html>").unwrap_err();
        assert!(matches!(err, CheckError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_fn_checker_receives_subject() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let checker = FnChecker::new(move |subject: SubjectId| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if subject.as_str() == "ok" {
                    Ok(VerificationStatus::Pass)
                } else {
                    Err(CheckError::Transport("connection reset".to_string()))
                }
            }
        });

        let ok = SubjectId::new("ok").unwrap();
        let other = SubjectId::new("other").unwrap();
        assert_eq!(checker.check_status(&ok).await, Ok(VerificationStatus::Pass));
        assert!(checker.check_status(&other).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_arc_checker_delegates() {
        let checker: Arc<dyn StatusChecker> =
            Arc::new(FnChecker::new(|_| async { Ok(VerificationStatus::Manual) }));
        let subject = SubjectId::new("s").unwrap();
        assert_eq!(checker.check_status(&subject).await, Ok(VerificationStatus::Manual));
    }
}
