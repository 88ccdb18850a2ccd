use crate::TrackStoreError;

/// A best-effort sink for failures that the reader absorbs.
///
/// Reporting must never fail or block; the reader carries on (or resolves to
/// `None`) regardless of what the reporter does with the error.
pub trait Reporter {
    /// Record a failure that was converted into a missing result.
    fn report(&self, error: &TrackStoreError);
}

/// Emits every reported failure as a `tracing` error event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, error: &TrackStoreError) {
        match error {
            TrackStoreError::UnknownUser => {
                tracing::warn!("local tracks requested before a user was announced")
            }
            error => tracing::error!(%error, "failed to read local tracks"),
        }
    }
}

impl<R> Reporter for &R
where
    R: Reporter + ?Sized,
{
    fn report(&self, error: &TrackStoreError) {
        (**self).report(error)
    }
}

impl<R> Reporter for std::rc::Rc<R>
where
    R: Reporter + ?Sized,
{
    fn report(&self, error: &TrackStoreError) {
        (**self).report(error)
    }
}
