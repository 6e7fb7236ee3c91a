/// Progress hook: `(current, total, message)`
///
/// May be called from worker threads during metadata extraction, hence `Sync`.
/// Implementations must not panic.
pub type ProgressCallback<'a> = &'a (dyn Fn(usize, usize, &str) + Sync);

/// Report progress if a callback is present
pub(crate) fn report(progress: Option<ProgressCallback<'_>>, current: usize, total: usize, message: &str) {
    if let Some(callback) = progress {
        callback(current, total, message);
    }
}
