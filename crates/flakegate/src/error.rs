/// A result type defaulting to the crate's [`enum@Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All recoverable errors that `flakegate` can produce.
///
/// Runtime clock anomalies inside the ID generator are deliberately *not*
/// represented here: they abort the generator instead of being handed back
/// to a caller who might retry and mint a colliding ID.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A configuration value is out of range or inconsistent.
    ///
    /// Returned eagerly at construction time; fix the configuration and
    /// construct again.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
