/// Errors produced while probing a target.
///
/// Every variant except [`ProbeError::EmptyTraces`] describes a single
/// unreachable target; callers drop that target and carry on.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("cannot handle empty slice of traces")]
    EmptyTraces,

    #[error("invalid probe target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("trace failed on {target}: {source}")]
    Request {
        target: String,
        #[source]
        source: reqwest::Error,
    },
}
