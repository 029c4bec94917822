use thiserror::Error;

/// Failure modes of one assessment request. None of these escape
/// [`HumanRiskAssessor::assess`](crate::HumanRiskAssessor::assess); they
/// are logged and replaced by the fallback assessment.
#[derive(Debug, Error)]
pub enum AssessError {
    #[error("network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("language-model service returned {status} for {url}")]
    ServiceStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("malformed completion response from {0}")]
    MalformedResponse(String, #[source] reqwest::Error),

    #[error("completion contained no choices")]
    NoChoices,

    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("could not decode assessment JSON")]
    Decode(#[source] serde_json::Error),
}
