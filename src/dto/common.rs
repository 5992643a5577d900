use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire envelope wrapping every response, success or failure.
///
/// The boundary is always exactly this shape, so clients unwrap it
/// deterministically instead of probing whether a payload happens to be
/// wrapped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
pub struct Envelope<T> {
    /// HTTP-style status code, 200 on success.
    pub code: u16,
    /// Human-readable outcome description.
    pub message: String,
    /// Payload, present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Failure to extract a payload from an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// The authority rejected the request.
    #[error("rejected ({code}): {message}")]
    Rejected {
        /// Status code carried by the envelope.
        code: u16,
        /// Message carried by the envelope.
        message: String,
    },
    /// A success envelope arrived without a data payload.
    #[error("success envelope missing its data payload")]
    MissingData,
}

impl<T> Envelope<T> {
    /// Success envelope around `data`.
    pub fn ok(data: T) -> Self {
        Self { code: 200, message: "Success".into(), data: Some(data) }
    }

    /// Failure envelope with no payload.
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    /// Unwrap the payload, turning a failure envelope into an error.
    pub fn into_data(self) -> Result<T, EnvelopeError> {
        if self.code == 200 {
            self.data.ok_or(EnvelopeError::MissingData)
        } else {
            Err(EnvelopeError::Rejected { code: self.code, message: self.message })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_unwraps_to_its_payload() {
        let envelope = Envelope::ok(7u32);
        assert_eq!(envelope.into_data(), Ok(7));
    }

    #[test]
    fn error_envelope_carries_code_and_message() {
        let envelope = Envelope::<u32>::error(409, "already assigned");
        assert_eq!(
            envelope.into_data(),
            Err(EnvelopeError::Rejected { code: 409, message: "already assigned".into() })
        );
    }

    #[test]
    fn success_without_data_is_rejected() {
        let envelope =
            Envelope::<u32> { code: 200, message: "Success".into(), data: None };
        assert_eq!(envelope.into_data(), Err(EnvelopeError::MissingData));
    }
}
