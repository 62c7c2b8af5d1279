//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use vigil_domain::VigilError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub VigilError);

impl From<InfraError> for VigilError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<VigilError> for InfraError {
    fn from(value: VigilError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoVigilError {
    fn into_vigil(self) -> VigilError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → VigilError */
/* -------------------------------------------------------------------------- */

impl IntoVigilError for HttpError {
    fn into_vigil(self) -> VigilError {
        if self.is_timeout() {
            return VigilError::Timeout(format!("HTTP request timed out: {self}"));
        }

        if self.is_connect() {
            return VigilError::Network(format!("HTTP connection failure: {self}"));
        }

        if self.is_builder() {
            return VigilError::InvalidInput(format!("invalid HTTP request: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            return VigilError::Network(format!(
                "HTTP {} {}",
                code,
                status.canonical_reason().unwrap_or("unknown status")
            ));
        }

        VigilError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_vigil())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
