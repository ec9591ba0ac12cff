use schema::{FlightNumber, StoreError};
use thiserror::Error;

/// Request-level failures of the flight lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlightError {
    #[error("Estimated Departure Time cannot be after Estimated Arrival Time")]
    InvalidSchedule,

    #[error("Flight not found: {0}")]
    FlightNotFound(FlightNumber),

    #[error("Flight with same flight number is already departed. FlightNumber={0}")]
    DuplicateActiveFlight(FlightNumber),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<FlightError> for tonic::Status {
    fn from(error: FlightError) -> Self {
        let message = error.to_string();
        match error {
            FlightError::InvalidSchedule => Self::invalid_argument(message),
            FlightError::FlightNotFound(_) => Self::not_found(message),
            FlightError::DuplicateActiveFlight(_) => Self::failed_precondition(message),
            FlightError::Store(_) => Self::internal(message),
        }
    }
}

/// Invalid server configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not valid: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("no terminals configured")]
    NoTerminals,

    #[error("poll interval {poll_ms}ms must be shorter than service interval {service_ms}ms")]
    PollNotShorterThanService { poll_ms: u64, service_ms: u64 },
}

#[cfg(test)]
mod test {
    use tonic::Code;

    use super::*;

    #[test]
    fn test_status_codes() {
        let number = FlightNumber::from_str("ABC123");

        let status = tonic::Status::from(FlightError::InvalidSchedule);
        assert_eq!(status.code(), Code::InvalidArgument);

        let status = tonic::Status::from(FlightError::FlightNotFound(number.clone()));
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "Flight not found: ABC123");

        let status = tonic::Status::from(FlightError::DuplicateActiveFlight(number));
        assert_eq!(status.code(), Code::FailedPrecondition);

        let status = tonic::Status::from(FlightError::Store(StoreError::new("disk full")));
        assert_eq!(status.code(), Code::Internal);
    }
}
