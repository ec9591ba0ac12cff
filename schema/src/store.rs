use chrono::NaiveDate;
use thiserror::Error;

use crate::{Flight, FlightNumber, FlightStatus};

/// Failure reported by a `FlightStore` backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("flight store: {0}")]
pub struct StoreError(String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Keyed storage of `Flight` records
pub trait FlightStore {
    /// Inserts the flight, assigning an id if it has none, or replaces the record with its id
    fn save(&mut self, flight: Flight) -> Result<Flight, StoreError>;

    /// Flights with the given number and status, ascending by estimated departure
    fn find_by_number_and_status(
        &self,
        flight_number: &FlightNumber,
        status: FlightStatus,
    ) -> Result<Vec<Flight>, StoreError>;

    /// Flights with the given number whose estimated departure falls on `date`,
    /// ascending by estimated departure
    fn find_by_number_and_date(
        &self,
        flight_number: &FlightNumber,
        date: NaiveDate,
    ) -> Result<Vec<Flight>, StoreError>;

    fn find_by_origin(&self, origin: &str) -> Result<Vec<Flight>, StoreError>;

    fn find_by_destination(&self, destination: &str) -> Result<Vec<Flight>, StoreError>;

    fn find_by_origin_and_destination(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<Vec<Flight>, StoreError>;

    fn find_by_status(&self, status: FlightStatus) -> Result<Vec<Flight>, StoreError>;

    fn find_all(&self) -> Result<Vec<Flight>, StoreError>;
}
