use std::fmt;

use chrono::NaiveDateTime;

use crate::StoreError;

/// Date-time layout accepted in flight CSV files
const CSV_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlightStatus {
    #[default]
    Scheduled,
    Departed,
    Arrived,
}

impl<'a> TryFrom<&'a str> for FlightStatus {
    type Error = String;

    fn try_from(s: &'a str) -> Result<Self, Self::Error> {
        match s {
            s if s.eq_ignore_ascii_case("SCHEDULED") => Ok(Self::Scheduled),
            s if s.eq_ignore_ascii_case("DEPARTED") => Ok(Self::Departed),
            s if s.eq_ignore_ascii_case("ARRIVED") => Ok(Self::Arrived),
            _ => Err("invalid flight status".to_string()),
        }
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scheduled => "SCHEDULED",
            Self::Departed => "DEPARTED",
            Self::Arrived => "ARRIVED",
        })
    }
}

/// Airline-assigned flight identifier. The same number recurs across dates.
#[derive(Default, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlightNumber(String);

impl FlightNumber {
    pub fn from_str(s: &str) -> Self {
        Self(s.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlightNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a physical servicing bay, e.g. `A1`
#[derive(Default, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TerminalNumber(String);

impl TerminalNumber {
    pub fn from_str(s: &str) -> Self {
        Self(s.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TerminalNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Surrogate key assigned by the `FlightStore` on first save
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlightId(pub u64);

/// A booking request for a new `Flight`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateFlight {
    pub flight_number: FlightNumber,
    pub aircraft_type: String,
    pub origin: String,
    pub destination: String,
    pub estimated_departure_time: NaiveDateTime,
    pub estimated_arrival_time: NaiveDateTime,
}

impl CreateFlight {
    /// Reads `number, aircraft, origin, destination, departure, arrival` rows
    pub fn from_csv(path: &str) -> Result<Vec<Self>, Box<dyn std::error::Error>> {
        let csv_bytes = std::fs::read(path)?;
        Self::parse_csv(&String::from_utf8(csv_bytes)?)
    }

    pub fn parse_csv(csv: &str) -> Result<Vec<Self>, Box<dyn std::error::Error>> {
        let mut flights = vec![];

        for line in csv.lines().filter(|line| !line.trim().is_empty()) {
            let values = line.split(',').map(str::trim).collect::<Vec<_>>();
            let [number, aircraft, origin, destination, departure, arrival] = values[..] else {
                return Err(format!("expected 6 columns, got {}: {line}", values.len()).into());
            };

            flights.push(Self {
                flight_number: FlightNumber::from_str(number),
                aircraft_type: aircraft.to_string(),
                origin: origin.to_string(),
                destination: destination.to_string(),
                estimated_departure_time: NaiveDateTime::parse_from_str(
                    departure,
                    CSV_DATETIME_FORMAT,
                )?,
                estimated_arrival_time: NaiveDateTime::parse_from_str(arrival, CSV_DATETIME_FORMAT)?,
            });
        }

        Ok(flights)
    }

    /// Whether the estimated departure does not come after the estimated arrival
    pub fn is_valid_schedule(&self) -> bool {
        self.estimated_departure_time <= self.estimated_arrival_time
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flight {
    /// Storage key, `None` until the flight has been saved
    pub id: Option<FlightId>,
    pub flight_number: FlightNumber,
    pub aircraft_type: String,
    pub origin: String,
    pub destination: String,
    pub estimated_departure_time: NaiveDateTime,
    pub estimated_arrival_time: NaiveDateTime,
    pub actual_departure_time: Option<NaiveDateTime>,
    pub actual_arrival_time: Option<NaiveDateTime>,
    pub status: FlightStatus,
}

impl From<CreateFlight> for Flight {
    fn from(request: CreateFlight) -> Self {
        Self {
            id: None,
            flight_number: request.flight_number,
            aircraft_type: request.aircraft_type,
            origin: request.origin,
            destination: request.destination,
            estimated_departure_time: request.estimated_departure_time,
            estimated_arrival_time: request.estimated_arrival_time,
            actual_departure_time: None,
            actual_arrival_time: None,
            status: FlightStatus::Scheduled,
        }
    }
}

impl Flight {
    /// Moves a scheduled flight to `Departed`
    pub fn depart(&mut self, at: NaiveDateTime) -> Result<(), StoreError> {
        self.advance(FlightStatus::Scheduled, FlightStatus::Departed)?;
        self.actual_departure_time = Some(at);
        Ok(())
    }

    /// Moves a departed flight to `Arrived`
    pub fn arrive(&mut self, at: NaiveDateTime) -> Result<(), StoreError> {
        self.advance(FlightStatus::Departed, FlightStatus::Arrived)?;
        self.actual_arrival_time = Some(at);
        Ok(())
    }

    /// Callers only advance records the store returned for a `from` status query,
    /// so a mismatch means the store broke its query contract. That is reported
    /// as a `StoreError` (an internal failure) rather than a client error.
    fn advance(&mut self, from: FlightStatus, to: FlightStatus) -> Result<(), StoreError> {
        if self.status != from {
            return Err(StoreError::new(format!(
                "contract violated: flight {} is {}, cannot move to {}",
                self.flight_number, self.status, to
            )));
        }
        self.status = to;
        Ok(())
    }
}

/// Occupancy of one terminal as observed from outside its worker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerminalStatus {
    pub terminal: TerminalNumber,
    pub current_flight: Option<FlightNumber>,
}

impl TerminalStatus {
    pub fn is_servicing(&self) -> bool {
        self.current_flight.is_some()
    }
}
