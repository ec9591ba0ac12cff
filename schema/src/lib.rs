use chrono::{DateTime, NaiveDateTime};
use prost::Message as ProstMessage;
use prost_types::Timestamp;

mod entities;
mod speed;
mod store;

pub mod proto {
    pub mod aero;
}

pub use entities::{
    CreateFlight, Flight, FlightId, FlightNumber, FlightStatus, TerminalNumber, TerminalStatus,
};
pub use speed::Speed;
pub use store::{FlightStore, StoreError};

pub const SAMPLE_FLIGHTS_CSV_PATH: &str = "./test_data/flights.csv";

pub trait ToFromProto<Proto>: Sized
where
    Proto: ProstMessage,
{
    fn try_from_proto(proto: Proto) -> Option<Self>;
    fn into_proto(self) -> Proto;
}

/// Timestamps on the wire carry the naive local time as if it were UTC
pub fn timestamp_from_datetime(datetime: NaiveDateTime) -> Timestamp {
    let utc = datetime.and_utc();
    Timestamp {
        seconds: utc.timestamp(),
        nanos: utc.timestamp_subsec_nanos() as i32,
    }
}

pub fn datetime_from_timestamp(timestamp: Timestamp) -> Option<NaiveDateTime> {
    let nanos = u32::try_from(timestamp.nanos).ok()?;
    DateTime::from_timestamp(timestamp.seconds, nanos).map(|utc| utc.naive_utc())
}

impl From<FlightStatus> for proto::aero::FlightStatus {
    fn from(status: FlightStatus) -> Self {
        match status {
            FlightStatus::Scheduled => Self::Scheduled,
            FlightStatus::Departed => Self::Departed,
            FlightStatus::Arrived => Self::Arrived,
        }
    }
}

impl From<proto::aero::FlightStatus> for FlightStatus {
    fn from(status: proto::aero::FlightStatus) -> Self {
        match status {
            proto::aero::FlightStatus::Scheduled => Self::Scheduled,
            proto::aero::FlightStatus::Departed => Self::Departed,
            proto::aero::FlightStatus::Arrived => Self::Arrived,
        }
    }
}

impl ToFromProto<proto::aero::Flight> for Flight {
    fn into_proto(self) -> proto::aero::Flight {
        proto::aero::Flight {
            flight_number: self.flight_number.to_string(),
            aircraft_type: self.aircraft_type,
            origin: self.origin,
            destination: self.destination,
            estimated_departure_time: Some(timestamp_from_datetime(self.estimated_departure_time)),
            estimated_arrival_time: Some(timestamp_from_datetime(self.estimated_arrival_time)),
            actual_departure_time: self.actual_departure_time.map(timestamp_from_datetime),
            actual_arrival_time: self.actual_arrival_time.map(timestamp_from_datetime),
            status: proto::aero::FlightStatus::from(self.status).into(),
        }
    }

    fn try_from_proto(message: proto::aero::Flight) -> Option<Self> {
        let status = message.status().into();
        Some(Self {
            id: None,
            flight_number: FlightNumber::from_str(&message.flight_number),
            aircraft_type: message.aircraft_type,
            origin: message.origin,
            destination: message.destination,
            estimated_departure_time: datetime_from_timestamp(message.estimated_departure_time?)?,
            estimated_arrival_time: datetime_from_timestamp(message.estimated_arrival_time?)?,
            actual_departure_time: match message.actual_departure_time {
                Some(ts) => Some(datetime_from_timestamp(ts)?),
                None => None,
            },
            actual_arrival_time: match message.actual_arrival_time {
                Some(ts) => Some(datetime_from_timestamp(ts)?),
                None => None,
            },
            status,
        })
    }
}

impl ToFromProto<proto::aero::CreateFlight> for CreateFlight {
    fn into_proto(self) -> proto::aero::CreateFlight {
        proto::aero::CreateFlight {
            flight_number: self.flight_number.to_string(),
            aircraft_type: self.aircraft_type,
            origin: self.origin,
            destination: self.destination,
            estimated_departure_time: Some(timestamp_from_datetime(self.estimated_departure_time)),
            estimated_arrival_time: Some(timestamp_from_datetime(self.estimated_arrival_time)),
        }
    }

    /// Both estimated timestamps are required
    fn try_from_proto(message: proto::aero::CreateFlight) -> Option<Self> {
        Some(Self {
            flight_number: FlightNumber::from_str(&message.flight_number),
            aircraft_type: message.aircraft_type,
            origin: message.origin,
            destination: message.destination,
            estimated_departure_time: datetime_from_timestamp(message.estimated_departure_time?)?,
            estimated_arrival_time: datetime_from_timestamp(message.estimated_arrival_time?)?,
        })
    }
}

impl ToFromProto<proto::aero::TerminalUpdate> for TerminalStatus {
    fn into_proto(self) -> proto::aero::TerminalUpdate {
        proto::aero::TerminalUpdate {
            terminal: self.terminal.to_string(),
            current_flight: self.current_flight.map(|flight| flight.to_string()),
        }
    }

    fn try_from_proto(message: proto::aero::TerminalUpdate) -> Option<Self> {
        Some(Self {
            terminal: TerminalNumber::from_str(&message.terminal),
            current_flight: message
                .current_flight
                .as_deref()
                .map(FlightNumber::from_str),
        })
    }
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use super::*;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .expect("datetime")
    }

    #[test]
    fn test_flight_keeps_absent_actual_times() {
        let flight = Flight {
            actual_departure_time: Some(at(10, 5)),
            status: FlightStatus::Departed,
            ..Flight::from(CreateFlight {
                flight_number: FlightNumber::from_str("ABC123"),
                aircraft_type: "Boeing 737".to_string(),
                origin: "VNO".to_string(),
                destination: "RIX".to_string(),
                estimated_departure_time: at(10, 0),
                estimated_arrival_time: at(12, 0),
            })
        };

        let message = flight.clone().into_proto();
        assert_eq!(message.status(), proto::aero::FlightStatus::Departed);
        assert!(message.actual_departure_time.is_some());
        assert!(message.actual_arrival_time.is_none());

        assert_eq!(Flight::try_from_proto(message), Some(flight));
    }

    #[test]
    fn test_create_flight_requires_estimates() {
        let message = proto::aero::CreateFlight {
            flight_number: "ABC123".to_string(),
            estimated_departure_time: Some(timestamp_from_datetime(at(10, 0))),
            estimated_arrival_time: None,
            ..Default::default()
        };

        assert_eq!(CreateFlight::try_from_proto(message), None);
    }

    #[test]
    fn test_idle_terminal_has_no_flight_on_the_wire() {
        let update = TerminalStatus {
            terminal: TerminalNumber::from_str("B3"),
            current_flight: None,
        }
        .into_proto();

        assert_eq!(update.terminal, "B3");
        assert_eq!(update.current_flight, None);
    }
}
