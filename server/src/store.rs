use chrono::NaiveDate;
use itertools::Itertools;
use schema::{Flight, FlightId, FlightNumber, FlightStatus, FlightStore, StoreError};

/// Process-local `FlightStore`. Records are kept in insertion order,
/// which is also the tie-break order for equal departure estimates.
#[derive(Default, Debug)]
pub struct InMemoryFlightStore {
    flights: Vec<Flight>,
    next_id: u64,
}

impl InMemoryFlightStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    fn matching(&self, predicate: impl Fn(&Flight) -> bool) -> Vec<Flight> {
        self.flights.iter().filter(|&f| predicate(f)).cloned().collect()
    }

    fn matching_by_departure(&self, predicate: impl Fn(&Flight) -> bool) -> Vec<Flight> {
        self.flights
            .iter()
            .filter(|&f| predicate(f))
            .sorted_by_key(|f| f.estimated_departure_time)
            .cloned()
            .collect()
    }
}

impl FlightStore for InMemoryFlightStore {
    fn save(&mut self, mut flight: Flight) -> Result<Flight, StoreError> {
        match flight.id {
            Some(id) => {
                let existing = self
                    .flights
                    .iter_mut()
                    .find(|f| f.id == Some(id))
                    .ok_or_else(|| StoreError::new(format!("no flight with id {}", id.0)))?;
                *existing = flight.clone();
            }
            None => {
                self.next_id += 1;
                flight.id = Some(FlightId(self.next_id));
                self.flights.push(flight.clone());
            }
        }

        Ok(flight)
    }

    fn find_by_number_and_status(
        &self,
        flight_number: &FlightNumber,
        status: FlightStatus,
    ) -> Result<Vec<Flight>, StoreError> {
        Ok(self.matching_by_departure(|f| &f.flight_number == flight_number && f.status == status))
    }

    fn find_by_number_and_date(
        &self,
        flight_number: &FlightNumber,
        date: NaiveDate,
    ) -> Result<Vec<Flight>, StoreError> {
        Ok(self.matching_by_departure(|f| {
            &f.flight_number == flight_number && f.estimated_departure_time.date() == date
        }))
    }

    fn find_by_origin(&self, origin: &str) -> Result<Vec<Flight>, StoreError> {
        Ok(self.matching(|f| f.origin == origin))
    }

    fn find_by_destination(&self, destination: &str) -> Result<Vec<Flight>, StoreError> {
        Ok(self.matching(|f| f.destination == destination))
    }

    fn find_by_origin_and_destination(
        &self,
        origin: &str,
        destination: &str,
    ) -> Result<Vec<Flight>, StoreError> {
        Ok(self.matching(|f| f.origin == origin && f.destination == destination))
    }

    fn find_by_status(&self, status: FlightStatus) -> Result<Vec<Flight>, StoreError> {
        Ok(self.matching(|f| f.status == status))
    }

    fn find_all(&self) -> Result<Vec<Flight>, StoreError> {
        Ok(self.flights.clone())
    }
}

#[cfg(test)]
mod test {
    use chrono::NaiveDateTime;
    use schema::CreateFlight;

    use super::*;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .expect("datetime")
    }

    fn flight(number: &str, departs: NaiveDateTime) -> Flight {
        Flight::from(CreateFlight {
            flight_number: FlightNumber::from_str(number),
            aircraft_type: "Boeing 737".to_string(),
            origin: "VNO".to_string(),
            destination: "RIX".to_string(),
            estimated_departure_time: departs,
            estimated_arrival_time: departs,
        })
    }

    #[test]
    fn test_save_assigns_ids_and_replaces() -> Result<(), StoreError> {
        let mut store = InMemoryFlightStore::new();
        let mut saved = store.save(flight("ABC123", at(1, 10)))?;
        let other = store.save(flight("XY9", at(1, 11)))?;
        assert_ne!(saved.id, other.id);

        saved.status = FlightStatus::Departed;
        store.save(saved.clone())?;

        assert_eq!(store.len(), 2);
        assert_eq!(store.find_by_status(FlightStatus::Departed)?, vec![saved]);
        Ok(())
    }

    #[test]
    fn test_save_unknown_id_fails() {
        let mut store = InMemoryFlightStore::new();
        let mut unknown = flight("ABC123", at(1, 10));
        unknown.id = Some(FlightId(42));

        assert!(store.save(unknown).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_number_queries_order_by_departure() -> Result<(), StoreError> {
        let mut store = InMemoryFlightStore::new();
        store.save(flight("ABC123", at(3, 9)))?;
        store.save(flight("ABC123", at(1, 18)))?;
        store.save(flight("ABC123", at(1, 7)))?;
        store.save(flight("XY9", at(1, 8)))?;

        let number = FlightNumber::from_str("ABC123");
        let scheduled = store.find_by_number_and_status(&number, FlightStatus::Scheduled)?;
        let departures = scheduled
            .iter()
            .map(|f| f.estimated_departure_time)
            .collect::<Vec<_>>();
        assert_eq!(departures, vec![at(1, 7), at(1, 18), at(3, 9)]);

        let on_first = store.find_by_number_and_date(&number, at(1, 0).date())?;
        assert_eq!(on_first.len(), 2);
        assert_eq!(on_first[0].estimated_departure_time, at(1, 7));
        Ok(())
    }
}
