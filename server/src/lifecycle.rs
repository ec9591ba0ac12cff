use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveDateTime};
use schema::{CreateFlight, Flight, FlightNumber, FlightStatus, FlightStore, StoreError};

use crate::{ArrivalQueue, FlightError};

type Clock = fn() -> NaiveDateTime;

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Drives flights through SCHEDULED -> DEPARTED -> ARRIVED and hands arrived
/// flights to the `ArrivalQueue`.
///
/// Each operation holds the store lock from its first read to its last write,
/// so the "at most one DEPARTED flight per number" check can't race with
/// another departure.
pub struct FlightLifecycle<S> {
    store: Mutex<S>,
    arrivals: Arc<ArrivalQueue>,
    clock: Clock,
}

impl<S: FlightStore> FlightLifecycle<S> {
    pub fn new(store: S, arrivals: Arc<ArrivalQueue>) -> Self {
        Self {
            store: Mutex::new(store),
            arrivals,
            clock: local_now,
        }
    }

    /// Use the provided clock for actual times and for "today"
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn arrivals(&self) -> &Arc<ArrivalQueue> {
        &self.arrivals
    }

    fn store(&self) -> Result<MutexGuard<'_, S>, FlightError> {
        self.store
            .lock()
            .map_err(|_| StoreError::new("flight store lock poisoned").into())
    }

    fn today(&self) -> NaiveDate {
        (self.clock)().date()
    }

    /// Book a new flight. It starts out `Scheduled` with no actual times.
    pub fn create(&self, request: CreateFlight) -> Result<Flight, FlightError> {
        if !request.is_valid_schedule() {
            return Err(FlightError::InvalidSchedule);
        }

        let saved = self.store()?.save(Flight::from(request))?;
        log::info!("Flight {} has been registered", saved.flight_number);
        Ok(saved)
    }

    /// Book every request, stopping at the first invalid one. Returns how many were booked.
    pub fn create_all(
        &self,
        requests: impl IntoIterator<Item = CreateFlight>,
    ) -> Result<usize, FlightError> {
        requests
            .into_iter()
            .try_fold(0, |booked, request| self.create(request).map(|_| booked + 1))
    }

    /// Depart the earliest scheduled flight with this number
    pub fn register_departure(&self, flight_number: &FlightNumber) -> Result<Flight, FlightError> {
        let mut store = self.store()?;

        if !store
            .find_by_number_and_status(flight_number, FlightStatus::Departed)?
            .is_empty()
        {
            return Err(FlightError::DuplicateActiveFlight(flight_number.clone()));
        }

        // Ascending by estimated departure, so the first is the earliest
        let mut flight = store
            .find_by_number_and_status(flight_number, FlightStatus::Scheduled)?
            .into_iter()
            .next()
            .ok_or_else(|| FlightError::FlightNotFound(flight_number.clone()))?;

        flight.depart((self.clock)())?;
        let updated = store.save(flight)?;
        drop(store);

        log::info!("Flight number=[{}] has departed", flight_number);
        Ok(updated)
    }

    /// Land the departed flight with this number and queue it for a terminal
    pub fn register_arrival(&self, flight_number: &FlightNumber) -> Result<Flight, FlightError> {
        let mut store = self.store()?;

        // At most one should be departed; if the store says otherwise take the latest
        let mut flight = store
            .find_by_number_and_status(flight_number, FlightStatus::Departed)?
            .into_iter()
            .last()
            .ok_or_else(|| FlightError::FlightNotFound(flight_number.clone()))?;

        flight.arrive((self.clock)())?;
        let updated = store.save(flight)?;
        drop(store);

        self.arrivals.enqueue(flight_number.clone());

        log::info!("Flight number=[{}] has arrived", flight_number);
        Ok(updated)
    }

    /// Status of the flight with this number departing on `date` (default: today)
    pub fn get_status(
        &self,
        flight_number: &FlightNumber,
        date: Option<NaiveDate>,
    ) -> Result<FlightStatus, FlightError> {
        self.find_on_date(flight_number, date.unwrap_or_else(|| self.today()))
            .map(|flight| flight.status)
    }

    /// Today's flight with this number
    pub fn get_by_number(&self, flight_number: &FlightNumber) -> Result<Flight, FlightError> {
        self.find_on_date(flight_number, self.today())
    }

    fn find_on_date(
        &self,
        flight_number: &FlightNumber,
        date: NaiveDate,
    ) -> Result<Flight, FlightError> {
        self.store()?
            .find_by_number_and_date(flight_number, date)?
            .into_iter()
            .next()
            .ok_or_else(|| FlightError::FlightNotFound(flight_number.clone()))
    }

    /// Flights by origin and/or destination. With neither given nothing matches.
    pub fn search(
        &self,
        origin: Option<&str>,
        destination: Option<&str>,
    ) -> Result<Vec<Flight>, FlightError> {
        let store = self.store()?;
        let flights = match (origin, destination) {
            (Some(origin), Some(destination)) => {
                store.find_by_origin_and_destination(origin, destination)?
            }
            (Some(origin), None) => store.find_by_origin(origin)?,
            (None, Some(destination)) => store.find_by_destination(destination)?,
            (None, None) => vec![],
        };
        Ok(flights)
    }

    pub fn by_status(&self, status: FlightStatus) -> Result<Vec<Flight>, FlightError> {
        Ok(self.store()?.find_by_status(status)?)
    }

    pub fn all(&self) -> Result<Vec<Flight>, FlightError> {
        Ok(self.store()?.find_all()?)
    }
}
