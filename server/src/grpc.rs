use std::pin::Pin;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use schema::proto::aero::{self, flights_server::Flights};
use schema::{CreateFlight, Flight, FlightNumber, FlightStore, TerminalStatus, ToFromProto};
use tonic::{Request, Response, Status};
use ulid::Ulid;

use crate::FlightLifecycle;

pub type Subscription = (Ulid, mpsc::UnboundedSender<TerminalStatus>);

/// gRPC face of the `FlightLifecycle` plus the terminal monitor feed
pub struct FlightsService<S> {
    lifecycle: Arc<FlightLifecycle<S>>,
    subscriptions_sender: mpsc::UnboundedSender<Subscription>,
}

impl<S> FlightsService<S> {
    pub fn new(
        lifecycle: Arc<FlightLifecycle<S>>,
        subscriptions_sender: mpsc::UnboundedSender<Subscription>,
    ) -> Self {
        Self {
            lifecycle,
            subscriptions_sender,
        }
    }
}

fn flight_number(request: Request<aero::FlightNumber>) -> FlightNumber {
    FlightNumber::from_str(&request.into_inner().flight_number)
}

fn flight_list(flights: Vec<Flight>) -> aero::FlightList {
    aero::FlightList {
        flights: flights.into_iter().map(Flight::into_proto).collect(),
    }
}

fn parse_date(date: Option<&str>) -> Result<Option<NaiveDate>, Status> {
    date.filter(|date| !date.is_empty())
        .map(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|_| Status::invalid_argument(format!("invalid date: {date}")))
        })
        .transpose()
}

#[tonic::async_trait]
impl<S> Flights for FlightsService<S>
where
    S: FlightStore + Send + 'static,
{
    type MonitorStream = Pin<Box<dyn Stream<Item = Result<aero::TerminalUpdate, Status>> + Send>>;

    async fn create(
        &self,
        request: Request<aero::CreateFlight>,
    ) -> Result<Response<aero::Flight>, Status> {
        let create = CreateFlight::try_from_proto(request.into_inner()).ok_or_else(|| {
            Status::invalid_argument("estimated departure and arrival times are required")
        })?;
        log::info!("received create request for flight {}", create.flight_number);

        let flight = self.lifecycle.create(create)?;
        Ok(Response::new(flight.into_proto()))
    }

    async fn register_departure(
        &self,
        request: Request<aero::FlightNumber>,
    ) -> Result<Response<aero::Flight>, Status> {
        let number = flight_number(request);
        log::info!("received departure for flight {}", number);

        let flight = self.lifecycle.register_departure(&number)?;
        Ok(Response::new(flight.into_proto()))
    }

    async fn register_arrival(
        &self,
        request: Request<aero::FlightNumber>,
    ) -> Result<Response<aero::Flight>, Status> {
        let number = flight_number(request);
        log::info!("received arrival for flight {}", number);

        let flight = self.lifecycle.register_arrival(&number)?;
        Ok(Response::new(flight.into_proto()))
    }

    async fn get_status(
        &self,
        request: Request<aero::StatusQuery>,
    ) -> Result<Response<aero::StatusReply>, Status> {
        let query = request.into_inner();
        let date = parse_date(query.date.as_deref())?;

        let status = self
            .lifecycle
            .get_status(&FlightNumber::from_str(&query.flight_number), date)?;
        Ok(Response::new(aero::StatusReply {
            status: aero::FlightStatus::from(status).into(),
        }))
    }

    async fn get_by_number(
        &self,
        request: Request<aero::FlightNumber>,
    ) -> Result<Response<aero::Flight>, Status> {
        let flight = self.lifecycle.get_by_number(&flight_number(request))?;
        Ok(Response::new(flight.into_proto()))
    }

    async fn search(
        &self,
        request: Request<aero::SearchQuery>,
    ) -> Result<Response<aero::FlightList>, Status> {
        let query = request.into_inner();
        let flights = self
            .lifecycle
            .search(query.origin.as_deref(), query.destination.as_deref())?;
        log::info!(
            "search origin={:?} destination={:?} found {} flights",
            query.origin,
            query.destination,
            flights.len()
        );
        Ok(Response::new(flight_list(flights)))
    }

    async fn by_status(
        &self,
        request: Request<aero::StatusFilter>,
    ) -> Result<Response<aero::FlightList>, Status> {
        let status = request.into_inner().status().into();
        let flights = self.lifecycle.by_status(status)?;
        Ok(Response::new(flight_list(flights)))
    }

    async fn all(&self, _request: Request<()>) -> Result<Response<aero::FlightList>, Status> {
        let flights = self.lifecycle.all()?;
        Ok(Response::new(flight_list(flights)))
    }

    async fn monitor(&self, _request: Request<()>) -> Result<Response<Self::MonitorStream>, Status> {
        let subscription_id = Ulid::new();
        log::info!("received monitor request: {}", subscription_id);
        let (tx, rx) = mpsc::unbounded();
        self.subscriptions_sender
            .clone()
            .start_send((subscription_id, tx))
            .map_err(|_| Status::internal("send subscription"))?;

        let resp = rx
            .map(|update| Ok::<aero::TerminalUpdate, Status>(update.into_proto()))
            .boxed();

        Ok(Response::new(resp))
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, NaiveDateTime};
    use schema::timestamp_from_datetime;
    use tonic::Code;

    use super::*;
    use crate::{ArrivalQueue, InMemoryFlightStore};

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .expect("datetime")
    }

    fn service() -> (
        FlightsService<InMemoryFlightStore>,
        mpsc::UnboundedReceiver<Subscription>,
    ) {
        let lifecycle =
            FlightLifecycle::new(InMemoryFlightStore::new(), Arc::new(ArrivalQueue::new()))
                .with_clock(fixed_now);
        let (tx, rx) = mpsc::unbounded();
        (FlightsService::new(Arc::new(lifecycle), tx), rx)
    }

    fn create_request(departure: NaiveDateTime, arrival: NaiveDateTime) -> aero::CreateFlight {
        aero::CreateFlight {
            flight_number: "ABC123".to_string(),
            aircraft_type: "Boeing 737".to_string(),
            origin: "VNO".to_string(),
            destination: "RIX".to_string(),
            estimated_departure_time: Some(timestamp_from_datetime(departure)),
            estimated_arrival_time: Some(timestamp_from_datetime(arrival)),
        }
    }

    fn number(s: &str) -> Request<aero::FlightNumber> {
        Request::new(aero::FlightNumber {
            flight_number: s.to_string(),
        })
    }

    #[tokio::test]
    async fn test_lifecycle_over_grpc() -> Result<(), Status> {
        let (service, _subscriptions) = service();
        let departure = fixed_now() + Duration::hours(2);

        let created = service
            .create(Request::new(create_request(departure, departure + Duration::hours(2))))
            .await?
            .into_inner();
        assert_eq!(created.status(), aero::FlightStatus::Scheduled);
        assert!(created.actual_departure_time.is_none());

        let departed = service
            .register_departure(number("ABC123"))
            .await?
            .into_inner();
        assert_eq!(departed.status(), aero::FlightStatus::Departed);
        assert!(departed.actual_departure_time.is_some());
        assert!(departed.actual_arrival_time.is_none());

        let again = service.register_departure(number("ABC123")).await;
        assert_eq!(again.err().map(|s| s.code()), Some(Code::FailedPrecondition));

        let arrived = service.register_arrival(number("ABC123")).await?.into_inner();
        assert_eq!(arrived.status(), aero::FlightStatus::Arrived);
        assert!(arrived.actual_arrival_time.is_some());

        let status = service
            .get_status(Request::new(aero::StatusQuery {
                flight_number: "ABC123".to_string(),
                date: Some("2024-05-01".to_string()),
            }))
            .await?
            .into_inner();
        assert_eq!(status.status(), aero::FlightStatus::Arrived);

        let all = service.all(Request::new(())).await?.into_inner();
        assert_eq!(all.flights.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_request_errors() {
        let (service, _subscriptions) = service();
        let departure = fixed_now() + Duration::hours(10);

        let invalid = service
            .create(Request::new(create_request(departure, fixed_now())))
            .await;
        assert_eq!(invalid.err().map(|s| s.code()), Some(Code::InvalidArgument));

        let mut missing = create_request(departure, departure);
        missing.estimated_arrival_time = None;
        let missing = service.create(Request::new(missing)).await;
        assert_eq!(missing.err().map(|s| s.code()), Some(Code::InvalidArgument));

        let unknown = service.register_arrival(number("XX-XXX")).await;
        assert_eq!(unknown.err().map(|s| s.code()), Some(Code::NotFound));

        let bad_date = service
            .get_status(Request::new(aero::StatusQuery {
                flight_number: "ABC123".to_string(),
                date: Some("01/05/2024".to_string()),
            }))
            .await;
        assert_eq!(bad_date.err().map(|s| s.code()), Some(Code::InvalidArgument));
    }

    #[tokio::test]
    async fn test_search_and_status_filters() -> Result<(), Status> {
        let (service, _subscriptions) = service();
        let departure = fixed_now() + Duration::hours(2);
        service
            .create(Request::new(create_request(departure, departure)))
            .await?;

        let none = service
            .search(Request::new(aero::SearchQuery::default()))
            .await?
            .into_inner();
        assert!(none.flights.is_empty());

        let scheduled = service
            .by_status(Request::new(aero::StatusFilter {
                status: aero::FlightStatus::Scheduled.into(),
            }))
            .await?
            .into_inner();
        assert_eq!(scheduled.flights.len(), 1);

        let from_vno = service
            .search(Request::new(aero::SearchQuery {
                origin: Some("VNO".to_string()),
                destination: None,
            }))
            .await?
            .into_inner();
        assert_eq!(from_vno.flights.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_monitor_registers_subscription() -> Result<(), Status> {
        let (service, mut subscriptions) = service();

        let mut stream = service.monitor(Request::new(())).await?.into_inner();
        let (_id, tx) = subscriptions.next().await.expect("subscription");

        tx.unbounded_send(TerminalStatus {
            terminal: schema::TerminalNumber::from_str("A1"),
            current_flight: Some(FlightNumber::from_str("AA123")),
        })
        .expect("send update");

        let update = stream.next().await.expect("update")?;
        assert_eq!(update.terminal, "A1");
        assert_eq!(update.current_flight.as_deref(), Some("AA123"));
        Ok(())
    }
}
