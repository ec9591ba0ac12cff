use std::collections::HashMap;
use std::sync::Arc;

use futures::channel::mpsc;
use futures::StreamExt;
use schema::proto::aero::flights_server::FlightsServer;
use schema::{CreateFlight, TerminalStatus};
use tonic::transport::Server as TonicServer;
use ulid::Ulid;

use server::{
    AllocationService, ArrivalQueue, Config, FlightLifecycle, FlightsService, InMemoryFlightStore,
};

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;

    let arrivals = Arc::new(ArrivalQueue::new());
    let lifecycle = Arc::new(FlightLifecycle::new(
        InMemoryFlightStore::new(),
        arrivals.clone(),
    ));

    if let Some(path) = &config.flights_csv {
        let booked = lifecycle.create_all(CreateFlight::from_csv(path)?)?;
        log::info!("booked {} flights from {}", booked, path);
    }

    let allocation = AllocationService::start(
        config.terminals.clone(),
        arrivals,
        config.scaled_intervals(),
    );
    let mut updates = allocation.updates();
    let (subscriptions_sender, mut subscriptions_receiver) = mpsc::unbounded();
    let server = FlightsServer::new(FlightsService::new(lifecycle, subscriptions_sender));

    // Forward terminal updates to every monitor subscriber until the terminals stop.
    // Dropping the subscriptions afterwards ends their streams so the server can finish.
    let stream_process = async move {
        let mut subscriptions = HashMap::<Ulid, mpsc::UnboundedSender<TerminalStatus>>::new();

        loop {
            tokio::select! {
                update = updates.next() => {
                    let Some(update) = update else {
                        break;
                    };
                    log::info!("processing update for terminal {}", update.terminal);

                    let mut disconnected = vec![];
                    for (id, tx) in subscriptions.iter() {
                        match tx.unbounded_send(update.clone()) {
                            Err(e) if e.is_disconnected() => {
                                disconnected.push(*id);
                            }
                            _ => {}
                        }
                    }

                    // Remove any disconnected subscribers
                    for id in disconnected {
                        subscriptions.remove(&id);
                    }
                }

                Some((id, tx)) = subscriptions_receiver.next() => {
                    subscriptions.insert(id, tx);
                }
            }
        }

        log::info!("closing {} monitor subscriptions", subscriptions.len());
    };

    let shutdown = async move {
        let _ = tokio::signal::ctrl_c().await;
        log::info!("shutting down");

        for report in allocation.shutdown().await {
            if let Some(flight) = &report.dropped {
                log::warn!(
                    "flight {} was still being serviced by terminal {}",
                    flight,
                    report.terminal
                );
            }
            log::info!(
                "terminal {} serviced {} flights",
                report.terminal,
                report.serviced.len()
            );
        }
    };

    log::info!("running server on {}", config.socket);

    let (served, ()) = futures::join!(
        TonicServer::builder()
            .add_service(server)
            .serve_with_shutdown(config.socket, shutdown),
        stream_process
    );
    served?;

    Ok(())
}
