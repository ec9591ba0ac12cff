use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use schema::{FlightNumber, Speed, TerminalNumber, TerminalStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

use crate::ArrivalQueue;

/// How long a terminal is occupied by a flight, and how often an idle
/// terminal checks for new arrivals
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Intervals {
    pub service: Duration,
    pub poll: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            service: Duration::from_secs(10),
            poll: Duration::from_secs(1),
        }
    }
}

impl Intervals {
    /// Scale both intervals by the provided `Speed`
    pub fn with_speed(self, speed: Speed) -> Self {
        Self {
            service: speed.adjust_duration(self.service),
            poll: speed.adjust_duration(self.poll),
        }
    }
}

/// A physical servicing bay. Only its own worker mutates it; everyone else
/// observes the `TerminalStatus` it publishes.
#[derive(Debug)]
pub struct Terminal {
    number: TerminalNumber,
    current_flight: Option<FlightNumber>,
    status: watch::Sender<TerminalStatus>,
}

impl Terminal {
    pub fn new(number: TerminalNumber) -> (Self, watch::Receiver<TerminalStatus>) {
        let (status, receiver) = watch::channel(TerminalStatus {
            terminal: number.clone(),
            current_flight: None,
        });

        (
            Self {
                number,
                current_flight: None,
                status,
            },
            receiver,
        )
    }

    pub fn number(&self) -> &TerminalNumber {
        &self.number
    }

    pub fn current_flight(&self) -> Option<&FlightNumber> {
        self.current_flight.as_ref()
    }

    /// Claim the next waiting flight. Does nothing while already servicing.
    pub fn assign(&mut self, queue: &ArrivalQueue) -> Option<FlightNumber> {
        if self.current_flight.is_some() {
            return None;
        }

        let flight = queue.try_dequeue_head()?;
        self.current_flight = Some(flight.clone());
        self.publish();
        Some(flight)
    }

    /// Clear the terminal, returning the flight it held
    pub fn release(&mut self) -> Option<FlightNumber> {
        let flight = self.current_flight.take();
        self.publish();
        flight
    }

    fn publish(&self) {
        self.status.send_replace(TerminalStatus {
            terminal: self.number.clone(),
            current_flight: self.current_flight.clone(),
        });
    }
}

/// What a terminal worker did before it stopped
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TerminalReport {
    pub terminal: TerminalNumber,
    /// Flights fully serviced, in order
    pub serviced: Vec<FlightNumber>,
    /// Flight that was mid-service when the worker was cancelled. It is not requeued.
    pub dropped: Option<FlightNumber>,
}

impl TerminalReport {
    /// Every flight this terminal took off the arrival queue
    pub fn claimed(&self) -> impl Iterator<Item = &FlightNumber> {
        self.serviced.iter().chain(self.dropped.iter())
    }
}

fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

/// Resolves once shutdown is signalled or the signal's sender is gone
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Worker loop for a single terminal: claim, service, poll, repeat until shutdown
pub async fn run_terminal(
    mut terminal: Terminal,
    queue: Arc<ArrivalQueue>,
    intervals: Intervals,
    mut shutdown: watch::Receiver<bool>,
) -> TerminalReport {
    log::info!("Starting terminal worker. Terminal={}", terminal.number());
    let mut serviced = vec![];

    let dropped = loop {
        if shutdown_requested(&shutdown) {
            break None;
        }

        match terminal.assign(&queue) {
            Some(flight) => {
                log::info!("Flight {} assigned to terminal {}", flight, terminal.number());

                tokio::select! {
                    _ = tokio::time::sleep(intervals.service) => {
                        terminal.release();
                        log::info!(
                            "Flight {} in terminal {} was serviced. Terminal is clear.",
                            flight,
                            terminal.number()
                        );
                        serviced.push(flight);
                    }
                    _ = cancelled(&mut shutdown) => {
                        log::warn!(
                            "Terminal {} stopped while servicing flight {}",
                            terminal.number(),
                            flight
                        );
                        break terminal.release();
                    }
                }
            }
            None => log::debug!("No arrivals waiting for terminal {}", terminal.number()),
        }

        tokio::select! {
            _ = tokio::time::sleep(intervals.poll) => {}
            _ = cancelled(&mut shutdown) => break None,
        }
    };

    log::info!(
        "Terminal worker stopped. Terminal={}, serviced={}",
        terminal.number(),
        serviced.len()
    );

    TerminalReport {
        terminal: terminal.number().clone(),
        serviced,
        dropped,
    }
}

/// Runs one independent worker per terminal, all draining the same `ArrivalQueue`
pub struct AllocationService {
    shutdown: watch::Sender<bool>,
    statuses: Vec<watch::Receiver<TerminalStatus>>,
    workers: Vec<JoinHandle<TerminalReport>>,
}

impl AllocationService {
    /// Spawns the terminal workers onto the current tokio runtime
    pub fn start(
        terminals: impl IntoIterator<Item = TerminalNumber>,
        queue: Arc<ArrivalQueue>,
        intervals: Intervals,
    ) -> Self {
        let (shutdown, shutdown_receiver) = watch::channel(false);

        let (statuses, workers) = terminals
            .into_iter()
            .map(|number| {
                let (terminal, status) = Terminal::new(number);
                let worker = tokio::spawn(run_terminal(
                    terminal,
                    queue.clone(),
                    intervals,
                    shutdown_receiver.clone(),
                ));
                (status, worker)
            })
            .unzip();

        Self {
            shutdown,
            statuses,
            workers,
        }
    }

    /// Current occupancy of every terminal, in configuration order
    pub fn statuses(&self) -> Vec<TerminalStatus> {
        self.statuses
            .iter()
            .map(|status| status.borrow().clone())
            .collect()
    }

    /// Stream of terminal status changes, starting with each terminal's current status.
    /// Ends once every worker has stopped.
    pub fn updates(&self) -> BoxStream<'static, TerminalStatus> {
        stream::select_all(
            self.statuses
                .iter()
                .cloned()
                .map(|status| WatchStream::new(status).boxed()),
        )
        .boxed()
    }

    /// Signal every worker to stop and collect their reports
    pub async fn shutdown(self) -> Vec<TerminalReport> {
        log::info!("Stopping {} terminal workers", self.workers.len());
        self.shutdown.send_replace(true);

        let mut reports = Vec::with_capacity(self.workers.len());
        for worker in self.workers {
            match worker.await {
                Ok(report) => reports.push(report),
                Err(e) => log::error!("terminal worker failed: {}", e),
            }
        }

        reports
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    fn number(s: &str) -> FlightNumber {
        FlightNumber::from_str(s)
    }

    fn terminals(names: &[&str]) -> Vec<TerminalNumber> {
        names.iter().map(|name| TerminalNumber::from_str(name)).collect()
    }

    fn queue_of(flights: &[&str]) -> Arc<ArrivalQueue> {
        let queue = Arc::new(ArrivalQueue::new());
        for flight in flights {
            queue.enqueue(number(flight));
        }
        queue
    }

    #[test]
    fn test_terminal_picks_first_flight() {
        let queue = queue_of(&["AA123", "BB123"]);
        let (mut terminal, status) = Terminal::new(TerminalNumber::from_str("A1"));

        assert_eq!(terminal.assign(&queue), Some(number("AA123")));
        assert_eq!(terminal.current_flight(), Some(&number("AA123")));
        assert_eq!(status.borrow().current_flight, Some(number("AA123")));

        // Busy terminals don't claim more work
        assert_eq!(terminal.assign(&queue), None);
        assert_eq!(queue.snapshot(), vec![number("BB123")]);

        assert_eq!(terminal.release(), Some(number("AA123")));
        assert!(!status.borrow().is_servicing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_terminals_two_flights() {
        let queue = queue_of(&["AA123", "BB123"]);
        let service = AllocationService::start(
            terminals(&["A1", "A2", "B3"]),
            queue.clone(),
            Intervals::default(),
        );

        tokio::time::sleep(Duration::from_millis(2000)).await;

        let statuses = service.statuses();
        let held = statuses
            .iter()
            .filter_map(|status| status.current_flight.clone())
            .collect::<HashSet<_>>();
        assert_eq!(statuses.iter().filter(|s| s.is_servicing()).count(), 2);
        assert_eq!(held, HashSet::from([number("AA123"), number("BB123")]));
        assert!(queue.is_empty());

        // Both flights are still mid-service when the workers are stopped
        let reports = service.shutdown().await;
        assert_eq!(reports.len(), 3);
        let dropped = reports
            .iter()
            .filter_map(|report| report.dropped.clone())
            .collect::<HashSet<_>>();
        assert_eq!(dropped, held);
        assert!(reports.iter().all(|report| report.serviced.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_clears_after_service_interval() {
        let queue = queue_of(&["AA123"]);
        let service =
            AllocationService::start(terminals(&["A1"]), queue.clone(), Intervals::default());

        tokio::time::sleep(Duration::from_millis(9_500)).await;
        assert_eq!(service.statuses()[0].current_flight, Some(number("AA123")));

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(service.statuses()[0].current_flight, None);

        // Picked up on the next poll
        queue.enqueue(number("BB123"));
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(service.statuses()[0].current_flight, Some(number("BB123")));

        let reports = service.shutdown().await;
        assert_eq!(reports[0].serviced, vec![number("AA123")]);
        assert_eq!(reports[0].dropped, Some(number("BB123")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_claimed_flight_is_accounted_for() {
        let flights = ["AA1", "BB2", "CC3", "DD4", "EE5"];
        let queue = queue_of(&flights);
        let service =
            AllocationService::start(terminals(&["A1", "A2"]), queue.clone(), Intervals::default());

        tokio::time::sleep(Duration::from_secs(25)).await;
        let reports = service.shutdown().await;

        let claimed = reports
            .iter()
            .flat_map(|report| report.claimed().cloned())
            .chain(queue.snapshot())
            .collect::<Vec<_>>();
        let distinct = claimed.iter().cloned().collect::<HashSet<_>>();

        assert_eq!(claimed.len(), flights.len());
        assert_eq!(distinct, flights.iter().map(|f| number(f)).collect());
        assert_eq!(reports.iter().map(|r| r.serviced.len()).sum::<usize>(), 4);
        assert_eq!(reports.iter().filter(|r| r.dropped.is_some()).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_shutdown_is_prompt() {
        let service = AllocationService::start(
            terminals(&["A1", "A2"]),
            Arc::new(ArrivalQueue::new()),
            Intervals::default(),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;

        let reports = tokio::time::timeout(Duration::from_millis(10), service.shutdown())
            .await
            .expect("workers stop without waiting out the poll interval");
        assert!(reports.iter().all(|report| report.claimed().count() == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_updates_follow_terminal_state() {
        let queue = Arc::new(ArrivalQueue::new());
        let service =
            AllocationService::start(terminals(&["A1"]), queue.clone(), Intervals::default());
        let mut updates = service.updates();

        let initial = updates.next().await.expect("initial status");
        assert!(!initial.is_servicing());

        queue.enqueue(number("AA123"));
        let servicing = updates.next().await.expect("servicing status");
        assert_eq!(servicing.current_flight, Some(number("AA123")));

        let cleared = updates.next().await.expect("cleared status");
        assert_eq!(cleared.terminal, TerminalNumber::from_str("A1"));
        assert!(!cleared.is_servicing());

        service.shutdown().await;
        assert_eq!(updates.next().await, None);
    }

    #[test]
    fn test_intervals_follow_speed() {
        let intervals = Intervals::default().with_speed(Speed::fast_forward(10).expect("speed"));
        assert_eq!(intervals.service, Duration::from_secs(1));
        assert_eq!(intervals.poll, Duration::from_millis(100));
    }
}
