use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use schema::FlightNumber;

/// FIFO mailbox of arrived flights waiting for a terminal.
///
/// Every operation takes the lock for the duration of a single push or pop,
/// so it is never held across an `.await`.
#[derive(Default, Debug)]
pub struct ArrivalQueue {
    arrivals: Mutex<VecDeque<FlightNumber>>,
}

impl ArrivalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the flight to the tail. Every call is one arrival event, so a
    /// number that is still waiting from an earlier instance is queued again.
    pub fn enqueue(&self, flight_number: FlightNumber) {
        self.lock().push_back(flight_number.clone());
        log::info!("Flight {} has been added to arrivals", flight_number);
    }

    /// Removes and returns the longest-waiting flight, if any
    pub fn try_dequeue_head(&self) -> Option<FlightNumber> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Waiting flights, head first
    pub fn snapshot(&self) -> Vec<FlightNumber> {
        self.lock().iter().cloned().collect()
    }

    // Each critical section is a single VecDeque call, so a panic elsewhere
    // can't leave the buffer half-updated.
    fn lock(&self) -> MutexGuard<'_, VecDeque<FlightNumber>> {
        self.arrivals.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    fn number(s: &str) -> FlightNumber {
        FlightNumber::from_str(s)
    }

    #[test]
    fn test_fifo_order() {
        let queue = ArrivalQueue::new();
        queue.enqueue(number("AA123"));
        queue.enqueue(number("BB123"));
        queue.enqueue(number("CC123"));

        assert_eq!(queue.snapshot(), vec![number("AA123"), number("BB123"), number("CC123")]);
        assert_eq!(queue.try_dequeue_head(), Some(number("AA123")));
        assert_eq!(queue.try_dequeue_head(), Some(number("BB123")));
        assert_eq!(queue.try_dequeue_head(), Some(number("CC123")));
        assert_eq!(queue.try_dequeue_head(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_every_arrival_is_queued() {
        let queue = ArrivalQueue::new();
        queue.enqueue(number("AA123"));
        queue.enqueue(number("BB123"));
        queue.enqueue(number("AA123"));
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.try_dequeue_head(), Some(number("AA123")));
        assert_eq!(queue.try_dequeue_head(), Some(number("BB123")));
        assert_eq!(queue.try_dequeue_head(), Some(number("AA123")));
        assert!(queue.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_drain_is_exactly_once() {
        let queue = Arc::new(ArrivalQueue::new());
        let total = 500;
        for i in 0..total {
            queue.enqueue(number(&format!("FL{i}")));
        }

        let drainers = (0..8)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    let mut claimed = vec![];
                    while let Some(flight) = queue.try_dequeue_head() {
                        claimed.push(flight);
                        tokio::task::yield_now().await;
                    }
                    claimed
                })
            })
            .collect::<Vec<_>>();

        let mut claimed = vec![];
        for drainer in drainers {
            claimed.extend(drainer.await.expect("drainer"));
        }

        let distinct = claimed.iter().collect::<HashSet<_>>();
        assert_eq!(claimed.len(), total);
        assert_eq!(distinct.len(), total);
        assert!(queue.is_empty());
    }
}
