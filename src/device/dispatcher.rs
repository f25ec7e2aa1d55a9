//! Consumer-side tick loop. Fully drains the record queue on every tick,
//! mirrors received lines to the console stream, and feeds record-marker
//! lines through parse → decode → store. A terminal sentinel flips the
//! connection state and stops the loop until a reconnect builds a fresh
//! pipeline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::MissedTickBehavior;

use super::models::{ConnectionState, MonitorEvent};
use crate::errlog::store::LogStore;
use crate::errlog::{decode, parser};
use crate::serial::LinkEvent;

pub(crate) const DISPATCH_TICK: Duration = Duration::from_millis(100);

pub(crate) struct Dispatcher {
    line_rx: mpsc::UnboundedReceiver<LinkEvent>,
    events_tx: broadcast::Sender<MonitorEvent>,
    store: Arc<RwLock<LogStore>>,
    state: Arc<RwLock<ConnectionState>>,
}

impl Dispatcher {
    pub(crate) fn new(
        line_rx: mpsc::UnboundedReceiver<LinkEvent>,
        events_tx: broadcast::Sender<MonitorEvent>,
        store: Arc<RwLock<LogStore>>,
        state: Arc<RwLock<ConnectionState>>,
    ) -> Self {
        Self {
            line_rx,
            events_tx,
            store,
            state,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut tick = tokio::time::interval(DISPATCH_TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            loop {
                match self.line_rx.try_recv() {
                    Ok(event) => {
                        if !self.handle_event(event).await {
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        log::debug!("dispatcher stopped: line channel closed");
                        return;
                    }
                }
            }
        }
    }

    /// Returns false once processing must stop.
    async fn handle_event(&mut self, event: LinkEvent) -> bool {
        match event {
            LinkEvent::Line(line) => {
                self.handle_line(line).await;
                true
            }
            LinkEvent::Closed { reason } => {
                log::error!("serial link lost: {}", reason);
                *self.state.write().await = ConnectionState::Error(reason.clone());
                let _ = self.events_tx.send(MonitorEvent::LinkDown { reason });
                false
            }
        }
    }

    async fn handle_line(&mut self, line: String) {
        let _ = self
            .events_tx
            .send(MonitorEvent::ConsoleLine(line.clone()));

        if !parser::is_record_line(&line) {
            return;
        }
        match parser::parse_record(&line) {
            Ok(record) => {
                let decoded = decode::decode_record(record);
                self.store.write().await.append(decoded.clone());
                let _ = self.events_tx.send(MonitorEvent::RecordParsed(decoded));
            }
            Err(err) => {
                log::warn!("dropping malformed record line {:?}: {}", line, err);
                let _ = self.events_tx.send(MonitorEvent::RecordRejected {
                    line,
                    reason: err.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (
        mpsc::UnboundedSender<LinkEvent>,
        broadcast::Receiver<MonitorEvent>,
        Arc<RwLock<LogStore>>,
        Arc<RwLock<ConnectionState>>,
        Dispatcher,
    ) {
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = broadcast::channel(64);
        let store = Arc::new(RwLock::new(LogStore::new()));
        let state = Arc::new(RwLock::new(ConnectionState::Connected));
        let dispatcher = Dispatcher::new(
            line_rx,
            events_tx,
            Arc::clone(&store),
            Arc::clone(&state),
        );
        (line_tx, events_rx, store, state, dispatcher)
    }

    #[tokio::test]
    async fn test_record_lines_reach_the_store() {
        let (_tx, mut events, store, _state, mut dispatcher) = fixture();

        let line = "OK 1 80000001 64 00000102 40000000 2002 10 1900 1C00";
        assert!(
            dispatcher
                .handle_event(LinkEvent::Line(line.to_string()))
                .await
        );

        assert_eq!(store.read().await.len(), 1);
        assert!(matches!(
            events.try_recv().unwrap(),
            MonitorEvent::ConsoleLine(_)
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            MonitorEvent::RecordParsed(_)
        ));
    }

    #[tokio::test]
    async fn test_malformed_records_leave_the_store_untouched() {
        let (_tx, mut events, store, _state, mut dispatcher) = fixture();

        assert!(
            dispatcher
                .handle_event(LinkEvent::Line("OK 1 2 3".to_string()))
                .await
        );

        assert!(store.read().await.is_empty());
        assert!(matches!(
            events.try_recv().unwrap(),
            MonitorEvent::ConsoleLine(_)
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            MonitorEvent::RecordRejected { .. }
        ));
    }

    #[tokio::test]
    async fn test_free_form_lines_go_to_console_only() {
        let (_tx, mut events, store, _state, mut dispatcher) = fixture();

        assert!(
            dispatcher
                .handle_event(LinkEvent::Line("hello world".to_string()))
                .await
        );

        assert!(store.read().await.is_empty());
        assert!(matches!(
            events.try_recv().unwrap(),
            MonitorEvent::ConsoleLine(_)
        ));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sentinel_flips_state_and_stops_processing() {
        let (_tx, mut events, _store, state, mut dispatcher) = fixture();

        let keep_going = dispatcher
            .handle_event(LinkEvent::Closed {
                reason: "stream lost".to_string(),
            })
            .await;

        assert!(!keep_going);
        assert_eq!(
            *state.read().await,
            ConnectionState::Error("stream lost".to_string())
        );
        assert!(matches!(
            events.try_recv().unwrap(),
            MonitorEvent::LinkDown { .. }
        ));
    }
}
