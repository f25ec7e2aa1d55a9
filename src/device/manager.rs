use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;

use super::dispatcher::Dispatcher;
use super::models::{ConnectionState, FetchState, MonitorEvent};
use super::{DeviceError, Result};
use crate::config::{command_checksum, LinkSettings, TransportProfile};
use crate::errlog::store::LogStore;
use crate::errlog::types::DecodedRecord;
use crate::serial::reader::reader_task;
use crate::serial::{PortCommand, SerialDeviceInfo, SerialInterface, SerialPortIO};

const READER_STOP_TIMEOUT: Duration = Duration::from_secs(1);
const COMMAND_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Highest index requested by the bulk error-log fetch (`errlog 0..=5`).
pub const LOG_FETCH_LAST_INDEX: u32 = 5;
const FETCH_PACING: Duration = Duration::from_millis(250);

/// Device-side command that drops its stored error logs.
pub const CLEAR_LOG_COMMAND: &str = "errlog clear";

/// Owns one serial session end to end: the link state machine, the reader
/// and dispatcher tasks, the log store, and the bulk-fetch sequencer.
/// All cross-thread traffic funnels through the channels wired up here.
pub struct DeviceManager {
    state: Arc<RwLock<ConnectionState>>,
    store: Arc<RwLock<LogStore>>,
    link: Mutex<Option<LinkHandle>>,
    fetch: Arc<Mutex<FetchState>>,
    fetch_cancel: Arc<Mutex<Option<watch::Sender<bool>>>>,
    events_tx: broadcast::Sender<MonitorEvent>,
}

struct LinkHandle {
    cmd_tx: mpsc::Sender<PortCommand>,
    profile: TransportProfile,
    reader: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

/// Frame one outbound command for the wire plus the event reporting it.
fn framed_write(profile: TransportProfile, command: &str) -> (PortCommand, MonitorEvent) {
    let command = command.trim().to_string();
    let frame = profile.frame(&command);
    let checksum = if profile.requires_checksum() {
        Some(format!("{:02X}", command_checksum(&command)))
    } else {
        None
    };
    (
        PortCommand::Write {
            frame: frame.into_bytes(),
            echo_text: command.clone(),
        },
        MonitorEvent::CommandSent { command, checksum },
    )
}

impl DeviceManager {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            store: Arc::new(RwLock::new(LogStore::new())),
            link: Mutex::new(None),
            fetch: Arc::new(Mutex::new(FetchState::Idle)),
            fetch_cancel: Arc::new(Mutex::new(None)),
            events_tx,
        }
    }

    /// List candidate serial ports for the connection form.
    pub fn discover_ports() -> Result<Vec<SerialDeviceInfo>> {
        Ok(SerialInterface::discover_ports()?)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events_tx.subscribe()
    }

    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    pub async fn fetch_state(&self) -> FetchState {
        *self.fetch.lock().await
    }

    /// Snapshot of the log store, newest record first.
    pub async fn records(&self) -> Vec<DecodedRecord> {
        self.store.read().await.snapshot()
    }

    /// Open the configured port and start the pipeline. Fails closed: on
    /// any setup error no partially connected state is observable.
    pub async fn connect(&self, settings: &LinkSettings) -> Result<()> {
        self.begin_connect().await?;

        let interface = match SerialInterface::open(settings) {
            Ok(interface) => interface,
            Err(err) => {
                *self.state.write().await = ConnectionState::Error(err.to_string());
                return Err(err.into());
            }
        };

        self.attach(Box::new(interface), settings.profile).await;
        log::info!(
            "connected to {} at {} baud",
            settings.port_name,
            settings.baud_rate
        );
        Ok(())
    }

    /// Start the pipeline over caller-supplied port I/O. This is the seam
    /// simulators and tests use in place of real hardware.
    pub async fn connect_with_io(
        &self,
        io: Box<dyn SerialPortIO>,
        profile: TransportProfile,
    ) -> Result<()> {
        self.begin_connect().await?;
        self.attach(io, profile).await;
        Ok(())
    }

    async fn begin_connect(&self) -> Result<()> {
        let mut state = self.state.write().await;
        match *state {
            ConnectionState::Connected | ConnectionState::Connecting => {
                Err(DeviceError::AlreadyConnected)
            }
            _ => {
                *state = ConnectionState::Connecting;
                Ok(())
            }
        }
    }

    async fn attach(&self, io: Box<dyn SerialPortIO>, profile: TransportProfile) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (line_tx, line_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(reader_task(io, cmd_rx, line_tx));
        let dispatcher = tokio::spawn(
            Dispatcher::new(
                line_rx,
                self.events_tx.clone(),
                Arc::clone(&self.store),
                Arc::clone(&self.state),
            )
            .run(),
        );

        *self.link.lock().await = Some(LinkHandle {
            cmd_tx,
            profile,
            reader,
            dispatcher,
        });
        *self.state.write().await = ConnectionState::Connected;
    }

    /// Tear the session down: abort any fetch sequence, ask the reader to
    /// stop and wait a bounded time for it, then mark the link down. A
    /// reader that misses the deadline is logged and aborted, not fatal.
    pub async fn disconnect(&self) -> Result<()> {
        self.cancel_log_fetch().await;

        let handle = self.link.lock().await.take();
        if let Some(mut handle) = handle {
            let _ = handle.cmd_tx.send(PortCommand::Shutdown).await;
            drop(handle.cmd_tx);

            if tokio::time::timeout(READER_STOP_TIMEOUT, &mut handle.reader)
                .await
                .is_err()
            {
                log::warn!(
                    "serial reader did not stop within {:?}; aborting it",
                    READER_STOP_TIMEOUT
                );
                handle.reader.abort();
            }
            if tokio::time::timeout(READER_STOP_TIMEOUT, &mut handle.dispatcher)
                .await
                .is_err()
            {
                log::warn!(
                    "dispatcher did not stop within {:?}; aborting it",
                    READER_STOP_TIMEOUT
                );
                handle.dispatcher.abort();
            }
        }

        *self.state.write().await = ConnectionState::Disconnected;
        log::info!("disconnected");
        Ok(())
    }

    /// Clone of the active link's outbound channel and transport profile.
    async fn active_link(&self) -> Result<(mpsc::Sender<PortCommand>, TransportProfile)> {
        let link = self.link.lock().await;
        match link.as_ref() {
            Some(handle) => Ok((handle.cmd_tx.clone(), handle.profile)),
            None => Err(DeviceError::NotConnected),
        }
    }

    /// Frame and transmit one command over the active transport profile.
    pub async fn send_command(&self, command: &str) -> Result<()> {
        if !self.state.read().await.is_connected() {
            return Err(DeviceError::NotConnected);
        }
        let (cmd_tx, profile) = self.active_link().await?;

        let (write, sent_event) = framed_write(profile, command);
        cmd_tx
            .send(write)
            .await
            .map_err(|_| DeviceError::NotConnected)?;
        let _ = self.events_tx.send(sent_event);
        Ok(())
    }

    /// Kick off the paced `errlog 0..=5` sequence. Rejected while one is
    /// already running; never queued.
    pub async fn start_log_fetch(&self) -> Result<()> {
        if !self.state.read().await.is_connected() {
            return Err(DeviceError::NotConnected);
        }
        let (cmd_tx, profile) = self.active_link().await?;
        {
            let mut fetch = self.fetch.lock().await;
            if fetch.is_active() {
                return Err(DeviceError::FetchInProgress);
            }
            *fetch = FetchState::Sending(0);
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        *self.fetch_cancel.lock().await = Some(cancel_tx);

        let sequencer = FetchSequencer {
            state: Arc::clone(&self.state),
            fetch: Arc::clone(&self.fetch),
            fetch_cancel: Arc::clone(&self.fetch_cancel),
            events_tx: self.events_tx.clone(),
            cmd_tx,
            profile,
        };
        tokio::spawn(sequencer.run(cancel_rx));
        Ok(())
    }

    /// Request cancellation of a running fetch sequence; the sequence task
    /// returns itself to idle.
    pub async fn cancel_log_fetch(&self) {
        if let Some(cancel) = self.fetch_cancel.lock().await.as_ref() {
            let _ = cancel.send(true);
        }
    }

    /// Drop every stored record and, while connected, tell the device to
    /// clear its own log storage too.
    pub async fn clear_records(&self) -> Result<()> {
        self.store.write().await.clear();
        if self.state.read().await.is_connected() {
            self.send_command(CLEAR_LOG_COMMAND).await?;
        }
        Ok(())
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Timer-paced sender for the bulk error-log fetch. Runs as its own task so
/// the dispatcher tick never waits on it; aborts on cancellation or on loss
/// of the connected state and always leaves the fetch state idle.
struct FetchSequencer {
    state: Arc<RwLock<ConnectionState>>,
    fetch: Arc<Mutex<FetchState>>,
    fetch_cancel: Arc<Mutex<Option<watch::Sender<bool>>>>,
    events_tx: broadcast::Sender<MonitorEvent>,
    cmd_tx: mpsc::Sender<PortCommand>,
    profile: TransportProfile,
}

impl FetchSequencer {
    async fn run(self, cancel_rx: watch::Receiver<bool>) {
        log::info!(
            "starting errlog fetch sequence 0..={}",
            LOG_FETCH_LAST_INDEX
        );

        for index in 0..=LOG_FETCH_LAST_INDEX {
            if *cancel_rx.borrow() {
                log::info!("errlog fetch sequence cancelled at index {}", index);
                break;
            }
            if !self.state.read().await.is_connected() {
                log::warn!("connection lost; aborting errlog fetch at index {}", index);
                break;
            }

            *self.fetch.lock().await = FetchState::Sending(index);
            let (write, sent_event) = framed_write(self.profile, &format!("errlog {}", index));
            if self.cmd_tx.send(write).await.is_err() {
                log::warn!("link went away; aborting errlog fetch at index {}", index);
                break;
            }
            let _ = self.events_tx.send(sent_event);
            tokio::time::sleep(FETCH_PACING).await;
        }

        *self.fetch.lock().await = FetchState::Idle;
        *self.fetch_cancel.lock().await = None;
    }
}
