use std::mem;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use midistream_pipe::{PipeChannel, PipeId, PipeState, TransportConnector, MAX_PIPES};
use tracing::{error, info, warn};

use crate::config::HostConfig;
use crate::error::{HostError, StreamFault};
use crate::sink::SynthSink;
use crate::status::{StreamSnapshot, StreamStatus};
use crate::stop::StopToken;
use crate::worker::{StreamWorker, WorkerReport, WorkerSettings};

/// Outcome of [`StreamMultiplexer::stop_all`].
#[derive(Debug, Default)]
pub struct StopReport {
    /// Streams whose worker exited and whose resources were released.
    pub stopped: Vec<PipeId>,
    /// Streams whose worker did not exit within the join timeout. Their
    /// threads are detached and their sink resources are left untouched.
    pub timed_out: Vec<PipeId>,
    /// Faults not yet collected through [`StreamMultiplexer::take_faults`].
    pub faults: Vec<StreamFault>,
}

struct StreamHandle {
    pipe: PipeId,
    stop: StopToken,
    status: Arc<StreamStatus>,
    thread: Option<JoinHandle<()>>,
    exited: bool,
    released: bool,
}

/// Runs one [`StreamWorker`] per pipe and owns their lifecycle.
pub struct StreamMultiplexer<C: TransportConnector> {
    connector: C,
    config: HostConfig,
    sink: Option<Arc<dyn SynthSink>>,
    streams: Vec<StreamHandle>,
    reports_tx: Sender<WorkerReport>,
    reports_rx: Receiver<WorkerReport>,
    faults: Vec<StreamFault>,
    started: bool,
    stopped: bool,
}

impl<C: TransportConnector> std::fmt::Debug for StreamMultiplexer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamMultiplexer")
            .field("config", &self.config)
            .field("streams", &self.streams.len())
            .field("started", &self.started)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl<C: TransportConnector> StreamMultiplexer<C> {
    pub fn new(connector: C, config: HostConfig) -> Result<Self, HostError> {
        config.validate()?;
        let (reports_tx, reports_rx) = crossbeam_channel::unbounded();
        Ok(Self {
            connector,
            config,
            sink: None,
            streams: Vec::new(),
            reports_tx,
            reports_rx,
            faults: Vec::new(),
            started: false,
            stopped: false,
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Opens `channel_count` pipes and spawns a worker for each.
    ///
    /// A pipe that fails to open is recorded as a fault and skipped; the
    /// others still start. Returns the pipes that are running.
    pub fn start(
        &mut self,
        channel_count: usize,
        sink: Arc<dyn SynthSink>,
    ) -> Result<Vec<PipeId>, HostError> {
        if self.started {
            return Err(HostError::AlreadyStarted);
        }
        if channel_count > MAX_PIPES {
            return Err(HostError::TooManyChannels {
                requested: channel_count,
                max: MAX_PIPES,
            });
        }
        self.started = true;

        let settings = WorkerSettings::from(&self.config);
        let mut running = Vec::with_capacity(channel_count);
        for pipe in PipeId::first(channel_count) {
            let capacity = self.config.capacity_for(pipe);
            let mut channel = match PipeChannel::connect(&self.connector, pipe, capacity) {
                Ok(channel) => channel,
                Err(source) => {
                    let fault = StreamFault::Open { pipe, source };
                    error!(%fault, "stream not started");
                    self.faults.push(fault);
                    continue;
                }
            };

            if let Err(source) = sink.open_stream(pipe) {
                channel.close();
                let fault = StreamFault::Sink { pipe, source };
                error!(%fault, "stream not started");
                self.faults.push(fault);
                continue;
            }

            let stop = StopToken::new();
            let status = Arc::new(StreamStatus::new());
            let worker = StreamWorker::new(
                channel,
                Arc::clone(&sink),
                stop.clone(),
                Arc::clone(&status),
                settings,
            );
            match worker.spawn(self.reports_tx.clone()) {
                Ok(thread) => {
                    self.streams.push(StreamHandle {
                        pipe,
                        stop,
                        status,
                        thread: Some(thread),
                        exited: false,
                        released: false,
                    });
                    running.push(pipe);
                }
                Err(err) => {
                    sink.release_stream(pipe);
                    let fault = StreamFault::Spawn {
                        pipe,
                        message: err.to_string(),
                    };
                    error!(%fault, "stream not started");
                    self.faults.push(fault);
                }
            }
        }

        info!(
            requested = channel_count,
            running = running.len(),
            "stream multiplexer started"
        );
        self.sink = Some(sink);
        Ok(running)
    }

    /// Stops every worker, waiting at most the configured join timeout in
    /// total. Only the first call does anything.
    pub fn stop_all(&mut self) -> StopReport {
        if !self.started || self.stopped {
            return StopReport::default();
        }
        self.stopped = true;

        for stream in &self.streams {
            stream.stop.cancel();
        }

        let deadline = Instant::now() + self.config.join_timeout();
        while self.streams.iter().any(|stream| !stream.exited) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.reports_rx.recv_timeout(remaining) {
                Ok(report) => self.handle_report(report),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let mut report = StopReport::default();
        for stream in &mut self.streams {
            if stream.exited {
                report.stopped.push(stream.pipe);
            } else {
                warn!(
                    pipe = %stream.pipe,
                    timeout_ms = self.config.join_timeout_ms,
                    "stream worker did not stop in time; detaching it"
                );
                stream.thread.take();
                report.timed_out.push(stream.pipe);
            }
        }
        report.faults = mem::take(&mut self.faults);
        info!(
            stopped = report.stopped.len(),
            timed_out = report.timed_out.len(),
            "stream multiplexer stopped"
        );
        report
    }

    /// Faults reported since the last call. Streams that ended with a fault
    /// have already released their resources by the time they show up here.
    pub fn take_faults(&mut self) -> Vec<StreamFault> {
        self.collect_reports();
        mem::take(&mut self.faults)
    }

    pub fn is_running(&mut self, pipe: PipeId) -> bool {
        self.collect_reports();
        self.streams
            .iter()
            .any(|stream| stream.pipe == pipe && !stream.exited)
    }

    pub fn running_pipes(&mut self) -> Vec<PipeId> {
        self.collect_reports();
        self.streams
            .iter()
            .filter(|stream| !stream.exited)
            .map(|stream| stream.pipe)
            .collect()
    }

    pub fn stream_status(&self, pipe: PipeId) -> Option<StreamSnapshot> {
        self.streams
            .iter()
            .find(|stream| stream.pipe == pipe)
            .map(|stream| self.snapshot(stream))
    }

    /// Snapshots of every started stream, in pipe order.
    pub fn status(&self) -> Vec<StreamSnapshot> {
        self.streams
            .iter()
            .map(|stream| self.snapshot(stream))
            .collect()
    }

    fn snapshot(&self, stream: &StreamHandle) -> StreamSnapshot {
        let voices = match (&self.sink, stream.status.state()) {
            (Some(sink), PipeState::Open | PipeState::Draining) => sink.active_voices(stream.pipe),
            _ => 0,
        };
        stream.status.snapshot(stream.pipe, voices)
    }

    fn collect_reports(&mut self) {
        while let Ok(report) = self.reports_rx.try_recv() {
            self.handle_report(report);
        }
    }

    fn handle_report(&mut self, report: WorkerReport) {
        let Some(stream) = self
            .streams
            .iter_mut()
            .find(|stream| stream.pipe == report.pipe)
        else {
            return;
        };
        stream.exited = true;
        if let Some(thread) = stream.thread.take() {
            if thread.join().is_err() {
                warn!(pipe = %stream.pipe, "stream worker thread panicked after reporting");
            }
        }
        if !stream.released {
            stream.released = true;
            if let Some(sink) = &self.sink {
                sink.release_stream(stream.pipe);
            }
        }
        if let Some(fault) = report.fault {
            self.faults.push(fault);
        }
    }
}

impl<C: TransportConnector> Drop for StreamMultiplexer<C> {
    fn drop(&mut self) {
        self.stop_all();
    }
}
