//! Polling loop that drains one pipe into the synthesis sink.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use midistream_codec::{decode_long, MidiEvent, RunningStatus};
use midistream_pipe::{PipeChannel, PipeId, MAX_LONG_SLOTS};
use tracing::{debug, error, trace, warn};

use crate::config::HostConfig;
use crate::error::StreamFault;
use crate::sink::{SinkError, SynthSink};
use crate::status::StreamStatus;
use crate::stop::StopToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub long_buffer_bytes: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from(&HostConfig::default())
    }
}

impl From<&HostConfig> for WorkerSettings {
    fn from(config: &HostConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            long_buffer_bytes: config.long_buffer_bytes.max(1),
        }
    }
}

/// Sent once by every worker thread right before it exits.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub pipe: PipeId,
    pub fault: Option<StreamFault>,
}

/// Drains one [`PipeChannel`] into a [`SynthSink`].
pub struct StreamWorker {
    channel: PipeChannel,
    sink: Arc<dyn SynthSink>,
    stop: StopToken,
    status: Arc<StreamStatus>,
    running_status: RunningStatus,
    long_buffer: Vec<u8>,
    poll_interval: Duration,
}

impl std::fmt::Debug for StreamWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWorker")
            .field("channel", &self.channel)
            .field("running_status", &self.running_status)
            .finish_non_exhaustive()
    }
}

impl StreamWorker {
    pub fn new(
        channel: PipeChannel,
        sink: Arc<dyn SynthSink>,
        stop: StopToken,
        status: Arc<StreamStatus>,
        settings: WorkerSettings,
    ) -> Self {
        status.set_state(channel.state());
        Self {
            channel,
            sink,
            stop,
            status,
            running_status: RunningStatus::new(),
            long_buffer: vec![0; settings.long_buffer_bytes.max(1)],
            poll_interval: settings.poll_interval,
        }
    }

    pub fn pipe(&self) -> PipeId {
        self.channel.id()
    }

    pub fn status(&self) -> &Arc<StreamStatus> {
        &self.status
    }

    /// Polls until the stop token is cancelled, then drains whatever is still
    /// pending so nothing signalled before the stop is lost.
    pub fn run(&mut self) -> Result<(), SinkError> {
        debug!(pipe = %self.pipe(), "stream worker running");
        while !self.stop.is_cancelled() {
            self.poll_cycle()?;
        }
        self.flush()
    }

    /// One poll cycle: forward a pending long event, pause, then drain every
    /// short event written before the cycle started. Returns the number of
    /// events taken from the pipe.
    pub fn poll_cycle(&mut self) -> Result<usize, SinkError> {
        let mut taken = usize::from(self.forward_long_event()?);
        self.pause();
        taken += self.drain_short_events()?;
        self.publish();
        Ok(taken)
    }

    /// Drains the long events already queued and every short event written
    /// so far, without pausing.
    pub fn flush(&mut self) -> Result<(), SinkError> {
        for _ in 0..MAX_LONG_SLOTS {
            if !self.forward_long_event()? {
                break;
            }
        }
        self.drain_short_events()?;
        self.publish();
        Ok(())
    }

    /// Closes the pipe and marks the stream closed.
    pub fn finish(mut self) {
        self.publish();
        self.channel.close();
        self.status.set_state(self.channel.state());
    }

    /// Moves the worker onto its own thread. The thread reports to `reports`
    /// when it exits, whether it stopped cleanly, hit a fatal sink error or
    /// panicked.
    pub fn spawn(self, reports: Sender<WorkerReport>) -> std::io::Result<JoinHandle<()>> {
        let pipe = self.pipe();
        let mut worker = self;
        thread::Builder::new()
            .name(format!("midistream-{pipe}"))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker.run()));
                let fault = match outcome {
                    Ok(Ok(())) => None,
                    Ok(Err(source)) => Some(StreamFault::Sink { pipe, source }),
                    Err(payload) => Some(StreamFault::Panicked {
                        pipe,
                        message: panic_message(payload.as_ref()),
                    }),
                };
                worker.finish();
                match &fault {
                    Some(fault) => error!(%fault, "stream worker stopped"),
                    None => debug!(%pipe, "stream worker stopped"),
                }
                let _ = reports.send(WorkerReport { pipe, fault });
            })
    }

    fn pause(&self) {
        if self.poll_interval.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(self.poll_interval);
        }
    }

    fn forward_long_event(&mut self) -> Result<bool, SinkError> {
        let len = match self.channel.fetch_long_event(&mut self.long_buffer) {
            Ok(len) => len.min(self.long_buffer.len()),
            Err(err) => {
                debug!(pipe = %self.pipe(), %err, "long event read failed");
                return Ok(false);
            }
        };
        let Some(event) = decode_long(&self.long_buffer[..len]) else {
            return Ok(false);
        };
        deliver(self.sink.as_ref(), &self.status, self.channel.id(), event)?;
        Ok(true)
    }

    fn drain_short_events(&mut self) -> Result<usize, SinkError> {
        if !self.channel.has_pending_data() {
            return Ok(0);
        }
        let target = self.channel.write_head_position();
        self.channel.begin_drain();
        self.status.add_drain_cycle();
        let drained = self.drain_until(target);
        self.channel.end_drain();
        drained
    }

    fn drain_until(&mut self, target: i32) -> Result<usize, SinkError> {
        let mut drained = 0;
        while self.channel.has_pending_data() {
            let raw = match self.channel.fetch_short_event() {
                Ok(raw) => raw,
                Err(err) => {
                    debug!(pipe = %self.pipe(), %err, "short event read failed");
                    break;
                }
            };
            self.channel.reset_read_head_if_needed();
            drained += 1;

            match self.running_status.decode(raw) {
                Some(event) => {
                    deliver(self.sink.as_ref(), &self.status, self.channel.id(), event)?;
                }
                None => {
                    trace!(pipe = %self.pipe(), raw, "skipping unmapped event");
                    self.status.add_skipped_event();
                }
            }

            if self.channel.read_head_position() == target {
                break;
            }
        }
        Ok(drained)
    }

    fn publish(&self) {
        self.status.update_heads(
            self.channel.read_head_position(),
            self.channel.write_head_position(),
        );
        self.status.set_state(self.channel.state());
    }
}

fn deliver(
    sink: &dyn SynthSink,
    status: &StreamStatus,
    pipe: PipeId,
    event: MidiEvent<'_>,
) -> Result<(), SinkError> {
    match sink.dispatch(pipe, event) {
        Ok(()) => {
            if matches!(event, MidiEvent::Long(_)) {
                status.add_long_event();
            } else {
                status.add_short_event();
            }
            Ok(())
        }
        Err(SinkError::Rejected(reason)) => {
            warn!(%pipe, %reason, "sink rejected event");
            status.add_dispatch_error();
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
