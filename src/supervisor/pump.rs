use std::io::{BufRead, BufReader, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace};

/// Receives each captured line as soon as it is drained
pub type LineSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Collects output lines from a running process.
///
/// Reader threads push lines into a channel as they arrive; [`OutputPump::drain`]
/// moves whatever is queued into the captured log. Only one drain runs at a
/// time: a drain requested while another is in progress returns immediately.
pub struct OutputPump {
    sender: Mutex<Option<Sender<String>>>,
    receiver: Mutex<Receiver<String>>,
    captured: Mutex<Vec<String>>,
    draining: AtomicBool,
    echo: Option<LineSink>,
}

impl OutputPump {
    pub fn new(echo: Option<LineSink>) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel();
        Arc::new(OutputPump {
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(receiver),
            captured: Mutex::new(Vec::new()),
            draining: AtomicBool::new(false),
            echo,
        })
    }

    /// Starts a thread that forwards every line of `stream` into the pump.
    ///
    /// Lines from one stream keep their order.
    pub fn attach<R: Read + Send + 'static>(&self, stream: R, name: &'static str) -> JoinHandle<()> {
        let sender = lock(&self.sender).clone();

        thread::spawn(move || {
            let Some(sender) = sender else {
                return;
            };
            let mut reader = BufReader::new(stream);
            let mut buf = Vec::new();

            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        let line = line.trim_end_matches(['\n', '\r']);
                        if sender.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(stream = name, error = %e, "stopped reading process output");
                        break;
                    }
                }
            }
        })
    }

    /// Drops the pump's own sender so the channel closes once all readers finish.
    pub fn seal(&self) {
        lock(&self.sender).take();
    }

    /// Moves every queued line into the log, echoing each one if configured.
    ///
    /// Returns `false` without doing anything when another drain is running.
    pub fn drain(&self) -> bool {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("drain already in progress, skipping");
            return false;
        }
        let _guard = DrainGuard(&self.draining);

        let receiver = lock(&self.receiver);
        let mut captured = lock(&self.captured);
        loop {
            match receiver.try_recv() {
                Ok(line) => {
                    if let Some(echo) = &self.echo {
                        echo(&line);
                    }
                    captured.push(line);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        true
    }

    /// Snapshot of everything drained so far
    pub fn captured(&self) -> Vec<String> {
        lock(&self.captured).clone()
    }

    pub fn into_captured(self: Arc<Self>) -> Vec<String> {
        match Arc::try_unwrap(self) {
            Ok(pump) => pump
                .captured
                .into_inner()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
            Err(shared) => shared.captured(),
        }
    }
}

/// Clears the in-progress flag when a drain ends, even by panic
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodically drains a pump on a background thread until stopped
pub struct DrainTicker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl DrainTicker {
    pub fn start(pump: Arc<OutputPump>, interval: Duration) -> Self {
        let (stop, stopped) = mpsc::channel::<()>();

        let handle = thread::spawn(move || loop {
            match stopped.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    pump.drain();
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        DrainTicker { stop, handle }
    }

    /// Stops the ticker and waits for any drain it is running to finish
    pub fn stop(self) {
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            debug!("drain ticker panicked");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
