// SPDX-License-Identifier: GPL-3.0-or-later
use std::fmt;
use std::mem;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::camera::{FrameValidator, SensorPort};
use crate::error::{AcquisitionError, RenderFailure};
use crate::render::ImageRenderer;
use crate::temperature::{TemperatureEstimator, TemperatureSample, ThermalHistory};

/// How long the worker waits for a request before checking whether it should stop.
pub const QUEUE_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Where the worker is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for a request.
    Idle,

    /// Capturing, estimating and rendering for a request.
    Acquiring,

    /// Shutdown has been requested, but the worker hasn't noticed yet.
    Draining,

    /// The worker thread has exited.
    Stopped,
}

/// The temperature and history as of the last completed request.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub temperature: TemperatureSample,
    pub thermal_history: ThermalHistory,
}

/// Bookkeeping shared between callers and the worker thread, guarded by one mutex.
#[derive(Debug)]
struct Progress {
    /// Requests submitted but not finished. Never more than one.
    outstanding: usize,
    state: WorkerState,
    /// The most recent results from the worker, not yet published.
    latest: Snapshot,
    failures: Vec<RenderFailure>,
}

#[derive(Debug)]
struct Shared {
    progress: Mutex<Progress>,
    progress_changed: Condvar,
    stop: AtomicBool,
    published: RwLock<Snapshot>,
}

impl Shared {
    fn new() -> Self {
        Self {
            progress: Mutex::new(Progress {
                outstanding: 0,
                state: WorkerState::Idle,
                latest: Snapshot::default(),
                failures: Vec::new(),
            }),
            progress_changed: Condvar::new(),
            stop: AtomicBool::new(false),
            published: RwLock::new(Snapshot::default()),
        }
    }
}

/// Everything the worker thread owns exclusively.
struct Pipeline {
    sensor: Box<dyn SensorPort + Send>,
    validator: FrameValidator,
    estimator: TemperatureEstimator,
    renderer: ImageRenderer,
    history: ThermalHistory,
}

impl Pipeline {
    /// Capture a frame, then estimate the temperature and render it to `destination`.
    fn process(&mut self, destination: PathBuf) -> (Snapshot, Result<(), RenderFailure>) {
        debug!(destination = %destination.display(), "Capturing frame");
        let frame = self.validator.acquire(&mut self.sensor);
        let temperature = self.estimator.estimate(&frame, &mut self.history);
        let render_result = self.renderer.render_to(&frame, &destination).map(|_| ());
        let snapshot = Snapshot {
            temperature,
            thermal_history: self.history.clone(),
        };
        (snapshot, render_result)
    }
}

/// Marks the worker as stopped when the thread exits, even if it panics, so that nobody waits
/// forever on a request that will never finish.
struct ExitGuard(Arc<Shared>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let mut progress = self.0.progress.lock();
        progress.state = WorkerState::Stopped;
        self.0.progress_changed.notify_all();
    }
}

fn worker_loop(mut pipeline: Pipeline, requests: mpsc::Receiver<PathBuf>, shared: Arc<Shared>) {
    let _guard = ExitGuard(Arc::clone(&shared));
    loop {
        match requests.recv_timeout(QUEUE_POLL_TIMEOUT) {
            Ok(destination) => {
                {
                    let mut progress = shared.progress.lock();
                    if progress.state == WorkerState::Idle {
                        progress.state = WorkerState::Acquiring;
                    }
                }
                let (snapshot, render_result) = pipeline.process(destination);
                let mut progress = shared.progress.lock();
                progress.latest = snapshot;
                if let Err(failure) = render_result {
                    warn!(%failure, "Unable to save thermal image");
                    progress.failures.push(failure);
                }
                progress.outstanding = progress.outstanding.saturating_sub(1);
                if progress.state == WorkerState::Acquiring {
                    progress.state = WorkerState::Idle;
                }
                shared.progress_changed.notify_all();
            }
            Err(RecvTimeoutError::Timeout) => {
                if shared.stop.load(Ordering::SeqCst) {
                    debug!("Quitting thermal camera thread");
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Request channel closed, quitting thermal camera thread");
                break;
            }
        }
    }
}

/// Runs the capture pipeline on a dedicated thread, one request at a time.
///
/// Only one request can be outstanding at once. [`submit`][Self::submit] waits for the previous
/// request to finish before queueing another one, so a slow or misbehaving sensor pushes back on
/// callers instead of building up a backlog.
pub struct AcquisitionWorker {
    requests: Mutex<Option<mpsc::SyncSender<PathBuf>>>,
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl AcquisitionWorker {
    /// Start a worker using the standard validator, estimator and renderer.
    pub fn start(sensor: Box<dyn SensorPort + Send>) -> Result<Self, AcquisitionError> {
        Self::with_parts(sensor, FrameValidator::default(), ImageRenderer::default())
    }

    /// Start a worker with a specific validator and renderer.
    pub fn with_parts(
        sensor: Box<dyn SensorPort + Send>,
        validator: FrameValidator,
        renderer: ImageRenderer,
    ) -> Result<Self, AcquisitionError> {
        let pipeline = Pipeline {
            sensor,
            validator,
            estimator: TemperatureEstimator,
            renderer,
            history: ThermalHistory::new(),
        };
        let shared = Arc::new(Shared::new());
        let (sender, receiver) = mpsc::sync_channel(1);
        let thread_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("thermal-acquisition".to_string())
            .spawn(move || worker_loop(pipeline, receiver, thread_shared))?;
        info!("Started thermal camera worker");
        Ok(Self {
            requests: Mutex::new(Some(sender)),
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Queue a capture that will be rendered to `destination`.
    ///
    /// Blocks while a previous request is still being processed.
    pub fn submit<P: Into<PathBuf>>(&self, destination: P) -> Result<(), AcquisitionError> {
        let destination = destination.into();
        let mut progress = self.shared.progress.lock();
        loop {
            let state = progress.state;
            match state {
                WorkerState::Draining | WorkerState::Stopped => {
                    return Err(AcquisitionError::Stopped)
                }
                _ if progress.outstanding == 0 => break,
                _ => self.shared.progress_changed.wait(&mut progress),
            }
        }
        let requests = self.requests.lock();
        let sender = requests.as_ref().ok_or(AcquisitionError::Stopped)?;
        // The channel always has room, as nothing is outstanding.
        sender
            .try_send(destination)
            .map_err(|_| AcquisitionError::Stopped)?;
        progress.outstanding += 1;
        debug!("Submitted capture request");
        Ok(())
    }

    /// Wait for every submitted request to finish, then publish the results.
    ///
    /// If any of the finished requests could not save their image, those failures are returned
    /// (the temperature readings are still published).
    pub fn await_completion(&self) -> Result<Snapshot, AcquisitionError> {
        let mut progress = self.shared.progress.lock();
        while progress.outstanding > 0 && progress.state != WorkerState::Stopped {
            self.shared.progress_changed.wait(&mut progress);
        }
        self.finish(&mut progress)
    }

    /// Like [`await_completion`][Self::await_completion], but gives up after `timeout`.
    ///
    /// `Ok(None)` means the results are not ready yet; the request keeps running and can be
    /// waited on again later.
    pub fn await_completion_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<Snapshot>, AcquisitionError> {
        let deadline = Instant::now() + timeout;
        let mut progress = self.shared.progress.lock();
        while progress.outstanding > 0 && progress.state != WorkerState::Stopped {
            if self
                .shared
                .progress_changed
                .wait_until(&mut progress, deadline)
                .timed_out()
                && progress.outstanding > 0
            {
                return Ok(None);
            }
        }
        self.finish(&mut progress).map(Some)
    }

    fn finish(&self, progress: &mut Progress) -> Result<Snapshot, AcquisitionError> {
        if progress.outstanding > 0 {
            // Only reachable once the worker has exited with a request in flight.
            return Err(AcquisitionError::WorkerPanicked);
        }
        let snapshot = progress.latest.clone();
        *self.shared.published.write() = snapshot.clone();
        let failures = mem::take(&mut progress.failures);
        if failures.is_empty() {
            Ok(snapshot)
        } else {
            Err(failures.into())
        }
    }

    /// The temperature as of the last [`await_completion`][Self::await_completion].
    pub fn current_temperature(&self) -> TemperatureSample {
        let temperature = self.shared.published.read().temperature;
        debug!(%temperature, "Current temperature");
        temperature
    }

    /// The history as of the last [`await_completion`][Self::await_completion].
    pub fn current_history(&self) -> ThermalHistory {
        self.shared.published.read().thermal_history.clone()
    }

    pub fn state(&self) -> WorkerState {
        self.shared.progress.lock().state
    }

    /// Stop the worker and wait for its thread to exit.
    ///
    /// A request that is already being processed is finished first. Once this returns, further
    /// calls to [`submit`][Self::submit] fail with [`AcquisitionError::Stopped`].
    pub fn shutdown(&self) -> Result<(), AcquisitionError> {
        {
            let mut progress = self.shared.progress.lock();
            if progress.state != WorkerState::Stopped {
                progress.state = WorkerState::Draining;
            }
            self.shared.stop.store(true, Ordering::SeqCst);
            self.shared.progress_changed.notify_all();
        }
        let thread = self.thread.lock().take();
        let result = match thread {
            Some(handle) => {
                debug!("Waiting for thermal camera thread to exit");
                handle.join().map_err(|_| AcquisitionError::WorkerPanicked)
            }
            None => Ok(()),
        };
        self.requests.lock().take();
        info!("Thermal camera worker stopped");
        result
    }
}

impl fmt::Debug for AcquisitionWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquisitionWorker")
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for AcquisitionWorker {
    fn drop(&mut self) {
        if self.thread.get_mut().is_some() {
            if let Err(err) = self.shutdown() {
                warn!(%err, "Error stopping thermal camera worker");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::camera::scripted::{uniform_frame, ScriptedSensor};
    use crate::camera::FrameValidator;
    use crate::error::{AcquisitionError, SensorFault};
    use crate::render::ImageRenderer;
    use crate::temperature::{TemperatureSample, HISTORY_LEN};

    use super::{AcquisitionWorker, WorkerState};

    fn fast_worker(sensor: ScriptedSensor) -> AcquisitionWorker {
        AcquisitionWorker::with_parts(
            Box::new(sensor),
            FrameValidator::new(Duration::from_millis(1)),
            ImageRenderer::default(),
        )
        .unwrap()
    }

    #[test]
    fn renders_and_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let worker = fast_worker(ScriptedSensor::new(Vec::new(), 100.0));
        worker.submit(&path).unwrap();
        let snapshot = worker.await_completion().unwrap();
        assert_eq!(snapshot.temperature.to_string(), "129.0");
        assert_eq!(snapshot.thermal_history.len(), HISTORY_LEN);
        assert_eq!(
            snapshot.thermal_history.latest(),
            Some(&snapshot.temperature)
        );
        assert_eq!(worker.current_temperature(), snapshot.temperature);
        assert_eq!(worker.current_history(), snapshot.thermal_history);
        assert!(path.exists());
    }

    #[test]
    fn nothing_published_before_await() {
        let dir = tempfile::tempdir().unwrap();
        let worker = fast_worker(ScriptedSensor::new(Vec::new(), 100.0));
        assert_eq!(worker.current_temperature(), TemperatureSample::default());
        worker.submit(dir.path().join("frame.png")).unwrap();
        // Give the worker plenty of time to finish; results still wait for await_completion.
        thread::sleep(Duration::from_millis(200));
        assert_eq!(worker.current_temperature(), TemperatureSample::default());
        worker.await_completion().unwrap();
        assert_eq!(worker.current_temperature().to_string(), "129.0");
    }

    #[test]
    fn await_without_requests() {
        let worker = fast_worker(ScriptedSensor::new(Vec::new(), 100.0));
        let snapshot = worker.await_completion().unwrap();
        assert_eq!(snapshot.temperature, TemperatureSample::default());
        assert_eq!(snapshot.thermal_history.len(), HISTORY_LEN);
    }

    #[test]
    fn history_in_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let script = vec![Ok(uniform_frame(100.0)), Ok(uniform_frame(20.0))];
        let worker = fast_worker(ScriptedSensor::new(script, 60.0));
        for name in ["a.png", "b.png", "c.png"].iter() {
            worker.submit(dir.path().join(name)).unwrap();
            worker.await_completion().unwrap();
        }
        let history: Vec<String> = worker
            .current_history()
            .iter()
            .skip(HISTORY_LEN - 3)
            .map(ToString::to_string)
            .collect();
        assert_eq!(history, vec!["129.0", "21.0", "75.0"]);
    }

    #[test]
    fn retries_are_invisible() {
        let dir = tempfile::tempdir().unwrap();
        let mut zeroed = uniform_frame(100.0);
        {
            let readings: &mut [f32] = &mut zeroed;
            readings[5] = 0.0;
        }
        let script = vec![
            Err(SensorFault::Busy),
            Ok(zeroed),
            Ok(uniform_frame(500.0)),
            Err(SensorFault::Io(anyhow::anyhow!("bus error"))),
            Ok(uniform_frame(1.0)),
        ];
        let sensor = ScriptedSensor::new(script, 100.0);
        let polls = sensor.poll_counter();
        let worker = fast_worker(sensor);
        worker.submit(dir.path().join("frame.png")).unwrap();
        let snapshot = worker.await_completion().unwrap();
        assert_eq!(polls.get(), 6);
        assert_eq!(snapshot.temperature.to_string(), "129.0");
    }

    #[test]
    fn second_submit_waits_for_first() {
        let dir = tempfile::tempdir().unwrap();
        let (sensor, gate) = ScriptedSensor::new(Vec::new(), 100.0).gated();
        let worker = Arc::new(fast_worker(sensor));
        worker.submit(dir.path().join("a.png")).unwrap();

        let submitted = Arc::new(AtomicBool::new(false));
        let second = {
            let worker = Arc::clone(&worker);
            let submitted = Arc::clone(&submitted);
            let path = dir.path().join("b.png");
            thread::spawn(move || {
                worker.submit(path).unwrap();
                submitted.store(true, Ordering::SeqCst);
            })
        };
        thread::sleep(Duration::from_millis(300));
        assert!(
            !submitted.load(Ordering::SeqCst),
            "second submit returned while the first was still capturing"
        );
        assert_eq!(worker.state(), WorkerState::Acquiring);

        // Let the first capture finish
        gate.send(()).unwrap();
        second.join().unwrap();
        assert!(submitted.load(Ordering::SeqCst));
        assert!(dir.path().join("a.png").exists());

        gate.send(()).unwrap();
        worker.await_completion().unwrap();
        assert!(dir.path().join("b.png").exists());
    }

    #[test]
    fn await_timeout_reports_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let (sensor, gate) = ScriptedSensor::new(Vec::new(), 100.0).gated();
        let worker = fast_worker(sensor);
        worker.submit(dir.path().join("frame.png")).unwrap();
        let pending = worker
            .await_completion_timeout(Duration::from_millis(50))
            .unwrap();
        assert!(pending.is_none());
        gate.send(()).unwrap();
        let ready = worker
            .await_completion_timeout(Duration::from_secs(10))
            .unwrap();
        assert_eq!(ready.unwrap().temperature.to_string(), "129.0");
    }

    #[test]
    fn render_failure_surfaced_once() {
        let dir = tempfile::tempdir().unwrap();
        let bad_path = dir.path().join("missing").join("frame.png");
        let worker = fast_worker(ScriptedSensor::new(Vec::new(), 100.0));
        worker.submit(&bad_path).unwrap();
        match worker.await_completion() {
            Err(AcquisitionError::Render(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].destination(), &bad_path);
            }
            other => panic!("Expected a render failure, got {:?}", other),
        }
        // The reading itself was still good
        assert_eq!(worker.current_temperature().to_string(), "129.0");

        worker.submit(dir.path().join("frame.png")).unwrap();
        assert!(worker.await_completion().is_ok());
    }

    #[test]
    fn shutdown_while_idle() {
        let worker = fast_worker(ScriptedSensor::new(Vec::new(), 100.0));
        assert_eq!(worker.state(), WorkerState::Idle);
        let start = Instant::now();
        worker.shutdown().unwrap();
        assert!(
            start.elapsed() < Duration::from_secs(1),
            "shutdown took {:?}",
            start.elapsed()
        );
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert!(matches!(
            worker.submit("frame.png"),
            Err(AcquisitionError::Stopped)
        ));
    }

    #[test]
    fn shutdown_finishes_in_flight_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let (sensor, gate) = ScriptedSensor::new(Vec::new(), 100.0).gated();
        let worker = fast_worker(sensor);
        worker.submit(&path).unwrap();
        let release = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            gate.send(()).unwrap();
        });
        worker.shutdown().unwrap();
        release.join().unwrap();
        assert!(path.exists());
        let snapshot = worker.await_completion().unwrap();
        assert_eq!(snapshot.temperature.to_string(), "129.0");
    }

    #[test]
    fn snapshot_json() {
        let worker = fast_worker(ScriptedSensor::new(Vec::new(), 100.0));
        let snapshot = worker.await_completion().unwrap();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["temperature"], "0.0");
        assert_eq!(
            json["thermal_history"].as_array().map(Vec::len),
            Some(HISTORY_LEN)
        );
    }
}
