//! Background payload loading
//!
//! Worker threads run caller-supplied parse closures (file decoding, mesh
//! building) and hand the finished component back over a channel. They
//! never touch the [`World`]: the owning thread calls
//! [`AssetLoader::drain`] once per frame, which installs every finished
//! payload and fulfils the matching [`LoadHandle`].

use crate::config::LoaderConfig;
use crate::ecs::{Component, Entity, World};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Loading errors
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    /// The parse closure rejected its input
    #[error("Parse error: {0}")]
    Parse(String),

    /// No worker is left to run or report the job
    #[error("Loader worker is gone")]
    WorkerGone,

    /// IO error while reading a source or starting a worker
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Final outcome of one submitted job
#[derive(Debug)]
pub enum LoadStatus {
    /// Payload installed on the target entity
    Applied,
    /// Cancelled before the payload was installed
    Cancelled,
    /// Target entity was deleted while the job was in flight
    Discarded,
    /// Parsing failed
    Failed(LoadError),
}

/// Shared flag checked when a worker dequeues a job and again at drain time
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Fresh, not-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Caller's side of a submitted job
#[derive(Debug)]
pub struct LoadHandle {
    target: Entity,
    token: CancellationToken,
    status: Receiver<LoadStatus>,
}

impl LoadHandle {
    /// Entity the payload is destined for
    pub fn target(&self) -> Entity {
        self.target
    }

    /// Cancel the job. Has no effect once the payload is installed.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token shared with the job
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Outcome, if the owning thread has drained it yet
    pub fn poll(&self) -> Option<LoadStatus> {
        self.status.try_recv().ok()
    }

    /// Block until the job is drained.
    ///
    /// Only call this from a thread other than the one calling
    /// [`AssetLoader::drain`].
    pub fn wait(self) -> LoadStatus {
        self.status.recv().unwrap_or(LoadStatus::Failed(LoadError::WorkerGone))
    }
}

/// Counts from one [`AssetLoader::drain`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Payloads installed
    pub applied: usize,
    /// Jobs cancelled
    pub cancelled: usize,
    /// Payloads dropped because their entity was gone
    pub discarded: usize,
    /// Jobs whose parse failed
    pub failed: usize,
}

impl DrainReport {
    /// Jobs finished in this drain
    pub fn total(&self) -> usize {
        self.applied + self.cancelled + self.discarded + self.failed
    }

    fn record(&mut self, status: &LoadStatus) {
        match status {
            LoadStatus::Applied => self.applied += 1,
            LoadStatus::Cancelled => self.cancelled += 1,
            LoadStatus::Discarded => self.discarded += 1,
            LoadStatus::Failed(_) => self.failed += 1,
        }
    }
}

type Installer = Box<dyn FnOnce(&mut World, Entity) + Send>;
type ParseFn = Box<dyn FnOnce() -> Result<Installer, LoadError> + Send>;

struct Job {
    target: Entity,
    token: CancellationToken,
    promise: Sender<LoadStatus>,
    parse: ParseFn,
}

enum Outcome {
    Skipped,
    Parsed(Installer),
    Failed(LoadError),
}

struct Finished {
    target: Entity,
    token: CancellationToken,
    promise: Sender<LoadStatus>,
    outcome: Outcome,
}

/// Worker pool plus the owning-thread end of its result queue
pub struct AssetLoader {
    jobs: Option<Sender<Job>>,
    results: Receiver<Finished>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl AssetLoader {
    /// Start `config.worker_threads` workers (at least one)
    pub fn new(config: &LoaderConfig) -> Result<Self, LoadError> {
        let (job_sender, job_receiver) = bounded::<Job>(config.queue_capacity.max(1));
        let (result_sender, result_receiver) = unbounded();

        let count = config.worker_threads.max(1);
        let mut workers = Vec::with_capacity(count);
        for id in 0..count {
            let jobs = job_receiver.clone();
            let results = result_sender.clone();
            let handle = thread::Builder::new()
                .name(format!("asset-loader-{id}"))
                .spawn(move || run_worker(id, &jobs, &results))?;
            workers.push(handle);
        }
        log::debug!("Started {count} asset loader workers");

        Ok(Self {
            jobs: Some(job_sender),
            results: result_receiver,
            workers,
        })
    }

    /// Queue `parse` to run on a worker; its payload is installed on
    /// `target` by a later [`drain`](Self::drain).
    ///
    /// Blocks while the job queue is full.
    pub fn submit<P, F>(&self, target: Entity, parse: F) -> LoadHandle
    where
        P: Component + Send,
        F: FnOnce() -> Result<P, LoadError> + Send + 'static,
    {
        let (promise, status) = bounded(1);
        let token = CancellationToken::new();
        let job = Job {
            target,
            token: token.clone(),
            promise,
            parse: Box::new(move || {
                let payload = parse()?;
                let install: Installer = Box::new(move |world: &mut World, target: Entity| {
                    world.insert_component(target, payload);
                });
                Ok(install)
            }),
        };

        let rejected = match &self.jobs {
            Some(jobs) => jobs.send(job).err().map(|error| error.into_inner()),
            None => Some(job),
        };
        if let Some(job) = rejected {
            // Handle may already be gone
            let _ = job.promise.send(LoadStatus::Failed(LoadError::WorkerGone));
        }

        LoadHandle { target, token, status }
    }

    /// Install every finished payload. Call on the thread that owns `world`.
    pub fn drain(&mut self, world: &mut World) -> DrainReport {
        let mut report = DrainReport::default();

        for finished in self.results.try_iter() {
            let status = match finished.outcome {
                _ if finished.token.is_cancelled() => LoadStatus::Cancelled,
                Outcome::Skipped => LoadStatus::Cancelled,
                Outcome::Failed(error) => {
                    log::warn!("Load for {} failed: {error}", finished.target);
                    LoadStatus::Failed(error)
                }
                Outcome::Parsed(_) if !world.contains(finished.target) => LoadStatus::Discarded,
                Outcome::Parsed(install) => {
                    install(world, finished.target);
                    LoadStatus::Applied
                }
            };

            report.record(&status);
            let _ = finished.promise.send(status);
        }

        if report.total() > 0 {
            log::trace!("Drained {report:?}");
        }
        report
    }
}

impl Drop for AssetLoader {
    fn drop(&mut self) {
        // Closing the queue lets workers finish what is queued, then exit
        self.jobs = None;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::warn!("Asset loader worker panicked");
            }
        }
        log::debug!("Asset loader stopped");
    }
}

fn run_worker(id: usize, jobs: &Receiver<Job>, results: &Sender<Finished>) {
    log::trace!("Asset loader worker {id} running");
    for job in jobs.iter() {
        let outcome = if job.token.is_cancelled() {
            Outcome::Skipped
        } else {
            match (job.parse)() {
                Ok(install) => Outcome::Parsed(install),
                Err(error) => Outcome::Failed(error),
            }
        };

        let finished = Finished {
            target: job.target,
            token: job.token,
            promise: job.promise,
            outcome,
        };
        if results.send(finished).is_err() {
            break;
        }
    }
    log::trace!("Asset loader worker {id} exiting");
}
