//! Tick scheduler and worker pool.
//!
//! Suspended walks and armed periodic triggers wait here. The scheduler is
//! a min-heap of `(due_tick, slot)` pairs over a slot vector; consumed
//! slots become placeholders and the storage compacts once too many pile
//! up. Slot numbers increase monotonically between compactions, so tasks
//! due on the same tick pop in scheduling order.
//!
//! The worker pool runs blocking jobs (file appends) off the main thread
//! and posts the walk continuation back over a channel; the engine drains
//! completions each tick, so the walk always resumes on the main thread.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, warn};

use crate::event::EventCtx;
use crate::exec::ExecError;
use crate::trigger::Trigger;

#[cfg(test)]
const PLACEHOLDER_THRESHOLD: usize = 4;
#[cfg(not(test))]
const PLACEHOLDER_THRESHOLD: usize = 64;

/// A suspended walk: which trigger, where to resume, and the firing context.
#[derive(Debug)]
pub struct Continuation {
    pub trigger: Arc<Trigger>,
    /// Item index to resume at; `None` means the suspending item was last.
    pub next: Option<usize>,
    pub ctx: EventCtx,
}

/// What the scheduler hands back when a slot comes due.
#[derive(Debug, Default)]
pub enum Task {
    /// Consumed slot. Never returned from [`Scheduler::pop_due`].
    #[default]
    Placeholder,
    /// Resume a suspended walk.
    Resume(Continuation),
    /// Fire a periodic trigger and re-arm it.
    FirePeriodic(Arc<Trigger>),
}

impl Task {
    fn is_placeholder(&self) -> bool {
        matches!(self, Task::Placeholder)
    }
}

#[derive(Default)]
pub struct Scheduler {
    heap: BinaryHeap<Reverse<(u64, usize)>>,
    tasks: Vec<Task>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_at(&mut self, due_tick: u64, task: Task) {
        let slot = self.tasks.len();
        debug!("scheduling task for tick {due_tick} (slot {slot})");
        self.heap.push(Reverse((due_tick, slot)));
        self.tasks.push(task);
    }

    /// Pop the next due task, if any.
    ///
    /// Returns `None` when the earliest scheduled task is still in the
    /// future. Call repeatedly to drain a tick.
    pub fn pop_due(&mut self, now: u64) -> Option<Task> {
        if let Some(Reverse((due_tick, slot))) = self.heap.peek().copied() {
            if now >= due_tick {
                self.heap.pop();
                // "take" instead of "remove" keeps indices stable for the
                // remaining heap entries; leaves a placeholder behind
                let task = std::mem::take(&mut self.tasks[slot]);
                self.compact_if_needed();
                return Some(task);
            }
        }
        None
    }

    pub fn pending(&self) -> usize {
        self.heap.len()
    }

    /// Rebuild the slot storage when too many placeholders accumulate.
    fn compact_if_needed(&mut self) {
        let placeholder_count = self.tasks.iter().filter(|t| t.is_placeholder()).count();
        if placeholder_count > PLACEHOLDER_THRESHOLD {
            let old_tasks = std::mem::take(&mut self.tasks);
            let mut index_map = vec![0; old_tasks.len()];
            for (old_slot, task) in old_tasks.into_iter().enumerate() {
                if task.is_placeholder() {
                    continue;
                }
                let new_slot = self.tasks.len();
                index_map[old_slot] = new_slot;
                self.tasks.push(task);
            }
            let mut new_heap = BinaryHeap::with_capacity(self.heap.len());
            while let Some(Reverse((due_tick, old_slot))) = self.heap.pop() {
                new_heap.push(Reverse((due_tick, index_map[old_slot])));
            }
            self.heap = new_heap;
        }
    }
}

/// A blocking job an effect wants run off-thread.
pub type Job = Box<dyn FnOnce() -> Result<(), ExecError> + Send + 'static>;

struct WorkerJob {
    job: Job,
    cont: Continuation,
}

/// A finished job, posted back to the main thread.
pub struct WorkerDone {
    pub cont: Continuation,
    pub result: Result<(), ExecError>,
}

pub struct WorkerPool {
    job_tx: Option<Sender<WorkerJob>>,
    done_rx: Receiver<WorkerDone>,
    handles: Vec<JoinHandle<()>>,
    in_flight: usize,
}

impl WorkerPool {
    /// Spawn `workers` threads sharing one job queue.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let (job_tx, job_rx) = channel::<WorkerJob>();
        let (done_tx, done_rx) = channel::<WorkerDone>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let mut handles = Vec::with_capacity(workers);
        for n in 0..workers.max(1) {
            let job_rx = Arc::clone(&job_rx);
            let done_tx = done_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("schist-worker-{n}"))
                .spawn(move || {
                    loop {
                        let job = {
                            let guard = job_rx.lock().expect("worker queue lock poisoned");
                            guard.recv()
                        };
                        let Ok(WorkerJob { job, cont }) = job else {
                            break; // queue closed, pool is shutting down
                        };
                        let result = job();
                        if done_tx.send(WorkerDone { cont, result }).is_err() {
                            break;
                        }
                    }
                })
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }
        Self {
            job_tx: Some(job_tx),
            done_rx,
            handles,
            in_flight: 0,
        }
    }

    pub fn submit(&mut self, job: Job, cont: Continuation) {
        self.in_flight += 1;
        if let Some(tx) = &self.job_tx {
            if tx.send(WorkerJob { job, cont }).is_err() {
                warn!("worker pool is gone; dropping background job");
                self.in_flight -= 1;
            }
        }
    }

    /// Completions that have arrived since the last drain. Non-blocking.
    pub fn drain_done(&mut self) -> Vec<WorkerDone> {
        let mut done = Vec::new();
        while let Ok(item) = self.done_rx.try_recv() {
            self.in_flight -= 1;
            done.push(item);
        }
        done
    }

    /// Wait for every submitted job to finish and return all completions.
    /// Used by tests and shutdown; the tick loop uses [`Self::drain_done`].
    pub fn drain_blocking(&mut self, timeout: Duration) -> Vec<WorkerDone> {
        let mut done = self.drain_done();
        while self.in_flight > 0 {
            match self.done_rx.recv_timeout(timeout) {
                Ok(item) => {
                    self.in_flight -= 1;
                    done.push(item);
                },
                Err(RecvTimeoutError::Timeout) => {
                    warn!("timed out waiting for {} background job(s)", self.in_flight);
                    break;
                },
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        done
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the job channel lets the workers fall out of their loops.
        self.job_tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use schist_data::{EventSpec, GameEvent, PlayerId, SourceRef};

    use super::*;

    fn dummy_trigger() -> Arc<Trigger> {
        Arc::new(Trigger {
            name: "t".into(),
            event: EventSpec::Join,
            items: Vec::new(),
            source: SourceRef {
                script: "test.sk".into(),
                line: 1,
            },
        })
    }

    fn dummy_cont(tag: u64) -> Continuation {
        Continuation {
            trigger: dummy_trigger(),
            next: None,
            ctx: EventCtx::new(
                GameEvent::Join {
                    player: PlayerId::random(),
                },
                tag,
            ),
        }
    }

    fn tag_of(task: &Task) -> u64 {
        match task {
            Task::Resume(cont) => cont.ctx.execution,
            _ => panic!("expected a resume task"),
        }
    }

    #[test]
    fn same_tick_tasks_pop_in_scheduling_order() {
        let mut sched = Scheduler::new();
        for tag in 0..5 {
            sched.schedule_at(10, Task::Resume(dummy_cont(tag)));
        }
        for expected in 0..5 {
            let task = sched.pop_due(10).expect("task should be due");
            assert_eq!(tag_of(&task), expected);
        }
        assert!(sched.pop_due(10).is_none());
    }

    #[test]
    fn nothing_pops_before_its_tick() {
        let mut sched = Scheduler::new();
        sched.schedule_at(5, Task::Resume(dummy_cont(0)));
        assert!(sched.pop_due(4).is_none());
        assert!(sched.pop_due(5).is_some());
    }

    #[test]
    fn compaction_preserves_due_order() {
        let mut sched = Scheduler::new();
        // enough consumed slots to cross the test threshold of 4
        for tag in 0..6 {
            sched.schedule_at(1, Task::Resume(dummy_cont(tag)));
        }
        for _ in 0..6 {
            sched.pop_due(1).expect("due");
        }
        sched.schedule_at(3, Task::Resume(dummy_cont(30)));
        sched.schedule_at(2, Task::Resume(dummy_cont(20)));
        sched.schedule_at(3, Task::Resume(dummy_cont(31)));
        assert_eq!(tag_of(&sched.pop_due(5).unwrap()), 20);
        assert_eq!(tag_of(&sched.pop_due(5).unwrap()), 30);
        assert_eq!(tag_of(&sched.pop_due(5).unwrap()), 31);
    }

    #[test]
    fn worker_pool_posts_completions_back() {
        let mut pool = WorkerPool::new(2);
        for tag in 0..3 {
            pool.submit(Box::new(|| Ok(())), dummy_cont(tag));
        }
        let done = pool.drain_blocking(Duration::from_secs(5));
        assert_eq!(done.len(), 3);
        assert!(done.iter().all(|d| d.result.is_ok()));
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn worker_errors_travel_with_the_continuation() {
        let mut pool = WorkerPool::new(1);
        pool.submit(
            Box::new(|| Err(ExecError::BadPath("../etc/passwd".into()))),
            dummy_cont(7),
        );
        let done = pool.drain_blocking(Duration::from_secs(5));
        assert_eq!(done.len(), 1);
        assert!(done[0].result.is_err());
        assert_eq!(done[0].cont.ctx.execution, 7);
    }
}
