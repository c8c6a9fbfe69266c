// Copyright (c) 2024 Mike Tsao

//! A small fixed-size pool of worker threads for work that doesn't belong on
//! the audio thread.

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::{sync::Arc, thread::JoinHandle};

/// A unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs [Task]s on a fixed number of threads. Workers take tasks one at a
/// time, in the order they were added.
#[derive(Debug)]
pub struct Pool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}
impl Default for Pool {
    fn default() -> Self {
        Self::new(0)
    }
}
impl Pool {
    /// How many tasks can wait before [Pool::add_work()] starts running them
    /// on the caller's thread.
    pub const MAX_PENDING: usize = 1024;

    /// Starts `thread_count` workers. A pool with zero threads runs every task
    /// inline.
    pub fn new(thread_count: usize) -> Self {
        if thread_count == 0 {
            return Self {
                sender: None,
                workers: Vec::default(),
            };
        }
        let (sender, receiver) = bounded::<Task>(Self::MAX_PENDING);
        let receiver = Arc::new(Mutex::new(receiver));
        let workers: Vec<JoinHandle<()>> = (0..thread_count)
            .filter_map(|i| {
                let receiver = Arc::clone(&receiver);
                match std::thread::Builder::new()
                    .name(format!("voicebox-pool-{i}"))
                    .spawn(move || Self::run(&receiver))
                {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        log::warn!("couldn't start pool worker {i}: {e}");
                        None
                    }
                }
            })
            .collect();
        log::debug!("started a pool of {} workers", workers.len());
        Self {
            sender: if workers.is_empty() {
                None
            } else {
                Some(sender)
            },
            workers,
        }
    }

    fn run(receiver: &Mutex<Receiver<Task>>) {
        loop {
            let task = receiver.lock().recv();
            match task {
                Ok(task) => task(),
                Err(_) => break,
            }
        }
    }

    /// Schedules `task`. Runs it right away on this thread if the pool has no
    /// workers or its queue is full.
    pub fn add_work(&self, task: Task) {
        let Some(sender) = self.sender.as_ref() else {
            task();
            return;
        };
        match sender.try_send(task) {
            Ok(()) => {}
            Err(TrySendError::Full(task)) | Err(TrySendError::Disconnected(task)) => task(),
        }
    }

    /// Number of worker threads.
    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }
}
impl Drop for Pool {
    fn drop(&mut self) {
        // Workers finish whatever is queued, then see the closed channel.
        self.sender = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::warn!("a pool worker panicked");
            }
        }
    }
}
