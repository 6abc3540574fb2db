use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::model::AllocationModel;
use crate::summary::Summary;
use crate::trace::TraceData;

/// Progress of a load, in the order a [`Loader`] sends them.
#[derive(Debug)]
pub enum LoadEvent {
    /// The data is about to be replaced. Every index handed out so far is stale from here on.
    BeginReset,
    /// The new data is complete. After a failed load this is an empty aggregate.
    EndReset(Arc<TraceData>),
    /// The load succeeded.
    DataReady(Summary),
    /// The load failed.
    Failed(io::Error),
}

/// Reads trace files on a background thread.
///
/// Every load sends a [`LoadEvent::BeginReset`] before anything else, then exactly one
/// [`LoadEvent::EndReset`], and finally either [`LoadEvent::DataReady`] or
/// [`LoadEvent::Failed`]. The reset bracket is completed even if the load fails, so a view
/// waiting for it never gets stuck. Loads cannot be cancelled.
///
/// Each load reports on a channel of its own. Starting a load drops whatever the previous one
/// has not delivered yet.
#[derive(Debug)]
pub struct Loader {
    receiver: Receiver<LoadEvent>,
}

impl Default for Loader {
    fn default() -> Self {
        // no load in flight, so nobody is left to send
        let (_, receiver) = crossbeam_channel::unbounded();
        Self { receiver }
    }
}

impl Loader {
    /// Creates a loader with no load in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// The events of the most recently started load.
    pub fn events(&self) -> &Receiver<LoadEvent> {
        &self.receiver
    }

    /// Starts reading `path` on a new thread.
    pub fn load_file<P>(&mut self, path: P) -> io::Result<thread::JoinHandle<()>>
    where
        P: Into<PathBuf>,
    {
        let path = path.into();
        let (sender, receiver) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name("heapscope-loader".to_string())
            .spawn(move || load(&path, &sender))?;
        self.receiver = receiver;
        Ok(handle)
    }

    /// Applies the events of the current load to `model` as they arrive, and returns how the
    /// load went.
    ///
    /// This blocks until the load started last with [`Loader::load_file`] completes. If there
    /// is no load, or its thread died before finishing, an error is returned.
    pub fn wait(&self, model: &mut AllocationModel) -> io::Result<Summary> {
        for event in self.receiver.iter() {
            match event {
                LoadEvent::BeginReset => model.begin_reset(),
                LoadEvent::EndReset(data) => model.end_reset(data),
                LoadEvent::DataReady(summary) => return Ok(summary),
                LoadEvent::Failed(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "loader exited before finishing the load",
        ))
    }
}

fn load(path: &Path, sender: &Sender<LoadEvent>) {
    // Sending only fails once the receiving side is gone, and then nobody is waiting for us.
    let _ = sender.send(LoadEvent::BeginReset);
    info!("Loading {}", path.display());
    match TraceData::read_file(path) {
        Ok(data) => {
            let summary = Summary::from(&data);
            info!(
                "Loaded {} allocation sites from {}",
                data.merged_allocations().len(),
                path.display()
            );
            let _ = sender.send(LoadEvent::EndReset(Arc::new(data)));
            let _ = sender.send(LoadEvent::DataReady(summary));
        }
        Err(e) => {
            error!("Failed to load {}: {}", path.display(), e);
            let _ = sender.send(LoadEvent::EndReset(Arc::new(TraceData::default())));
            let _ = sender.send(LoadEvent::Failed(e));
        }
    }
}
