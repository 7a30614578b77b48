// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info};

use super::engine::{LoadReport, SamplerHandle};
use super::error::SamplerError;

/// A sample to load in the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadRequest {
    /// A file path.
    File(PathBuf),
    /// A name resolved against the samples directory.
    Named(String),
}

impl LoadRequest {
    fn label(&self) -> String {
        match self {
            LoadRequest::File(path) => path.to_string_lossy().to_string(),
            LoadRequest::Named(name) => name.clone(),
        }
    }
}

/// The outcome of one request.
#[derive(Debug)]
pub struct LoadOutcome {
    pub request: LoadRequest,
    pub result: Result<LoadReport, SamplerError>,
}

/// Loads samples on a dedicated thread so the UI never blocks on decoding.
/// Requests queued behind the one being decoded are coalesced: only the most
/// recent is loaded, the rest are reported as superseded.
pub struct LoadWorker {
    requests: Option<Sender<LoadRequest>>,
    outcomes: Receiver<LoadOutcome>,
    join_handle: Option<JoinHandle<()>>,
}

impl LoadWorker {
    pub fn start(handle: SamplerHandle) -> Result<LoadWorker, SamplerError> {
        let (request_tx, request_rx) = unbounded::<LoadRequest>();
        let (outcome_tx, outcome_rx) = unbounded::<LoadOutcome>();

        let join_handle = thread::Builder::new()
            .name("sample-loader".to_string())
            .spawn(move || Self::run(handle, request_rx, outcome_tx))
            .map_err(|e| {
                error!(err = %e, "Unable to start sample loader thread");
                SamplerError::LoaderGone
            })?;

        Ok(LoadWorker {
            requests: Some(request_tx),
            outcomes: outcome_rx,
            join_handle: Some(join_handle),
        })
    }

    fn run(handle: SamplerHandle, requests: Receiver<LoadRequest>, outcomes: Sender<LoadOutcome>) {
        info!("Sample loader started");
        while let Ok(mut request) = requests.recv() {
            for newer in requests.try_iter() {
                let stale = std::mem::replace(&mut request, newer);
                debug!(request = ?stale, "Coalescing queued load");
                let outcome = LoadOutcome {
                    result: Err(SamplerError::Superseded(stale.label())),
                    request: stale,
                };
                if outcomes.send(outcome).is_err() {
                    return;
                }
            }

            let result = match &request {
                LoadRequest::File(path) => handle.load_sample(path),
                LoadRequest::Named(name) => handle.load_named(name),
            };
            handle.collect();
            if outcomes.send(LoadOutcome { request, result }).is_err() {
                return;
            }
        }
        info!("Sample loader stopped");
    }

    /// Queues a load.
    pub fn request(&self, request: LoadRequest) -> Result<(), SamplerError> {
        self.requests
            .as_ref()
            .ok_or(SamplerError::LoaderGone)?
            .send(request)
            .map_err(|_| SamplerError::LoaderGone)
    }

    /// Outcomes in completion order.
    pub fn outcomes(&self) -> &Receiver<LoadOutcome> {
        &self.outcomes
    }
}

impl Drop for LoadWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the loop once the current load finishes.
        self.requests.take();
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                error!("Error joining sample loader thread");
            }
        }
    }
}
