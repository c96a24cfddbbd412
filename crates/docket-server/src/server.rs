//! The serving loop.
//!
//! Event-serial: one request is read, answered (inline for blocking
//! commands and cache hits, via a worker thread otherwise), and only then
//! is the next request accepted. The loop alone touches the cache and
//! performs store writes, so cache and store mutations are totally
//! ordered: there is exactly one mutator.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use docket_cache::{ResponseCache, MAX_KEYWORD_BYTES};
use docket_proto::transport::{self, Endpoints};
use docket_proto::{
    command, error_response, first_str, opcode, CommandSpec, ProtoError, Request, Response, Status,
};
use docket_store::RecordStore;

use crate::dispatch::dispatch;
use crate::error::ServerError;
use crate::handlers::{Outcome, ServerContext};

const STORE_FILE: &str = "index.bin";
const CACHE_FILE: &str = "cache_lru.bin";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding document body files.
    pub docroot: PathBuf,
    /// Maximum number of cached search responses.
    pub cache_capacity: usize,
    /// Directory for the FIFO endpoints.
    pub runtime_dir: PathBuf,
    /// Directory for the store file and the cache image.
    pub data_dir: PathBuf,
}

impl ServerConfig {
    pub fn new(docroot: impl Into<PathBuf>, cache_capacity: usize) -> Self {
        Self {
            docroot: docroot.into(),
            cache_capacity,
            runtime_dir: PathBuf::from("/tmp"),
            data_dir: PathBuf::from("tmp"),
        }
    }
}

pub struct Server {
    ctx: ServerContext,
    cache: ResponseCache,
    cache_path: PathBuf,
    endpoints: Endpoints,
    request_fifo: File,
    workers: Vec<JoinHandle<()>>,
    workers_spawned: u64,
}

impl Server {
    /// Open the store, load the cache image, and claim the request FIFO.
    pub fn start(config: ServerConfig) -> Result<Self, ServerError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = RecordStore::open(config.data_dir.join(STORE_FILE))?;
        let cache_path = config.data_dir.join(CACHE_FILE);
        let cache = ResponseCache::load(&cache_path, config.cache_capacity);

        let endpoints = Endpoints::new(&config.runtime_dir);
        let request_path = endpoints.request_path();
        transport::create_fifo(&request_path)?;
        let request_fifo = transport::open_owned(&request_path)?;

        tracing::info!(
            target = "docket.server",
            docroot = %config.docroot.display(),
            endpoint = %request_path.display(),
            cache_capacity = config.cache_capacity,
            cache_warm = cache.len(),
            "server ready"
        );

        Ok(Self {
            ctx: ServerContext {
                store: Arc::new(store),
                docroot: config.docroot,
            },
            cache,
            cache_path,
            endpoints,
            request_fifo,
            workers: Vec::new(),
            workers_spawned: 0,
        })
    }

    /// Worker threads spawned so far; cache hits and blocking commands
    /// spawn none.
    pub fn workers_spawned(&self) -> u64 {
        self.workers_spawned
    }

    /// Serve until a handler requests shutdown, then drain and persist.
    pub fn run(&mut self) -> Result<(), ServerError> {
        loop {
            self.reap_workers();

            let frame = match transport::read_request_frame(&mut self.request_fifo) {
                Ok(frame) => frame,
                Err(ProtoError::Io(err)) => {
                    tracing::error!(target = "docket.server", error = %err, "request endpoint read failed");
                    return Err(ProtoError::Io(err).into());
                }
                Err(err) => {
                    tracing::warn!(target = "docket.server", error = %err, "malformed request frame dropped");
                    continue;
                }
            };

            let (req_opcode, pid, payload) = match Request::parse(&frame) {
                Ok(req) => (req.opcode, req.pid, req.payload.to_vec()),
                Err(err) => {
                    tracing::warn!(target = "docket.server", error = %err, "unparseable request dropped");
                    continue;
                }
            };

            let Some(spec) = command::by_opcode(req_opcode) else {
                tracing::debug!(target = "docket.server", opcode = req_opcode, "unknown opcode dropped");
                continue;
            };

            if spec.blocking {
                if self.handle_blocking(spec, pid, &payload) {
                    break;
                }
                continue;
            }

            self.handle_nonblocking(spec, pid, payload);
        }

        self.drain()
    }

    /// Run a blocking command in the loop. Returns true on shutdown.
    fn handle_blocking(&mut self, spec: &'static CommandSpec, pid: i32, payload: &[u8]) -> bool {
        match dispatch(&self.ctx, spec, payload) {
            Ok(Outcome::Reply(rsp)) => {
                self.reply(pid, &rsp);
                false
            }
            Ok(Outcome::Shutdown(rsp)) => {
                self.reply(pid, &rsp);
                true
            }
            Err(err) => {
                tracing::debug!(target = "docket.server", flag = spec.flag, error = %err, "command failed");
                self.reply(pid, &error_response(spec.opcode));
                false
            }
        }
    }

    fn handle_nonblocking(&mut self, spec: &'static CommandSpec, pid: i32, payload: Vec<u8>) {
        // Search consults the cache before any worker is spawned.
        let keyword = (spec.opcode == opcode::SEARCH)
            .then(|| first_str(&payload, MAX_KEYWORD_BYTES).ok().map(<[u8]>::to_vec))
            .flatten();

        if let Some(kw) = keyword.as_deref() {
            if let Some(rsp) = self.cache.get(kw) {
                tracing::debug!(target = "docket.server", "search served from cache");
                self.reply(pid, &rsp);
                return;
            }
        }

        let Some(rsp) = self.spawn_worker(spec, payload) else {
            // No response frame ever arrived; the client times out.
            return;
        };

        if let Some(kw) = keyword {
            if matches!(Response::parse(&rsp), Ok(parsed) if parsed.status == Status::Ok) {
                self.cache.put(&kw, rsp.clone());
            }
        }
        self.reply(pid, &rsp);
    }

    /// Run the dispatcher in a worker thread and synchronously collect its
    /// response frame. The worker converts any failure into the `ERR`
    /// fallback, so a missing frame means the worker itself died.
    fn spawn_worker(&mut self, spec: &'static CommandSpec, payload: Vec<u8>) -> Option<Vec<u8>> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let ctx = self.ctx.clone();

        let spawned = std::thread::Builder::new()
            .name(format!("docket-worker{}", spec.flag))
            .spawn(move || {
                let rsp = match dispatch(&ctx, spec, &payload) {
                    Ok(Outcome::Reply(frame)) | Ok(Outcome::Shutdown(frame)) => frame,
                    Err(err) => {
                        tracing::debug!(target = "docket.server", flag = spec.flag, error = %err, "worker command failed");
                        error_response(spec.opcode)
                    }
                };
                let _ = tx.send(rsp);
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(target = "docket.server", error = %err, "worker spawn failed; request dropped");
                return None;
            }
        };
        self.workers_spawned += 1;
        self.workers.push(handle);

        match rx.recv() {
            Ok(rsp) => Some(rsp),
            Err(_) => {
                tracing::warn!(target = "docket.server", flag = spec.flag, "worker exited without a response");
                None
            }
        }
    }

    fn reply(&self, pid: i32, frame: &[u8]) {
        let path = self.endpoints.reply_path(pid);
        let mut fifo = match transport::open_reply(&path) {
            Ok(fifo) => fifo,
            Err(err) => {
                tracing::warn!(
                    target = "docket.server",
                    pid,
                    error = %err,
                    "reply endpoint unavailable; client assumed gone"
                );
                return;
            }
        };
        if let Err(err) = transport::write_frame(&mut fifo, frame) {
            tracing::warn!(target = "docket.server", pid, error = %err, "reply write failed");
        }
    }

    /// Collect finished workers without waiting on the live ones.
    fn reap_workers(&mut self) {
        let mut pending = Vec::with_capacity(self.workers.len());
        for handle in self.workers.drain(..) {
            if handle.is_finished() {
                if handle.join().is_err() {
                    tracing::error!(target = "docket.server", "worker thread panicked");
                }
            } else {
                pending.push(handle);
            }
        }
        self.workers = pending;
    }

    fn drain(&mut self) -> Result<(), ServerError> {
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!(target = "docket.server", "worker thread panicked");
            }
        }
        if let Err(err) = self.cache.persist(&self.cache_path) {
            tracing::error!(target = "docket.server", error = %err, "cache persistence failed");
        }
        transport::remove_endpoint(&self.endpoints.request_path());
        tracing::info!(
            target = "docket.server",
            workers_spawned = self.workers_spawned,
            cached = self.cache.len(),
            "server drained"
        );
        Ok(())
    }
}
