//! Tokio runtime shared by the session worker, the event router and sends.

use anyhow::Context;
use tokio::runtime::{Builder, Runtime};

const BACKEND_WORKER_THREADS: usize = 2;

pub fn build_runtime() -> anyhow::Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(BACKEND_WORKER_THREADS)
        .thread_name("backend-runtime")
        .enable_all()
        .build()
        .context("failed to build backend runtime")
}
