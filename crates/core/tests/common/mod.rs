//! Shared helpers for integration tests: local engine mirrors.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};

use extractor_core::testing::fixtures::ENGINE_MANIFEST;

/// Size of the fake engine payload.
pub const PAYLOAD_SIZE: usize = 256 * 1024;

/// How a mirror answers.
#[derive(Debug, Clone, Copy)]
pub enum MirrorBehavior {
    /// Serves both assets.
    Healthy,
    /// Answers 404 for both assets.
    Missing,
    /// Serves the module but never finishes the payload.
    Hanging,
}

/// A mirror served from a local axum server.
pub struct Mirror {
    /// Base URL to put in `engine.mirrors`.
    pub base: String,
    module_hits: Arc<AtomicUsize>,
    payload_hits: Arc<AtomicUsize>,
}

impl Mirror {
    pub async fn start(behavior: MirrorBehavior) -> Self {
        let module_hits = Arc::new(AtomicUsize::new(0));
        let payload_hits = Arc::new(AtomicUsize::new(0));

        let module_counter = Arc::clone(&module_hits);
        let payload_counter = Arc::clone(&payload_hits);
        let router = Router::new()
            .route(
                "/engine/engine.toml",
                get(move || {
                    let hits = Arc::clone(&module_counter);
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        match behavior {
                            MirrorBehavior::Missing => Err(StatusCode::NOT_FOUND),
                            _ => Ok(ENGINE_MANIFEST),
                        }
                    }
                }),
            )
            .route(
                "/engine/ffmpeg",
                get(move || {
                    let hits = Arc::clone(&payload_counter);
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        match behavior {
                            MirrorBehavior::Healthy => Ok(vec![0x7fu8; PAYLOAD_SIZE]),
                            MirrorBehavior::Missing => Err(StatusCode::NOT_FOUND),
                            MirrorBehavior::Hanging => {
                                tokio::time::sleep(Duration::from_secs(30)).await;
                                Ok(Vec::new())
                            }
                        }
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base: format!("http://{}/engine", addr),
            module_hits,
            payload_hits,
        }
    }

    pub fn module_hits(&self) -> usize {
        self.module_hits.load(Ordering::SeqCst)
    }

    pub fn payload_hits(&self) -> usize {
        self.payload_hits.load(Ordering::SeqCst)
    }
}

/// A base URL nothing listens on.
pub async fn unreachable_mirror() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/engine", addr)
}
