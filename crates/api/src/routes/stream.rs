//! Live view: index page and MJPEG stream

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{Html, IntoResponse},
};
use camera_capture::mjpeg;
use futures::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info};

use crate::AppState;

/// Counts a streaming client for as long as it is held
struct ClientGuard(Arc<AtomicUsize>);

impl ClientGuard {
    fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count)
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
        debug!("Streaming client disconnected");
    }
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Drowsiness Monitor</title>
  <style>
    body { background: #111; color: #eee; font-family: sans-serif; text-align: center; }
    img { max-width: 100%; border: 2px solid #333; }
    #status { margin-top: 1em; font-size: 1.2em; }
  </style>
</head>
<body>
  <h1>Drowsiness Monitor</h1>
  <img src="/video_feed" alt="Live camera feed">
  <div id="status">Waiting for frames...</div>
  <script>
    async function poll() {
      try {
        const res = await fetch('/api/v1/status');
        const body = await res.json();
        const a = body.analysis;
        if (!a) return;
        const alert = a.face_detected ? a.state.current_alert : 'no face';
        const s = a.signals;
        document.getElementById('status').textContent = s
          ? `EAR ${s.avg_ear.toFixed(2)}  MAR ${s.mar.toFixed(2)}  alert: ${alert}`
          : `alert: ${alert}`;
      } catch (e) {}
    }
    setInterval(poll, 500);
  </script>
</body>
</html>
"#;

/// Index page embedding the stream
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Annotated frames as `multipart/x-mixed-replace`.
///
/// The body ends when the pipeline stops or the server shuts down.
pub async fn video_feed(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("Streaming client connected");
    let guard = ClientGuard::new(state.streaming_clients.clone());
    let mut shutdown = state.shutdown.clone();
    let stopped = async move {
        let _guard = guard;
        // A dropped sender also means shutdown
        let _ = shutdown.wait_for(|stop| *stop).await;
    };

    let frames = BroadcastStream::new(state.handles.frames.subscribe())
        .filter_map(|item| async move {
            match item {
                Ok(part) => Some(Ok::<_, Infallible>(part)),
                Err(e) => {
                    // Slow client: drop frames rather than stall the pipeline
                    debug!("Streaming client behind: {}", e);
                    None
                }
            }
        })
        .take_until(stopped);

    (
        [
            (header::CONTENT_TYPE, mjpeg::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
}
