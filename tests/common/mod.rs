//! axum fixture server for fetch tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub body: String,
    pub etag: Option<String>,
    pub delay: Option<Duration>,
}

impl Route {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            etag: None,
            delay: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
            etag: None,
            delay: None,
        }
    }

    pub fn with_etag(mut self, etag: &str) -> Self {
        self.etag = Some(etag.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A request as the server saw it; header names are lowercase.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub headers: HashMap<String, String>,
}

/// State shared between the router and test code.
#[derive(Default)]
struct FixtureState {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<Recorded>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Handle to the running fixture server.
pub struct FixtureServer {
    base: String,
    state: Arc<FixtureState>,
}

impl FixtureServer {
    /// Start on a random local port. Returns once the server is listening.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(FixtureState::default());

        let app = Router::new().fallback(serve_route).with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base, state }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Register `route` at `path` and return its full URL.
    pub fn route(&self, path: &str, route: Route) -> String {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert(path.to_string(), route);
        self.url(path)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    /// Highest number of requests handled at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Route handler
// ---------------------------------------------------------------------------

async fn serve_route(
    State(state): State<Arc<FixtureState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let path = uri.path().to_string();
    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak.fetch_max(now, Ordering::SeqCst);

    state.requests.lock().unwrap().push(Recorded {
        path: path.clone(),
        headers: headers
            .iter()
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
            .collect(),
    });
    let route = state
        .routes
        .lock()
        .unwrap()
        .get(&path)
        .cloned()
        .unwrap_or_else(|| Route::status(404));

    if let Some(delay) = route.delay {
        tokio::time::sleep(delay).await;
    }

    let not_modified = match (&route.etag, headers.get(header::IF_NONE_MATCH)) {
        (Some(etag), Some(sent)) => sent.as_bytes() == etag.as_bytes(),
        _ => false,
    };
    let mut response = if not_modified {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        let status = StatusCode::from_u16(route.status).unwrap();
        (
            status,
            [(header::CONTENT_TYPE, "application/rss+xml")],
            route.body,
        )
            .into_response()
    };
    if let Some(etag) = &route.etag {
        response
            .headers_mut()
            .insert(header::ETAG, HeaderValue::from_str(etag).unwrap());
    }

    state.in_flight.fetch_sub(1, Ordering::SeqCst);
    response
}

/// Render an RSS 2.0 document; items are `(guid, title, pubDate)`.
pub fn rss(title: &str, items: &[(&str, &str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(guid, title, date)| {
            format!(
                "<item><title>{title}</title><link>https://example.com/{guid}</link>\
                 <guid>{guid}</guid><pubDate>{date}</pubDate></item>"
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>{title}</title>\
         <link>https://example.com/</link><description>fixture</description>{items}</channel></rss>"
    )
}
