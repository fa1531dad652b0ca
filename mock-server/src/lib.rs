use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{
        header::{CONTENT_RANGE, CONTENT_TYPE, RANGE},
        HeaderMap, Method, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::debug;

/// Payload served by `/download`, sliced by `Range`.
pub const DOWNLOAD: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

pub const PAGE_SIZE: u32 = 3;

/// Largest body `/bytes/{len}` will produce.
pub const MAX_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: u32,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub cur_page: u32,
    pub datas: Vec<Article>,
}

/// What the server saw, returned by every `/echo` route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Lowercased header name to every value received, in order.
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

#[derive(Deserialize)]
pub struct ArticleQuery {
    pub k: String,
}

#[derive(Clone, Default)]
pub struct AppState {
    pub hits: Arc<AtomicU64>,
}

pub fn app() -> Router {
    app_with_state(AppState::default())
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/echo/{*rest}", any(echo))
        .route("/article/list/{page}/json", get(list_articles))
        .route("/article/query/{page}/json", post(query_articles))
        .route("/article/top/json", get(top_articles))
        .route("/xml/echo", post(xml_echo))
        .route("/download", get(download))
        .route("/bytes/{len}", get(bytes_of_len))
        .route("/counter", get(counter))
        .route("/status/{code}", any(status))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn articles(page: u32, title: impl Fn(u32) -> String) -> Vec<Article> {
    (0..PAGE_SIZE)
        .map(|i| {
            let id = page * 10 + i;
            Article { id, title: title(id) }
        })
        .collect()
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let mut seen: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &headers {
        seen.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    debug!(%method, %uri, "echo");
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: seen,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn list_articles(Path(page): Path<u32>) -> Json<Page> {
    Json(Page {
        cur_page: page,
        datas: articles(page, |id| format!("article {id}")),
    })
}

async fn query_articles(Path(page): Path<u32>, Form(query): Form<ArticleQuery>) -> Json<Page> {
    Json(Page {
        cur_page: page,
        datas: articles(page, |id| format!("{} {id}", query.k)),
    })
}

async fn top_articles() -> Json<Vec<Article>> {
    Json(articles(0, |id| format!("top {id}")))
}

async fn xml_echo(body: Bytes) -> impl IntoResponse {
    ([(CONTENT_TYPE, "application/xml; charset=utf-8")], body)
}

async fn download(headers: HeaderMap) -> Response {
    let Some(range) = headers.get(RANGE).and_then(|v| v.to_str().ok()) else {
        return (StatusCode::OK, DOWNLOAD).into_response();
    };
    match parse_range(range, DOWNLOAD.len()) {
        Some((start, end)) => (
            StatusCode::PARTIAL_CONTENT,
            [(CONTENT_RANGE, format!("bytes {start}-{end}/{}", DOWNLOAD.len()))],
            &DOWNLOAD[start..=end],
        )
            .into_response(),
        None => StatusCode::RANGE_NOT_SATISFIABLE.into_response(),
    }
}

/// `bytes=start-[end]` to an inclusive index range within `len`.
pub fn parse_range(header: &str, len: usize) -> Option<(usize, usize)> {
    let (start, end) = header.trim().strip_prefix("bytes=")?.split_once('-')?;
    let start: usize = start.trim().parse().ok()?;
    let last = len.checked_sub(1)?;
    let end = match end.trim() {
        "" => last,
        end => end.parse::<usize>().ok()?.min(last),
    };
    (start <= end).then_some((start, end))
}

async fn bytes_of_len(Path(len): Path<usize>) -> Result<Vec<u8>, StatusCode> {
    if len > MAX_BYTES {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }
    Ok(vec![b'x'; len])
}

async fn counter(State(state): State<AppState>) -> String {
    let n = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
    n.to_string()
}

async fn status(Path(code): Path<u16>) -> (StatusCode, String) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, format!("status {}", status.as_u16()))
}
