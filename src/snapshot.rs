//! Short-lived viewer for diagnostic screenshots: an in-memory page pair
//! served on an ephemeral port until the image has been fetched once.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use tokio::sync::Notify;

use crate::error::Result;

const VIEWER_HTML: &str = r#"<!doctype html>
<html>
	<head>
		<title>drover snapshot</title>
		<link rel="icon" href="data:;base64,iVBORw0KGgo=">
	</head>
	<body>
		<img src="snap.png" style="width:800px" alt="snap.png">
	</body>
</html>
"#;

#[derive(Clone)]
struct Viewer {
    png: Arc<Vec<u8>>,
    served: Arc<Notify>,
}

/// Serves `png` plus the viewer page on a fresh ephemeral port, blocking
/// until the image has been fetched once, then shuts the listener down
/// gracefully.
pub(crate) async fn serve(png: Vec<u8>) -> Result<()> {
    let (addr, server) = bind(png).await?;
    tracing::info!("serving snapshot at http://localhost:{}/", addr.port());
    server.await
}

pub(crate) async fn bind(png: Vec<u8>) -> Result<(SocketAddr, impl Future<Output = Result<()>>)> {
    let viewer = Viewer {
        png: Arc::new(png),
        served: Arc::new(Notify::new()),
    };
    let served = viewer.served.clone();

    let app = Router::new()
        .route("/", get(index))
        .route("/index.html", get(index))
        .route("/snap.png", get(image))
        .with_state(viewer);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { served.notified().await })
            .await?;
        Ok(())
    };
    Ok((addr, server))
}

async fn index() -> Html<&'static str> {
    Html(VIEWER_HTML)
}

async fn image(State(viewer): State<Viewer>) -> impl IntoResponse {
    viewer.served.notify_one();
    (
        [(header::CONTENT_TYPE, "image/png")],
        viewer.png.as_ref().clone(),
    )
}
