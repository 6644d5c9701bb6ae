use std::{
    io::ErrorKind,
    net::SocketAddr,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use axum::{
    extract::{Path as AxumPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use crossbeam_channel::bounded;
use miette::{miette, Context, IntoDiagnostic, Result};
use tracing::{debug, error, info, warn};

/// Route prefix under which downloaded files are served
pub const VIDEOS_ROUTE: &str = "videos";

/// Build the public URL of a downloaded file.
///
/// This is plain string building: nothing checks that `base_url` actually
/// points to this file server.
pub fn public_url(base_url: &str, filename: &str) -> String {
    format!(
        "{}/{VIDEOS_ROUTE}/{filename}",
        base_url.trim_end_matches('/')
    )
}

/// Router serving `GET /videos/<filename>` from the given directory
pub fn router(root: PathBuf) -> Router {
    Router::new()
        .route("/videos/:filename", get(serve_video))
        .with_state(Arc::new(root))
}

async fn serve_video(
    State(root): State<Arc<PathBuf>>,
    AxumPath(filename): AxumPath<String>,
) -> Response {
    let Some(target) = resolve_file(&root, &filename) else {
        warn!("Refusing to serve {filename:?}");
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::fs::read(&target).await {
        Ok(bytes) => {
            debug!("Serving {} ({} bytes)", target.display(), bytes.len());
            ([(header::CONTENT_TYPE, content_type(&target))], bytes).into_response()
        }
        Err(err) if err.kind() == ErrorKind::NotFound || !target.is_file() => {
            StatusCode::NOT_FOUND.into_response()
        }
        Err(err) => {
            error!("Could not read {}: {err}", target.display());
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Only accept a plain file name, directly inside the root
fn resolve_file(root: &Path, filename: &str) -> Option<PathBuf> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => Some(root.join(name)),
        _ => None,
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Start the file server on its own thread, for the lifetime of the process.
///
/// Return once the listener is bound, with the bound address.
pub fn spawn(root: PathBuf, bind: SocketAddr) -> Result<SocketAddr> {
    let (send, receive) = bounded(1);

    std::thread::Builder::new()
        .name("file-server".to_owned())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(err) => {
                    let _ = send.send(Err(err.to_string()));
                    return;
                }
            };

            runtime.block_on(async move {
                let listener = match tokio::net::TcpListener::bind(bind).await {
                    Ok(listener) => listener,
                    Err(err) => {
                        let _ = send.send(Err(format!("Could not bind {bind}: {err}")));
                        return;
                    }
                };
                let local = listener.local_addr().unwrap_or(bind);
                let _ = send.send(Ok(local));

                if let Err(err) = axum::serve(listener, router(root)).await {
                    error!("File server stopped: {err}");
                }
            });
        })
        .into_diagnostic()
        .wrap_err("Could not spawn file server thread")?;

    let addr = receive
        .recv()
        .into_diagnostic()
        .wrap_err("File server thread exited during startup")?
        .map_err(|err| miette!("Could not start file server: {err}"))?;

    info!("Serving downloads on http://{addr}/{VIDEOS_ROUTE}/");
    Ok(addr)
}
