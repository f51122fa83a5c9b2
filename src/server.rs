/// HTTP server exposing the dataframe endpoints
///
/// Every route locks the one shared [`Session`]. Mutating routes enqueue
/// their modification, run the trigger and answer with every modification
/// the trigger propagated.
use actix_web::http::StatusCode;
use actix_web::{middleware, web, App, HttpResponse, HttpServer, ResponseError};
use serde::Deserialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::ServerConfig;
use crate::endpoints::{self, EditRequest, RemoveRowRequest, RowsRequest, SchemaRequest};
use crate::error::{ErrorKind, FrameError};
use crate::frame::{DataFrame, FrameId};
use crate::graph::Session;

/// Shared server state
pub struct AppState {
    session: Mutex<Session>,
    config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        AppState::with_session(config, Session::new())
    }

    /// Serve an existing session, e.g. one with reactions already registered.
    pub fn with_session(config: ServerConfig, session: Session) -> Self {
        AppState {
            session: Mutex::new(session),
            config,
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        // A panicking handler leaves the session as it was; keep serving it
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResponseError for FrameError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Reaction => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "type": "Error",
            "message": self.to_string(),
        }))
    }
}

type Handled = Result<HttpResponse, FrameError>;

#[derive(Debug, Deserialize)]
struct CreateFrameRequest {
    records: Vec<serde_json::Value>,
    #[serde(default)]
    backend: Option<String>,
    #[serde(default)]
    primary_key: Option<String>,
}

/// Health check endpoint
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "message": "LiveFrame server is running"
    }))
}

async fn create_frame(state: web::Data<AppState>, body: web::Json<CreateFrameRequest>) -> Handled {
    let request = body.into_inner();
    let backend = request
        .backend
        .as_deref()
        .unwrap_or(state.config.backend_selector());
    let mut df = DataFrame::from_records(&request.records, Some(backend))?;
    if let Some(pk) = &request.primary_key {
        df = df.with_primary_key(pk)?;
    }
    let response = endpoints::schema(&df, &SchemaRequest::default())?;

    let mut session = state.session();
    let id = session.workspace.insert_frame(df);
    log::info!("created {} with {} rows", id, response.nrows);
    Ok(HttpResponse::Created().json(response))
}

async fn schema(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<SchemaRequest>,
) -> Handled {
    let id: FrameId = path.parse()?;
    let session = state.session();
    let response = endpoints::schema(session.workspace.frame(id)?, &body)?;
    Ok(HttpResponse::Ok().json(response))
}

async fn rows(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<RowsRequest>,
) -> Handled {
    let id: FrameId = path.parse()?;
    let session = state.session();
    let response = endpoints::rows(session.workspace.frame(id)?, &body)?;
    Ok(HttpResponse::Ok().json(response))
}

async fn remove_row_by_index(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<RemoveRowRequest>,
) -> Handled {
    let id: FrameId = path.parse()?;
    let mut session = state.session();
    let Session { workspace, queue, .. } = &mut *session;
    endpoints::remove_row_by_index(workspace.frame_mut(id)?, queue, &body)?;
    Ok(HttpResponse::Ok().json(session.trigger()?))
}

async fn edit(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<EditRequest>,
) -> Handled {
    let id: FrameId = path.parse()?;
    let mut session = state.session();
    let Session { workspace, queue, .. } = &mut *session;
    endpoints::edit(workspace.frame_mut(id)?, queue, &body)?;
    Ok(HttpResponse::Ok().json(session.trigger()?))
}

async fn trigger(state: web::Data<AppState>) -> Handled {
    let modifications = state.session().trigger()?;
    Ok(HttpResponse::Ok().json(modifications))
}

/// Register every route on an app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/trigger/", web::post().to(trigger))
        .service(
            web::scope("/df")
                .route("/", web::post().to(create_frame))
                .route("/{df}/schema/", web::post().to(schema))
                .route("/{df}/rows/", web::post().to(rows))
                .route("/{df}/remove_row_by_index/", web::post().to(remove_row_by_index))
                .route("/{df}/edit/", web::post().to(edit)),
        );
}

/// Start the HTTP server
pub async fn run_server(config: ServerConfig) -> std::io::Result<()> {
    run_server_with(AppState::new(config)).await
}

/// Start the HTTP server over prepared state
pub async fn run_server_with(state: AppState) -> std::io::Result<()> {
    let host = state.config.host.clone();
    let port = state.config.port;
    let state = web::Data::new(state);

    log::info!("LiveFrame server listening on http://{}:{}", host, port);
    log::info!("default backend: {}", state.config.default_backend);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            // Enable logger
            .wrap(middleware::Logger::default())
            // CORS for development
            .wrap(
                actix_cors::Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .configure(configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
