use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use subnet_lte_mac::{MacConfig, MacError, MacNetworkCore, Operation, Response};

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_ACTIVITY_LIMIT: usize = 100;

type Core = Arc<MacNetworkCore>;

#[derive(Debug, Serialize)]
struct Envelope {
    code: u16,
    message: String,
    data: Value,
}

#[derive(Debug, Deserialize)]
struct ActivityQuery {
    limit: Option<usize>,
}

fn envelope(result: Result<Response, MacError>) -> Envelope {
    match result {
        Ok(response) => Envelope {
            code: response.status_code(),
            message: response.message(),
            data: serde_json::to_value(&response).unwrap_or(Value::Null),
        },
        Err(e) => {
            if !matches!(e, MacError::NotFound(_)) {
                warn!("operation failed: {}", e);
            }
            Envelope {
                code: e.status_code(),
                message: e.to_string(),
                data: Value::Null,
            }
        }
    }
}

fn reply(result: Result<Response, MacError>) -> (StatusCode, Json<Envelope>) {
    let body = envelope(result);
    let status = StatusCode::from_u16(body.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let core = MacNetworkCore::simulated(MacConfig::default())?;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any)
        .allow_origin(Any);

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/register/:packet_count", get(register))
        .route("/modulate", get(modulate))
        .route("/profile", get(profile))
        .route("/sort", get(sort))
        .route("/schedule", get(schedule))
        .route("/reset", get(reset))
        .route("/inspect/:section", get(inspect))
        .route("/activity", get(activity))
        .layer(cors)
        .with_state(core);

    let addr: SocketAddr = std::env::var("GATEWAY_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Gateway listening on {}", addr);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

async fn register(
    State(core): State<Core>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(packet_count): Path<String>,
) -> (StatusCode, Json<Envelope>) {
    reply(
        core.execute(Operation::Register {
            source_address: peer.ip().to_string(),
            packet_count,
        })
        .await,
    )
}

async fn modulate(State(core): State<Core>) -> (StatusCode, Json<Envelope>) {
    reply(core.execute(Operation::ModulateNext).await)
}

async fn profile(State(core): State<Core>) -> (StatusCode, Json<Envelope>) {
    reply(core.execute(Operation::ProfileNext).await)
}

async fn sort(State(core): State<Core>) -> (StatusCode, Json<Envelope>) {
    reply(core.execute(Operation::SortNext).await)
}

async fn schedule(State(core): State<Core>) -> (StatusCode, Json<Envelope>) {
    reply(core.execute(Operation::RunCycle).await)
}

async fn reset(State(core): State<Core>) -> (StatusCode, Json<Envelope>) {
    reply(core.execute(Operation::Reset).await)
}

async fn inspect(State(core): State<Core>, Path(section): Path<String>) -> (StatusCode, Json<Envelope>) {
    reply(core.execute(Operation::Inspect { section }).await)
}

async fn activity(State(core): State<Core>, Query(query): Query<ActivityQuery>) -> Json<Value> {
    let records = core.activity(query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT)).await;
    Json(serde_json::to_value(records).unwrap_or(Value::Null))
}

async fn root_handler(State(core): State<Core>) -> Html<String> {
    let depths = core.depths().await;
    let cycles = core.cycles();
    let html = format!(r#"
        <html>
        <head>
            <title>LTE Sub-Network MAC Gateway</title>
            <style>
                body {{ font-family: monospace; background: #0a0a0a; color: #00ff00; padding: 20px; }}
                pre {{ font-size: 14px; line-height: 1.6; }}
                .header {{ color: #ff9900; font-weight: bold; }}
                .metric {{ color: #00ff00; }}
                .dim {{ color: #666; }}
            </style>
        </head>
        <body>
        <pre class="header">LTE Sub-Network MAC Gateway</pre>
        <pre>
<span class="dim">UERegister:</span> <span class="metric">{}</span>
<span class="dim">QueuedMACPackets:</span> <span class="metric">{}</span>
<span class="dim">TransmissionQueue:</span> <span class="metric">{}</span>
<span class="dim">Sorted sessions:</span> <span class="metric">{}</span> <span class="dim">waiting frames:</span> <span class="metric">{}</span> <span class="dim">bits:</span> <span class="metric">{}</span>
<span class="dim">RejectedPackets:</span> <span class="metric">{}</span>
<span class="dim">Scheduler cycles:</span> <span class="metric">{}</span>
        </pre>
        </body>
        </html>
        "#,
        depths.ue_register,
        depths.queued_mac_packets,
        depths.transmission_queue,
        depths.sorted_sessions,
        depths.sorted_frames,
        depths.sorted_bits,
        depths.rejected_packets,
        cycles,
    );
    Html(html)
}
