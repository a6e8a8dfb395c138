use std::env;
use std::io;

use chrono::{DateTime, Utc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tow_policy::csv::{read_requests, write_decisions};
use tow_policy::{FixedClock, PolicyEngine};

/// Evaluation instant for the whole batch, RFC 3339.
const NOW_VAR: &str = "TOW_POLICY_NOW";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let path = env::args()
        .nth(1)
        .expect("usage: tow-policy <requests.csv>");

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let now = match env::var(NOW_VAR) {
        Ok(value) => value
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|e| panic!("{NOW_VAR} must be an RFC 3339 timestamp: {e}")),
        Err(_) => Utc::now(),
    };
    info!(now = %now, "evaluating requests");

    // one instant for the whole batch so every row sees the same "now"
    let engine = PolicyEngine::with_clock(FixedClock(now));
    let requests = read_requests(path).expect("failed to open csv file");
    let (req_sender, req_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in requests {
            match result {
                Ok(request) => {
                    if req_sender.send(request).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    let decisions = engine.run(ReceiverStream::new(req_receiver)).await;

    write_decisions(io::stdout().lock(), &decisions).expect("failed to write decisions");
}
