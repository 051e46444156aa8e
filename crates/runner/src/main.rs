use auth::{
    ApiClient, ApiClientOptions, ApiCredentials, AuthPlacement, ClientOptions, HmacProvider,
    UnsignedRequest,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Env prefix for credentials (`EXCHANGE_API_KEY`, `EXCHANGE_API_SECRET`, ...).
const CREDENTIALS_PREFIX: &str = "EXCHANGE";

/// Base address used when `EXCHANGE_BASE_URL` is not set.
const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Number of concurrent request issuers.
const WORKERS: usize = 4;

/// Requests signed by each worker.
const REQUESTS_PER_WORKER: usize = 5;

#[tokio::main]
async fn main() {
    common::init_logging();

    let mut options = match ClientOptions::from_env(CREDENTIALS_PREFIX) {
        Ok(options) => options,
        Err(e) => {
            error!(error = %e, "Invalid credentials in environment");
            std::process::exit(1);
        }
    };

    if options.credentials.is_none() {
        warn!(
            prefix = CREDENTIALS_PREFIX,
            "No credentials configured, using demo credentials"
        );
        options.credentials = demo_credentials();
    }

    let base_url =
        std::env::var("EXCHANGE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let api_options = ApiClientOptions::new(base_url);

    let client = match ApiClient::new(&options, &api_options, HmacProvider::new) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to create API client");
            std::process::exit(1);
        }
    };

    info!(base_address = %client.base_address(), workers = WORKERS, "Starting signing demo");

    // Mix of REST-style callers (parameters) and a socket-login style caller (headers)
    let mut handles = Vec::with_capacity(WORKERS);
    for worker in 0..WORKERS {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let placement = if worker == 0 {
                AuthPlacement::Headers
            } else {
                AuthPlacement::Parameters
            };

            for n in 0..REQUESTS_PER_WORKER {
                let request = UnsignedRequest::get("/api/v3/order")
                    .param("symbol", "BTCUSDT")
                    .param("orderId", n as u64)
                    .with_placement(placement)
                    .authenticated();

                match client.authenticate(request) {
                    Ok(signed) => info!(
                        worker,
                        url_len = signed.url().len(),
                        headers = signed.headers.len(),
                        "Request signed"
                    ),
                    Err(e) => error!(worker, error = %e, "Signing failed"),
                }

                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }));
    }

    // Rotate to a fresh copy while workers are signing; the provider is rebuilt
    tokio::time::sleep(Duration::from_millis(20)).await;
    let rotated = client
        .credential_store()
        .current()
        .and_then(|credentials| credentials.copy());
    client.set_api_credentials(rotated);

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Worker panicked");
        }
    }

    info!(state = ?client.provider_state(), "All workers finished");

    client.dispose();
    info!("Credentials disposed, shutdown complete");
}

fn demo_credentials() -> Option<ApiCredentials> {
    match ApiCredentials::new("demo-key", "demo-secret") {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            error!(error = %e, "Failed to build demo credentials");
            None
        }
    }
}
