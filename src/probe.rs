use reqwest::blocking::Client;
use std::time::Duration;
use tracing::debug;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// GET `{base_url}/health`; `true` only for a 2xx answer.
///
/// Stateless and safe to call while a check is in flight.
pub fn probe(base_url: &str) -> bool {
    let url = format!("{}/health", base_url.trim_end_matches('/'));

    let client = match Client::builder()
        .connect_timeout(PROBE_TIMEOUT)
        .timeout(PROBE_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            debug!("probe client could not be built: {}", e);
            return false;
        }
    };

    match client.get(&url).send() {
        Ok(response) => {
            debug!(%url, status = response.status().as_u16(), "probe answered");
            response.status().is_success()
        }
        Err(e) => {
            debug!(%url, "probe failed: {}", e);
            false
        }
    }
}
