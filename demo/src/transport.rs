//! Blocking `HttpClient` backed by ureq.

use odata_core::consts::HTTP_HEADER_ACCEPT;
use odata_core::{HttpClient, HttpResponse, ODataError};

pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    /// 4xx/5xx responses come back as data so the core can report them as
    /// `ODataError::Http`.
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl HttpClient for UreqClient {
    fn get(&self, uri: &str, accept: &str) -> Result<HttpResponse, ODataError> {
        let mut response = self
            .agent
            .get(uri)
            .header(HTTP_HEADER_ACCEPT, accept)
            .call()
            .map_err(|e| ODataError::Transport(format!("GET {uri}: {e}")))?;

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| ODataError::Transport(format!("GET {uri}: {e}")))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new()
    }
}
