//! HTTP/JSON registry client.
//!
//! Speaks the v3 REST surface of the registries:
//!
//! ```text
//! identity     /api/v3/applications/{app}/devices/{dev}
//! network      /api/v3/ns/applications/{app}/devices/{dev}
//! application  /api/v3/as/applications/{app}/devices/{dev}
//! join         /api/v3/js/applications/{app}/devices/{dev}
//! ```
//!
//! Reads pass the mask as `field_mask=a,b`; writes `PUT` an
//! `{"end_device": …, "field_mask": {"paths": […]}}` body. `ureq` is
//! blocking, so every request runs on the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use devreg_core::{DeviceIdentifiers, EndDeviceRecord, Registry};
use devreg_sync::{CallError, Dialer, RegistryClient};

const TIMEOUT: Duration = Duration::from_secs(30);

/// Opens [`HttpClient`]s that share one connection agent.
pub struct HttpDialer {
    agent: ureq::Agent,
    scheme: &'static str,
    api_key: Option<String>,
}

impl HttpDialer {
    pub fn new(api_key: Option<String>, insecure: bool) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(TIMEOUT).build(),
            scheme: if insecure { "http" } else { "https" },
            api_key,
        }
    }
}

#[async_trait]
impl Dialer for HttpDialer {
    async fn dial(&self, address: &str) -> Result<Arc<dyn RegistryClient>, CallError> {
        let base_url = if address.contains("://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("{}://{}", self.scheme, address.trim_end_matches('/'))
        };
        Ok(Arc::new(HttpClient {
            agent: self.agent.clone(),
            base_url,
            api_key: self.api_key.clone(),
        }))
    }
}

pub struct HttpClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: Option<String>,
}

impl HttpClient {
    fn device_url(&self, registry: Registry, ids: &DeviceIdentifiers) -> String {
        let service = match registry {
            Registry::Identity => "",
            Registry::Network => "ns/",
            Registry::Application => "as/",
            Registry::Join => "js/",
        };
        format!(
            "{}/api/v3/{service}applications/{}/devices/{}",
            self.base_url, ids.application_id, ids.device_id
        )
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let request = self.agent.request(method, url);
        match &self.api_key {
            Some(key) => request.set("Authorization", &format!("Bearer {key}")),
            None => request,
        }
    }
}

#[async_trait]
impl RegistryClient for HttpClient {
    async fn get(
        &self,
        registry: Registry,
        ids: &DeviceIdentifiers,
        paths: &[String],
    ) -> Result<EndDeviceRecord, CallError> {
        let request = self
            .request("GET", &self.device_url(registry, ids))
            .query("field_mask", &paths.join(","));
        let body = blocking(move || {
            request
                .call()
                .map_err(call_error)?
                .into_json::<Value>()
                .map_err(decode_error)
        })
        .await?;
        from_wire(body)
    }

    async fn set(
        &self,
        registry: Registry,
        device: &EndDeviceRecord,
        paths: &[String],
    ) -> Result<EndDeviceRecord, CallError> {
        let request = self.request("PUT", &self.device_url(registry, &device.ids));
        let body = json!({
            "end_device": to_wire(device)?,
            "field_mask": { "paths": paths },
        });
        let body = blocking(move || {
            request
                .send_json(body)
                .map_err(call_error)?
                .into_json::<Value>()
                .map_err(decode_error)
        })
        .await?;
        from_wire(body)
    }

    async fn delete(&self, registry: Registry, ids: &DeviceIdentifiers) -> Result<(), CallError> {
        let request = self.request("DELETE", &self.device_url(registry, ids));
        blocking(move || request.call().map(|_| ()).map_err(call_error)).await
    }
}

async fn blocking<T, F>(f: F) -> Result<T, CallError>
where
    F: FnOnce() -> Result<T, CallError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CallError::Transport(format!("request task failed: {e}")))?
}

fn call_error(err: ureq::Error) -> CallError {
    match err {
        ureq::Error::Status(code, response) => {
            let message = response
                .into_string()
                .unwrap_or_else(|_| String::from("<unreadable body>"));
            match code {
                429 => CallError::ResourceExhausted(message),
                503 => CallError::Unavailable(message),
                404 => CallError::NotFound(message),
                _ => CallError::Rejected(format!("HTTP {code}: {message}")),
            }
        }
        ureq::Error::Transport(transport) => match transport.kind() {
            ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::Dns | ureq::ErrorKind::Io => {
                CallError::Unavailable(transport.to_string())
            }
            _ => CallError::Transport(transport.to_string()),
        },
    }
}

fn decode_error(err: std::io::Error) -> CallError {
    CallError::Transport(format!("invalid response body: {err}"))
}

// ---------------------------------------------------------------------------
// Wire conversion
// ---------------------------------------------------------------------------

/// Record as the registries encode it: the application ID is nested under
/// `ids.application_ids`.
pub fn to_wire(device: &EndDeviceRecord) -> Result<Value, CallError> {
    let mut value =
        serde_json::to_value(device).map_err(|e| CallError::Transport(e.to_string()))?;
    if let Some(ids) = value.get_mut("ids").and_then(Value::as_object_mut) {
        if let Some(application_id) = ids.remove("application_id") {
            ids.insert(
                "application_ids".to_string(),
                json!({ "application_id": application_id }),
            );
        }
    }
    Ok(value)
}

/// Inverse of [`to_wire`].
pub fn from_wire(mut value: Value) -> Result<EndDeviceRecord, CallError> {
    if let Some(ids) = value.get_mut("ids").and_then(Value::as_object_mut) {
        if let Some(application_id) = ids
            .remove("application_ids")
            .and_then(|mut nested| nested.get_mut("application_id").map(Value::take))
        {
            ids.insert("application_id".to_string(), application_id);
        }
    }
    serde_json::from_value(value).map_err(|e| CallError::Transport(format!("invalid device: {e}")))
}

#[cfg(test)]
mod tests {
    use devreg_core::Eui64;

    use super::*;

    #[test]
    fn wire_nests_application_id() {
        let device = EndDeviceRecord::new(
            DeviceIdentifiers::new("app1", "d1").with_dev_eui(Eui64([0x70, 0xB3, 0xD5, 0x7E, 0xD0, 0, 0, 1])),
        )
        .with("name", "sensor");
        let wire = to_wire(&device).expect("to wire");
        assert_eq!(wire["ids"]["application_ids"]["application_id"], json!("app1"));
        assert_eq!(wire["ids"]["dev_eui"], json!("70B3D57ED0000001"));
        assert!(wire["ids"].get("application_id").is_none());
        assert_eq!(from_wire(wire).expect("from wire"), device);
    }

    #[test]
    fn registry_response_decodes() {
        let body = json!({
            "ids": {
                "device_id": "d1",
                "application_ids": { "application_id": "app1" },
                "join_eui": "0000000000000000"
            },
            "created_at": "2024-03-01T10:00:00Z",
            "mac_settings": { "rx1_delay": "RX_DELAY_3" }
        });
        let device = from_wire(body).expect("decode");
        assert_eq!(device.ids.application_id.0, "app1");
        assert_eq!(device.ids.join_eui, Some(Eui64([0; 8])));
        assert_eq!(device.get("mac_settings.rx1_delay"), Some(&json!("RX_DELAY_3")));
        assert!(device.created_at.is_some());
    }

    #[tokio::test]
    async fn dial_prefixes_scheme() {
        let dialer = HttpDialer::new(None, true);
        let client = dialer.dial("localhost:1885").await;
        assert!(client.is_ok());
        let client = HttpClient {
            agent: ureq::agent(),
            base_url: "http://localhost:1885".to_string(),
            api_key: None,
        };
        assert_eq!(
            client.device_url(Registry::Network, &DeviceIdentifiers::new("app1", "d1")),
            "http://localhost:1885/api/v3/ns/applications/app1/devices/d1"
        );
        assert_eq!(
            client.device_url(Registry::Identity, &DeviceIdentifiers::new("app1", "d1")),
            "http://localhost:1885/api/v3/applications/app1/devices/d1"
        );
    }

    #[test]
    fn status_codes_map_to_call_errors() {
        let err = |code: u16| {
            call_error(ureq::Error::Status(
                code,
                ureq::Response::new(code, "status", "body").expect("response"),
            ))
        };
        assert!(matches!(err(429), CallError::ResourceExhausted(_)));
        assert!(matches!(err(503), CallError::Unavailable(_)));
        assert!(matches!(err(404), CallError::NotFound(_)));
        assert!(matches!(err(400), CallError::Rejected(_)));
    }
}
