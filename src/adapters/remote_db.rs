//! Remote document database sink (MongoDB Atlas Data API).
//!
//! One HTTPS POST per result to the `insertOne` action:
//!
//! ```text
//! POST <remote_url>
//! api-key: <key>
//! Content-Type: application/json
//!
//! {"dataSource":…,"database":…,"collection":…,"document":{…}}
//! ```
//!
//! Any non-2xx answer is a [`SinkError::RemoteStatus`].  The sink only
//! exists when both the API key and the collection were provisioned.

use log::{debug, info, warn};
use serde::Serialize;

use crate::app::ports::RemoteLogPort;
use crate::app::result::RemoteDocument;
use crate::config::{ConfigString, Secrets, SystemConfig};
use crate::error::SinkError;

/// Per-stage HTTP timeout.  Connect, body write and response each get one.
pub const HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertOne<'a> {
    data_source: &'a str,
    database: &'a str,
    collection: &'a str,
    document: &'a RemoteDocument<'a>,
}

pub struct RemoteDb {
    url: ConfigString,
    cluster: ConfigString,
    database: ConfigString,
    api_key: heapless::String<96>,
    collection: heapless::String<64>,
    #[cfg(not(target_os = "espidf"))]
    sim: sim::Endpoint,
}

impl RemoteDb {
    /// Build the sink, or `None` when the key or collection is missing.
    pub fn from_config(config: &SystemConfig, secrets: &Secrets) -> Option<Self> {
        let Some((key, collection)) = secrets.remote_credentials() else {
            info!("Remote DB: no API key or collection provisioned, sink disabled");
            return None;
        };
        let mut api_key = heapless::String::new();
        api_key.push_str(key).ok()?;
        let mut coll = heapless::String::new();
        coll.push_str(collection).ok()?;
        info!(
            "Remote DB: {}/{} on {}",
            config.remote_database, coll, config.remote_cluster
        );
        Some(Self {
            url: config.remote_url.clone(),
            cluster: config.remote_cluster.clone(),
            database: config.remote_database.clone(),
            api_key,
            collection: coll,
            #[cfg(not(target_os = "espidf"))]
            sim: sim::Endpoint::default(),
        })
    }

    /// Serialize the request body for `document`.
    pub fn build_body(&self, document: &RemoteDocument<'_>) -> Result<Vec<u8>, SinkError> {
        serde_json::to_vec(&InsertOne {
            data_source: &self.cluster,
            database: &self.database,
            collection: &self.collection,
            document,
        })
        .map_err(|_| SinkError::Encode)
    }
}

impl RemoteLogPort for RemoteDb {
    fn insert_one(&mut self, document: &RemoteDocument<'_>) -> Result<(), SinkError> {
        let body = self.build_body(document)?;
        let status = self.post(&body)?;
        if !(200..300).contains(&status) {
            warn!("Remote DB: insertOne answered HTTP {}", status);
            return Err(SinkError::RemoteStatus(status));
        }
        debug!("Remote DB: inserted ({} bytes)", body.len());
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Transport
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl RemoteDb {
    fn post(&mut self, body: &[u8]) -> Result<u16, SinkError> {
        use core::time::Duration;

        use esp_idf_svc::http::Method;
        use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
        use esp_idf_svc::io::Write;

        let transport = |e: esp_idf_svc::sys::EspError| {
            warn!("Remote DB: HTTP transport error {}", e);
            SinkError::RemoteTransport
        };

        let mut conn = EspHttpConnection::new(&Configuration {
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            timeout: Some(Duration::from_secs(HTTP_TIMEOUT_SECS)),
            ..Default::default()
        })
        .map_err(transport)?;

        let len = body.len().to_string();
        let headers = [
            ("Content-Type", "application/json"),
            ("api-key", self.api_key.as_str()),
            ("Content-Length", len.as_str()),
        ];
        conn.initiate_request(Method::Post, &self.url, &headers)
            .map_err(transport)?;
        conn.write_all(body).map_err(transport)?;
        conn.initiate_response().map_err(transport)?;
        Ok(conn.status())
    }
}

#[cfg(not(target_os = "espidf"))]
mod sim {
    /// Simulated Data-API endpoint.
    #[derive(Debug)]
    pub struct Endpoint {
        pub status: Option<u16>,
        pub bodies: Vec<Vec<u8>>,
    }

    impl Default for Endpoint {
        fn default() -> Self {
            Self {
                status: Some(201),
                bodies: Vec::new(),
            }
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl RemoteDb {
    fn post(&mut self, body: &[u8]) -> Result<u16, SinkError> {
        debug!("Remote DB(sim): POST {} with key of {} bytes", self.url, self.api_key.len());
        let status = self.sim.status.ok_or(SinkError::RemoteTransport)?;
        self.sim.bodies.push(body.to_vec());
        Ok(status)
    }

    /// Simulation: next answers use `status`, or fail to connect when `None`.
    pub fn sim_respond_with(&mut self, status: Option<u16>) {
        self.sim.status = status;
    }

    /// Simulation: every request body sent so far.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sim.bodies
    }
}
