use crate::app::ports::{ConnectivityCheckPort, ContentWriterPort};
use crate::config::CollectionsConfig;
use crate::constants::{DEFAULT_CONTENT_TYPE, HEADER_CONTENT_TYPE};
use crate::domain::NativeMessage;
use crate::error::{IngesterError, Result};
use crate::infra::http_client::AgeingClient;
use crate::metrics::IngestMetrics;
use crate::native::body_parser::ContentBodyParser;
use async_trait::async_trait;
use reqwest::header::HOST;
use reqwest::{Method, Response};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

const GTG_PATH: &str = "/__gtg";

/// Writes native content to `{address}/{collection}/{uuid}`.
pub struct NativeWriter {
    address: String,
    collections: Arc<CollectionsConfig>,
    host_header: Option<String>,
    http: AgeingClient,
    parser: ContentBodyParser,
}

impl NativeWriter {
    pub fn new(
        address: &str,
        collections: Arc<CollectionsConfig>,
        host_header: Option<String>,
        http: AgeingClient,
        parser: ContentBodyParser,
    ) -> Self {
        Self {
            address: address.trim_end_matches('/').to_string(),
            collections,
            host_header: host_header.filter(|h| !h.trim().is_empty()),
            http,
            parser,
        }
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.http.client().request(method, url);
        match &self.host_header {
            Some(host) => builder.header(HOST, host.as_str()),
            None => builder,
        }
    }
}

#[async_trait]
impl ContentWriterPort for NativeWriter {
    fn get_collection(&self, origin_id: &str, content_type: &str) -> Result<String> {
        self.collections.get_collection(origin_id, content_type)
    }

    async fn write_to_collection(&self, msg: &NativeMessage, collection: &str) -> Result<String> {
        let tid = msg.transaction_id();
        let content_uuid = self.parser.get_uuid(msg.body()).map_err(|e| {
            error!(transaction_id = %tid, error = %e, "Error extracting uuid. Ignoring message.");
            e
        })?;
        info!(transaction_id = %tid, uuid = %content_uuid, "Start processing native publish event");

        let payload = serde_json::to_vec(msg.body()).map_err(IngesterError::InvalidBody)?;
        let url = format!("{}/{}/{}", self.address, collection, content_uuid);
        let method = if msg.is_partial() {
            Method::PATCH
        } else {
            Method::PUT
        };

        let mut request = self.request(method, &url).body(payload);
        for (name, value) in msg.headers() {
            request = request.header(name.as_str(), value.as_str());
        }
        if msg.content_type().is_none() {
            warn!(
                transaction_id = %tid,
                uuid = %content_uuid,
                "Content-Type header missing. Defaulting to {}", DEFAULT_CONTENT_TYPE
            );
            request = request.header(HEADER_CONTENT_TYPE, DEFAULT_CONTENT_TYPE);
        }

        let started = Instant::now();
        let response = request.send().await.map_err(|e| {
            error!(transaction_id = %tid, uuid = %content_uuid, error = %e, "Error calling native writer. Ignoring message.");
            IngesterError::WriteTransport(e)
        })?;
        IngestMetrics::record_write_duration(started.elapsed().as_secs_f64());

        let status = response.status();
        drain(tid, response).await;

        if !status.is_success() {
            let err = IngesterError::WriteStatus {
                status: status.as_u16(),
            };
            error!(transaction_id = %tid, uuid = %content_uuid, status = status.as_u16(), "Native writer returned non-200 code");
            return Err(err);
        }

        info!(transaction_id = %tid, uuid = %content_uuid, collection = %collection, "Successfully finished processing native publish event");
        Ok(content_uuid)
    }
}

#[async_trait]
impl ConnectivityCheckPort for NativeWriter {
    async fn connectivity_check(&self) -> Result<String> {
        let url = format!("{}{}", self.address, GTG_PATH);
        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| IngesterError::Connectivity {
                message: format!("Native writer is not good to go. {e}"),
            })?;
        let status = response.status();
        drain("", response).await;
        if status != reqwest::StatusCode::OK {
            return Err(IngesterError::Connectivity {
                message: format!(
                    "Native writer is not good to go. GTG HTTP status code is {}",
                    status.as_u16()
                ),
            });
        }
        Ok("Native writer is good to go.".to_string())
    }
}

/// Reads the response to the end so the connection returns to the pool.
async fn drain(tid: &str, response: Response) {
    if let Err(e) = response.bytes().await {
        warn!(transaction_id = %tid, error = %e, "Couldn't read response body");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OriginRule;
    use crate::infra::http_client::ClientSettings;
    use crate::test_support::{unreachable_url, StubServer};
    use axum::http::StatusCode;

    const UUID: &str = "07ac9fad-6434-47c7-b7c4-34361a048d07";
    const METHODE: &str = "http://cmdb.ft.com/systems/methode-web-pub";

    fn writer(address: &str, host_header: Option<&str>) -> NativeWriter {
        let collections = CollectionsConfig::default().with_origin(
            METHODE,
            vec![OriginRule::new("(application/json).*", "methode").unwrap()],
        );
        NativeWriter::new(
            address,
            Arc::new(collections),
            host_header.map(str::to_string),
            AgeingClient::new(ClientSettings::default()).unwrap(),
            ContentBodyParser::new(["uuid", "post.uuid", "data.uuidv3"]),
        )
    }

    fn native_message(body: &str) -> NativeMessage {
        let mut msg = NativeMessage::new(body, "2017-02-16T12:56:16.162Z", "tid_test").unwrap();
        msg.add_hash_header("27f79e6d884acdd642d1758c4fd30d43074f8384d552d1ebb1959345");
        msg
    }

    #[tokio::test]
    async fn writes_with_put_and_forwarded_headers() {
        let store = StubServer::start(|_| (StatusCode::OK, String::new())).await;
        let w = writer(&store.url, Some("nativerw"));

        let mut msg = native_message(&format!(r#"{{"data":{{"uuidv3":"{UUID}"}}}}"#));
        msg.add_content_type_header("application/json; version=1.0");
        let uuid = w.write_to_collection(&msg, "methode").await.unwrap();
        assert_eq!(uuid, UUID);

        let reqs = store.requests();
        assert_eq!(reqs.len(), 1);
        let req = &reqs[0];
        assert_eq!(req.method, "PUT");
        assert_eq!(req.path, format!("/methode/{UUID}"));
        assert_eq!(req.header("X-Request-Id"), Some("tid_test"));
        assert_eq!(
            req.header("X-Native-Hash"),
            Some("27f79e6d884acdd642d1758c4fd30d43074f8384d552d1ebb1959345")
        );
        assert_eq!(req.header("Content-Type"), Some("application/json; version=1.0"));
        assert_eq!(req.header("Host"), Some("nativerw"));

        let body: serde_json::Value = serde_json::from_str(&req.body).unwrap();
        assert_eq!(body["lastModified"], "2017-02-16T12:56:16.162Z");
        assert_eq!(body["publishReference"], "tid_test");
        assert_eq!(body["data"]["uuidv3"], UUID);
    }

    #[tokio::test]
    async fn missing_content_type_defaults_to_json() {
        let store = StubServer::start(|_| (StatusCode::CREATED, String::new())).await;
        let w = writer(&store.url, None);
        w.write_to_collection(&native_message(&format!(r#"{{"uuid":"{UUID}"}}"#)), "methode")
            .await
            .unwrap();
        assert_eq!(
            store.requests()[0].header("Content-Type"),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn partial_content_uses_patch() {
        let store = StubServer::start(|_| (StatusCode::OK, String::new())).await;
        let w = writer(&store.url, None);
        let mut msg = native_message(&format!(r#"{{"uuid":"{UUID}"}}"#));
        msg.mark_partial();
        w.write_to_collection(&msg, "universal-content").await.unwrap();
        let req = &store.requests()[0];
        assert_eq!(req.method, "PATCH");
        assert_eq!(req.path, format!("/universal-content/{UUID}"));
    }

    #[tokio::test]
    async fn missing_uuid_is_never_written() {
        let store = StubServer::start(|_| (StatusCode::OK, String::new())).await;
        let w = writer(&store.url, None);
        let err = w
            .write_to_collection(&native_message(r#"{"title":"no id"}"#), "methode")
            .await
            .unwrap_err();
        assert!(matches!(err, IngesterError::UuidNotFound));
        assert!(store.requests().is_empty());
    }

    #[tokio::test]
    async fn server_error_is_write_error() {
        let store =
            StubServer::start(|_| (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string())).await;
        let w = writer(&store.url, None);
        let err = w
            .write_to_collection(&native_message(&format!(r#"{{"uuid":"{UUID}"}}"#)), "methode")
            .await
            .unwrap_err();
        assert!(matches!(err, IngesterError::WriteStatus { status: 500 }));
    }

    #[tokio::test]
    async fn unreachable_store_is_transport_error() {
        let w = writer(&unreachable_url(), None);
        let err = w
            .write_to_collection(&native_message(&format!(r#"{{"uuid":"{UUID}"}}"#)), "methode")
            .await
            .unwrap_err();
        assert!(matches!(err, IngesterError::WriteTransport(_)));
    }

    #[tokio::test]
    async fn collection_lookup_delegates_to_config() {
        let w = writer("http://localhost", None);
        assert_eq!(
            w.get_collection(METHODE, "application/json").unwrap(),
            "methode"
        );
        assert!(w.get_collection("unknown", "application/json").is_err());
    }

    #[tokio::test]
    async fn gtg_ok_and_failing() {
        let healthy = StubServer::start(|_| (StatusCode::OK, "OK".to_string())).await;
        assert_eq!(
            writer(&healthy.url, Some("nativerw"))
                .connectivity_check()
                .await
                .unwrap(),
            "Native writer is good to go."
        );
        let req = &healthy.requests()[0];
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/__gtg");
        assert_eq!(req.header("Host"), Some("nativerw"));

        let unhealthy =
            StubServer::start(|_| (StatusCode::SERVICE_UNAVAILABLE, String::new())).await;
        let err = writer(&unhealthy.url, None)
            .connectivity_check()
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Native writer is not good to go. GTG HTTP status code is 503"
        );

        assert!(writer(&unreachable_url(), None)
            .connectivity_check()
            .await
            .is_err());
    }
}
