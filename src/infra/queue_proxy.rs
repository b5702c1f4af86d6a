use crate::app::ports::QueueProxyPort;
use crate::domain::{ConsumerInstance, Message};
use crate::error::{IngesterError, Result};
use crate::infra::http_client::AgeingClient;
use crate::queue::config::QueueConfig;
use crate::queue::wire::{decode_record, ConsumedRecord};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HOST};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct CreateInstanceResponse {
    base_uri: String,
    #[serde(default)]
    instance_id: String,
}

/// REST client for the queue proxy's consumer API.
pub struct HttpQueueProxy {
    addresses: Vec<String>,
    group: String,
    topic: String,
    offset: String,
    auto_commit_enable: bool,
    queue: Option<String>,
    authorization_key: Option<String>,
    http: AgeingClient,
    next_address: AtomicUsize,
}

impl HttpQueueProxy {
    pub fn new(config: &QueueConfig, http: AgeingClient) -> Self {
        Self {
            addresses: config.addresses.clone(),
            group: config.group.clone(),
            topic: config.topic.clone(),
            offset: config.offset.clone(),
            auto_commit_enable: config.auto_commit_enable,
            queue: config.queue.clone().filter(|q| !q.is_empty()),
            authorization_key: config.authorization_key.clone().filter(|k| !k.is_empty()),
            http,
            next_address: AtomicUsize::new(0),
        }
    }

    async fn call(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
        expected: StatusCode,
    ) -> Result<Vec<u8>> {
        let mut request = self
            .http
            .client()
            .request(method.clone(), url)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }
        if let Some(queue) = &self.queue {
            request = request.header(HOST, queue.as_str());
        }
        if let Some(key) = &self.authorization_key {
            request = request.header(AUTHORIZATION, key.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await;

        if status.is_server_error() {
            // The backend may have been rotated out; stop reusing pooled connections to it.
            self.http.refresh();
        }
        if status != expected {
            warn!(%method, url, status = status.as_u16(), "Unexpected response status from queue proxy");
            return Err(IngesterError::QueueStatus {
                status: status.as_u16(),
                expected: expected.as_u16(),
            });
        }
        Ok(bytes?.to_vec())
    }

    fn instance_url(&self, instance: &ConsumerInstance) -> String {
        let path = match Url::parse(&instance.base_uri) {
            Ok(url) => url.path().to_string(),
            Err(_) => instance.base_uri.clone(),
        };
        format!("{}{}", instance.address, path.trim_end_matches('/'))
    }

    async fn check_address(&self, address: &str) -> Result<()> {
        let body = self
            .call(Method::GET, &format!("{address}/topics"), None, StatusCode::OK)
            .await
            .map_err(|e| IngesterError::Connectivity {
                message: format!("Could not connect to proxy: {e}"),
            })?;
        topic_is_listed(&body, &self.topic)
    }
}

/// Checks a proxy `/topics` response for `topic`.
pub fn topic_is_listed(body: &[u8], topic: &str) -> Result<()> {
    let topics: Vec<String> =
        serde_json::from_slice(body).map_err(|e| IngesterError::Connectivity {
            message: format!("Error occurred and topic could not be found. {e}"),
        })?;
    if topics.iter().any(|t| t == topic) {
        Ok(())
    } else {
        Err(IngesterError::Connectivity {
            message: "Topic was not found".into(),
        })
    }
}

#[async_trait]
impl QueueProxyPort for HttpQueueProxy {
    async fn create_instance(&self) -> Result<ConsumerInstance> {
        let index = self.next_address.fetch_add(1, Ordering::Relaxed) % self.addresses.len();
        let address = &self.addresses[index];

        let request_body = serde_json::json!({
            "auto.offset.reset": self.offset,
            "auto.commit.enable": self.auto_commit_enable.to_string(),
        })
        .to_string();
        let body = self
            .call(
                Method::POST,
                &format!("{}/consumers/{}", address, self.group),
                Some(request_body),
                StatusCode::OK,
            )
            .await?;
        let created: CreateInstanceResponse =
            serde_json::from_slice(&body).map_err(|e| IngesterError::Queue {
                message: format!("invalid create instance response: {e}"),
            })?;

        debug!(address = %address, base_uri = %created.base_uri, "Created consumer instance");
        Ok(ConsumerInstance {
            address: address.clone(),
            base_uri: created.base_uri,
            instance_id: created.instance_id,
        })
    }

    async fn consume(&self, instance: &ConsumerInstance) -> Result<Vec<Message>> {
        let url = format!("{}/topics/{}", self.instance_url(instance), self.topic);
        let body = self.call(Method::GET, &url, None, StatusCode::OK).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let records: Vec<ConsumedRecord> =
            serde_json::from_slice(&body).map_err(|e| IngesterError::Queue {
                message: format!("invalid consume response: {e}"),
            })?;

        Ok(records
            .iter()
            .filter_map(|record| match decode_record(record) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    warn!(partition = ?record.partition, offset = ?record.offset, error = %e, "Skipping undecodable record");
                    None
                }
            })
            .collect())
    }

    async fn commit_offsets(&self, instance: &ConsumerInstance) -> Result<()> {
        let url = format!("{}/offsets", self.instance_url(instance));
        self.call(Method::POST, &url, None, StatusCode::OK).await?;
        Ok(())
    }

    async fn destroy_instance(&self, instance: &ConsumerInstance) -> Result<()> {
        let url = self.instance_url(instance);
        self.call(Method::DELETE, &url, None, StatusCode::NO_CONTENT)
            .await?;
        Ok(())
    }

    async fn check_connectivity(&self) -> Result<String> {
        let checks = self.addresses.iter().map(|address| async move {
            self.check_address(address)
                .await
                .map_err(|e| format!("{address}: {e}"))
        });
        let results = futures::future::join_all(checks).await;

        if results.iter().any(|r| r.is_ok()) {
            return Ok("Connectivity to consumer proxies is OK.".to_string());
        }
        let message = results
            .into_iter()
            .filter_map(|r| r.err())
            .collect::<Vec<_>>()
            .join("; ");
        Err(IngesterError::Connectivity { message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::http_client::ClientSettings;
    use crate::test_support::{unreachable_url, StubServer};
    use axum::http::StatusCode as AxumStatus;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    fn proxy(addresses: Vec<String>) -> HttpQueueProxy {
        let mut config = QueueConfig::new(addresses, "native-ingester", "NativeCmsPublicationEvents");
        config.queue = Some("kafka".into());
        config.authorization_key = Some("Basic abc".into());
        HttpQueueProxy::new(&config, AgeingClient::new(ClientSettings::default()).unwrap())
    }

    fn record(frame: &str) -> String {
        format!(r#"{{"value":"{}","partition":0,"offset":1}}"#, STANDARD.encode(frame))
    }

    #[tokio::test]
    async fn creates_instance_with_offset_settings() {
        let server = StubServer::start(|_| {
            (
                AxumStatus::OK,
                r#"{"instance_id":"rest-consumer-1","base_uri":"http://kafka-rest-proxy:8080/consumers/native-ingester/instances/rest-consumer-1"}"#.to_string(),
            )
        })
        .await;
        let instance = proxy(vec![server.url.clone()]).create_instance().await.unwrap();

        assert_eq!(instance.address, server.url);
        assert_eq!(instance.instance_id, "rest-consumer-1");

        let req = &server.requests()[0];
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/consumers/native-ingester");
        assert_eq!(req.header("Host"), Some("kafka"));
        assert_eq!(req.header("Authorization"), Some("Basic abc"));
        let body: serde_json::Value = serde_json::from_str(&req.body).unwrap();
        assert_eq!(body["auto.offset.reset"], "largest");
        assert_eq!(body["auto.commit.enable"], "false");
    }

    #[tokio::test]
    async fn instance_calls_use_creation_address_and_base_path() {
        let frame = "FTMSG/1.0\r\nX-Request-Id: tid_1\r\nMessage-Timestamp: 2017-02-16T12:56:16.162Z\r\n\r\n{\"uuid\":\"07ac9fad-6434-47c7-b7c4-34361a048d07\"}";
        let batch = format!("[{}]", record(frame));
        let server = StubServer::start(move |req| match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/consumers/g/instances/i1/topics/NativeCmsPublicationEvents") => {
                (AxumStatus::OK, batch.clone())
            }
            ("POST", "/consumers/g/instances/i1/offsets") => (AxumStatus::OK, String::new()),
            ("DELETE", "/consumers/g/instances/i1") => (AxumStatus::NO_CONTENT, String::new()),
            _ => (AxumStatus::NOT_FOUND, String::new()),
        })
        .await;
        let proxy = proxy(vec![server.url.clone()]);
        let instance = ConsumerInstance {
            address: server.url.clone(),
            base_uri: "http://elsewhere:8082/consumers/g/instances/i1/".into(),
            instance_id: "i1".into(),
        };

        let msgs = proxy.consume(&instance).await.unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].transaction_id(), "tid_1");
        proxy.commit_offsets(&instance).await.unwrap();
        proxy.destroy_instance(&instance).await.unwrap();
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn undecodable_records_are_skipped() {
        let good = record("FTMSG/1.0\r\nX-Request-Id: ok\r\n\r\n{}");
        let batch = format!(r#"[{{"value":"%%%"}},{good}]"#);
        let server = StubServer::start(move |_| (AxumStatus::OK, batch.clone())).await;
        let instance = ConsumerInstance {
            address: server.url.clone(),
            base_uri: "/consumers/g/instances/i1".into(),
            instance_id: "i1".into(),
        };
        let msgs = proxy(vec![server.url.clone()]).consume(&instance).await.unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].transaction_id(), "ok");
    }

    #[tokio::test]
    async fn unexpected_status_is_queue_error() {
        let server = StubServer::start(|_| (AxumStatus::BAD_GATEWAY, String::new())).await;
        let proxy = proxy(vec![server.url.clone()]);
        let err = proxy.create_instance().await.unwrap_err();
        assert!(matches!(
            err,
            IngesterError::QueueStatus {
                status: 502,
                expected: 200
            }
        ));
        let instance = ConsumerInstance {
            address: server.url.clone(),
            base_uri: "/consumers/g/instances/i1".into(),
            instance_id: "i1".into(),
        };
        assert!(proxy.destroy_instance(&instance).await.is_err());
    }

    #[tokio::test]
    async fn instance_creation_rotates_addresses() {
        let created = r#"{"instance_id":"i","base_uri":"/consumers/g/instances/i"}"#;
        let a = StubServer::start(move |_| (AxumStatus::OK, created.to_string())).await;
        let b = StubServer::start(move |_| (AxumStatus::OK, created.to_string())).await;
        let proxy = proxy(vec![a.url.clone(), b.url.clone()]);

        let first = proxy.create_instance().await.unwrap();
        let second = proxy.create_instance().await.unwrap();
        let third = proxy.create_instance().await.unwrap();
        assert_eq!(first.address, a.url);
        assert_eq!(second.address, b.url);
        assert_eq!(third.address, a.url);
    }

    #[tokio::test]
    async fn connectivity_is_ok_when_any_address_lists_topic() {
        let healthy = StubServer::start(|_| {
            (
                AxumStatus::OK,
                r#"["NativeCmsPublicationEvents","Other"]"#.to_string(),
            )
        })
        .await;
        let proxy_ok = proxy(vec![unreachable_url(), healthy.url.clone()]);
        assert_eq!(
            proxy_ok.check_connectivity().await.unwrap(),
            "Connectivity to consumer proxies is OK."
        );
        assert_eq!(healthy.requests()[0].path, "/topics");
    }

    #[tokio::test]
    async fn connectivity_fails_when_no_address_is_usable() {
        let wrong_topic =
            StubServer::start(|_| (AxumStatus::OK, r#"["Other"]"#.to_string())).await;
        let dead = unreachable_url();
        let err = proxy(vec![dead.clone(), wrong_topic.url.clone()])
            .check_connectivity()
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains(&dead));
        assert!(message.contains("Topic was not found"));
    }

    #[test]
    fn topic_listing_must_be_json_array() {
        assert!(topic_is_listed(br#"["a","b"]"#, "b").is_ok());
        assert!(topic_is_listed(br#"{"a":1}"#, "a").is_err());
    }
}
