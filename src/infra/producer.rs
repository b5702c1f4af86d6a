use crate::app::ports::{ConnectivityCheckPort, MessageProducerPort};
use crate::constants::KAFKA_BINARY_CONTENT_TYPE;
use crate::domain::Message;
use crate::error::{IngesterError, Result};
use crate::infra::http_client::AgeingClient;
use crate::infra::queue_proxy::topic_is_listed;
use crate::queue::wire::produce_request;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use reqwest::{Method, StatusCode};

#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub address: String,
    pub topic: String,
    pub queue: Option<String>,
    pub authorization: Option<String>,
}

/// Publishes messages to a topic through the queue proxy.
pub struct HttpMessageProducer {
    config: ProducerConfig,
    http: AgeingClient,
}

impl HttpMessageProducer {
    pub fn new(mut config: ProducerConfig, http: AgeingClient) -> Self {
        config.address = config.address.trim_end_matches('/').to_string();
        config.queue = config.queue.filter(|q| !q.is_empty());
        config.authorization = config.authorization.filter(|a| !a.is_empty());
        Self { config, http }
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let mut request = self.http.client().request(method, url);
        if let Some(queue) = &self.config.queue {
            request = request.header(HOST, queue.as_str());
        }
        if let Some(key) = &self.config.authorization {
            request = request.header(AUTHORIZATION, key.as_str());
        }
        request
    }
}

#[async_trait]
impl MessageProducerPort for HttpMessageProducer {
    async fn send_message(&self, msg: &Message) -> Result<()> {
        let url = format!("{}/topics/{}", self.config.address, self.config.topic);
        let envelope = serde_json::to_string(&produce_request("", msg)).map_err(|e| {
            IngesterError::Forward {
                message: format!("could not encode message: {e}"),
            }
        })?;

        let response = self
            .request(Method::POST, &url)
            .header(CONTENT_TYPE, KAFKA_BINARY_CONTENT_TYPE)
            .body(envelope)
            .send()
            .await
            .map_err(|e| IngesterError::Forward {
                message: format!("executing request: {e}"),
            })?;
        let status = response.status();
        let _ = response.bytes().await;

        if status.is_server_error() {
            self.http.refresh();
        }
        if status != StatusCode::OK {
            return Err(IngesterError::Forward {
                message: format!(
                    "Unexpected response status {}. Expected: 200. {}",
                    status.as_u16(),
                    url
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ConnectivityCheckPort for HttpMessageProducer {
    async fn connectivity_check(&self) -> Result<String> {
        let url = format!("{}/topics", self.config.address);
        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| IngesterError::Connectivity {
                message: format!("Could not connect to proxy: {e}"),
            })?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(IngesterError::Connectivity {
                message: format!("Producer proxy returned status: {}", status.as_u16()),
            });
        }
        let body = response.bytes().await?;
        topic_is_listed(&body, &self.config.topic)?;
        Ok("Connectivity to producer proxy is OK.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::http_client::ClientSettings;
    use crate::queue::wire::decode_frame;
    use crate::test_support::StubServer;
    use axum::http::StatusCode as AxumStatus;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use std::collections::HashMap;

    fn producer(address: &str) -> HttpMessageProducer {
        HttpMessageProducer::new(
            ProducerConfig {
                address: address.to_string(),
                topic: "CmsPublicationEvents".into(),
                queue: Some("kafka".into()),
                authorization: None,
            },
            AgeingClient::new(ClientSettings::default()).unwrap(),
        )
    }

    fn message() -> Message {
        Message::new(
            HashMap::from([
                ("X-Request-Id".to_string(), "tid_fwd".to_string()),
                ("Native-Hash".to_string(), "h".to_string()),
            ]),
            r#"{"uuid":"07ac9fad-6434-47c7-b7c4-34361a048d07"}"#,
        )
    }

    #[tokio::test]
    async fn posts_binary_envelope_to_topic() {
        let server = StubServer::start(|_| (AxumStatus::OK, String::new())).await;
        producer(&server.url).send_message(&message()).await.unwrap();

        let req = &server.requests()[0];
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/topics/CmsPublicationEvents");
        assert_eq!(
            req.header("Content-Type"),
            Some("application/vnd.kafka.binary.v1+json")
        );
        assert_eq!(req.header("Host"), Some("kafka"));
        assert_eq!(req.header("Authorization"), None);

        let envelope: serde_json::Value = serde_json::from_str(&req.body).unwrap();
        let value = envelope["records"][0]["value"].as_str().unwrap();
        let frame = String::from_utf8(STANDARD.decode(value).unwrap()).unwrap();
        assert_eq!(decode_frame(&frame).unwrap(), message());
    }

    #[tokio::test]
    async fn non_200_is_forward_error() {
        let server = StubServer::start(|_| (AxumStatus::SERVICE_UNAVAILABLE, String::new())).await;
        let err = producer(&server.url)
            .send_message(&message())
            .await
            .unwrap_err();
        assert!(matches!(err, IngesterError::Forward { .. }));
    }

    #[tokio::test]
    async fn connectivity_requires_topic() {
        let ok = StubServer::start(|_| {
            (AxumStatus::OK, r#"["CmsPublicationEvents"]"#.to_string())
        })
        .await;
        assert_eq!(
            producer(&ok.url).connectivity_check().await.unwrap(),
            "Connectivity to producer proxy is OK."
        );

        let missing = StubServer::start(|_| (AxumStatus::OK, "[]".to_string())).await;
        assert!(producer(&missing.url).connectivity_check().await.is_err());

        let down = StubServer::start(|_| (AxumStatus::INTERNAL_SERVER_ERROR, String::new())).await;
        let err = producer(&down.url).connectivity_check().await.unwrap_err();
        assert_eq!(err.to_string(), "Producer proxy returned status: 500");
    }
}
