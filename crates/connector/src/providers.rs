//! Adapts `CloudClient`'s OAuth/FCM operations to the token-provider traits
//! the notification transports depend on, so `connector-transport` never
//! needs to know about `connector-cloud` directly.

use std::sync::Arc;
use std::time::Duration;

use connector_cloud::CloudClient;
use connector_transport::http_stream::FcmTokenProvider;
use connector_transport::{AccessTokenProvider, TransportError};

pub struct CloudTokenProvider(pub Arc<CloudClient>);

#[async_trait::async_trait]
impl AccessTokenProvider for CloudTokenProvider {
    async fn access_token(&self) -> Result<String, TransportError> {
        self.0
            .get_robot_access_token()
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))
    }
}

#[async_trait::async_trait]
impl FcmTokenProvider for CloudTokenProvider {
    async fn fcm_subscribe(&self, path: &str) -> Result<(String, Duration), TransportError> {
        self.0
            .fcm_subscribe(path)
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_cloud::OAuthConfig;

    fn unreachable_client() -> Arc<CloudClient> {
        Arc::new(CloudClient::new(
            "https://example.invalid",
            OAuthConfig {
                token_url: "https://example.invalid/token".to_string(),
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                refresh_token: "refresh".to_string(),
            },
        ))
    }

    #[tokio::test]
    async fn access_token_maps_cloud_errors_to_transport_protocol_errors() {
        let provider = CloudTokenProvider(unreachable_client());
        let result = provider.access_token().await;
        assert!(matches!(result, Err(TransportError::Protocol(_))));
    }

    #[tokio::test]
    async fn fcm_subscribe_maps_cloud_errors_to_transport_protocol_errors() {
        let provider = CloudTokenProvider(unreachable_client());
        let result = provider.fcm_subscribe("registration-id").await;
        assert!(matches!(result, Err(TransportError::Protocol(_))));
    }
}
