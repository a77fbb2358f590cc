//! HTTP calls made by the client (rating submission).

use haiso_server::infrastructure::dto::http::{
    ErrorResponse, SubmitRatingRequest, SubmitRatingResponse,
};

use crate::error::ClientError;

/// Derive the HTTP base URL from the WebSocket endpoint
///
/// `ws://host:8080/ws` → `http://host:8080`
pub fn http_base_from_ws(ws_url: &str) -> String {
    let url = if let Some(rest) = ws_url.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = ws_url.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else {
        ws_url.to_string()
    };
    url.trim_end_matches('/')
        .trim_end_matches("/ws")
        .to_string()
}

/// Client for `POST /api/ratings`
#[derive(Debug, Clone)]
pub struct RatingApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RatingApi {
    pub fn new(ws_url: &str, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: http_base_from_ws(ws_url),
            token,
        }
    }

    /// Submit a rating as the token's principal
    ///
    /// Business rejections come back as `ClientError::Rejected` with the server's code.
    pub async fn submit(
        &self,
        request: &SubmitRatingRequest,
    ) -> Result<SubmitRatingResponse, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/ratings", self.base_url))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<SubmitRatingResponse>()
                .await
                .map_err(|e| ClientError::Connection(e.to_string()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        Err(match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(error) => ClientError::Rejected {
                code: error.code,
                message: error.message,
            },
            Err(_) => ClientError::Rejected {
                code: status.as_u16().to_string(),
                message: body,
            },
        })
    }
}
