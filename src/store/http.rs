use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{Store, StoreError};
use crate::config::EditorConfig;
use crate::types::{Filter, FilterId, Rule, RuleId, Selector, SelectorId, SelectorWithFilters};

#[derive(Deserialize)]
struct Representation {
    representation: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct RuleWithSelectors<'a> {
    rule: &'a Rule,
    selector_ids: &'a [SelectorId],
}

#[derive(Serialize)]
struct SelectorIds<'a> {
    selector_ids: &'a [SelectorId],
}

/// [`Store`] backed by the scheduling service's REST API.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
}

impl HttpStore {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport {
                url: base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { client, base_url })
    }

    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed.
    pub fn from_config(config: &EditorConfig) -> Result<Self, StoreError> {
        Self::new(config.base_url.clone(), config.request_timeout())
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, StoreError> {
        let response = request.send().await.map_err(|e| {
            error!(url, error = %e, "store request failed");
            StoreError::Transport {
                url: url.to_owned(),
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        if is_lookup_miss(status) {
            debug!(url, %message, "store has no such record");
        } else {
            error!(url, status = status.as_u16(), %message, "store rejected request");
        }
        Err(StoreError::Status {
            status: status.as_u16(),
            url: url.to_owned(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        url: &str,
    ) -> Result<T, StoreError> {
        response.json::<T>().await.map_err(|e| StoreError::Decode {
            url: url.to_owned(),
            message: e.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, StoreError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self.send(self.client.get(&url), &url).await?;
        Self::decode(response, &url).await
    }

    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StoreError> {
        match self.get_json(path).await {
            Ok(value) => Ok(Some(value)),
            Err(StoreError::Status { status, .. })
                if StatusCode::from_u16(status).is_ok_and(is_lookup_miss) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn send_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, StoreError> {
        let url = self.url(path);
        debug!(%url, %method, "sending");
        let request = self.client.request(method, &url).json(body);
        let response = self.send(request, &url).await?;
        Self::decode(response, &url).await
    }

    async fn send_unit<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), StoreError> {
        let url = self.url(path);
        debug!(%url, %method, "sending");
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request, &url).await.map(|_| ())
    }

    async fn representation(&self, path: &str) -> Result<String, StoreError> {
        self.get_json::<Representation>(path)
            .await
            .map(|r| r.representation)
    }
}

// Single fetches map 404 to `Ok(None)`; it is not a failure worth an error log.
fn is_lookup_miss(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND
}

#[async_trait]
impl Store for HttpStore {
    async fn list_filters(&self) -> Result<Vec<Filter>, StoreError> {
        self.get_json("filters").await
    }

    async fn get_filter(&self, id: FilterId) -> Result<Option<Filter>, StoreError> {
        self.get_optional(&format!("filters/{id}")).await
    }

    async fn create_filter(&self, filter: &Filter) -> Result<Filter, StoreError> {
        self.send_json(Method::POST, "filters", filter).await
    }

    async fn update_filter(&self, id: FilterId, filter: &Filter) -> Result<Filter, StoreError> {
        self.send_json(Method::PUT, &format!("filters/{id}"), filter)
            .await
    }

    async fn delete_filter(&self, id: FilterId) -> Result<(), StoreError> {
        self.send_unit::<()>(Method::DELETE, &format!("filters/{id}"), None)
            .await
    }

    async fn filter_representation(&self, id: FilterId) -> Result<String, StoreError> {
        self.representation(&format!("filters/{id}/representation"))
            .await
    }

    async fn list_selectors(&self) -> Result<Vec<Selector>, StoreError> {
        self.get_json("selectors").await
    }

    async fn get_selector(&self, id: SelectorId) -> Result<Option<Selector>, StoreError> {
        self.get_optional(&format!("selectors/{id}")).await
    }

    async fn create_selector(&self, selector: &Selector) -> Result<Selector, StoreError> {
        self.send_json(Method::POST, "selectors", selector).await
    }

    async fn update_selector(
        &self,
        id: SelectorId,
        selector: &Selector,
    ) -> Result<Selector, StoreError> {
        self.send_json(Method::PUT, &format!("selectors/{id}"), selector)
            .await
    }

    async fn delete_selector(&self, id: SelectorId) -> Result<(), StoreError> {
        self.send_unit::<()>(Method::DELETE, &format!("selectors/{id}"), None)
            .await
    }

    async fn selector_with_filters(
        &self,
        id: SelectorId,
    ) -> Result<Option<SelectorWithFilters>, StoreError> {
        self.get_optional(&format!("selectors/{id}/filters")).await
    }

    async fn selector_representation(&self, id: SelectorId) -> Result<String, StoreError> {
        self.representation(&format!("selectors/{id}/representation"))
            .await
    }

    async fn list_rules(&self) -> Result<Vec<Rule>, StoreError> {
        self.get_json("rules").await
    }

    async fn get_rule(&self, id: RuleId) -> Result<Option<Rule>, StoreError> {
        self.get_optional(&format!("rules/{id}")).await
    }

    async fn complete_rule(&self, id: RuleId) -> Result<Option<Rule>, StoreError> {
        self.get_optional(&format!("rules/{id}/complete")).await
    }

    async fn rule_selectors(&self, id: RuleId) -> Result<Vec<SelectorWithFilters>, StoreError> {
        self.get_json(&format!("rules/{id}/selectors")).await
    }

    async fn create_rule_with_selectors(
        &self,
        rule: &Rule,
        selector_ids: &[SelectorId],
    ) -> Result<Rule, StoreError> {
        let body = RuleWithSelectors { rule, selector_ids };
        self.send_json(Method::POST, "rules/with-selectors", &body)
            .await
    }

    async fn update_rule(&self, id: RuleId, rule: &Rule) -> Result<Rule, StoreError> {
        self.send_json(Method::PUT, &format!("rules/{id}"), rule)
            .await
    }

    async fn replace_rule_selectors(
        &self,
        id: RuleId,
        selector_ids: &[SelectorId],
    ) -> Result<(), StoreError> {
        let body = SelectorIds { selector_ids };
        self.send_unit(Method::PUT, &format!("rules/{id}/selectors"), Some(&body))
            .await
    }

    async fn delete_rule(&self, id: RuleId) -> Result<(), StoreError> {
        self.send_unit::<()>(Method::DELETE, &format!("rules/{id}"), None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalised() {
        let store = HttpStore::new("http://localhost:5000/", Duration::from_secs(5)).unwrap();
        assert_eq!(store.base_url(), "http://localhost:5000");
        assert_eq!(store.url("filters/3"), "http://localhost:5000/api/filters/3");
    }

    #[test]
    fn rule_payload_shape() {
        let rule = Rule {
            name: "r".into(),
            selectors: vec![9],
            ..Rule::default()
        };
        let body = RuleWithSelectors {
            rule: &rule,
            selector_ids: &[1, 2],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["selector_ids"], serde_json::json!([1, 2]));
        assert_eq!(json["rule"]["name"], "r");
        assert!(json["rule"].get("selectors").is_none());
    }

    #[test]
    fn only_not_found_is_a_quiet_miss() {
        assert!(is_lookup_miss(StatusCode::NOT_FOUND));
        assert!(!is_lookup_miss(StatusCode::BAD_REQUEST));
        assert!(!is_lookup_miss(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn error_body_is_preferred() {
        let body: ErrorBody = serde_json::from_str(r#"{"error":"Invalid operation"}"#).unwrap();
        assert_eq!(body.error, "Invalid operation");
    }
}
