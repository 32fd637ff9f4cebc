//! HTTP client with token injection, duplicate-request cancellation and
//! response envelope handling.
//!
//! Every request passes through the same two stages:
//!
//! - request: register in the pending registry (unless `cancel` is off),
//!   show the loading indicator, attach the token header;
//! - response: deregister, hide the loading indicator, then classify the
//!   outcome. Transport failures and non-2xx statuses notify the user;
//!   a session-expiry code also clears the token and navigates to login.
//!
//! Every failure is terminal for that request. There is no retry.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::cancel::{request_key, PendingGuard, PendingRegistry};
use super::error::{ApiError, TransportFailure};
use super::status::check_status;
use super::types::{EnvelopeHeader, EnvelopeOutcome, ResultData};
use crate::config::ClientConfig;
use crate::hooks::{LogNavigator, LogNotifier, Navigator, Notifier};
use crate::state::SessionStore;

/// Per-call options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Cancel an identical in-flight request in favor of this one.
    pub cancel: bool,
    /// Drive the notifier's loading indicator for this request.
    pub loading: bool,
    /// Extra headers for this request. The token header always wins.
    pub headers: HeaderMap,
    /// Overrides the client-wide timeout.
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            cancel: true,
            loading: true,
            headers: HeaderMap::new(),
            timeout: None,
        }
    }
}

impl RequestOptions {
    /// Allow this request to run alongside identical in-flight requests.
    pub fn no_cancel(mut self) -> Self {
        self.cancel = false;
        self
    }

    /// Skip the loading indicator for this request.
    pub fn silent(mut self) -> Self {
        self.loading = false;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Where request parameters go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Query,
    Body,
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    config: ClientConfig,
    session: Option<Arc<SessionStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl ApiClientBuilder {
    /// Session store the token is read from and cleared in.
    pub fn session(mut self, session: Arc<SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn build(self) -> Result<ApiClient, ApiError> {
        let client = Client::builder()
            .timeout(self.config.timeout)
            .cookie_store(self.config.with_credentials)
            .build()
            .map_err(ApiError::Build)?;

        let session = self
            .session
            .unwrap_or_else(|| Arc::new(SessionStore::in_memory(&self.config.store_id)));

        Ok(ApiClient {
            client,
            config: self.config,
            session,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(LogNotifier)),
            navigator: self.navigator.unwrap_or_else(|| Arc::new(LogNavigator)),
            pending: PendingRegistry::new(),
        })
    }
}

/// HTTP client wrapper for backend API communication.
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
    session: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    pending: PendingRegistry,
}

impl ApiClient {
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder {
            config,
            session: None,
            notifier: None,
            navigator: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Registry of in-flight requests.
    pub fn pending(&self) -> &PendingRegistry {
        &self.pending
    }

    /// Cancel every in-flight request (e.g. on route change).
    pub fn cancel_all_pending(&self) {
        self.pending.remove_all_pending();
    }

    /// GET with `params` as the query string.
    pub async fn get<T, P>(
        &self,
        url: &str,
        params: P,
        opts: RequestOptions,
    ) -> Result<ResultData<T>, ApiError>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        let body = self
            .dispatch(Method::GET, url, &params, Placement::Query, opts)
            .await?;
        self.handle_envelope(&body).await
    }

    /// POST with `params` as the JSON body (a string is sent form-encoded).
    pub async fn post<T, P>(
        &self,
        url: &str,
        params: P,
        opts: RequestOptions,
    ) -> Result<ResultData<T>, ApiError>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        let body = self
            .dispatch(Method::POST, url, &params, Placement::Body, opts)
            .await?;
        self.handle_envelope(&body).await
    }

    /// PUT with `params` as the JSON body.
    pub async fn put<T, P>(
        &self,
        url: &str,
        params: P,
        opts: RequestOptions,
    ) -> Result<ResultData<T>, ApiError>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        let body = self
            .dispatch(Method::PUT, url, &params, Placement::Body, opts)
            .await?;
        self.handle_envelope(&body).await
    }

    /// DELETE with `params` as the query string.
    pub async fn delete<T, P>(
        &self,
        url: &str,
        params: P,
        opts: RequestOptions,
    ) -> Result<ResultData<T>, ApiError>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        let body = self
            .dispatch(Method::DELETE, url, &params, Placement::Query, opts)
            .await?;
        self.handle_envelope(&body).await
    }

    /// POST `params` and return the raw response bytes.
    ///
    /// The body is not treated as an envelope; only transport and HTTP
    /// status failures are reported.
    pub async fn download<P>(
        &self,
        url: &str,
        params: P,
        opts: RequestOptions,
    ) -> Result<Vec<u8>, ApiError>
    where
        P: Serialize,
    {
        let body = self
            .dispatch(Method::POST, url, &params, Placement::Body, opts)
            .await?;
        Ok(body)
    }

    /// Run one request through both interceptor stages.
    ///
    /// Returns the body of a 2xx response.
    async fn dispatch<P: Serialize>(
        &self,
        method: Method,
        url: &str,
        params: &P,
        placement: Placement,
        opts: RequestOptions,
    ) -> Result<Vec<u8>, ApiError> {
        let url = self.config.resolve_url(url);
        let params = serde_json::to_value(params)?;
        let query = match placement {
            Placement::Query => query_pairs(&params)?,
            Placement::Body => Vec::new(),
        };
        let signature = match &params {
            Value::Null => String::new(),
            other => other.to_string(),
        };

        // Request stage
        let guard = opts
            .cancel
            .then(|| self.pending.add_pending(&request_key(&method, &url, &signature)));
        if opts.loading {
            self.notifier.show_loading();
        }

        let token = self.session.token().await;
        let mut headers = opts.headers;
        headers.remove(self.config.token_header.as_str());
        let mut builder = self
            .client
            .request(method.clone(), &url)
            .headers(headers)
            .header(self.config.token_header.as_str(), token);
        if let Some(timeout) = opts.timeout {
            builder = builder.timeout(timeout);
        }
        let builder = match placement {
            Placement::Query if query.is_empty() => builder,
            Placement::Query => builder.query(&query),
            Placement::Body => attach_body(builder, &params),
        };

        log::debug!("{} {}", method, url);
        let outcome = exchange(builder, guard.as_ref()).await;

        // Response stage
        if let Some(ref guard) = guard {
            self.pending.remove_pending(guard);
        }
        if opts.loading {
            self.notifier.hide_loading();
        }

        match outcome {
            None => {
                log::debug!("{} {} cancelled by a newer duplicate", method, url);
                Err(ApiError::Cancelled)
            }
            Some(Err(err)) => {
                log::warn!("{} {} failed: {}", method, url, err);
                if let Some(failure) = TransportFailure::classify(&err) {
                    self.notifier.error(failure.message());
                }
                Err(ApiError::from_transport(err))
            }
            Some(Ok((status, _))) if !status.is_success() => {
                log::warn!("{} {} returned HTTP {}", method, url, status);
                let message = check_status(status);
                self.notifier.error(message);
                Err(ApiError::Status { status, message })
            }
            Some(Ok((_, body))) => Ok(body),
        }
    }

    /// Classify a response envelope and decode its payload.
    async fn handle_envelope<T: DeserializeOwned>(
        &self,
        body: &[u8],
    ) -> Result<ResultData<T>, ApiError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        if !value.is_object() {
            return Err(ApiError::Decode(format!(
                "expected a response envelope object, got: {}",
                value
            )));
        }

        let mut value = value;
        let header: EnvelopeHeader = serde::Deserialize::deserialize(&value)
            .map_err(|e: serde_json::Error| ApiError::Decode(e.to_string()))?;
        match header.outcome() {
            EnvelopeOutcome::SessionExpired => {
                log::info!("Session expired, clearing token");
                self.session.set_token(String::new()).await;
                self.navigator.replace(&self.config.login_url);
                self.notifier.error(&header.msg);
                Err(ApiError::SessionExpired { msg: header.msg })
            }
            EnvelopeOutcome::Failed => {
                self.notifier.error(&header.msg);
                Err(ApiError::Business {
                    code: header.code.unwrap_or_default(),
                    msg: header.msg,
                })
            }
            EnvelopeOutcome::Success => {
                // An envelope without `data` decodes as `data: null`.
                if let Value::Object(ref mut map) = value {
                    map.entry("data").or_insert(Value::Null);
                }
                serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

fn attach_body(builder: RequestBuilder, params: &Value) -> RequestBuilder {
    match params {
        Value::Null => builder,
        Value::String(raw) => builder
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(raw.clone()),
        params => builder.json(params),
    }
}

/// Flatten parameters into query pairs.
///
/// Arrays use bracket keys (`tags[]=a&tags[]=b`); nested objects are sent
/// as JSON text. Anything other than an object or `null` is rejected.
fn query_pairs(params: &Value) -> Result<Vec<(String, String)>, ApiError> {
    let map = match params {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        other => {
            return Err(ApiError::Query(format!(
                "expected an object of query parameters, got: {}",
                other
            )))
        }
    };

    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                let key = format!("{}[]", key);
                for item in items {
                    pairs.push((key.clone(), scalar_text(item)));
                }
            }
            other => pairs.push((key.clone(), scalar_text(other))),
        }
    }
    Ok(pairs)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Send the request and read the body, racing the cancellation token.
///
/// Returns `None` when the request was superseded.
async fn exchange(
    builder: RequestBuilder,
    guard: Option<&PendingGuard>,
) -> Option<Result<(StatusCode, Vec<u8>), reqwest::Error>> {
    let round_trip = async {
        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        Ok::<_, reqwest::Error>((status, body.to_vec()))
    };

    match guard {
        Some(guard) => tokio::select! {
            biased;
            _ = guard.token.cancelled() => None,
            result = round_trip => Some(result),
        },
        None => Some(round_trip.await),
    }
}
