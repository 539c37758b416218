mod wire;

pub use wire::{
    Action, AddResponse, Authorization, FetchRequest, FetchResponse, ItemFromApi, ItemState,
    ItemStatus, RequestTokenResponse, STATUS_ARCHIVED, STATUS_DELETED, STATUS_NORMAL,
    SendResponse, SortOrder,
};

use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Method, StatusCode};
use satchel_core::{Event, EventSink, SatchelError, SatchelResult};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "https://getpocket.com";

const ENDPOINT_GET: &str = "/v3/get";
const ENDPOINT_ADD: &str = "/v3/add";
const ENDPOINT_SEND: &str = "/v3/send";
const ENDPOINT_OAUTH_REQUEST: &str = "/v3/oauth/request";
const ENDPOINT_OAUTH_AUTHORIZE: &str = "/v3/oauth/authorize";

const HEADER_X_ACCEPT: &str = "x-accept";
const HEADER_X_ERROR: &str = "x-error";
const HEADER_USER_REMAINING: &str = "x-limit-user-remaining";
const HEADER_USER_RESET: &str = "x-limit-user-reset";
const HEADER_KEY_REMAINING: &str = "x-limit-key-remaining";
const HEADER_KEY_RESET: &str = "x-limit-key-reset";

#[derive(Clone)]
pub struct PocketApi {
    base_url: String,
    consumer_key: String,
    client: Client,
    events: Option<Arc<dyn EventSink>>,
}

impl fmt::Debug for PocketApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PocketApi")
            .field("base_url", &self.base_url)
            .field("events", &self.events.is_some())
            .finish_non_exhaustive()
    }
}

impl PocketApi {
    pub fn new(base_url: &str, consumer_key: &str) -> SatchelResult<Self> {
        let trimmed = base_url.trim_end_matches('/').to_string();
        if trimmed.is_empty() {
            return Err(SatchelError::usage("server URL cannot be empty"));
        }
        if consumer_key.trim().is_empty() {
            return Err(SatchelError::usage(
                "consumer key is required; set POCKET_CONSUMER_KEY or `consumer_key` in the profile",
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!("satchel/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| SatchelError::io(format!("failed to construct API client: {err}")))?;

        Ok(Self {
            base_url: trimmed,
            consumer_key: consumer_key.trim().to_string(),
            client,
            events: None,
        })
    }

    /// Every classified failure is also emitted on `sink` so listeners can
    /// react without the caller forwarding it.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn fetch(&self, access_token: &str, request: &FetchRequest) -> SatchelResult<FetchResponse> {
        let params = self.authorized_params(access_token, request)?;
        self.call(Method::POST, ENDPOINT_GET, params)
    }

    pub fn add(
        &self,
        access_token: &str,
        url: &str,
        title: Option<&str>,
    ) -> SatchelResult<ItemFromApi> {
        if url.trim().is_empty() {
            return Err(SatchelError::usage("url is required to add an item"));
        }

        let mut body = json!({ "url": url });
        if let Some(title) = title
            && !title.trim().is_empty()
        {
            body["title"] = json!(title);
        }

        let params = self.authorized_params(access_token, &body)?;
        let response: AddResponse = self.call(Method::POST, ENDPOINT_ADD, params)?;
        Ok(response.into_item())
    }

    pub fn send_actions(&self, access_token: &str, actions: &[Action]) -> SatchelResult<SendResponse> {
        if actions.is_empty() {
            return Ok(SendResponse::default());
        }

        let params = self.authorized_params(access_token, &json!({ "actions": actions }))?;
        let response: SendResponse = self.call(Method::POST, ENDPOINT_SEND, params)?;
        tracing::debug!(
            actions = actions.len(),
            results = response.action_results.len(),
            "send completed"
        );
        Ok(response)
    }

    pub fn add_batch(
        &self,
        access_token: &str,
        entries: &[(String, Option<String>)],
    ) -> SatchelResult<SendResponse> {
        let actions: Vec<Action> = entries
            .iter()
            .map(|(url, title)| Action::add(url.clone(), title.clone()))
            .collect();
        self.send_actions(access_token, &actions)
    }

    pub fn archive(&self, access_token: &str, item_id: &str) -> SatchelResult<SendResponse> {
        self.send_actions(access_token, &[Action::archive(item_id)])
    }

    pub fn delete(&self, access_token: &str, item_id: &str) -> SatchelResult<SendResponse> {
        self.send_actions(access_token, &[Action::delete(item_id)])
    }

    pub fn favorite(&self, access_token: &str, item_id: &str) -> SatchelResult<SendResponse> {
        self.send_actions(access_token, &[Action::favorite(item_id)])
    }

    pub fn unfavorite(&self, access_token: &str, item_id: &str) -> SatchelResult<SendResponse> {
        self.send_actions(access_token, &[Action::unfavorite(item_id)])
    }

    pub fn update_metadata(
        &self,
        access_token: &str,
        item_id: &str,
        title: &str,
        tags: &[String],
    ) -> SatchelResult<SendResponse> {
        self.send_actions(
            access_token,
            &[
                Action::retitle(item_id, title),
                Action::tags_replace(item_id, tags),
            ],
        )
    }

    /// First leg of the OAuth handshake; the returned code must be approved
    /// by the user at [`PocketApi::authorize_url`].
    pub fn request_token(&self, redirect_uri: &str) -> SatchelResult<String> {
        let params = self.consumer_params(&json!({ "redirect_uri": redirect_uri }))?;
        let response: RequestTokenResponse =
            self.call(Method::POST, ENDPOINT_OAUTH_REQUEST, params)?;
        Ok(response.code)
    }

    pub fn authorize_url(&self, code: &str, redirect_uri: &str) -> String {
        format!(
            "{}/auth/authorize?request_token={}&redirect_uri={}",
            self.base_url,
            urlencoding::encode(code),
            urlencoding::encode(redirect_uri)
        )
    }

    pub fn authorize(&self, code: &str) -> SatchelResult<Authorization> {
        if code.trim().is_empty() {
            return Err(SatchelError::usage("request token code is required"));
        }

        let params = self.consumer_params(&json!({ "code": code }))?;
        self.call(Method::POST, ENDPOINT_OAUTH_AUTHORIZE, params)
    }

    /// Sends one request and maps the outcome to a parsed body or a
    /// classified error. Every failure is logged and broadcast.
    pub fn send(&self, method: Method, endpoint: &str, params: Value) -> SatchelResult<Value> {
        let url = self.url(endpoint);
        let request = if method == Method::GET {
            let query: Vec<(String, String)> = params
                .as_object()
                .map(|map| {
                    map.iter()
                        .map(|(key, value)| (key.clone(), query_value(value)))
                        .collect()
                })
                .unwrap_or_default();
            self.client.get(url).query(&query)
        } else {
            self.client
                .request(method, url)
                .header(CONTENT_TYPE, "application/json; charset=UTF-8")
                .json(&params)
        };

        request
            .header(HEADER_X_ACCEPT, "application/json")
            .send()
            .map_err(network_error)
            .and_then(parse_json_response)
            .inspect_err(|error| self.report_failure(endpoint, error))
    }

    fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: Value,
    ) -> SatchelResult<T> {
        let body = self.send(method, endpoint, params)?;
        serde_json::from_value::<T>(body)
            .map_err(|err| {
                SatchelError::generic(format!(
                    "failed to map API response to expected shape: {err}"
                ))
            })
            .inspect_err(|error| self.report_failure(endpoint, error))
    }

    fn report_failure(&self, endpoint: &str, error: &SatchelError) {
        tracing::warn!(
            endpoint,
            kind = error.kind.as_str(),
            http_code = error.http_code,
            "request failed"
        );
        if let Some(sink) = &self.events {
            sink.emit(Event::from_error(error));
        }
    }

    fn authorized_params<P: serde::Serialize>(
        &self,
        access_token: &str,
        payload: &P,
    ) -> SatchelResult<Value> {
        if access_token.trim().is_empty() {
            return Err(SatchelError::unauthorized(
                "no access token stored; run `satchel auth login` first",
            ));
        }

        let mut params = self.consumer_params(payload)?;
        params["access_token"] = json!(access_token);
        Ok(params)
    }

    fn consumer_params<P: serde::Serialize>(&self, payload: &P) -> SatchelResult<Value> {
        let mut params = match serde_json::to_value(payload)
            .map_err(|err| SatchelError::io(format!("failed to encode request: {err}")))?
        {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(SatchelError::io(format!(
                    "request payload must be an object, got {other}"
                )));
            }
        };
        params.insert("consumer_key".to_string(), json!(self.consumer_key));
        Ok(Value::Object(params))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn parse_json_response(response: Response) -> SatchelResult<Value> {
    let status = response.status();
    let headers = response.headers().clone();
    let body_text = response.text().unwrap_or_default();

    if !status.is_success() {
        return Err(classify_failure(status, &headers, &body_text));
    }

    serde_json::from_str::<Value>(&body_text).map_err(|err| {
        SatchelError::generic(format!("response is not valid JSON: {err}"))
            .with_http_code(status.as_u16())
    })
}

/// Maps a non-success response onto the remote error taxonomy.
pub fn classify_failure(status: StatusCode, headers: &HeaderMap, body_text: &str) -> SatchelError {
    let message = failure_message(status, headers, body_text);
    let code = status.as_u16();

    let error = match status {
        StatusCode::UNAUTHORIZED => SatchelError::unauthorized(message),
        StatusCode::FORBIDDEN => {
            if quota_exhausted(headers) {
                SatchelError::rate_limited(message, reset_delay(headers))
            } else {
                SatchelError::new(satchel_core::ErrorKind::MissingPermissions, message)
            }
        }
        StatusCode::NOT_FOUND => SatchelError::unreachable(message),
        _ => SatchelError::generic(message),
    };

    error.with_http_code(code)
}

fn failure_message(status: StatusCode, headers: &HeaderMap, body_text: &str) -> String {
    if let Some(reason) = header_str(headers, HEADER_X_ERROR)
        && !reason.is_empty()
    {
        return format!("{reason} [http_status={}]", status.as_u16());
    }

    let body_trimmed = body_text.trim();
    if body_trimmed.is_empty() {
        format!("request failed with status {}", status.as_u16())
    } else {
        format!(
            "request failed with status {}: {}",
            status.as_u16(),
            truncate_for_error(body_trimmed, 240)
        )
    }
}

fn quota_exhausted(headers: &HeaderMap) -> bool {
    [HEADER_USER_REMAINING, HEADER_KEY_REMAINING]
        .into_iter()
        .filter_map(|name| header_u64(headers, name))
        .any(|remaining| remaining == 0)
}

fn reset_delay(headers: &HeaderMap) -> Option<u64> {
    if header_u64(headers, HEADER_USER_REMAINING) == Some(0) {
        return header_u64(headers, HEADER_USER_RESET);
    }

    header_u64(headers, HEADER_KEY_RESET).or_else(|| header_u64(headers, HEADER_USER_RESET))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    header_str(headers, name).and_then(|value| value.parse::<u64>().ok())
}

fn truncate_for_error(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }

    let truncated: String = input.chars().take(max_chars).collect();
    format!("{truncated}...")
}

fn network_error(err: reqwest::Error) -> SatchelError {
    SatchelError::unreachable(format!("network request failed: {err}"))
}
