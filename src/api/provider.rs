use async_trait::async_trait;
use serde_json::Value;

/// Query parameters for one API call.
pub type Params = [(&'static str, String)];

/// Seam over the football data API. Every caller treats `None` as
/// "no data right now" and degrades instead of failing.
#[async_trait]
pub trait FootballApi: Send + Sync {
    /// GET `endpoint` with `params`; `None` on any transport, status or
    /// payload failure.
    async fn fetch(&self, endpoint: &str, params: &Params) -> Option<Value>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Requests issued so far (quota visibility).
    fn requests_made(&self) -> u64;
}

/// Items of the provider's `response` array, empty when absent.
pub fn response_items(payload: &Value) -> &[Value] {
    payload
        .get("response")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
