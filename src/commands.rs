//! Command handlers for the `session-request` binary.
//!
//! Each handler drives the library the way an application would and maps
//! library errors to printable messages.

use std::path::Path;

use serde_json::map::Entry;
use serde_json::Value;

use session_request::hooks::{Navigator, Notifier};
use session_request::{ApiClient, RequestOptions, UserInfo};

/// Prints notifications to stderr.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn error(&self, msg: &str) {
        eprintln!("error: {}", msg);
    }
}

/// Tells the user to sign in again instead of changing routes.
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn replace(&self, path: &str) {
        log::info!("Redirect requested to {}", path);
        eprintln!("Session expired. Run `session-request login --token <TOKEN>` to sign in again.");
    }
}

/// Parse a JSON body argument. `None` sends no body.
pub fn parse_body(body: Option<&str>) -> Result<Value, String> {
    match body {
        None => Ok(Value::Null),
        Some(raw) => serde_json::from_str(raw).map_err(|e| format!("Invalid JSON body: {}", e)),
    }
}

/// Turn `key=value` arguments into a JSON object of query parameters.
///
/// Repeated keys become arrays.
pub fn parse_query(pairs: &[String]) -> Result<Value, String> {
    let mut map = serde_json::Map::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("Invalid query parameter (expected key=value): {}", pair))?;
        let value = Value::String(value.to_string());
        match map.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::Array(items) => items.push(value),
                existing => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
            },
        }
    }
    if map.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(map))
    }
}

pub async fn get(api: &ApiClient, path: &str, query: &[String]) -> Result<(), String> {
    let params = parse_query(query)?;
    let result = api
        .get::<Value, _>(path, &params, RequestOptions::default())
        .await
        .map_err(|e| e.to_string())?;
    print_json(&result.data)
}

pub async fn delete(api: &ApiClient, path: &str, query: &[String]) -> Result<(), String> {
    let params = parse_query(query)?;
    let result = api
        .delete::<Value, _>(path, &params, RequestOptions::default())
        .await
        .map_err(|e| e.to_string())?;
    print_json(&result.data)
}

pub async fn post(api: &ApiClient, path: &str, body: Option<&str>) -> Result<(), String> {
    let params = parse_body(body)?;
    let result = api
        .post::<Value, _>(path, &params, RequestOptions::default())
        .await
        .map_err(|e| e.to_string())?;
    print_json(&result.data)
}

pub async fn put(api: &ApiClient, path: &str, body: Option<&str>) -> Result<(), String> {
    let params = parse_body(body)?;
    let result = api
        .put::<Value, _>(path, &params, RequestOptions::default())
        .await
        .map_err(|e| e.to_string())?;
    print_json(&result.data)
}

pub async fn download(
    api: &ApiClient,
    path: &str,
    body: Option<&str>,
    out: &Path,
) -> Result<(), String> {
    let params = parse_body(body)?;
    let bytes = api
        .download(path, &params, RequestOptions::default())
        .await
        .map_err(|e| e.to_string())?;
    tokio::fs::write(out, &bytes)
        .await
        .map_err(|e| format!("Failed to write {}: {}", out.display(), e))?;
    log::info!("Downloaded {} bytes to {}", bytes.len(), out.display());
    Ok(())
}

/// Store a token (and optionally the user's name) in the session.
pub async fn login(api: &ApiClient, token: String, name: Option<String>) -> Result<(), String> {
    let session = api.session();
    session.set_token(token).await;
    if let Some(name) = name {
        let mut info = session.user_info().await;
        info.name = name;
        session.set_user_info(info).await;
    }
    log::info!("Session token stored in '{}'", session.store_id());
    Ok(())
}

/// Drop the stored session.
pub async fn logout(api: &ApiClient) -> Result<(), String> {
    api.cancel_all_pending();
    api.session().clear().await;
    log::info!("Session cleared");
    Ok(())
}

/// Print the stored user info and whether a token is present.
pub async fn whoami(api: &ApiClient) -> Result<(), String> {
    let session = api.session();
    let info: UserInfo = session.user_info().await;
    let summary = serde_json::json!({
        "authenticated": session.is_authenticated().await,
        "userInfo": info,
    });
    print_json(&summary)
}

fn print_json(value: &Value) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to format response: {}", e))?;
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_query() {
        let args = vec![
            "page=2".to_string(),
            "tag=a".to_string(),
            "tag=b".to_string(),
            "empty=".to_string(),
        ];
        let params = parse_query(&args).unwrap();
        assert_eq!(
            params,
            json!({ "page": "2", "tag": ["a", "b"], "empty": "" })
        );
    }

    #[test]
    fn test_parse_query_tag_three_times() {
        let args: Vec<String> = ["t=1", "t=2", "t=3"].iter().map(|s| s.to_string()).collect();
        assert_eq!(parse_query(&args).unwrap(), json!({ "t": ["1", "2", "3"] }));
    }

    #[test]
    fn test_parse_query_empty_is_null() {
        assert_eq!(parse_query(&[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_query_rejects_missing_equals() {
        let err = parse_query(&["oops".to_string()]).unwrap_err();
        assert!(err.contains("key=value"));
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(None).unwrap(), Value::Null);
        assert_eq!(parse_body(Some(r#"{"a":1}"#)).unwrap(), json!({ "a": 1 }));
        assert!(parse_body(Some("{not json")).is_err());
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        let api = ApiClient::builder(session_request::ClientConfig::default())
            .build()
            .unwrap();

        login(&api, "tok".to_string(), Some("Ada".to_string())).await.unwrap();
        assert_eq!(api.session().token().await, "tok");
        assert_eq!(api.session().user_info().await.name, "Ada");

        logout(&api).await.unwrap();
        assert_eq!(api.session().token().await, "");
        assert_eq!(api.session().user_info().await, UserInfo::default());
    }
}
