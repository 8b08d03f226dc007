//! `web_search` tool subprocess: queries the Brave Search API. Grounded on
//! `tools/web_search/web_search.h`'s params (`query`, `count`, `offset`,
//! `allowed_domains`, `blocked_domains`) and
//! `src/tools/web_search_brave/web_search_brave.c`'s status-code mapping
//! and domain allow/block filtering. Credential-file fallback is out of
//! scope here; only `BRAVE_API_KEY` is consulted.

use std::io::{Read, Write};

use serde_json::{Value, json};

const SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";

struct ToolError {
    message: String,
    code: &'static str,
}

impl ToolError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    fn into_json(self) -> Value {
        json!({ "error": self.message, "error_code": self.code })
    }
}

fn schema() -> Value {
    json!({
        "name": "web_search",
        "description": "Search the web via the Brave Search API.",
        "parameters": {
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query." },
                "count": { "type": "integer", "description": "Number of results to return. Defaults to 10." },
                "offset": { "type": "integer", "description": "Result offset for pagination. Defaults to 0." },
                "allowed_domains": { "type": "array", "items": { "type": "string" }, "description": "Only keep results whose URL matches one of these domains." },
                "blocked_domains": { "type": "array", "items": { "type": "string" }, "description": "Drop results whose URL matches one of these domains." },
            },
            "required": ["query"],
        },
    })
}

fn string_list(args: &Value, name: &str) -> Vec<String> {
    args.get(name)
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn host_of(url: &str) -> Option<String> {
    reqwest::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_lowercase))
}

fn matches_domain(url: &str, domain: &str) -> bool {
    let Some(host) = host_of(url) else { return false };
    let domain = domain.to_lowercase();
    host == domain || host.ends_with(&format!(".{domain}"))
}

fn passes_domain_filters(url: &str, allowed: &[String], blocked: &[String]) -> bool {
    if !allowed.is_empty() && !allowed.iter().any(|d| matches_domain(url, d)) {
        return false;
    }
    if blocked.iter().any(|d| matches_domain(url, d)) {
        return false;
    }
    true
}

fn status_error(status: reqwest::StatusCode) -> ToolError {
    match status.as_u16() {
        401 | 403 => ToolError::new("AUTH_INVALID", "API key is invalid or unauthorized"),
        429 => ToolError::new("RATE_LIMIT", "Rate limit exceeded"),
        _ => ToolError::new("API_ERROR", format!("API returned status {status}")),
    }
}

fn build_output(body: &Value, allowed: &[String], blocked: &[String]) -> Value {
    let results = body
        .get("web")
        .and_then(|web| web.get("results"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let filtered: Vec<Value> = results
        .into_iter()
        .filter_map(|item| {
            let url = item.get("url").and_then(Value::as_str)?.to_string();
            if !passes_domain_filters(&url, allowed, blocked) {
                return None;
            }
            let mut result = json!({ "url": url });
            if let Some(title) = item.get("title").and_then(Value::as_str) {
                result["title"] = json!(title);
            }
            if let Some(description) = item.get("description").and_then(Value::as_str) {
                result["snippet"] = json!(description);
            }
            Some(result)
        })
        .collect();

    json!({ "output": { "count": filtered.len(), "results": filtered } })
}

async fn run(args: &Value) -> Value {
    let Some(query) = args.get("query").and_then(Value::as_str) else {
        return ToolError::new("API_ERROR", "missing required parameter 'query'").into_json();
    };
    let count = args.get("count").and_then(Value::as_i64).unwrap_or(10);
    let offset = args.get("offset").and_then(Value::as_i64).unwrap_or(0);
    let allowed = string_list(args, "allowed_domains");
    let blocked = string_list(args, "blocked_domains");

    let api_key = match std::env::var("BRAVE_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => return ToolError::new("AUTH_INVALID", "BRAVE_API_KEY is not set").into_json(),
    };

    let client = match reqwest::Client::builder().build() {
        Ok(client) => client,
        Err(err) => return ToolError::new("NETWORK_ERROR", format!("failed to build HTTP client: {err}")).into_json(),
    };

    let response = client
        .get(SEARCH_URL)
        .header("Accept", "application/json")
        .header("X-Subscription-Token", api_key)
        .query(&[("q", query), ("count", &count.to_string()), ("offset", &offset.to_string())])
        .send()
        .await;

    let response = match response {
        Ok(response) => response,
        Err(_) => return ToolError::new("NETWORK_ERROR", "network request failed").into_json(),
    };

    if !response.status().is_success() {
        return status_error(response.status()).into_json();
    }

    let body: Value = match response.json().await {
        Ok(body) => body,
        Err(_) => return ToolError::new("API_ERROR", "invalid JSON response from API").into_json(),
    };

    if body.get("web").is_none() {
        return ToolError::new("API_ERROR", "missing web results in API response").into_json();
    }

    build_output(&body, &allowed, &blocked)
}

#[tokio::main]
async fn main() {
    let mut args = std::env::args();
    if args.any(|arg| arg == "--schema") {
        println!("{}", schema());
        return;
    }

    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        println!("{}", ToolError::new("NETWORK_ERROR", "failed to read stdin").into_json());
        return;
    }

    let parsed: Value = match serde_json::from_str(&input) {
        Ok(value) => value,
        Err(err) => {
            println!("{}", ToolError::new("API_ERROR", format!("invalid input JSON: {err}")).into_json());
            return;
        }
    };

    let result = run(&parsed).await;
    let _ = std::io::stdout().write_all(result.to_string().as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn domain_matches_exact_and_subdomains() {
        assert!(matches_domain("https://example.com/page", "example.com"));
        assert!(matches_domain("https://www.example.com/page", "example.com"));
        assert!(!matches_domain("https://notexample.com/page", "example.com"));
    }

    #[test]
    fn allowed_domains_filter_out_non_matching_results() {
        let body = json!({
            "web": { "results": [
                { "url": "https://example.com/a", "title": "A" },
                { "url": "https://other.com/b", "title": "B" },
            ] }
        });
        let output = build_output(&body, &["example.com".to_string()], &[]);
        let results = output["output"]["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["url"], "https://example.com/a");
    }

    #[test]
    fn blocked_domains_filter_out_matching_results() {
        let body = json!({
            "web": { "results": [
                { "url": "https://example.com/a", "title": "A" },
                { "url": "https://other.com/b", "title": "B" },
            ] }
        });
        let output = build_output(&body, &[], &["example.com".to_string()]);
        let results = output["output"]["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["url"], "https://other.com/b");
    }

    #[test]
    fn results_without_a_url_are_skipped() {
        let body = json!({ "web": { "results": [ { "title": "no url" } ] } });
        let output = build_output(&body, &[], &[]);
        assert_eq!(output["output"]["count"], 0);
    }

    #[test]
    fn schema_has_expected_shape() {
        let schema = schema();
        assert_eq!(schema["name"], "web_search");
        assert_eq!(schema["parameters"]["required"][0], "query");
    }
}
