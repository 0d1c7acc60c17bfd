// Sumologic HTTP collector output - one POST per event
//
// DESIGN: The collector's hosted HTTP source authenticates via the source
// key embedded in the URL path, so no auth header is set here. The body is
// the event reshaped per the configured format: a JSON object, a
// form-urlencoded query string, or a templated plain-text message.
//
// Delivery is best-effort single-attempt: no retries, no batching. The
// response body is always drained so the underlying connection can be
// reused for the next event.

use super::Output;
use crate::config::{Config, Format};
use crate::event::{value_to_string, Event, Fields};
use crate::template;
use anyhow::{Context, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use url::form_urlencoded;

pub struct SumologicOutput {
    client: reqwest::Client,
    host: String,
    path: String,
    key: String,
    url: Option<String>,
    content_type: String,
    mapping: Option<IndexMap<String, String>>,
    format: Format,
    message: Option<String>,
    finished: AtomicBool,
}

impl SumologicOutput {
    /// Setup contract: resolve the effective content type and validate the
    /// format/message coupling. Runs once, before any event is processed.
    pub fn new(config: &Config) -> Result<Self> {
        let content_type = match &config.content_type {
            Some(explicit) => explicit.clone(),
            None => match config.format {
                Format::Form => "application/x-www-form-urlencoded".to_string(),
                Format::Json => "application/json".to_string(),
                Format::Message => "text/plain".to_string(),
            },
        };

        if config.format == Format::Message {
            if config.message.is_none() {
                anyhow::bail!("message must be set if message format is used");
            }
            if config.mapping.is_some() {
                warn!("mapping is not supported and will be ignored if message format is used");
            }
        }

        Ok(Self {
            client: reqwest::Client::new(),
            host: config.host.clone(),
            path: config.path.clone(),
            key: config.key.clone(),
            url: config.url.clone(),
            content_type,
            mapping: config.mapping.clone(),
            format: config.format,
            message: config.message.clone(),
            finished: AtomicBool::new(false),
        })
    }

    /// The record the body is built from: either the mapping expanded
    /// against the event (in configuration order), or the whole event.
    fn intermediate(&self, event: &Event, fields: &Fields) -> Fields {
        match &self.mapping {
            Some(mapping) if self.format != Format::Message => mapping
                .iter()
                .map(|(k, tmpl)| (k.clone(), template::expand(tmpl, event).into()))
                .collect(),
            _ => fields.clone(),
        }
    }

    fn build_body(&self, event: &Event, fields: &Fields) -> Result<String> {
        match self.format {
            Format::Json => {
                let body = serde_json::to_string(&self.intermediate(event, fields))?;
                Ok(body)
            }
            Format::Message => {
                let Some(message) = &self.message else {
                    anyhow::bail!("message format configured without a message template");
                };
                Ok(template::expand(message, event))
            }
            Format::Form => {
                let mut serializer = form_urlencoded::Serializer::new(String::new());
                for (k, v) in &self.intermediate(event, fields) {
                    serializer.append_pair(k, &value_to_string(v));
                }
                Ok(serializer.finish())
            }
        }
    }

    /// The request target. When an override `url` is configured, its
    /// template expansion wins; otherwise the host/path/key composition
    /// (also logged diagnostically either way) is used.
    fn resolve_url(&self, event: &Event) -> String {
        let composed = format!(
            "https://{}{}{}",
            self.host,
            self.path,
            template::expand(&self.key, event)
        );
        debug!(url = %composed, "collector url");

        match &self.url {
            Some(url) => template::expand(url, event),
            None => composed,
        }
    }

    /// The fallible per-event path. Errors are converted to a logged and
    /// dropped outcome by `send`.
    async fn transmit(&self, event: &Event, fields: &Fields) -> Result<()> {
        let url = self.resolve_url(event);
        let body = self
            .build_body(event, fields)
            .with_context(|| format!("building {} body", self.content_type))?;

        let response = self
            .client
            .post(&url)
            .header("Content-Type", &self.content_type)
            .body(body)
            .send()
            .await
            .with_context(|| format!("POST {}", url))?;

        let status = response.status();

        // Consume the body to let this connection be reused
        let response_body = response
            .bytes()
            .await
            .with_context(|| format!("draining response from {}", url))?;

        if !status.is_success() {
            anyhow::bail!(
                "HTTP {} from {}: {}",
                status,
                url,
                String::from_utf8_lossy(&response_body)
            );
        }

        Ok(())
    }
}

#[async_trait]
impl Output for SumologicOutput {
    async fn send(&self, event: &Event) {
        let fields = match event {
            Event::Record(fields) => fields,
            Event::Shutdown => {
                debug!("shutdown sentinel received");
                self.finished.store(true, Ordering::SeqCst);
                return;
            }
        };

        if let Err(e) = self.transmit(event, fields).await {
            warn!(error = %format!("{:#}", e), "delivery failed, event dropped");
        }
    }

    fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config(yaml: &str) -> Config {
        Config::from_yaml(yaml).unwrap()
    }

    fn output(yaml: &str) -> SumologicOutput {
        SumologicOutput::new(&config(yaml)).unwrap()
    }

    fn record(json: &str) -> Event {
        Event::from_json_line(json).unwrap()
    }

    fn body_of(out: &SumologicOutput, event: &Event) -> String {
        let Event::Record(fields) = event else {
            panic!("expected a record");
        };
        out.build_body(event, fields).unwrap()
    }

    #[test]
    fn test_content_type_derived_from_format() {
        assert_eq!(output("key: \"k\"").content_type, "application/json");
        assert_eq!(
            output("key: \"k\"\nformat: \"form\"").content_type,
            "application/x-www-form-urlencoded"
        );
        assert_eq!(
            output("key: \"k\"\nformat: \"message\"\nmessage: \"m\"").content_type,
            "text/plain"
        );
    }

    #[test]
    fn test_explicit_content_type_wins() {
        let out = output("key: \"k\"\ncontent_type: \"application/vnd.custom\"");
        assert_eq!(out.content_type, "application/vnd.custom");
    }

    #[test]
    fn test_message_format_requires_message() {
        let result = SumologicOutput::new(&config("key: \"k\"\nformat: \"message\""));
        assert!(result.is_err());
    }

    #[test]
    fn test_message_format_with_mapping_still_starts() {
        let yaml = r#"
key: "k"
format: "message"
message: "Host: %{host}"
mapping:
  a: "%{host}"
        "#;
        // Warned about, not fatal
        assert!(SumologicOutput::new(&config(yaml)).is_ok());
    }

    #[test]
    fn test_json_body_without_mapping_is_whole_event() {
        let out = output("key: \"k\"");
        let event = record(r#"{"host": "web1", "status": 200, "tags": ["a", "b"]}"#);

        let parsed: serde_json::Value = serde_json::from_str(&body_of(&out, &event)).unwrap();
        assert_eq!(
            parsed,
            json!({"host": "web1", "status": 200, "tags": ["a", "b"]})
        );
    }

    #[test]
    fn test_json_body_with_mapping() {
        let yaml = r#"
key: "k"
mapping:
  a: "%{field1}"
  b: "%{field2}"
        "#;
        let out = output(yaml);
        let event = record(r#"{"field1": "x", "field2": "y", "extra": "ignored"}"#);

        // Exactly the mapped pairs, extra fields not reflected
        assert_eq!(body_of(&out, &event), r#"{"a":"x","b":"y"}"#);
    }

    #[test]
    fn test_json_body_key_order_follows_mapping() {
        let yaml = r#"
key: "k"
mapping:
  zebra: "%{a}"
  alpha: "%{b}"
        "#;
        let out = output(yaml);
        let event = record(r#"{"a": "1", "b": "2"}"#);
        assert_eq!(body_of(&out, &event), r#"{"zebra":"1","alpha":"2"}"#);
    }

    #[test]
    fn test_form_body_round_trips() {
        let out = output("key: \"k\"\nformat: \"form\"");
        let event = record(r#"{"q": "a&b=c d", "emoji": "café", "n": 7}"#);

        let body = body_of(&out, &event);
        let decoded: Vec<(String, String)> = form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect();

        assert_eq!(
            decoded,
            vec![
                ("q".to_string(), "a&b=c d".to_string()),
                ("emoji".to_string(), "café".to_string()),
                ("n".to_string(), "7".to_string()),
            ]
        );
        // Reserved characters actually escaped in the wire form
        assert!(!body.contains("a&b"));
        assert!(!body.contains(' '));
    }

    #[test]
    fn test_form_body_uses_mapping() {
        let yaml = r#"
key: "k"
format: "form"
mapping:
  who: "%{host}"
        "#;
        let out = output(yaml);
        let event = record(r#"{"host": "web 1", "extra": "x"}"#);
        assert_eq!(body_of(&out, &event), "who=web+1");
    }

    #[test]
    fn test_message_body_ignores_mapping() {
        let yaml = r#"
key: "k"
format: "message"
message: "Host: %{host}"
mapping:
  a: "%{other}"
        "#;
        let out = output(yaml);
        let event = record(r#"{"host": "web1", "other": "nope"}"#);
        assert_eq!(body_of(&out, &event), "Host: web1");
    }

    #[test]
    fn test_url_override_takes_precedence() {
        let yaml = r#"
key: "static"
url: "https://example.com/in/%{tenant}"
        "#;
        let out = output(yaml);
        let event = record(r#"{"tenant": "acme"}"#);
        assert_eq!(out.resolve_url(&event), "https://example.com/in/acme");
    }

    #[test]
    fn test_url_composed_when_no_override() {
        let yaml = r#"
host: "collectors.example.com"
path: "/receiver/v1/http/"
key: "%{tenant}-key"
        "#;
        let out = output(yaml);
        let event = record(r#"{"tenant": "acme"}"#);
        assert_eq!(
            out.resolve_url(&event),
            "https://collectors.example.com/receiver/v1/http/acme-key"
        );
    }

    /// Accept one connection, read one HTTP/1.1 request, answer 200.
    /// Returns the raw request text.
    async fn one_shot_server(listener: TcpListener) -> String {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length: "))
                    .or_else(|| {
                        text.lines().find_map(|l| l.strip_prefix("Content-Length: "))
                    })
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= header_end + 4 + content_length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nok")
            .await
            .unwrap();
        String::from_utf8_lossy(&raw).to_string()
    }

    #[tokio::test]
    async fn test_send_posts_body_and_content_type() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(one_shot_server(listener));

        let yaml = format!("key: \"k\"\nurl: \"http://{}/in/k\"\n", addr);
        let out = output(&yaml);
        out.send(&record(r#"{"host": "web1"}"#)).await;

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /in/k HTTP/1.1"));
        assert!(request.to_lowercase().contains("content-type: application/json"));
        assert!(request.ends_with(r#"{"host":"web1"}"#));
        assert!(!out.finished());
    }

    #[tokio::test]
    async fn test_send_swallows_connection_refused() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let yaml = format!("key: \"k\"\nurl: \"http://{}/in/k\"\n", addr);
        let out = output(&yaml);

        // Logged and dropped, no panic, no propagation
        out.send(&record(r#"{"host": "web1"}"#)).await;
        out.send(&record(r#"{"host": "web2"}"#)).await;
        assert!(!out.finished());
    }

    #[tokio::test]
    async fn test_send_swallows_http_error_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 4\r\n\r\nbusy")
                .await
                .unwrap();
        });

        let yaml = format!("key: \"k\"\nurl: \"http://{}/in/k\"\n", addr);
        let out = output(&yaml);
        out.send(&record(r#"{"host": "web1"}"#)).await;
    }

    #[tokio::test]
    async fn test_shutdown_sentinel_makes_no_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let yaml = format!("key: \"k\"\nurl: \"http://{}/in/k\"\n", addr);
        let out = output(&yaml);
        out.send(&Event::Shutdown).await;
        assert!(out.finished());

        // Nothing ever connects
        let accepted =
            tokio::time::timeout(Duration::from_millis(100), listener.accept()).await;
        assert!(accepted.is_err());
    }
}
