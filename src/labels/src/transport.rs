use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Method};
use serde_json::{Map, Value};

use crate::{value::stringify_value, HttpRequest, HttpResponse, HttpTransport};

/// [`HttpTransport`] over a shared reqwest client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = ClientBuilder::new().build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn request(&self, request: HttpRequest) -> anyhow::Result<HttpResponse> {
        let method = Method::from_bytes(request.method.as_bytes())?;
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(params) = &request.params {
            builder = builder.query(&query_pairs(params));
        }
        match &request.body {
            Some(body) if !body.is_null() => builder = builder.json(body),
            _ => {}
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let data = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            data,
        })
    }
}

// 数组按 key[]=a&key[]=b 展开
fn query_pairs(params: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Some(item) = stringify_value(item) {
                        pairs.push((format!("{}[]", key), item));
                    }
                }
            }
            other => {
                if let Some(value) = stringify_value(other) {
                    pairs.push((key.clone(), value));
                }
            }
        }
    }
    pairs
}
