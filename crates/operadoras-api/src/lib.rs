// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use operadoras_app::{Cnpj, Operadora, OperadoraDetail, OperadoraPage};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

const LIST_PATH: [&str; 2] = ["api", "operadoras"];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("cannot reach {url} -- is the operadoras API running? ({source})")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("server error ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("base url {0} cannot take path segments")]
    InvalidBaseUrl(String),
}

impl ApiError {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Status { .. } => "status",
            Self::Decode { .. } => "decode",
            Self::InvalidBaseUrl(_) => "config",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    base: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let base = Url::parse(trimmed).with_context(|| format!("parse api.base_url {trimmed:?}"))?;
        if !matches!(base.scheme(), "http" | "https") {
            bail!(
                "api.base_url must use http or https, got {:?}",
                base.scheme()
            );
        }
        if base.cannot_be_a_base() {
            bail!("api.base_url {trimmed:?} is not a base URL");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `GET /api/operadoras?page=&search=`; `page` is 1-based.
    pub fn list_operadoras(&self, page: u32, search: &str) -> Result<OperadoraPage, ApiError> {
        let mut url = self.endpoint(&LIST_PATH)?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("search", search);

        let envelope: ListEnvelope = self.get_json(url)?;
        Ok(OperadoraPage {
            items: envelope.data,
            total: envelope.total,
        })
    }

    /// `GET /api/operadoras/{cnpj}`.
    pub fn get_operadora(&self, cnpj: &Cnpj) -> Result<OperadoraDetail, ApiError> {
        let url = self.endpoint(&[LIST_PATH[0], LIST_PATH[1], cnpj.as_str()])?;
        self.get_json(url)
    }

    pub fn ping(&self) -> Result<(), ApiError> {
        self.list_operadoras(1, "").map(|_| ())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        debug!(%url, "GET");
        let response = self
            .http
            .get(url.clone())
            .send()
            .map_err(|source| ApiError::Transport {
                url: self.base_url().to_owned(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let body = read_body(response, self.base_url())?;
        serde_json::from_str(&body).map_err(|error| ApiError::Decode {
            url: url.path().to_owned(),
            message: error.to_string(),
        })
    }
}

fn read_body(response: Response, base_url: &str) -> Result<String, ApiError> {
    response.text().map_err(|source| ApiError::Transport {
        url: base_url.to_owned(),
        source,
    })
}

fn clean_error_response(status: StatusCode, body: &str) -> ApiError {
    let code = status.as_u16();
    if let Ok(parsed) = serde_json::from_str::<FastApiErrorEnvelope>(body)
        && let Some(message) = parsed.detail.as_ref().and_then(detail_message)
    {
        return ApiError::Status {
            status: code,
            message,
        };
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        return ApiError::Status {
            status: code,
            message: trimmed.to_owned(),
        };
    }

    ApiError::Status {
        status: code,
        message: status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned(),
    }
}

fn detail_message(detail: &Value) -> Option<String> {
    match detail {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_owned()),
        Value::Array(items) => items
            .first()
            .and_then(|item| item.get("msg"))
            .and_then(Value::as_str)
            .map(str::to_owned),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    data: Vec<Operadora>,
    total: u64,
}

#[derive(Debug, Deserialize)]
struct FastApiErrorEnvelope {
    detail: Option<Value>,
}
