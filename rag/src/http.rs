use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::from_str;
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("{method} {url} timed out")]
    Timeout { method: &'static str, url: String },
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url} failed: {status} {body}")]
    Status {
        method: &'static str,
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{method} {url} decode failed: {message} | {body}")]
    Decode {
        method: &'static str,
        url: String,
        message: String,
        body: String,
    },
}

impl HttpError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Timeout { .. })
    }
}

/// Blocking JSON client shared by the embedding and generation backends.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    auth_token: Option<String>,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration, auth_token: Option<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            auth_token,
            timeout,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, reqwest::Error> {
        Self::new(cfg.request_timeout, cfg.auth_token.clone())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        let mut req = self.client.get(url);
        if let Some(token) = &self.auth_token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let resp = req.send().map_err(|e| transport("GET", url, e))?;
        read_json("GET", url, resp)
    }

    pub fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        let mut req = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        if let Some(token) = &self.auth_token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let resp = req.send().map_err(|e| transport("POST", url, e))?;
        read_json("POST", url, resp)
    }
}

fn transport(method: &'static str, url: &str, err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout {
            method,
            url: url.to_string(),
        }
    } else {
        HttpError::Transport {
            method,
            url: url.to_string(),
            source: err,
        }
    }
}

fn read_json<T: DeserializeOwned>(
    method: &'static str,
    url: &str,
    resp: reqwest::blocking::Response,
) -> Result<T, HttpError> {
    let status = resp.status();
    let text = resp.text().map_err(|e| transport(method, url, e))?;
    if !status.is_success() {
        return Err(HttpError::Status {
            method,
            url: url.to_string(),
            status,
            body: text,
        });
    }
    from_str::<T>(&text).map_err(|e| HttpError::Decode {
        method,
        url: url.to_string(),
        message: e.to_string(),
        body: text,
    })
}
