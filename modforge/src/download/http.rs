//! HTTP client seam.
//!
//! Downloaders never hold a global session. A client handle is built once per
//! pipeline run and passed down, so tests can substitute an in-memory fake.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::LOCATION;
use reqwest::redirect;

use crate::config::PipelineConfig;
use crate::error::{ModError, ModResult};

/// A streamed response body.
pub struct HttpBody {
    pub reader: Box<dyn Read + Send>,
    /// Value of `Content-Length`, when sent.
    pub content_length: Option<u64>,
}

impl std::fmt::Debug for HttpBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Blocking HTTP operations used by the downloaders.
///
/// Connection-level failures must surface as [`ModError::Network`], the only
/// error the retry loop acts on.
pub trait HttpClient: Send + Sync {
    /// GET a page as text.
    fn get_text(&self, url: &str) -> ModResult<String>;

    /// GET a resource as a byte stream.
    fn get(&self, url: &str) -> ModResult<HttpBody>;

    /// GET without following redirects, returning the `Location` header.
    fn redirect_location(&self, url: &str) -> ModResult<Option<String>>;
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
    no_redirect: Client,
}

impl ReqwestClient {
    /// Create a client with the given user agent and timeout.
    pub fn new(user_agent: &str, timeout: Duration) -> ModResult<Self> {
        let build = |policy: redirect::Policy| {
            Client::builder()
                .user_agent(user_agent)
                .timeout(timeout)
                .redirect(policy)
                .build()
                .map_err(|e| ModError::InvalidConfig(format!("HTTP client: {}", e)))
        };

        Ok(Self {
            client: build(redirect::Policy::default())?,
            no_redirect: build(redirect::Policy::none())?,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> ModResult<Self> {
        Self::new(&config.user_agent, config.timeout)
    }

    fn send(&self, client: &Client, url: &str) -> ModResult<Response> {
        tracing::debug!(url = %url, "GET");
        client.get(url).send().map_err(|e| map_error(url, e))
    }
}

fn map_error(url: &str, e: reqwest::Error) -> ModError {
    if e.is_connect() || e.is_timeout() {
        ModError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        }
    } else {
        ModError::RequestFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

fn ensure_success(url: &str, response: Response) -> ModResult<Response> {
    let status = response.status();
    if !status.is_success() {
        return Err(ModError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

impl HttpClient for ReqwestClient {
    fn get_text(&self, url: &str) -> ModResult<String> {
        let response = ensure_success(url, self.send(&self.client, url)?)?;
        response.text().map_err(|e| map_error(url, e))
    }

    fn get(&self, url: &str) -> ModResult<HttpBody> {
        let response = ensure_success(url, self.send(&self.client, url)?)?;
        Ok(HttpBody {
            content_length: response.content_length(),
            reader: Box::new(response),
        })
    }

    fn redirect_location(&self, url: &str) -> ModResult<Option<String>> {
        let response = self.send(&self.no_redirect, url)?;
        Ok(response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory client for downloader tests.

    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;

    use super::*;

    /// Canned response for one URL.
    #[derive(Debug, Clone)]
    pub enum Canned {
        Body(Vec<u8>),
        Redirect(String),
        Status(u16),
        /// Connection failure for the first `n` requests, then the body.
        Flaky { failures: usize, body: Vec<u8> },
    }

    #[derive(Debug, Default)]
    pub struct FakeClient {
        responses: Mutex<HashMap<String, Canned>>,
        requests: Mutex<Vec<String>>,
    }

    impl FakeClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(self, url: &str, canned: Canned) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(url.to_string(), canned);
            self
        }

        pub fn with_body(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.with(url, Canned::Body(body.into()))
        }

        /// Every URL requested so far, in order.
        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self, url: &str) -> usize {
            self.requests().iter().filter(|r| *r == url).count()
        }

        fn respond(&self, url: &str) -> ModResult<Canned> {
            self.requests.lock().unwrap().push(url.to_string());
            let mut responses = self.responses.lock().unwrap();
            match responses.get_mut(url) {
                None => Err(ModError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                }),
                Some(Canned::Status(status)) => Err(ModError::HttpStatus {
                    url: url.to_string(),
                    status: *status,
                }),
                Some(Canned::Flaky { failures, body }) => {
                    if *failures > 0 {
                        *failures -= 1;
                        Err(ModError::Network {
                            url: url.to_string(),
                            reason: "connection reset".to_string(),
                        })
                    } else {
                        Ok(Canned::Body(body.clone()))
                    }
                }
                Some(canned) => Ok(canned.clone()),
            }
        }
    }

    impl HttpClient for FakeClient {
        fn get_text(&self, url: &str) -> ModResult<String> {
            match self.respond(url)? {
                Canned::Body(body) => Ok(String::from_utf8_lossy(&body).into_owned()),
                _ => Ok(String::new()),
            }
        }

        fn get(&self, url: &str) -> ModResult<HttpBody> {
            match self.respond(url)? {
                Canned::Body(body) => Ok(HttpBody {
                    content_length: Some(body.len() as u64),
                    reader: Box::new(Cursor::new(body)),
                }),
                _ => Ok(HttpBody {
                    content_length: Some(0),
                    reader: Box::new(Cursor::new(Vec::new())),
                }),
            }
        }

        fn redirect_location(&self, url: &str) -> ModResult<Option<String>> {
            match self.respond(url)? {
                Canned::Redirect(location) => Ok(Some(location)),
                _ => Ok(None),
            }
        }
    }
}
