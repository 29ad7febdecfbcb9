use std::time::Duration;

use log::debug;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{CircleError, Result};
use crate::providers::circleci::types::Page;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TOKEN_HEADER: &str = "Circle-Token";
const PAGE_TOKEN_PARAM: &str = "page-token";

pub const DEFAULT_BASE_URL: &str = "https://circleci.com/";

pub struct CircleCIClient {
    client: Client,
    v2_url: Url,
    v1_url: Url,
    token: String,
}

impl CircleCIClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("circle-cli/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CircleError::Config(format!("Failed to create HTTP client: {e}")))?;

        let base = Url::parse(base_url)
            .map_err(|e| CircleError::Config(format!("Invalid base URL: {e}")))?;

        let v2_url = base
            .join("api/v2/")
            .map_err(|e| CircleError::Config(format!("Invalid API base URL: {e}")))?;
        let v1_url = base
            .join("api/v1.1/")
            .map_err(|e| CircleError::Config(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client,
            v2_url,
            v1_url,
            token: token.into(),
        })
    }

    pub(super) fn v2(&self, path: &str) -> Result<Url> {
        self.v2_url
            .join(path)
            .map_err(|e| CircleError::Config(format!("Invalid API URL '{path}': {e}")))
    }

    pub(super) fn v1(&self, path: &str) -> Result<Url> {
        self.v1_url
            .join(path)
            .map_err(|e| CircleError::Config(format!("Invalid API URL '{path}': {e}")))
    }

    fn auth_request(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(TOKEN_HEADER, &self.token)
    }

    /// Maps a non-2xx response to [`CircleError::Api`], keeping the body for diagnosis.
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        Err(CircleError::Api {
            url,
            status: status.as_u16(),
            message,
        })
    }

    pub(super) async fn get_json<T>(&self, url: Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        debug!("GET {url}");
        let response = self.auth_request(self.client.get(url)).send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Fetches from a pre-signed URL. The token is not sent to a foreign host.
    pub(super) async fn get_signed_json<T>(&self, url: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        debug!("GET (signed) {url}");
        let response = self.client.get(url).send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Follows `next_page_token` until the pages run out or `limit` items are
    /// collected, then truncates to `limit`.
    pub(super) async fn get_paginated<T>(
        &self,
        url: Url,
        params: &[(&str, &str)],
        limit: Option<usize>,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let response = {
                let mut query: Vec<(&str, &str)> = params.to_vec();
                if let Some(token) = page_token.as_deref() {
                    query.push((PAGE_TOKEN_PARAM, token));
                }

                debug!("GET {url} {query:?}");
                let request = self.client.get(url.clone()).query(&query);
                self.auth_request(request).send().await?
            };
            let page: Page<T> = Self::check_status(response).await?.json().await?;

            items.extend(page.items);

            if limit.is_some_and(|limit| items.len() >= limit) {
                break;
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        if let Some(limit) = limit {
            items.truncate(limit);
        }

        Ok(items)
    }
}
