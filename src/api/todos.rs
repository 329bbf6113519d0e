//! JSONPlaceholder todo API client
//!
//! Fetches and updates todos over HTTP and exposes them as cache loaders and
//! mutation functions.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::query::{loader, mutation_fn, Loader, LoaderError, MutationFn};

/// Base URL for the public demo API
pub const JSONPLACEHOLDER_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

/// A todo as returned by the API
///
/// Only `id` is guaranteed; PUT responses echo back whatever was sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Payload of the PUT issued by the mutation page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutTodoRequest {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub user_id: u64,
}

impl PutTodoRequest {
    /// The fixed payload the demo button sends for `id`
    pub fn demo(id: u64) -> Self {
        Self {
            id,
            title: "foo".to_string(),
            body: "bar".to_string(),
            user_id: 1,
        }
    }
}

/// Client for the todo endpoints
#[derive(Debug, Clone)]
pub struct TodoClient {
    http_client: Client,
    /// Base URL without trailing slash (allows override for testing)
    base_url: String,
}

impl Default for TodoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TodoClient {
    pub fn new() -> Self {
        Self::with_base_url(JSONPLACEHOLDER_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn todo_url(&self, id: u64) -> String {
        format!("{}/todos/{}", self.base_url, id)
    }

    /// `GET /todos/{id}`
    pub async fn get_todo(&self, id: u64) -> Result<Todo, LoaderError> {
        let url = self.todo_url(id);
        debug!(%url, "get todo");
        let response = self.http_client.get(&url).send().await?;
        let status = response.status();
        let text = response.text().await?;
        parse_todo(status, &text)
    }

    /// `PUT /todos/{request.id}` with the request as JSON body
    pub async fn put_todo(&self, request: &PutTodoRequest) -> Result<Todo, LoaderError> {
        let url = self.todo_url(request.id);
        debug!(%url, "put todo");
        let response = self.http_client.put(&url).json(request).send().await?;
        let status = response.status();
        let text = response.text().await?;
        parse_todo(status, &text)
    }

    /// Cache loader fetching todo `id`
    pub fn todo_loader(&self, id: u64) -> Loader<Todo> {
        let client = self.clone();
        loader(move || {
            let client = client.clone();
            async move { client.get_todo(id).await }
        })
    }

    /// Mutation function issuing the PUT for whatever id the call carries
    pub fn put_todo_fn(&self) -> MutationFn<PutTodoRequest, Todo> {
        let client = self.clone();
        mutation_fn(move |request: PutTodoRequest| {
            let client = client.clone();
            async move { client.put_todo(&request).await }
        })
    }
}

/// Maps an HTTP response to a todo or a loader error
fn parse_todo(status: StatusCode, text: &str) -> Result<Todo, LoaderError> {
    if !status.is_success() {
        return Err(LoaderError::Status {
            status: status.as_u16(),
        });
    }
    Ok(serde_json::from_str(text)?)
}
