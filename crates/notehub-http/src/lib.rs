//! HTTP implementation of [`NotesApi`] for the NoteHub REST API.
//!
//! ```text
//! GET    {base}/notes?page=1&perPage=12&search=...
//! POST   {base}/notes          {title, content, tag}
//! DELETE {base}/notes/{id}
//! ```
//!
//! Every request carries `Authorization: Bearer {token}`.

use std::time::Duration;

use notehub_core::{CreateNote, Error, Note, NoteQuery, NotesApi, NotesPage};
use reqwest::{Response, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, trace};

pub const DEFAULT_BASE_URL: &str = "https://notehub-public.goit.study/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// List response, in either of the shapes the service has returned.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Paged {
        data: Vec<Note>,
        meta: ListMeta,
    },
    Flat {
        notes: Vec<Note>,
        #[serde(rename = "totalPages")]
        total_pages: u32,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMeta {
    total_pages: u32,
    #[serde(default)]
    current_page: Option<u32>,
    #[serde(default)]
    per_page: Option<u32>,
    #[serde(default)]
    total: Option<u64>,
}

impl From<ListResponse> for NotesPage {
    fn from(response: ListResponse) -> Self {
        match response {
            ListResponse::Paged { data, meta } => NotesPage {
                notes: data,
                total_pages: meta.total_pages,
                current_page: meta.current_page,
                per_page: meta.per_page,
                total: meta.total,
            },
            ListResponse::Flat { notes, total_pages } => NotesPage {
                notes,
                total_pages,
                current_page: None,
                per_page: None,
                total: None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// reqwest-backed NoteHub client.
pub struct HttpNotesApi {
    base_url: Url,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpNotesApi {
    /// A missing token is not an error here; every call will fail with
    /// `Error::Auth` instead.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, Error> {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| Error::Validation(format!("invalid base url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Validation(format!(
                "base url '{}' cannot have a path",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(Self {
            base_url,
            token,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn token(&self) -> Result<&str, Error> {
        self.token
            .as_deref()
            .ok_or_else(|| Error::Auth("no API token configured".into()))
    }

    /// `{base}/notes` followed by `extra` path segments.
    fn notes_url(&self, extra: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Internal(format!("base url '{}' cannot have a path", self.base_url)))?
            .pop_if_empty()
            .push("notes")
            .extend(extra);
        Ok(url)
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_decode() {
        Error::Internal(format!("Failed to decode response: {}", e))
    } else {
        Error::Network(e.to_string())
    }
}

/// Map a non-success status to the error taxonomy, using the server's
/// message when the body carries one.
async fn check_status(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or_else(|_| {
            if body.trim().is_empty() {
                status.to_string()
            } else {
                format!("{}: {}", status, body.trim())
            }
        });
    debug!(%status, %message, "request failed");

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth(message),
        StatusCode::NOT_FOUND => Error::NotFound(message),
        s if s.is_client_error() => Error::Validation(message),
        _ => Error::Network(message),
    })
}

#[async_trait::async_trait(?Send)]
impl NotesApi for HttpNotesApi {
    async fn list_notes(&self, query: NoteQuery) -> Result<NotesPage, Error> {
        let token = self.token()?;
        let url = self.notes_url(&[])?;

        let mut params = vec![
            ("page", query.page.to_string()),
            ("perPage", query.per_page.to_string()),
        ];
        if !query.search.is_empty() {
            params.push(("search", query.search.clone()));
        }
        trace!(%url, ?params, "GET notes");

        let response = self
            .client
            .get(url)
            .query(&params)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;
        let body: ListResponse = response.json().await.map_err(transport_error)?;
        Ok(body.into())
    }

    async fn create_note(&self, note: CreateNote) -> Result<Note, Error> {
        let token = self.token()?;
        let url = self.notes_url(&[])?;
        trace!(%url, title = %note.title, "POST note");

        let response = self
            .client
            .post(url)
            .json(&note)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;
        response.json::<Note>().await.map_err(transport_error)
    }

    async fn delete_note(&self, id: &str) -> Result<(), Error> {
        let token = self.token()?;
        let url = self.notes_url(&[id])?;
        trace!(%url, "DELETE note");

        let response = self
            .client
            .delete(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        check_status(response).await?;
        Ok(())
    }
}
