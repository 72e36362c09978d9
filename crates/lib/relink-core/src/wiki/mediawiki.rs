use std::collections::HashSet;
use std::time::Duration;

use relink_store::PageRef;
use reqwest::header::RETRY_AFTER;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    EditOutcome,
    ExtUrlQuery,
    PageEdit,
    PageHit,
    PageRevision,
    SearchQuery,
    WikiApi,
    WikiError,
    WikiResult,
};

/// Largest `srlimit`/`eulimit` a bot account may request.
const MAX_BATCH: usize = 500;
/// CSRF token handed out to anonymous sessions.
const ANONYMOUS_TOKEN: &str = "+\\";
/// Error codes that mean the session or token went stale.
const RELOGIN_CODES: [&str; 4] = [
    "badtoken",
    "notloggedin",
    "assertuserfailed",
    "assertnameduserfailed",
];

type Params = Vec<(&'static str, String)>;

#[derive(Debug, Clone)]
pub struct MediaWikiConfig {
    pub api_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_agent: String,
    /// `maxlag` sent with every edit, in seconds.
    pub maxlag: u32,
    /// How many lagged edit attempts are retried before giving up.
    pub maxlag_retries: u32,
    /// Wait used when the server sends no `Retry-After`.
    pub maxlag_backoff: Duration,
    pub timeout: Duration,
}

impl MediaWikiConfig {
    pub fn new(api_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            username: None,
            password: None,
            user_agent: user_agent.into(),
            maxlag: 5,
            maxlag_retries: 3,
            maxlag_backoff: Duration::from_secs(5),
            timeout: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Site root derived from the API endpoint, e.g. `https://commons.wikimedia.org`.
    pub fn site_base(&self) -> String {
        let api = self.api_url.trim_end_matches('/');
        api.strip_suffix("/w/api.php")
            .or_else(|| api.strip_suffix("/api.php"))
            .unwrap_or(api)
            .to_string()
    }
}

struct ApiReply {
    body: Value,
    retry_after: Option<Duration>,
}

/// MediaWiki action API client with a cookie-backed login session.
pub struct MediaWikiClient {
    http: reqwest::Client,
    config: MediaWikiConfig,
    csrf_token: Mutex<Option<String>>,
}

impl MediaWikiClient {
    /// Builds the HTTP client. No request is sent until the first call.
    ///
    /// # Errors
    /// Returns `WikiError::Http` if the HTTP client cannot be constructed.
    pub fn new(config: MediaWikiConfig) -> WikiResult<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            csrf_token: Mutex::new(None),
        })
    }

    async fn get(&self, params: &[(&str, String)]) -> WikiResult<ApiReply> {
        debug!(?params, "GET api");
        let response = self
            .http
            .get(&self.config.api_url)
            .query(&[("format", "json")])
            .query(params)
            .send()
            .await?
            .error_for_status()?;
        read_reply(response).await
    }

    async fn post(&self, params: &[(&'static str, String)]) -> WikiResult<ApiReply> {
        let mut form = params.to_vec();
        form.push(("format", "json".to_string()));
        let response = self
            .http
            .post(&self.config.api_url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?;
        read_reply(response).await
    }

    /// Logs in with a bot password and drops any cached edit token.
    ///
    /// # Errors
    /// Returns `WikiError::MissingCredentials` without credentials, or
    /// `WikiError::Login` when the wiki rejects them.
    pub async fn login(&self) -> WikiResult<()> {
        let (Some(username), Some(password)) = (&self.config.username, &self.config.password) else {
            return Err(WikiError::MissingCredentials);
        };

        let reply = self
            .get(&[
                ("action", "query".to_string()),
                ("meta", "tokens".to_string()),
                ("type", "login".to_string()),
            ])
            .await?;
        check_api_error(&reply.body)?;
        let login_token = reply
            .body
            .pointer("/query/tokens/logintoken")
            .and_then(Value::as_str)
            .ok_or_else(|| WikiError::UnexpectedResponse("missing login token".to_string()))?
            .to_string();

        let reply = self
            .post(&[
                ("action", "login".to_string()),
                ("lgname", username.clone()),
                ("lgpassword", password.clone()),
                ("lgtoken", login_token),
            ])
            .await?;
        check_api_error(&reply.body)?;
        let result = reply
            .body
            .pointer("/login/result")
            .and_then(Value::as_str)
            .unwrap_or("no result");
        if result != "Success" {
            let reason = reply
                .body
                .pointer("/login/reason")
                .and_then(Value::as_str)
                .unwrap_or(result);
            return Err(WikiError::Login(reason.to_string()));
        }

        *self.csrf_token.lock().await = None;
        info!(user = %username, api = %self.config.api_url, "logged in");
        Ok(())
    }

    async fn csrf_token(&self) -> WikiResult<String> {
        let mut cached = self.csrf_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let reply = self
            .get(&[
                ("action", "query".to_string()),
                ("meta", "tokens".to_string()),
            ])
            .await?;
        check_api_error(&reply.body)?;
        let token = reply
            .body
            .pointer("/query/tokens/csrftoken")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| WikiError::UnexpectedResponse("missing csrf token".to_string()))?
            .to_string();
        if token == ANONYMOUS_TOKEN {
            return Err(WikiError::Login(
                "session is anonymous; log in before editing".to_string(),
            ));
        }

        *cached = Some(token.clone());
        Ok(token)
    }

    fn edit_form(&self, edit: &PageEdit, token: &str) -> Params {
        let target = match &edit.page {
            PageRef::Id(pageid) => ("pageid", pageid.to_string()),
            PageRef::Title(title) => ("title", title.clone()),
        };
        vec![
            ("action", "edit".to_string()),
            target,
            ("text", edit.text.clone()),
            ("summary", edit.summary.clone()),
            ("token", token.to_string()),
            ("basetimestamp", edit.basetimestamp.clone()),
            ("assert", "user".to_string()),
            ("nocreate", "1".to_string()),
            ("bot", "1".to_string()),
            ("maxlag", self.config.maxlag.to_string()),
            ("formatversion", "2".to_string()),
        ]
    }

    /// Pages through a list module, keeping unique pages in first-seen order.
    async fn collect_hits(
        &self,
        base: Params,
        list: &str,
        limit_key: &'static str,
        limit: usize,
    ) -> WikiResult<Vec<PageHit>> {
        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        let mut next: Vec<(String, String)> = Vec::new();

        loop {
            let remaining = limit.saturating_sub(hits.len());
            if remaining == 0 {
                break;
            }
            let reply = {
                let mut params: Vec<(&str, String)> = base.clone();
                params.push((limit_key, remaining.min(MAX_BATCH).to_string()));
                params.extend(next.iter().map(|(key, value)| (key.as_str(), value.clone())));
                self.get(&params).await?
            };
            check_api_error(&reply.body)?;
            for hit in parse_hits(&reply.body, list)? {
                if hits.len() >= limit {
                    break;
                }
                if seen.insert(hit.pageid) {
                    hits.push(hit);
                }
            }
            info!(list, count = hits.len(), "retrieved unique pages so far");

            match continuation(&reply.body) {
                Some(params) => next = params,
                None => break,
            }
        }

        info!(list, count = hits.len(), "final count of unique pages");
        Ok(hits)
    }
}

impl WikiApi for MediaWikiClient {
    async fn fetch_page(&self, page: &PageRef) -> WikiResult<PageRevision> {
        let target = match page {
            PageRef::Id(pageid) => ("pageids", pageid.to_string()),
            PageRef::Title(title) => ("titles", title.clone()),
        };
        let reply = self
            .get(&[
                ("action", "query".to_string()),
                target,
                ("prop", "revisions".to_string()),
                ("rvprop", "content|timestamp".to_string()),
                ("rvslots", "main".to_string()),
                ("formatversion", "2".to_string()),
            ])
            .await?;
        check_api_error(&reply.body)?;
        parse_revision(&reply.body, page)
    }

    async fn save_page(&self, edit: &PageEdit) -> WikiResult<EditOutcome> {
        if edit.text.is_empty() {
            return Err(WikiError::InvalidEdit("new text is empty".to_string()));
        }
        if edit.basetimestamp.trim().is_empty() {
            return Err(WikiError::InvalidEdit(
                "base timestamp is required".to_string(),
            ));
        }

        let mut relogged = false;
        let mut lagged = 0;
        loop {
            let token = self.csrf_token().await?;
            let reply = self.post(&self.edit_form(edit, &token)).await?;
            let err = match parse_edit(&reply.body, &edit.page) {
                Ok(outcome) => return Ok(outcome),
                Err(err) => err,
            };

            let code = match &err {
                WikiError::Api { code, .. } => Some(code.clone()),
                _ => None,
            };
            match code.as_deref() {
                Some("maxlag") => {
                    lagged += 1;
                    if lagged > self.config.maxlag_retries {
                        return Err(WikiError::MaxlagExhausted(lagged));
                    }
                    let wait = reply.retry_after.unwrap_or(self.config.maxlag_backoff);
                    warn!(
                        page = %edit.page,
                        attempt = lagged,
                        wait_secs = wait.as_secs_f64(),
                        "server lagged; retrying edit"
                    );
                    tokio::time::sleep(wait).await;
                }
                Some(code) if !relogged && RELOGIN_CODES.contains(&code) => {
                    warn!(page = %edit.page, code, "auth/token issue; logging in again and retrying once");
                    relogged = true;
                    self.login().await?;
                }
                _ => return Err(err),
            }
        }
    }

    async fn search_pages(&self, query: &SearchQuery) -> WikiResult<Vec<PageHit>> {
        let base = vec![
            ("action", "query".to_string()),
            ("list", "search".to_string()),
            ("srsearch", query.query.clone()),
            ("srnamespace", query.namespace.to_string()),
            ("srprop", String::new()),
        ];
        self.collect_hits(base, "search", "srlimit", query.limit)
            .await
    }

    async fn pages_with_external_link(&self, query: &ExtUrlQuery) -> WikiResult<Vec<PageHit>> {
        let mut base = vec![
            ("action", "query".to_string()),
            ("list", "exturlusage".to_string()),
            ("euquery", query.query.clone()),
            ("euprop", "ids|title|url".to_string()),
        ];
        if let Some(protocol) = &query.protocol {
            base.push(("euprotocol", protocol.clone()));
        }
        if let Some(namespace) = query.namespace {
            base.push(("eunamespace", namespace.to_string()));
        }
        self.collect_hits(base, "exturlusage", "eulimit", query.limit)
            .await
    }
}

async fn read_reply(response: reqwest::Response) -> WikiResult<ApiReply> {
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.json::<Value>().await?;
    Ok(ApiReply { body, retry_after })
}

fn check_api_error(body: &Value) -> WikiResult<()> {
    let Some(error) = body.get("error") else {
        return Ok(());
    };
    let field = |name: &str| {
        error
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Err(WikiError::Api {
        code: field("code"),
        info: field("info"),
    })
}

fn parse_revision(body: &Value, page: &PageRef) -> WikiResult<PageRevision> {
    let first = body
        .pointer("/query/pages/0")
        .ok_or_else(|| WikiError::UnexpectedResponse(format!("no pages returned for {page}")))?;
    if first.get("missing").is_some() || first.get("invalid").is_some() {
        return Err(WikiError::MissingPage(page.clone()));
    }

    let revision = first
        .pointer("/revisions/0")
        .ok_or_else(|| WikiError::NoRevisions(page.clone()))?;
    let text = revision
        .pointer("/slots/main/content")
        .or_else(|| revision.pointer("/slots/main/*"))
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| WikiError::EmptyContent(page.clone()))?;
    let basetimestamp = revision
        .get("timestamp")
        .and_then(Value::as_str)
        .filter(|timestamp| !timestamp.is_empty())
        .ok_or_else(|| WikiError::MissingTimestamp(page.clone()))?;

    let pageid = first
        .get("pageid")
        .and_then(Value::as_u64)
        .or(match page {
            PageRef::Id(pageid) => Some(*pageid),
            PageRef::Title(_) => None,
        })
        .ok_or_else(|| WikiError::UnexpectedResponse(format!("no pageid for {page}")))?;
    let title = first
        .get("title")
        .and_then(Value::as_str)
        .map_or_else(|| page.to_string(), str::to_string);

    Ok(PageRevision {
        pageid,
        title,
        text: text.to_string(),
        basetimestamp: basetimestamp.to_string(),
    })
}

fn parse_edit(body: &Value, page: &PageRef) -> WikiResult<EditOutcome> {
    if let Err(err) = check_api_error(body) {
        return Err(match err {
            WikiError::Api { code, .. } if code == "editconflict" => {
                WikiError::EditConflict(page.clone())
            }
            other => other,
        });
    }

    let edit = body
        .get("edit")
        .ok_or_else(|| WikiError::UnexpectedResponse(body.to_string()))?;
    if edit
        .get("nochange")
        .is_some_and(|value| value.as_bool() != Some(false))
    {
        return Ok(EditOutcome::NoChange);
    }
    match edit.get("result").and_then(Value::as_str) {
        Some("Success") => Ok(EditOutcome::Saved {
            newrevid: edit.get("newrevid").and_then(Value::as_u64),
        }),
        _ => Err(WikiError::UnexpectedResponse(body.to_string())),
    }
}

fn parse_hits(body: &Value, list: &str) -> WikiResult<Vec<PageHit>> {
    let Some(items) = body.get("query").and_then(|query| query.get(list)) else {
        return Ok(Vec::new());
    };
    serde_json::from_value(items.clone())
        .map_err(|err| WikiError::UnexpectedResponse(format!("malformed {list} results: {err}")))
}

/// Every key of the `continue` object, to be sent with the next request.
fn continuation(body: &Value) -> Option<Vec<(String, String)>> {
    let cont = body.get("continue")?.as_object()?;
    let mut params: Vec<(String, String)> = cont
        .iter()
        .map(|(key, value)| (key.clone(), param_value(value)))
        .collect();
    params.sort();
    Some(params)
}

fn param_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
