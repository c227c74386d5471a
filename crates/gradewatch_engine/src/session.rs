use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use url::Url;
use watch_logging::{watch_info, watch_warn};

use crate::decode::decode_page;
use crate::fetch::{Fetcher, NoProgress, ProgressSink};
use crate::login_form::{find_login_form, FormMatcher};
use crate::{FailureKind, FetchError, FetchOutput};

/// Media type the portal serves for a transcript when the session is valid.
pub const DOCUMENT_MEDIA_TYPE: &str = "application/pdf";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LoginSettings {
    pub login_url: String,
    pub username_field: String,
    pub password_field: String,
    /// Tried in order; see [`find_login_form`].
    pub form_matchers: Vec<FormMatcher>,
    /// Text the portal shows when it rejects the credentials.
    pub failure_markers: Vec<String>,
}

impl LoginSettings {
    pub fn for_url(login_url: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into(),
            username_field: "user".to_string(),
            password_field: "pass".to_string(),
            form_matchers: vec![
                FormMatcher::ActionContains("login".to_string()),
                FormMatcher::HasInputNamed("user".to_string()),
            ],
            failure_markers: vec![
                "Anmeldefehler".to_string(),
                "Login fehlgeschlagen".to_string(),
            ],
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("no login form found on {url}")]
    FormNotFound { url: String },
    #[error("login rejected by portal (page shows \"{marker}\")")]
    Rejected { marker: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthenticationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unverified,
    Authenticated,
}

/// Result of probing the target URL with the current cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    /// The portal served the document.
    Document(FetchOutput),
    /// Anything else, typically the HTML login page after a redirect.
    LoginRequired(FetchOutput),
}

/// Decides whether the shared session is still good and logs in again when it is not.
pub struct SessionManager {
    fetcher: Arc<dyn Fetcher>,
    settings: LoginSettings,
    state: SessionState,
}

impl SessionManager {
    pub fn new(fetcher: Arc<dyn Fetcher>, settings: LoginSettings) -> Self {
        Self {
            fetcher,
            settings,
            state: SessionState::Unverified,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn settings(&self) -> &LoginSettings {
        &self.settings
    }

    pub async fn check_validity(
        &mut self,
        url: &str,
        sink: &dyn ProgressSink,
    ) -> Result<Validity, FetchError> {
        self.state = SessionState::Unverified;
        let response = self.fetcher.get(url, sink).await?;
        if response.has_media_type(DOCUMENT_MEDIA_TYPE) {
            self.state = SessionState::Authenticated;
            Ok(Validity::Document(response))
        } else {
            Ok(Validity::LoginRequired(response))
        }
    }

    /// Submit the credentials through the portal's login form.
    ///
    /// Success only means the portal did not complain; the caller confirms the
    /// session by fetching the document again.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<(), SessionError> {
        watch_info!("Fetching login page {}", self.settings.login_url);
        let page = self.fetcher.get(&self.settings.login_url, &NoProgress).await?;
        let decoded = decode_page(&page.bytes, page.metadata.content_type.as_deref());
        if decoded.lossy {
            watch_warn!(
                "Login page was not valid {}; form fields may be garbled",
                decoded.encoding_label
            );
        }
        let page_url = Url::parse(&page.metadata.final_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let form = find_login_form(&decoded.html, &page_url, &self.settings.form_matchers)
            .ok_or_else(|| AuthenticationError::FormNotFound {
                url: page.metadata.final_url.clone(),
            })?;

        let fields = form.submission_fields(
            (self.settings.username_field.as_str(), credentials.username.as_str()),
            (self.settings.password_field.as_str(), credentials.password.as_str()),
        );
        watch_info!(
            "Submitting login credentials to {} ({} fields, form matched by {:?})",
            form.action,
            fields.len(),
            form.matched_by
        );
        let response = self.fetcher.post_form(form.action.as_str(), &fields).await?;

        let body = decode_page(&response.bytes, response.metadata.content_type.as_deref()).html;
        if let Some(marker) = self
            .settings
            .failure_markers
            .iter()
            .find(|marker| body.contains(marker.as_str()))
        {
            return Err(AuthenticationError::Rejected {
                marker: marker.clone(),
            }
            .into());
        }

        watch_info!("Login successful");
        Ok(())
    }

    /// Fetch the document at `url`, logging in and retrying once if the
    /// portal answers with anything but the document.
    pub async fn fetch_document(
        &mut self,
        url: &str,
        credentials: &Credentials,
        sink: &dyn ProgressSink,
    ) -> Result<FetchOutput, SessionError> {
        watch_info!("Checking session validity");
        let response = match self.check_validity(url, sink).await? {
            Validity::Document(response) => {
                watch_info!("Session is valid");
                response
            }
            Validity::LoginRequired(response) => {
                watch_info!(
                    "Session expired or invalid (got {} instead of {}); logging in",
                    response.media_type().unwrap_or("no content type"),
                    DOCUMENT_MEDIA_TYPE
                );
                self.login(credentials).await?;

                watch_info!("Retrying document download");
                let retry = self.fetcher.get(url, sink).await?;
                if !retry.has_media_type(DOCUMENT_MEDIA_TYPE) && retry.is_success() {
                    watch_warn!("Portal still serves no document after login");
                    return Err(FetchError::new(
                        FailureKind::UnexpectedContentType {
                            content_type: retry.metadata.content_type.clone(),
                        },
                        "document not served after login",
                    )
                    .into());
                }
                if retry.is_success() {
                    self.state = SessionState::Authenticated;
                }
                retry
            }
        };

        if !response.is_success() {
            self.state = SessionState::Unverified;
            return Err(FetchError::new(
                FailureKind::HttpStatus(response.status),
                format!("document download failed with status {}", response.status),
            )
            .into());
        }

        Ok(response)
    }
}
