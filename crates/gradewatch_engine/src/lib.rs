//! Gradewatch engine: portal session, document retrieval and the poll loop.
mod decode;
mod extract;
mod fetch;
mod login_form;
mod notify;
mod persist;
mod poll;
mod session;
mod sqlite_store;
mod types;

pub use decode::{decode_page, DecodedPage};
pub use extract::{ExtractionError, PdfTextExtractor, TextExtractor};
pub use fetch::{FetchSettings, Fetcher, LogProgressSink, NoProgress, ProgressSink, ReqwestFetcher};
pub use login_form::{find_login_form, FormMatcher, LoginForm};
pub use notify::{LogNotifier, Notifier, NotifyError};
pub use persist::{PersistError, TranscriptArchive, TRANSCRIPT_FILENAME};
pub use poll::{
    Clock, CycleError, CycleReport, PollLoop, PollSettings, SettingsSource, Tick, TickOutcome,
    DEFAULT_POLL_INTERVAL, MISSING_CREDENTIALS_BACKOFF,
};
pub use session::{
    AuthenticationError, Credentials, LoginSettings, SessionError, SessionManager, SessionState,
    Validity, DOCUMENT_MEDIA_TYPE,
};
pub use sqlite_store::SqliteStore;
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput, FetchProgress};
