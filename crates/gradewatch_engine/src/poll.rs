use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gradewatch_core::{reconcile, GradeParser, GradeStore, PersistenceError, Reconciliation};
use thiserror::Error;
use watch_logging::{set_poll_cycle, watch_error, watch_info, watch_warn};

use crate::extract::{ExtractionError, PdfTextExtractor, TextExtractor};
use crate::fetch::LogProgressSink;
use crate::notify::{LogNotifier, Notifier};
use crate::persist::TranscriptArchive;
use crate::session::{Credentials, SessionError, SessionManager};

/// Pause before re-reading the configuration when credentials are missing.
pub const MISSING_CREDENTIALS_BACKOFF: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Produces the RFC 3339 timestamp stored with inserted or updated grades.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

/// Settings re-read at the start of every iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub credentials: Option<Credentials>,
    pub transcript_url: String,
    pub interval: Duration,
}

impl PollSettings {
    pub fn new(transcript_url: impl Into<String>) -> Self {
        Self {
            credentials: None,
            transcript_url: transcript_url.into(),
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

pub trait SettingsSource: Send + Sync {
    fn load(&self) -> PollSettings;
}

/// Fixed settings, for tests and one-off runs.
impl SettingsSource for PollSettings {
    fn load(&self) -> PollSettings {
        self.clone()
    }
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("text extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("reconciliation aborted: {0}")]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub records: usize,
    pub reconciliation: Reconciliation,
    pub notified: usize,
    pub archived: Option<PathBuf>,
}

#[derive(Debug)]
pub enum TickOutcome {
    MissingCredentials,
    Checked(CycleReport),
    Failed(CycleError),
}

#[derive(Debug)]
pub struct Tick {
    pub outcome: TickOutcome,
    /// How long to wait before the next iteration.
    pub pause: Duration,
}

/// Drives fetch, extraction, parsing, reconciliation and notification, one
/// cycle at a time.
pub struct PollLoop<S> {
    session: SessionManager,
    settings: Box<dyn SettingsSource>,
    store: S,
    extractor: Box<dyn TextExtractor>,
    notifier: Box<dyn Notifier>,
    parser: GradeParser,
    archive: Option<TranscriptArchive>,
    clock: Clock,
    cycle: u64,
}

impl<S: GradeStore> PollLoop<S> {
    pub fn new(session: SessionManager, settings: Box<dyn SettingsSource>, store: S) -> Self {
        Self {
            session,
            settings,
            store,
            extractor: Box::new(PdfTextExtractor),
            notifier: Box::new(LogNotifier),
            parser: GradeParser::new(),
            archive: None,
            clock: Arc::new(|| Utc::now().to_rfc3339()),
            cycle: 0,
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_archive(mut self, archive: TranscriptArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Runs until the process is stopped.
    pub async fn run_forever(&mut self) {
        loop {
            let tick = self.tick().await;
            tokio::time::sleep(tick.pause).await;
        }
    }

    /// One loop iteration: reload settings, then run a cycle if credentials are present.
    pub async fn tick(&mut self) -> Tick {
        let settings = self.settings.load();
        let Some(credentials) = settings.credentials.clone() else {
            watch_warn!(
                "Credentials are not configured; checking again in {}s",
                MISSING_CREDENTIALS_BACKOFF.as_secs()
            );
            return Tick {
                outcome: TickOutcome::MissingCredentials,
                pause: MISSING_CREDENTIALS_BACKOFF,
            };
        };

        self.cycle += 1;
        set_poll_cycle(self.cycle);
        watch_info!("Starting check cycle");

        let outcome = match self.run_cycle(&settings, &credentials).await {
            Ok(report) => {
                watch_info!(
                    "Check finished: {} grades, {} new, {} updated, {} unchanged, {} failed",
                    report.records,
                    report.reconciliation.inserted,
                    report.reconciliation.updated,
                    report.reconciliation.unchanged,
                    report.reconciliation.failed
                );
                TickOutcome::Checked(report)
            }
            Err(err) => {
                watch_error!("Check failed: {}", err);
                TickOutcome::Failed(err)
            }
        };

        watch_info!("Sleeping for {} minutes", settings.interval.as_secs() / 60);
        set_poll_cycle(0);
        Tick {
            outcome,
            pause: settings.interval,
        }
    }

    pub async fn run_cycle(
        &mut self,
        settings: &PollSettings,
        credentials: &Credentials,
    ) -> Result<CycleReport, CycleError> {
        let sink = LogProgressSink::default();
        let document = self
            .session
            .fetch_document(&settings.transcript_url, credentials, &sink)
            .await?;
        watch_info!("Document downloaded ({} bytes)", document.bytes.len());

        let archived = self
            .archive
            .as_ref()
            .and_then(|archive| match archive.store(&document.bytes) {
                Ok(path) => Some(path),
                Err(err) => {
                    watch_warn!("Could not archive transcript: {}", err);
                    None
                }
            });

        let text = self.extractor.extract(&document.bytes)?;
        let parsed = self.parser.parse_detailed(&text);
        for anomaly in &parsed.anomalies {
            watch_warn!("Transcript irregularity: {:?}", anomaly);
        }
        watch_info!(
            "Found {} grades in document; checking against store",
            parsed.records.len()
        );

        let now = (self.clock)();
        let reconciliation = reconcile(&parsed.records, &mut self.store, &now)?;

        let mut notified = 0;
        for event in &reconciliation.events {
            watch_info!("{}", event);
            match self.notifier.notify(event.module(), event.grade()).await {
                Ok(()) => notified += 1,
                Err(err) => watch_warn!("{}", err),
            }
        }

        if let Err(err) = self.store.record_check(&now) {
            watch_warn!("Could not record last check time: {}", err);
        }

        Ok(CycleReport {
            records: parsed.records.len(),
            reconciliation,
            notified,
            archived,
        })
    }
}
