//! Background stamping job.
//!
//! Runs [`PageStamper::run`] off the calling thread and reports progress
//! through a callback. The callback runs on the worker thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::document::Document;
use crate::signatures::Credential;
use crate::stamper::{PageStamper, StampOutcome};

/// Progress reported by a [`StampJob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StampStatus {
    /// Work has begun
    Started,
    /// Work is done, successfully or not
    Finished(StampOutcome),
}

/// Handle to a stamping run on a worker thread.
#[derive(Debug)]
pub struct StampJob {
    file_name: String,
    handle: JoinHandle<StampOutcome>,
}

impl StampJob {
    /// Start stamping `document` into `file_name`.
    ///
    /// `on_status` receives [`StampStatus::Started`] and then exactly one
    /// [`StampStatus::Finished`].
    pub fn spawn<F>(
        stamper: Arc<PageStamper>,
        document: Document,
        file_name: impl Into<String>,
        credential: Option<Credential>,
        on_status: F,
    ) -> std::io::Result<Self>
    where
        F: Fn(StampStatus) + Send + 'static,
    {
        let file_name = file_name.into();
        let name = file_name.clone();
        let handle = thread::Builder::new()
            .name("stamp-job".into())
            .spawn(move || {
                on_status(StampStatus::Started);
                let outcome = stamper.run(&document, &name, credential.as_ref());
                on_status(StampStatus::Finished(outcome.clone()));
                outcome
            })?;
        log::debug!("Spawned stamping job for {}", file_name);
        Ok(Self { file_name, handle })
    }

    /// Target file name.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Whether the worker has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the outcome.
    pub fn join(self) -> StampOutcome {
        match self.handle.join() {
            Ok(outcome) => outcome,
            Err(_) => {
                log::error!("Stamping job for {} panicked", self.file_name);
                StampOutcome::failure(format!("stamping {} was aborted", self.file_name))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StampConfig;
    use crate::document::tests::sample_pdf;
    use std::sync::Mutex;

    #[test]
    fn test_job_reports_started_then_finished() {
        let root = tempfile::tempdir().unwrap();
        let stamper = Arc::new(PageStamper::new(StampConfig::new(root.path())));
        let document = Document::from_bytes(sample_pdf(1, [0.0, 0.0, 612.0, 792.0])).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let job = StampJob::spawn(stamper, document, "job.pdf", None, move |status| {
            sink.lock().unwrap().push(status);
        })
        .unwrap();
        assert_eq!(job.file_name(), "job.pdf");
        let outcome = job.join();

        assert!(outcome.success, "{}", outcome.message);
        assert!(root.path().join("PDFApp/Signed/job.pdf").is_file());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], StampStatus::Started);
        assert_eq!(seen[1], StampStatus::Finished(outcome));
    }

    #[test]
    fn test_nul_in_file_name_is_a_failed_outcome() {
        let root = tempfile::tempdir().unwrap();
        let stamper = Arc::new(PageStamper::new(StampConfig::new(root.path())));
        let document = Document::from_bytes(sample_pdf(1, [0.0, 0.0, 612.0, 792.0])).unwrap();
        let outcome = StampJob::spawn(stamper, document, "a\0b.pdf", None, |_| {})
            .unwrap()
            .join();
        assert!(!outcome.success);
        assert!(outcome.message.contains("NUL"), "{}", outcome.message);
    }

    #[test]
    fn test_job_failure_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let stamper = Arc::new(PageStamper::new(StampConfig::new(root.path())));
        let document = Document::from_bytes(sample_pdf(1, [0.0, 0.0, 612.0, 792.0])).unwrap();
        let outcome = StampJob::spawn(stamper, document, "../escape.pdf", None, |_| {})
            .unwrap()
            .join();
        assert!(!outcome.success);
        assert!(outcome.path.is_none());
    }
}
