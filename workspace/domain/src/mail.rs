//! Outgoing mail.
//!
//! Signup only needs "hand this message to something that delivers it", so the
//! backends sit behind the [`Mailer`] trait: the console backend logs the
//! message, the file backend drops one file per message into a directory, and
//! the recording backend keeps messages in memory for tests.

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    fn render(&self) -> String {
        format!(
            "From: {}\nTo: {}\nSubject: {}\nDate: {}\n\n{}\n",
            self.from,
            self.to,
            self.subject,
            Utc::now().to_rfc2822(),
            self.body
        )
    }
}

#[derive(Error, Debug)]
pub enum MailError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Mailer: Send + Sync + Debug {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Writes messages to the log instead of delivering them. The body carries
/// the confirmation code, so only the envelope is logged at info.
#[derive(Debug, Default, Clone)]
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "Outgoing email");
        debug!("Email contents\n{}", email.render());
        Ok(())
    }
}

/// Stores every message as a separate `.log` file under `dir`.
#[derive(Debug, Clone)]
pub struct FileMailer {
    dir: PathBuf,
}

impl FileMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Mailer for FileMailer {
    #[instrument(skip(self, email), fields(to = %email.to))]
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let stamp = Utc::now().format("%Y%m%d-%H%M%S%.6f");
        let mut path = self.dir.join(format!("{stamp}.log"));
        let mut suffix = 1;
        while tokio::fs::try_exists(&path).await? {
            path = self.dir.join(format!("{stamp}-{suffix}.log"));
            suffix += 1;
        }

        tokio::fs::write(&path, email.render()).await?;
        debug!("Email written to {}", path.display());
        Ok(())
    }
}

/// Keeps sent messages in memory. Clones share the same outbox.
#[derive(Debug, Default, Clone)]
pub struct RecordingMailer {
    outbox: Arc<Mutex<Vec<Email>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far, oldest first.
    pub fn sent(&self) -> Vec<Email> {
        self.outbox.lock().clone()
    }

    pub fn last_to(&self, address: &str) -> Option<Email> {
        self.outbox
            .lock()
            .iter()
            .rev()
            .find(|email| email.to == address)
            .cloned()
    }

    /// Makes subsequent sends fail until switched back.
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        if *self.fail.lock() {
            return Err(MailError::Rejected(format!("delivery to {} disabled", email.to)));
        }
        self.outbox.lock().push(email.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> Email {
        Email {
            from: "noreply@yamdb.local".to_string(),
            to: to.to_string(),
            subject: "Confirmation code".to_string(),
            body: "Your confirmation code: abc".to_string(),
        }
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    async fn console_output(level: tracing::Level) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        ConsoleMailer.send(&message("a@example.com")).await.unwrap();

        let bytes = buffer.0.lock().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[tokio::test]
    async fn test_console_mailer_keeps_code_out_of_info_logs() {
        let info = console_output(tracing::Level::INFO).await;
        assert!(info.contains("Outgoing email"));
        assert!(info.contains("a@example.com"));
        assert!(!info.contains("Your confirmation code: abc"));

        let debug = console_output(tracing::Level::DEBUG).await;
        assert!(debug.contains("Your confirmation code: abc"));
    }

    #[tokio::test]
    async fn test_file_mailer_writes_one_file_per_message() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = FileMailer::new(dir.path().join("outbox"));

        mailer.send(&message("a@example.com")).await.unwrap();
        mailer.send(&message("b@example.com")).await.unwrap();

        let mut contents = Vec::new();
        for entry in std::fs::read_dir(dir.path().join("outbox")).unwrap() {
            contents.push(std::fs::read_to_string(entry.unwrap().path()).unwrap());
        }
        assert_eq!(contents.len(), 2);
        assert!(contents.iter().any(|c| c.contains("To: a@example.com")));
        assert!(contents.iter().all(|c| c.contains("Subject: Confirmation code")));
    }

    #[tokio::test]
    async fn test_recording_mailer_shares_outbox_between_clones() {
        let mailer = RecordingMailer::new();
        let handle = mailer.clone();

        mailer.send(&message("a@example.com")).await.unwrap();
        assert_eq!(handle.sent().len(), 1);
        assert_eq!(handle.last_to("a@example.com").unwrap().subject, "Confirmation code");
        assert!(handle.last_to("b@example.com").is_none());
    }

    #[tokio::test]
    async fn test_recording_mailer_can_fail() {
        let mailer = RecordingMailer::new();
        mailer.set_failing(true);
        assert!(matches!(
            mailer.send(&message("a@example.com")).await,
            Err(MailError::Rejected(_))
        ));
        assert!(mailer.sent().is_empty());
    }
}
