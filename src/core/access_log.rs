use std::fmt;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode, Version};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::common::{info, Time};
use crate::core::Outcome;

/// One line of the access log.
#[derive(Debug, Clone)]
pub struct AccessRecord {
    pub received_at: Time,
    pub remote_ip: Option<IpAddr>,
    pub method: Method,
    pub path: String,
    pub version: Version,
    pub user: String,
    pub status: StatusCode,
    pub outcome: Option<Outcome>,
    pub elapsed: Duration,
}

// <remote-ip> "<METHOD> <PATH> <VERSION>" <message>
impl fmt::Display for AccessRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.remote_ip {
            Some(ip) => write!(f, "{}", ip)?,
            None => f.write_str("-")?,
        }
        write!(f, " \"{} {} {:?}\" ", self.method, self.path, self.version)?;
        match self.outcome {
            Some(outcome) => write!(f, "{}", outcome),
            None => write!(f, "{}", self.status),
        }
    }
}

/// Fire and forget access log sink.
///
/// Records go into a bounded queue drained by a background task. When the
/// queue is full the record is dropped and counted; the request never waits.
#[derive(Debug, Clone)]
pub struct AccessLog {
    sender: Option<mpsc::Sender<AccessRecord>>,
    dropped: Arc<AtomicU64>,
}

impl AccessLog {
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Start the background consumer. Must be called within a tokio runtime.
    pub fn spawn(capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<AccessRecord>(std::cmp::max(capacity, 1));
        let dropped = Arc::new(AtomicU64::new(0));

        let handle = tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                info!(
                    target: "guardian::access",
                    user = %record.user,
                    status = record.status.as_u16(),
                    elapsed = ?record.elapsed,
                    received_at = %record.received_at.to_rfc3339(),
                    "{}", record
                );
            }
        });

        (
            Self {
                sender: Some(sender),
                dropped,
            },
            handle,
        )
    }

    /// Sink that discards every record.
    pub fn disabled() -> Self {
        Self {
            sender: None,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record(&self, record: AccessRecord) {
        let sender = match self.sender {
            Some(ref sender) => sender,
            None => return,
        };

        match sender.try_send(record) {
            Ok(()) => (),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // Consumer is gone, i.e. we are shutting down.
            Err(TrySendError::Closed(_)) => (),
        }
    }

    /// Records lost to a full queue so far, across every clone.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
