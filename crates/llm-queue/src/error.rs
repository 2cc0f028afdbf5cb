use std::fmt;

#[derive(Debug)]
pub enum QueueError {
    /// The queue has not been started, or has already been stopped.
    NotRunning,
    /// The queue-admission timeout elapsed before a worker slot freed up.
    QueueTimeout,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::NotRunning => write!(f, "queue is not running"),
            QueueError::QueueTimeout => write!(f, "timed out waiting for a worker slot"),
        }
    }
}

impl std::error::Error for QueueError {}
