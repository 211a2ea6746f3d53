#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Snapshot queue closed")]
    Closed,
}
