use crate::record::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    /// The whole collection was replaced by a load
    Reloaded,
}

/// Notification sent by the Entity Store after every successful mutation
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    /// Affected record; `None` for a reload
    pub id: Option<RecordId>,
    pub kind: ChangeKind,
    /// Store version after the change
    pub version: u64,
}
