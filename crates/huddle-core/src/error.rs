//! Error taxonomy for room operations.

use thiserror::Error;

/// Room operation errors.
///
/// All variants are recoverable, per-request conditions: they are reported
/// back to the originating connection (or HTTP caller) and never affect
/// other connections or other rooms.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// Referenced room does not exist (or no longer exists).
    #[error("Room {0} not found. It may have been deleted or never existed.")]
    RoomNotFound(String),

    /// Delete target is absent from the room's media list.
    #[error("Media not found")]
    MediaNotFound(String),

    /// Authorization failure on an admin/owner-gated action.
    #[error("{0}")]
    Forbidden(&'static str),

    /// Room-id collision on creation.
    #[error("Room {0} already exists")]
    AlreadyExists(String),
}

impl RoomError {
    /// The caller is not allowed to delete this media item.
    pub(crate) const MEDIA_FORBIDDEN: &'static str = "You can only delete your own media";

    /// The caller is not the room admin.
    pub(crate) const END_FORBIDDEN: &'static str = "Only the room admin can end the room";
}
