// Per-user resources: avatar images and profile updates

pub mod handlers;
pub mod storage;

pub use handlers::{get_avatar, update_profile, upload_avatar, AvatarResponse};
pub use storage::{FileStorage, LocalFileStorage, StorageError};
