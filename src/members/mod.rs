// Admin-managed member records

pub mod handlers;
pub mod models;
pub mod repository;

pub use handlers::*;
pub use models::{Member, MemberInput, MemberResponse};
pub use repository::{MemberRepository, PgMemberRepository};
