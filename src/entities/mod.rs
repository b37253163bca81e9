//! Mapped entities for the board schema.
//!
//! `user` and `post` map the tables created by the first revision.
//! `active_user` maps the `active_users` view and refuses writes.

pub mod active_user;
pub mod post;
pub mod user;

pub mod prelude {
    pub use super::active_user::Entity as ActiveUser;
    pub use super::post::Entity as Post;
    pub use super::user::Entity as User;
}
