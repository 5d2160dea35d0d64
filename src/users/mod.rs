//! User accounts and their storage.

mod model;
mod store;

pub use model::{NewUser, Role, UnknownRole, User, UserChanges, UserView};
pub use store::{JsonUserStore, StoreError, UserStore};
