//! Domain models and API payload schemas.

pub mod facility;
pub mod role;

pub use facility::{Facility, Member, MembersResponse, UserRoleResponse};
pub use role::Role;
