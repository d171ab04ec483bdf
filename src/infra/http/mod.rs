//! HTTP surfaces: the public read router and the admin router.

mod admin;
mod middleware;
mod public;

pub use admin::{AdminState, build_admin_router};
pub use public::{HttpState, build_router};
