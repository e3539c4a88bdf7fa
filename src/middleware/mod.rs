pub mod auth;
pub mod session;

pub use auth::{CurrentContext, RequireViewer};
pub use session::resolve_viewer;
