pub mod credentials;
pub mod csrf;
pub mod handlers;
pub mod policy;
pub mod remember;
pub mod session;

pub use policy::{authorize, AccessDenied, Action, Actor, Resource, Role};
