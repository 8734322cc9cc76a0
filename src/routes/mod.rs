//! HTTP route handlers.
//!
//! Killmail lookups and listings live in [`killmails`]; [`params`] decodes
//! the bulk listing query string and [`catchers`] renders errors that never
//! reach a handler.

pub mod catchers;
pub mod health;
pub mod killmails;
pub mod params;

use rocket::{Route, routes};

/// Every API route, mounted at `/`.
pub fn api_routes() -> Vec<Route> {
    routes![
        health::health_check,
        killmails::get_killmail,
        killmails::list_killmails,
    ]
}
