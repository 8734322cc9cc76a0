//! Error catchers rendering framework-level failures with the same
//! `{"message": ...}` body as handler errors.

use rocket::http::Status;
use rocket::{Catcher, Request, catch, catchers};

use crate::error::message_response;

struct Caught(Status);

impl<'r> rocket::response::Responder<'r, 'static> for Caught {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'static> {
        let message = self.0.reason().unwrap_or("unexpected error").to_lowercase();
        Ok(message_response(self.0, message))
    }
}

#[catch(default)]
fn default_catcher(status: Status, request: &Request<'_>) -> Caught {
    log::debug!("{} {} caught with {}", request.method(), request.uri(), status);
    Caught(status)
}

pub fn all() -> Vec<Catcher> {
    catchers![default_catcher]
}
