use rocket::http::{ContentType, Status};
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use std::io::Cursor;

use crate::models::MessageBody;
use crate::store::StoreError;

#[derive(Debug)]
pub enum ApiError {
    /// Malformed path or query input.
    BadRequest(String),
    /// Lookup miss. Rendered as 500 to stay compatible with existing clients.
    NotFound(String),
    Store(StoreError),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::NotFound(_) | ApiError::Store(_) => Status::InternalServerError,
        }
    }
}

/// Render `{"message": ...}` with the given status.
pub(crate) fn message_response(status: Status, message: String) -> Response<'static> {
    let json = serde_json::to_string(&MessageBody { message })
        .unwrap_or_else(|_| r#"{"message":"failed to serialize error"}"#.to_string());

    Response::build()
        .status(status)
        .header(ContentType::JSON)
        .sized_body(json.len(), Cursor::new(json))
        .finalize()
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(msg) => {
                log::debug!("bad request: {}", msg);
                msg
            }
            ApiError::NotFound(msg) => {
                log::warn!("not found: {}", msg);
                msg
            }
            ApiError::Store(e) => {
                log::error!("store error: {}", e);
                e.to_string()
            }
        };

        Ok(message_response(status, message))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
