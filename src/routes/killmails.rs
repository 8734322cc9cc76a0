//! Killmail endpoints: single lookup and filtered bulk listing.

use rocket::form::Errors;
use rocket::serde::json::Json;
use rocket::{State, get};

use crate::config::KillboardConfig;
use crate::error::ApiError;
use crate::models::{KillmailPage, KillmailRecord};
use crate::query::BulkQuery;
use crate::routes::params::{KillsParams, describe};
use crate::service;
use crate::store::SharedStore;

fn parse_killmail_id(raw: Result<i64, &str>) -> Result<i64, ApiError> {
    match raw {
        Ok(id) if id >= 0 => Ok(id),
        Ok(id) => Err(ApiError::BadRequest(format!(
            "killmail id must not be negative, got {id}"
        ))),
        Err(raw) => Err(ApiError::BadRequest(format!(
            "invalid killmail id '{raw}', expected an integer"
        ))),
    }
}

/// Retrieve a single killmail by id.
#[get("/kill/<id>")]
pub async fn get_killmail(
    id: Result<i64, &str>,
    store: &State<SharedStore>,
    config: &State<KillboardConfig>,
) -> Result<Json<KillmailRecord>, ApiError> {
    let id = parse_killmail_id(id)?;
    log::info!("fetching killmail {}", id);

    let record = service::fetch_killmail(store.inner().as_ref(), id, config.query_timeout).await?;
    Ok(Json(record))
}

/// List one page of post-processed killmails, newest first, keyed by id.
#[get("/kills?<params..>")]
pub async fn list_killmails(
    params: Result<KillsParams, Errors<'_>>,
    store: &State<SharedStore>,
    config: &State<KillboardConfig>,
) -> Result<Json<KillmailPage>, ApiError> {
    let params = params.map_err(|errors| ApiError::BadRequest(describe(&errors)))?;
    let query = BulkQuery::new(&params.filter(), params.page(), config.filter_mode);
    log::debug!("bulk query {:?} -> {}", params, query.filter);

    let page = service::list_killmails(store.inner().as_ref(), &query, config.query_timeout).await?;
    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn killmail_id_must_be_a_non_negative_integer() {
        assert_eq!(parse_killmail_id(Ok(93_000_001)).unwrap(), 93_000_001);
        assert!(matches!(parse_killmail_id(Ok(-1)), Err(ApiError::BadRequest(_))));
        assert!(matches!(
            parse_killmail_id(Err("abc")),
            Err(ApiError::BadRequest(msg)) if msg.contains("abc")
        ));
    }
}
