//! Query string decoding for the bulk listing endpoint.
//!
//! Unknown parameters and values that are not integers reject the whole
//! request. An empty value leaves its parameter unset, and when a parameter
//! repeats the last non-empty value wins.

use rocket::form::error::ErrorKind;
use rocket::form::{self, DataField, Errors, FromForm, FromFormField, Options, ValueField};

use crate::query::{EntityKind, KillmailFilter, Page};

/// Integer query value. An empty value is treated as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryId(pub Option<i64>);

impl<'r> FromFormField<'r> for QueryId {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        let trimmed = field.value.trim();
        if trimmed.is_empty() {
            return Ok(QueryId(None));
        }
        Ok(QueryId(Some(trimmed.parse()?)))
    }
}

/// Query parameters accepted by `GET /kills`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KillsParams {
    pub character_id: Option<i64>,
    pub corporation_id: Option<i64>,
    pub alliance_id: Option<i64>,
    pub solar_system: Option<i64>,
    pub constellation: Option<i64>,
    pub region: Option<i64>,
    /// Zero-based page index.
    pub page: Option<i64>,
}

impl KillsParams {
    pub fn filter(&self) -> KillmailFilter {
        let mut filter = KillmailFilter::default();
        for kind in EntityKind::ALL {
            let id = match kind {
                EntityKind::Character => self.character_id,
                EntityKind::Corporation => self.corporation_id,
                EntityKind::Alliance => self.alliance_id,
            };
            if let Some(id) = id {
                filter = filter.with_entity(kind, id);
            }
        }
        if let Some(id) = self.solar_system {
            filter = filter.with_solar_system(id);
        }
        if let Some(id) = self.constellation {
            filter = filter.with_constellation(id);
        }
        if let Some(id) = self.region {
            filter = filter.with_region(id);
        }
        filter
    }

    pub fn page(&self) -> Page {
        Page::from(self.page)
    }

    fn slot(&mut self, name: &str) -> Option<&mut Option<i64>> {
        match name {
            "character_id" => Some(&mut self.character_id),
            "corporation_id" => Some(&mut self.corporation_id),
            "alliance_id" => Some(&mut self.alliance_id),
            "solar_system" => Some(&mut self.solar_system),
            "constellation" => Some(&mut self.constellation),
            "region" => Some(&mut self.region),
            "page" => Some(&mut self.page),
            _ => None,
        }
    }
}

pub struct KillsParamsContext<'r> {
    params: KillsParams,
    errors: Errors<'r>,
}

#[rocket::async_trait]
impl<'r> FromForm<'r> for KillsParams {
    type Context = KillsParamsContext<'r>;

    fn init(_: Options) -> Self::Context {
        KillsParamsContext {
            params: <KillsParams as std::default::Default>::default(),
            errors: Errors::new(),
        }
    }

    fn push_value(ctxt: &mut Self::Context, field: ValueField<'r>) {
        let name = field.name;
        let value = field.value;
        let Some(slot) = ctxt.params.slot(name.key_lossy().as_str()) else {
            ctxt.errors.push(field.unexpected());
            return;
        };

        match QueryId::from_value(field) {
            Ok(QueryId(Some(id))) => *slot = Some(id),
            Ok(QueryId(None)) => {}
            Err(mut errors) => {
                errors.set_name(name);
                errors.set_value(value);
                ctxt.errors.extend(errors);
            }
        }
    }

    async fn push_data(ctxt: &mut Self::Context, field: DataField<'r, '_>) {
        ctxt.errors.push(field.unexpected());
    }

    fn finalize(ctxt: Self::Context) -> form::Result<'r, Self> {
        if ctxt.errors.is_empty() {
            Ok(ctxt.params)
        } else {
            Err(ctxt.errors)
        }
    }
}

/// Render decoding errors as a single client-facing message.
pub fn describe(errors: &Errors<'_>) -> String {
    errors
        .iter()
        .map(|error| {
            let name = error
                .name
                .as_ref()
                .map(|name| name.to_string())
                .unwrap_or_default();
            match (&error.kind, &error.value) {
                (ErrorKind::Unexpected, _) => format!("unknown query parameter '{name}'"),
                (kind, Some(value)) => {
                    format!("invalid value '{value}' for query parameter '{name}': {kind}")
                }
                (kind, None) => format!("invalid query parameter '{name}': {kind}"),
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::form::Form;

    fn parse(query: &str) -> form::Result<'_, KillsParams> {
        Form::<KillsParams>::parse(query)
    }

    #[test]
    fn decodes_known_parameters() {
        let params = parse("character_id=42&page=2").unwrap();
        assert_eq!(params.character_id, Some(42));
        assert_eq!(params.page().skip(), 200);
        assert_eq!(params.filter().entity(EntityKind::Character), Some(42));
        assert_eq!(params.filter().entity(EntityKind::Alliance), None);
    }

    #[test]
    fn empty_query_is_unfiltered_first_page() {
        let params = parse("").unwrap();
        assert_eq!(params, <KillsParams as Default>::default());
        assert_eq!(params.filter(), KillmailFilter::default());
        assert_eq!(params.page().number(), 0);
    }

    #[test]
    fn empty_values_leave_parameters_unset() {
        let params = parse("character_id=&page&region=").unwrap();
        assert_eq!(params, <KillsParams as Default>::default());
    }

    #[test]
    fn last_repeated_value_wins() {
        let params = parse("page=0&page=1&alliance_id=5&alliance_id=").unwrap();
        assert_eq!(params.page, Some(1));
        assert_eq!(params.alliance_id, Some(5));
    }

    #[test]
    fn rejects_unknown_parameter() {
        let errors = parse("page=1&foo=bar").unwrap_err();
        assert_eq!(describe(&errors), "unknown query parameter 'foo'");
    }

    #[test]
    fn rejects_malformed_value() {
        let errors = parse("alliance_id=lots").unwrap_err();
        let message = describe(&errors);
        assert!(message.contains("'lots'"), "{message}");
        assert!(message.contains("'alliance_id'"), "{message}");
    }

    #[test]
    fn location_parameters_reach_the_filter() {
        let params = parse("solar_system=30000142&constellation=20000020&region=10000002")
            .unwrap();
        let filter = params.filter();
        assert_eq!(filter.solar_system(), Some(30_000_142));
        assert_eq!(filter.constellation(), Some(20_000_020));
        assert_eq!(filter.region(), Some(10_000_002));
    }
}
