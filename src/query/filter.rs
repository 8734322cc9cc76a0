//! Filter predicate for bulk killmail listings.
//!
//! [`KillmailFilter`] is an immutable value built from validated request
//! parameters. [`KillmailFilter::to_document`] renders it as a MongoDB
//! filter document: only records carrying derived attributes (`axiom`) are
//! eligible, and each entity filter matches either any attacker or the
//! victim. Identifiers that are not positive place no constraint.

use rocket_db_pools::mongodb::bson::{Document, doc};
use std::str::FromStr;

/// How entity filters combine when several are supplied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterMode {
    /// Every supplied entity filter must hold.
    #[default]
    Conjunctive,
    /// Historical behavior: each entity filter overwrites the previous one
    /// under the single top-level `$or` key, so only the last one set
    /// (character, then corporation, then alliance) applies.
    LastWins,
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "conjunctive" | "and" => Ok(FilterMode::Conjunctive),
            "legacy" | "last-wins" | "last_wins" => Ok(FilterMode::LastWins),
            other => Err(format!(
                "invalid filter mode '{other}'; expected 'conjunctive' or 'legacy'"
            )),
        }
    }
}

/// Entities a killmail participant can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Character,
    Corporation,
    Alliance,
}

impl EntityKind {
    /// Order in which entity filters are applied.
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Character,
        EntityKind::Corporation,
        EntityKind::Alliance,
    ];

    /// Participant field holding this entity's identifier.
    pub fn field(self) -> &'static str {
        match self {
            EntityKind::Character => "character_id",
            EntityKind::Corporation => "corporation_id",
            EntityKind::Alliance => "alliance_id",
        }
    }

    fn participant_clause(self, id: i64) -> Vec<Document> {
        ["attackers", "victim"]
            .into_iter()
            .map(|participant| {
                let mut branch = Document::new();
                branch.insert(format!("killmail.{participant}.{}", self.field()), id);
                branch
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KillmailFilter {
    character_id: Option<i64>,
    corporation_id: Option<i64>,
    alliance_id: Option<i64>,
    solar_system: Option<i64>,
    constellation: Option<i64>,
    region: Option<i64>,
}

impl KillmailFilter {
    pub fn with_entity(mut self, kind: EntityKind, id: i64) -> Self {
        match kind {
            EntityKind::Character => self.character_id = Some(id),
            EntityKind::Corporation => self.corporation_id = Some(id),
            EntityKind::Alliance => self.alliance_id = Some(id),
        }
        self
    }

    pub fn with_solar_system(mut self, id: i64) -> Self {
        self.solar_system = Some(id);
        self
    }

    /// Accepted for API compatibility. Killmails do not record their
    /// constellation, so this does not narrow results.
    pub fn with_constellation(mut self, id: i64) -> Self {
        self.constellation = Some(id);
        self
    }

    /// Accepted for API compatibility. Killmails do not record their
    /// region, so this does not narrow results.
    pub fn with_region(mut self, id: i64) -> Self {
        self.region = Some(id);
        self
    }

    pub fn entity(&self, kind: EntityKind) -> Option<i64> {
        match kind {
            EntityKind::Character => self.character_id,
            EntityKind::Corporation => self.corporation_id,
            EntityKind::Alliance => self.alliance_id,
        }
    }

    pub fn solar_system(&self) -> Option<i64> {
        self.solar_system
    }

    pub fn constellation(&self) -> Option<i64> {
        self.constellation
    }

    pub fn region(&self) -> Option<i64> {
        self.region
    }

    /// Entity filters that constrain the listing, in application order.
    pub fn entities(&self) -> impl Iterator<Item = (EntityKind, i64)> + '_ {
        EntityKind::ALL
            .into_iter()
            .filter_map(|kind| {
                self.entity(kind)
                    .filter(|id| *id > 0)
                    .map(|id| (kind, id))
            })
    }

    /// Render the MongoDB filter document.
    pub fn to_document(&self, mode: FilterMode) -> Document {
        let mut filter = doc! { "axiom": { "$exists": true } };

        match mode {
            FilterMode::Conjunctive => {
                let mut clauses: Vec<Vec<Document>> = self
                    .entities()
                    .map(|(kind, id)| kind.participant_clause(id))
                    .collect();

                match clauses.len() {
                    0 => {}
                    1 => {
                        filter.insert("$or", clauses.remove(0));
                    }
                    _ => {
                        let all: Vec<Document> = clauses
                            .into_iter()
                            .map(|branches| doc! { "$or": branches })
                            .collect();
                        filter.insert("$and", all);
                    }
                }
            }
            FilterMode::LastWins => {
                for (kind, id) in self.entities() {
                    filter.insert("$or", kind.participant_clause(id));
                }
            }
        }

        if let Some(system) = self.solar_system.filter(|id| *id > 0) {
            filter.insert("killmail.solar_system_id", system);
        }

        if self.constellation.is_some() || self.region.is_some() {
            log::debug!(
                "constellation/region filters are not recorded on killmails and are ignored"
            );
        }

        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket_db_pools::mongodb::bson::Bson;

    fn eligible() -> Document {
        doc! { "axiom": { "$exists": true } }
    }

    #[test]
    fn empty_filter_only_requires_derived_attributes() {
        let filter = KillmailFilter::default();
        assert_eq!(filter.to_document(FilterMode::Conjunctive), eligible());
        assert_eq!(filter.to_document(FilterMode::LastWins), eligible());
    }

    #[test]
    fn single_entity_matches_attackers_or_victim() {
        let filter = KillmailFilter::default().with_entity(EntityKind::Character, 42);

        let mut expected = eligible();
        expected.insert(
            "$or",
            vec![
                doc! { "killmail.attackers.character_id": 42_i64 },
                doc! { "killmail.victim.character_id": 42_i64 },
            ],
        );

        assert_eq!(filter.to_document(FilterMode::Conjunctive), expected);
        assert_eq!(filter.to_document(FilterMode::LastWins), expected);
    }

    #[test]
    fn conjunctive_mode_requires_every_entity() {
        let filter = KillmailFilter::default()
            .with_entity(EntityKind::Character, 42)
            .with_entity(EntityKind::Alliance, 99);

        let document = filter.to_document(FilterMode::Conjunctive);
        let clauses = document.get_array("$and").unwrap();
        assert_eq!(clauses.len(), 2);
        assert!(document.get("$or").is_none());

        let fields: Vec<String> = clauses
            .iter()
            .filter_map(Bson::as_document)
            .flat_map(|clause| clause.get_array("$or").unwrap().clone())
            .filter_map(|branch| branch.as_document().and_then(|d| d.keys().next().cloned()))
            .collect();
        assert_eq!(
            fields,
            vec![
                "killmail.attackers.character_id",
                "killmail.victim.character_id",
                "killmail.attackers.alliance_id",
                "killmail.victim.alliance_id",
            ]
        );
    }

    #[test]
    fn legacy_mode_keeps_only_last_entity() {
        let filter = KillmailFilter::default()
            .with_entity(EntityKind::Character, 42)
            .with_entity(EntityKind::Corporation, 77);

        let document = filter.to_document(FilterMode::LastWins);
        assert!(document.get("$and").is_none());
        let branches = document.get_array("$or").unwrap();
        assert_eq!(
            branches[0].as_document().unwrap(),
            &doc! { "killmail.attackers.corporation_id": 77_i64 }
        );
    }

    #[test]
    fn non_positive_ids_place_no_constraint() {
        let filter = KillmailFilter::default()
            .with_entity(EntityKind::Character, 0)
            .with_entity(EntityKind::Alliance, -7)
            .with_solar_system(0);

        assert_eq!(filter.entities().count(), 0);
        assert_eq!(filter.to_document(FilterMode::Conjunctive), eligible());
        assert_eq!(filter.to_document(FilterMode::LastWins), eligible());
        assert_eq!(filter.entity(EntityKind::Alliance), Some(-7));
    }

    #[test]
    fn solar_system_is_wired_but_region_is_not() {
        let filter = KillmailFilter::default()
            .with_solar_system(30_000_142)
            .with_constellation(20_000_020)
            .with_region(10_000_002);

        let mut expected = eligible();
        expected.insert("killmail.solar_system_id", 30_000_142_i64);
        assert_eq!(filter.to_document(FilterMode::Conjunctive), expected);
        assert_eq!(filter.region(), Some(10_000_002));
    }

    #[test]
    fn filter_mode_parses_aliases() {
        assert_eq!("legacy".parse::<FilterMode>(), Ok(FilterMode::LastWins));
        assert_eq!(" AND ".parse::<FilterMode>(), Ok(FilterMode::Conjunctive));
        assert!("sometimes".parse::<FilterMode>().is_err());
    }
}
