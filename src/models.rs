use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ===== Killmail Models =====
//
// Records are decoded from BSON documents and rendered as JSON. Field names
// match the stored documents on both sides. Apart from `_id`, a field missing
// from a stored document decodes as its zero value.

/// A stored killmail together with its post-processing output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillmailRecord {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(rename = "killmail", default)]
    pub event: Killmail,
    /// Derived fitting attributes. Only post-processed records carry them.
    #[serde(rename = "axiom", default, skip_serializing_if = "Option::is_none")]
    pub derived: Option<FittingAttributes>,
}

impl KillmailRecord {
    pub fn is_listable(&self) -> bool {
        self.derived.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Killmail {
    #[serde(default)]
    pub attackers: Vec<Attacker>,
    #[serde(default)]
    pub killmail_id: i64,
    #[serde(default, with = "bson_datetime")]
    pub killmail_time: DateTime<Utc>,
    #[serde(default)]
    pub solar_system_id: i64,
    #[serde(default)]
    pub victim: Victim,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attacker {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub alliance_id: i64,
    #[serde(default)]
    pub corporation_id: i64,
    #[serde(default)]
    pub character_id: i64,
    #[serde(default)]
    pub damage_done: i64,
    #[serde(default)]
    pub final_blow: bool,
    #[serde(default)]
    pub security_status: f32,
    #[serde(default)]
    pub ship_type_id: i64,
    #[serde(default)]
    pub weapon_type_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Victim {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub alliance_id: i64,
    #[serde(default)]
    pub corporation_id: i64,
    #[serde(default)]
    pub character_id: i64,
    #[serde(default)]
    pub damage_taken: i64,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub ship_type_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub flag: i64,
    #[serde(default)]
    pub item_type_id: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub quantity_dropped: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub quantity_destroyed: i64,
    #[serde(default)]
    pub singleton: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Scoring data computed for a killmail after ingestion (`axiom`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FittingAttributes {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ship: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drones: Vec<BTreeMap<String, f64>>,
}

// ===== Response Models =====

/// Bulk listing payload keyed by killmail id. Integer keys are rendered as
/// JSON object keys in string form.
pub type KillmailPage = BTreeMap<i64, KillmailRecord>;

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Stored timestamps are BSON datetimes; the API renders them as RFC 3339.
mod bson_datetime {
    use chrono::{DateTime, Utc};
    use rocket_db_pools::mongodb::bson;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = bson::DateTime::deserialize(deserializer)?;
        DateTime::from_timestamp_millis(raw.timestamp_millis()).ok_or_else(|| {
            D::Error::custom(format!(
                "killmail_time out of range: {}ms",
                raw.timestamp_millis()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket_db_pools::mongodb::bson::{self, doc};

    fn stored_document(with_axiom: bool) -> bson::Document {
        let mut document = doc! {
            "_id": 93_000_001_i64,
            "killmail": {
                "attackers": [{
                    "corporation_id": 98_000_001,
                    "character_id": 42,
                    "damage_done": 1200,
                    "final_blow": true,
                    "security_status": -1.5,
                    "ship_type_id": 587,
                    "weapon_type_id": 2488,
                }],
                "killmail_id": 93_000_001_i64,
                "killmail_time": bson::DateTime::from_millis(1_600_000_000_000),
                "solar_system_id": 30_000_142,
                "victim": {
                    "alliance_id": 99_000_001,
                    "corporation_id": 98_000_002,
                    "character_id": 7,
                    "damage_taken": 1200,
                    "items": [{ "flag": 27, "item_type_id": 2488, "quantity_destroyed": 1, "singleton": 0 }],
                    "position": { "x": 1.0, "y": 2.0, "z": 3.0 },
                    "ship_type_id": 603,
                },
            },
        };
        if with_axiom {
            document.insert("axiom", doc! { "ship": { "hp": 1500.0 } });
        }
        document
    }

    #[test]
    fn decodes_stored_document() {
        let record: KillmailRecord = bson::from_document(stored_document(true)).unwrap();
        assert_eq!(record.id, 93_000_001);
        assert_eq!(record.event.attackers[0].character_id, 42);
        assert_eq!(record.event.attackers[0].alliance_id, 0);
        assert_eq!(record.event.victim.items[0].quantity_destroyed, 1);
        assert_eq!(record.event.killmail_time.timestamp(), 1_600_000_000);
        assert!(record.is_listable());
    }

    #[test]
    fn missing_fields_decode_as_zero_values() {
        let mut document = stored_document(true);
        let killmail = document.get_document_mut("killmail").unwrap();
        killmail.remove("solar_system_id");
        killmail.remove("killmail_time");
        killmail
            .get_document_mut("victim")
            .unwrap()
            .insert("items", vec![doc! { "quantity_dropped": 3 }]);

        let record: KillmailRecord = bson::from_document(document).unwrap();
        assert_eq!(record.event.solar_system_id, 0);
        assert_eq!(record.event.killmail_time.timestamp(), 0);
        assert_eq!(record.event.victim.items[0].flag, 0);
        assert_eq!(record.event.victim.items[0].quantity_dropped, 3);
    }

    #[test]
    fn json_omits_absent_optional_fields() {
        let record: KillmailRecord = bson::from_document(stored_document(false)).unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert!(json.get("axiom").is_none());
        assert_eq!(json["_id"], 93_000_001);
        assert!(json["killmail"]["attackers"][0].get("alliance_id").is_none());
        assert_eq!(json["killmail"]["victim"]["alliance_id"], 99_000_001);

        let item = &json["killmail"]["victim"]["items"][0];
        assert!(item.get("quantity_dropped").is_none());
        assert_eq!(item["quantity_destroyed"], 1);
        assert_eq!(json["killmail"]["killmail_time"], "2020-09-13T12:26:40Z");
    }

    #[test]
    fn json_keeps_derived_attributes() {
        let record: KillmailRecord = bson::from_document(stored_document(true)).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["axiom"]["ship"]["hp"], 1500.0);
        assert!(json["axiom"].get("drones").is_none());
    }

    #[test]
    fn page_keys_are_stringified_ids() {
        let record: KillmailRecord = bson::from_document(stored_document(true)).unwrap();
        let mut page = KillmailPage::new();
        page.insert(record.id, record);
        let json = serde_json::to_value(&page).unwrap();
        assert!(json.get("93000001").is_some());
    }
}
