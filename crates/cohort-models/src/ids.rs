//! Snowflake ids travel as decimal strings so JavaScript clients never lose
//! precision. Inbound payloads may carry either a string or a number.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serializer};
use std::fmt;

pub fn serialize<S: Serializer>(id: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(id)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    deserializer.deserialize_any(IdVisitor)
}

/// Parse an id out of a loose JSON value (`"123"` or `123`).
pub fn from_value(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::String(raw) => raw.trim().parse().ok(),
        serde_json::Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

struct IdVisitor;

impl Visitor<'_> for IdVisitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an id as a string or integer")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
        i64::try_from(v).map_err(|_| E::custom("id out of range"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
        v.trim().parse().map_err(|_| E::custom("invalid id"))
    }
}

pub mod vec {
    use serde::de::{Deserializer, SeqAccess, Visitor};
    use serde::ser::{SerializeSeq, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(ids: &[i64], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(ids.len()))?;
        for id in ids {
            seq.serialize_element(&id.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<i64>, D::Error> {
        struct SeqVisitor;

        impl<'de> Visitor<'de> for SeqVisitor {
            type Value = Vec<i64>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a list of ids")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<i64>, A::Error> {
                let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(id) = seq.next_element::<super::LooseId>()? {
                    out.push(id.0);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_seq(SeqVisitor)
    }
}

struct LooseId(i64);

impl<'de> Deserialize<'de> for LooseId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(IdVisitor).map(LooseId)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "crate::ids")]
        id: i64,
        #[serde(with = "crate::ids::vec")]
        ids: Vec<i64>,
    }

    #[test]
    fn ids_serialize_as_strings() {
        let value = serde_json::to_value(Holder { id: 42, ids: vec![1, 2] }).unwrap();
        assert_eq!(value, json!({ "id": "42", "ids": ["1", "2"] }));
    }

    #[test]
    fn ids_accept_strings_and_numbers() {
        let holder: Holder = serde_json::from_value(json!({ "id": 7, "ids": ["8", 9] })).unwrap();
        assert_eq!(holder.id, 7);
        assert_eq!(holder.ids, vec![8, 9]);
    }

    #[test]
    fn from_value_rejects_garbage() {
        assert_eq!(super::from_value(&json!("12")), Some(12));
        assert_eq!(super::from_value(&json!("abc")), None);
        assert_eq!(super::from_value(&json!({ "groupId": 1 })), None);
    }
}
