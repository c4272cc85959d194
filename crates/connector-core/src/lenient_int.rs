//! The "lenient integer" scalar: unquoted on output, quoted-or-unquoted
//! on input. The cloud API emits some index fields as
//! JSON strings and others as JSON numbers depending on endpoint vintage;
//! this type absorbs that without callers having to care.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LenientInt(pub i64);

impl LenientInt {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for LenientInt {
    fn from(v: i64) -> Self {
        LenientInt(v)
    }
}

impl From<LenientInt> for i64 {
    fn from(v: LenientInt) -> Self {
        v.0
    }
}

impl fmt::Display for LenientInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for LenientInt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

struct LenientIntVisitor;

impl Visitor<'_> for LenientIntVisitor {
    type Value = LenientInt;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer, optionally quoted as a JSON string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(LenientInt(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v)
            .map(LenientInt)
            .map_err(|_| E::custom(format!("integer {v} out of i64 range")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.trim()
            .parse::<i64>()
            .map(LenientInt)
            .map_err(|_| E::custom(format!("invalid lenient integer string {v:?}")))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        self.visit_str(&v)
    }
}

impl<'de> Deserialize<'de> for LenientInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LenientIntVisitor)
    }
}
