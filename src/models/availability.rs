use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A doctor-defined recurring weekly window eligible for booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub is_booked: bool,
}

impl AvailabilitySlot {
    /// True when `[start, end)` on `day_of_week` lies inside this slot.
    pub fn covers(&self, day_of_week: u8, start: NaiveTime, end: NaiveTime) -> bool {
        self.day_of_week == day_of_week && self.start_time <= start && end <= self.end_time
    }
}

/// `HH:MM` wire/storage format for slot boundaries.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn format(t: &NaiveTime) -> String {
        t.format(FORMAT).to_string()
    }

    /// Strict `HH:MM`. Seconds are rejected: they would not survive storage.
    pub fn parse(s: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(s, FORMAT).ok()
    }

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time: {raw}")))
    }
}
