use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    /// Hourly rate.
    pub price: Decimal,
    pub shared_class_price: Option<Decimal>,
    /// Minutes.
    pub duration_default: i64,
    pub color: String,
    pub is_active: bool,
}

impl Course {
    /// Rate used for price snapshots. Students on shared pricing pay the
    /// shared rate when the course defines one.
    pub fn hourly_rate(&self, shared_pricing: bool) -> Decimal {
        match (shared_pricing, self.shared_class_price) {
            (true, Some(shared)) => shared,
            _ => self.price,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourseRequest {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub shared_class_price: Option<Decimal>,
    #[serde(default = "default_duration")]
    pub duration_default: i64,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

pub(crate) fn default_duration() -> i64 {
    60
}

pub(crate) fn default_color() -> String {
    "#3b82f6".to_string()
}

fn default_active() -> bool {
    true
}
