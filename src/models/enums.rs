use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(UserRole {
    Patient => "PATIENT",
    Doctor => "DOCTOR",
    Admin => "ADMIN",
});

str_enum!(AppointmentStatus {
    Pending => "PENDING",
    Approved => "APPROVED",
    Rejected => "REJECTED",
});

impl AppointmentStatus {
    /// Only a pending request can be decided, and only to a final state.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        matches!(
            (self, next),
            (AppointmentStatus::Pending, AppointmentStatus::Approved)
                | (AppointmentStatus::Pending, AppointmentStatus::Rejected)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn user_role_round_trip() {
        for (variant, s) in [
            (UserRole::Patient, "PATIENT"),
            (UserRole::Doctor, "DOCTOR"),
            (UserRole::Admin, "ADMIN"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(UserRole::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn appointment_status_serializes_uppercase() {
        let json = serde_json::to_string(&AppointmentStatus::Approved).unwrap();
        assert_eq!(json, "\"APPROVED\"");
        let parsed: AppointmentStatus = serde_json::from_str("\"REJECTED\"").unwrap();
        assert_eq!(parsed, AppointmentStatus::Rejected);
    }

    #[test]
    fn pending_is_the_only_decidable_state() {
        use AppointmentStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Pending));
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(UserRole::from_str("patient").is_err());
        assert!(AppointmentStatus::from_str("CANCELLED").is_err());
        assert!(AppointmentStatus::from_str("").is_err());
    }
}
