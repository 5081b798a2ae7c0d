use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
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

str_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Confirmed => "confirmed",
    CheckedIn => "checked_in",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
    NoShow => "no_show",
});

impl AppointmentStatus {
    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }

    /// Live appointments occupy their interval for overlap checks.
    /// A completed appointment still occupies its slot.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::NoShow)
    }
}

str_enum!(AppointmentType {
    Consultation => "consultation",
    Vaccination => "vaccination",
    Surgery => "surgery",
    Dental => "dental",
    FollowUp => "follow_up",
    Emergency => "emergency",
    Other => "other",
});

str_enum!(AppointmentEventKind {
    Created => "created",
    Transition => "transition",
    Rescheduled => "rescheduled",
});

str_enum!(VisitStatus {
    Open => "open",
    InProgress => "in_progress",
    Completed => "completed",
});

impl VisitStatus {
    /// Position along the forward-only lifecycle.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Open => 0,
            Self::InProgress => 1,
            Self::Completed => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

str_enum!(NoteType {
    Soap => "soap",
    Progress => "progress",
    Procedure => "procedure",
    Discharge => "discharge",
    General => "general",
});
