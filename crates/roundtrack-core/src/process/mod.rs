//! Process definitions.
//!
//! A process type decides which counters exist for a round. The set of
//! processes and their fields is closed and known at compile time, so a
//! field id can only be spelled through the [`Field`] enum; string ids are
//! accepted at the boundary through [`ProcessType::parse_field`].

mod counters;

pub use counters::{CounterSet, CounterSnapshot};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessType {
    /// Shipping guides worked one by one.
    Guides,
    /// Case novelties: incidents raised on an order that need handling.
    Novelties,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GuideField {
    Done,
    Cancelled,
    Scheduled,
    Rescheduled,
    NoAnswer,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NoveltyField {
    Solved,
    Escalated,
    Cancelled,
    Refunded,
    Called,
    Messaged,
    Emailed,
    NoContact,
}

/// An editable counter field of some process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Guide(GuideField),
    Novelty(NoveltyField),
}

/// A read-only field computed from other fields of the same process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedField {
    /// Every contact attempt made on a novelty.
    NoveltyContacts,
}

/// Named group of fields, used by presentation layers to lay counters out.
#[derive(Debug, Clone, Copy)]
pub struct FieldGroup {
    pub id: &'static str,
    pub label: &'static str,
    pub fields: &'static [Field],
}

const GUIDE_FIELDS: [Field; 6] = [
    Field::Guide(GuideField::Done),
    Field::Guide(GuideField::Cancelled),
    Field::Guide(GuideField::Scheduled),
    Field::Guide(GuideField::Rescheduled),
    Field::Guide(GuideField::NoAnswer),
    Field::Guide(GuideField::Pending),
];

const NOVELTY_FIELDS: [Field; 8] = [
    Field::Novelty(NoveltyField::Solved),
    Field::Novelty(NoveltyField::Escalated),
    Field::Novelty(NoveltyField::Cancelled),
    Field::Novelty(NoveltyField::Refunded),
    Field::Novelty(NoveltyField::Called),
    Field::Novelty(NoveltyField::Messaged),
    Field::Novelty(NoveltyField::Emailed),
    Field::Novelty(NoveltyField::NoContact),
];

const NOVELTY_CONTACT_SOURCES: [Field; 3] = [
    Field::Novelty(NoveltyField::Called),
    Field::Novelty(NoveltyField::Messaged),
    Field::Novelty(NoveltyField::Emailed),
];

const GUIDE_GROUPS: [FieldGroup; 1] = [FieldGroup {
    id: "resultado",
    label: "Outcome",
    fields: &GUIDE_FIELDS,
}];

const NOVELTY_GROUPS: [FieldGroup; 2] = [
    FieldGroup {
        id: "gestion",
        label: "Handling",
        fields: &[
            Field::Novelty(NoveltyField::Solved),
            Field::Novelty(NoveltyField::Escalated),
            Field::Novelty(NoveltyField::Cancelled),
            Field::Novelty(NoveltyField::Refunded),
        ],
    },
    FieldGroup {
        id: "contacto",
        label: "Contact",
        fields: &[
            Field::Novelty(NoveltyField::Called),
            Field::Novelty(NoveltyField::Messaged),
            Field::Novelty(NoveltyField::Emailed),
            Field::Novelty(NoveltyField::NoContact),
        ],
    },
];

impl ProcessType {
    pub const ALL: [ProcessType; 2] = [ProcessType::Guides, ProcessType::Novelties];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessType::Guides => "guides",
            ProcessType::Novelties => "novelties",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProcessType::Guides => "Shipping guides",
            ProcessType::Novelties => "Novelties",
        }
    }

    /// Editable fields in display order.
    pub fn fields(&self) -> &'static [Field] {
        match self {
            ProcessType::Guides => &GUIDE_FIELDS,
            ProcessType::Novelties => &NOVELTY_FIELDS,
        }
    }

    pub fn groups(&self) -> &'static [FieldGroup] {
        match self {
            ProcessType::Guides => &GUIDE_GROUPS,
            ProcessType::Novelties => &NOVELTY_GROUPS,
        }
    }

    pub fn derived_fields(&self) -> &'static [DerivedField] {
        match self {
            ProcessType::Guides => &[],
            ProcessType::Novelties => &[DerivedField::NoveltyContacts],
        }
    }

    /// The field that counts completed work. Drives XP and throughput.
    pub fn done_field(&self) -> Field {
        match self {
            ProcessType::Guides => Field::Guide(GuideField::Done),
            ProcessType::Novelties => Field::Novelty(NoveltyField::Solved),
        }
    }

    /// The field that counts abandoned work. Success rate is done over
    /// done plus cancelled.
    pub fn cancelled_field(&self) -> Field {
        match self {
            ProcessType::Guides => Field::Guide(GuideField::Cancelled),
            ProcessType::Novelties => Field::Novelty(NoveltyField::Cancelled),
        }
    }

    /// Resolve a wire/field id into an editable field of this process.
    ///
    /// # Errors
    /// Derived ids are rejected with [`ValidationError::DerivedField`],
    /// anything else unknown with [`ValidationError::UnknownField`].
    pub fn parse_field(&self, id: &str) -> Result<Field, ValidationError> {
        if let Some(field) = self.fields().iter().find(|f| f.id() == id) {
            return Ok(*field);
        }
        if self.derived_fields().iter().any(|d| d.id() == id) {
            return Err(ValidationError::DerivedField(id.to_string()));
        }
        Err(ValidationError::UnknownField {
            process: self.as_str().to_string(),
            field: id.to_string(),
        })
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "guides" | "guias" => Ok(ProcessType::Guides),
            "novelties" | "novedades" => Ok(ProcessType::Novelties),
            other => Err(ValidationError::UnknownProcess(other.to_string())),
        }
    }
}

impl Field {
    /// Stable id used in storage and on the wire.
    pub fn id(&self) -> &'static str {
        match self {
            Field::Guide(f) => match f {
                GuideField::Done => "realizado",
                GuideField::Cancelled => "cancelado",
                GuideField::Scheduled => "agendado",
                GuideField::Rescheduled => "reprogramado",
                GuideField::NoAnswer => "sin_respuesta",
                GuideField::Pending => "pendiente",
            },
            Field::Novelty(f) => match f {
                NoveltyField::Solved => "solucionada",
                NoveltyField::Escalated => "escalada",
                NoveltyField::Cancelled => "cancelada",
                NoveltyField::Refunded => "reembolsada",
                NoveltyField::Called => "llamada",
                NoveltyField::Messaged => "mensaje",
                NoveltyField::Emailed => "correo",
                NoveltyField::NoContact => "sin_contacto",
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Field::Guide(f) => match f {
                GuideField::Done => "Done",
                GuideField::Cancelled => "Cancelled",
                GuideField::Scheduled => "Scheduled",
                GuideField::Rescheduled => "Rescheduled",
                GuideField::NoAnswer => "No answer",
                GuideField::Pending => "Pending",
            },
            Field::Novelty(f) => match f {
                NoveltyField::Solved => "Solved",
                NoveltyField::Escalated => "Escalated",
                NoveltyField::Cancelled => "Cancelled",
                NoveltyField::Refunded => "Refunded",
                NoveltyField::Called => "Phone call",
                NoveltyField::Messaged => "Message",
                NoveltyField::Emailed => "Email",
                NoveltyField::NoContact => "No contact",
            },
        }
    }

    pub fn process(&self) -> ProcessType {
        match self {
            Field::Guide(_) => ProcessType::Guides,
            Field::Novelty(_) => ProcessType::Novelties,
        }
    }

    /// Position of the field within its process' field list.
    pub(crate) fn index(&self) -> usize {
        match self {
            Field::Guide(f) => *f as usize,
            Field::Novelty(f) => *f as usize,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl DerivedField {
    pub fn id(&self) -> &'static str {
        match self {
            DerivedField::NoveltyContacts => "total_contactos",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DerivedField::NoveltyContacts => "Total contacts",
        }
    }

    pub fn process(&self) -> ProcessType {
        match self {
            DerivedField::NoveltyContacts => ProcessType::Novelties,
        }
    }

    /// The fields summed to produce this value.
    pub fn sources(&self) -> &'static [Field] {
        match self {
            DerivedField::NoveltyContacts => &NOVELTY_CONTACT_SOURCES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_index_matches_declaration_order() {
        for process in ProcessType::ALL {
            for (i, field) in process.fields().iter().enumerate() {
                assert_eq!(field.index(), i, "{field} out of order");
                assert_eq!(field.process(), process);
            }
        }
    }

    #[test]
    fn guides_have_six_fields_and_novelties_eight_in_two_groups() {
        assert_eq!(ProcessType::Guides.fields().len(), 6);
        assert_eq!(ProcessType::Novelties.fields().len(), 8);
        let grouped: usize = ProcessType::Novelties
            .groups()
            .iter()
            .map(|g| g.fields.len())
            .sum();
        assert_eq!(ProcessType::Novelties.groups().len(), 2);
        assert_eq!(grouped, 8);
    }

    #[test]
    fn parse_field_rejects_derived_and_unknown_ids() {
        let novelties = ProcessType::Novelties;
        assert_eq!(
            novelties.parse_field("llamada"),
            Ok(Field::Novelty(NoveltyField::Called))
        );
        assert_eq!(
            novelties.parse_field("total_contactos"),
            Err(ValidationError::DerivedField("total_contactos".into()))
        );
        assert!(matches!(
            ProcessType::Guides.parse_field("llamada"),
            Err(ValidationError::UnknownField { .. })
        ));
    }

    #[test]
    fn process_type_parses_aliases() {
        assert_eq!("Guias".parse::<ProcessType>(), Ok(ProcessType::Guides));
        assert_eq!("novelties".parse::<ProcessType>(), Ok(ProcessType::Novelties));
        assert!("tickets".parse::<ProcessType>().is_err());
    }
}
