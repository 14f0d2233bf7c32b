//! Core domain types shared by the store, the classifier, and the export.
//!
//! Surrogate keys are per-table newtypes so a `StepId` can never be passed
//! where a `TestFunctionId` is expected. Classification tags come in three
//! independent dimensions, all drawn from the single versioned
//! [`ReferenceType`] enumeration that is exported alongside the tables.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Surrogate keys
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub u32);

            impl $name {
                #[inline]
                pub fn get(self) -> u32 {
                    self.0
                }
            }

            impl From<u32> for $name {
                fn from(raw: u32) -> Self {
                    Self(raw)
                }
            }

            impl From<$name> for u32 {
                fn from(id: $name) -> u32 {
                    id.0
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

define_id!(
    /// Key of a [`crate::graph::records::Resource`] row.
    ResourceId,
    /// Key of a [`crate::graph::records::Service`] row.
    ServiceId,
    /// Key of a [`crate::graph::records::SourceFile`] row.
    SourceFileId,
    /// Key of a [`crate::graph::records::Struct`] row.
    StructId,
    /// Key of a [`crate::graph::records::TestFunction`] row.
    TestFunctionId,
    /// Key of a [`crate::graph::records::TemplateFunction`] row.
    TemplateFunctionId,
    StepId,
    TemplateCallId,
    SequentialLinkId,
    DirectReferenceId,
);

// ---------------------------------------------------------------------------
// ReferenceType
// ---------------------------------------------------------------------------

/// Version of the [`ReferenceType`] enumeration written into every export.
/// Bump whenever a variant is added or a code changes.
pub const REFERENCE_TYPE_VERSION: u32 = 1;

/// Closed enumeration backing all three classification dimensions.
///
/// The numeric codes are part of the export format and must never be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    SameFunction,
    SameFile,
    CrossFile,
    CrossFileAmbiguous,
    External,
    Private,
    Public,
    SameService,
    CrossService,
}

impl ReferenceType {
    pub const ALL: [ReferenceType; 9] = [
        Self::SameFunction,
        Self::SameFile,
        Self::CrossFile,
        Self::CrossFileAmbiguous,
        Self::External,
        Self::Private,
        Self::Public,
        Self::SameService,
        Self::CrossService,
    ];

    pub fn code(self) -> u32 {
        match self {
            Self::SameFunction => 1,
            Self::SameFile => 2,
            Self::CrossFile => 3,
            Self::CrossFileAmbiguous => 4,
            Self::External => 5,
            Self::Private => 6,
            Self::Public => 7,
            Self::SameService => 8,
            Self::CrossService => 9,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SameFunction => "same_function",
            Self::SameFile => "same_file",
            Self::CrossFile => "cross_file",
            Self::CrossFileAmbiguous => "cross_file_ambiguous",
            Self::External => "external",
            Self::Private => "private",
            Self::Public => "public",
            Self::SameService => "same_service",
            Self::CrossService => "cross_service",
        }
    }

    /// Dimensions this tag may appear in. `External` is shared by the
    /// resolution and visibility dimensions.
    pub fn dimensions(self) -> &'static [Dimension] {
        match self {
            Self::SameFunction | Self::SameFile | Self::CrossFile | Self::CrossFileAmbiguous => {
                &[Dimension::Resolution]
            }
            Self::External => &[Dimension::Resolution, Dimension::Visibility],
            Self::Private | Self::Public => &[Dimension::Visibility],
            Self::SameService | Self::CrossService => &[Dimension::ServiceImpact],
        }
    }
}

impl std::fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three independent classification dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Resolution,
    Visibility,
    ServiceImpact,
}

impl Dimension {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolution => "resolution",
            Self::Visibility => "visibility",
            Self::ServiceImpact => "service_impact",
        }
    }
}

// ---------------------------------------------------------------------------
// Typed dimensions
// ---------------------------------------------------------------------------

/// How an edge's target was located. Ordered from most to least specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    SameFunction,
    SameFile,
    CrossFile,
    /// Cross-file, picked from several candidate definitions.
    CrossFileAmbiguous,
    External,
}

impl Resolution {
    pub fn reference_type(self) -> ReferenceType {
        match self {
            Self::SameFunction => ReferenceType::SameFunction,
            Self::SameFile => ReferenceType::SameFile,
            Self::CrossFile => ReferenceType::CrossFile,
            Self::CrossFileAmbiguous => ReferenceType::CrossFileAmbiguous,
            Self::External => ReferenceType::External,
        }
    }

    pub fn from_reference_type(tag: ReferenceType) -> Option<Self> {
        match tag {
            ReferenceType::SameFunction => Some(Self::SameFunction),
            ReferenceType::SameFile => Some(Self::SameFile),
            ReferenceType::CrossFile => Some(Self::CrossFile),
            ReferenceType::CrossFileAmbiguous => Some(Self::CrossFileAmbiguous),
            ReferenceType::External => Some(Self::External),
            _ => None,
        }
    }

    pub fn is_cross_file(self) -> bool {
        matches!(self, Self::CrossFile | Self::CrossFileAmbiguous)
    }
}

/// Visibility of the subject identifier, by casing convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Public,
    External,
}

impl Visibility {
    pub fn reference_type(self) -> ReferenceType {
        match self {
            Self::Private => ReferenceType::Private,
            Self::Public => ReferenceType::Public,
            Self::External => ReferenceType::External,
        }
    }

    pub fn from_reference_type(tag: ReferenceType) -> Option<Self> {
        match tag {
            ReferenceType::Private => Some(Self::Private),
            ReferenceType::Public => Some(Self::Public),
            ReferenceType::External => Some(Self::External),
            _ => None,
        }
    }
}

/// Whether both endpoints of an edge live in the same service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceImpact {
    SameService,
    CrossService,
}

impl ServiceImpact {
    pub fn reference_type(self) -> ReferenceType {
        match self {
            Self::SameService => ReferenceType::SameService,
            Self::CrossService => ReferenceType::CrossService,
        }
    }

    pub fn from_reference_type(tag: ReferenceType) -> Option<Self> {
        match tag {
            ReferenceType::SameService => Some(Self::SameService),
            ReferenceType::CrossService => Some(Self::CrossService),
            _ => None,
        }
    }
}

/// The full tag set carried by every classified edge.
///
/// `service_impact` stays `None` until both endpoints' services are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    pub resolution: Resolution,
    pub visibility: Visibility,
    pub service_impact: Option<ServiceImpact>,
}

impl Classification {
    /// Tags for an edge whose target could not be located anywhere.
    pub fn external() -> Self {
        Self {
            resolution: Resolution::External,
            visibility: Visibility::External,
            service_impact: None,
        }
    }

    pub fn is_external(&self) -> bool {
        self.resolution == Resolution::External
    }
}

// ---------------------------------------------------------------------------
// OccurrenceKind
// ---------------------------------------------------------------------------

/// Syntactic shape of a literal target-identifier occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceKind {
    /// Block header, e.g. `resource "target" "name" { ... }`.
    Block,
    /// Attribute reference, e.g. `target.name.id`.
    Attribute,
}

impl OccurrenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Attribute => "attribute",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "block" => Some(Self::Block),
            "attribute" | "attr" => Some(Self::Attribute),
            _ => None,
        }
    }
}

impl std::fmt::Display for OccurrenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn reference_type_codes_are_unique_and_roundtrip() {
        let codes: HashSet<u32> = ReferenceType::ALL.iter().map(|t| t.code()).collect();
        assert_eq!(codes.len(), ReferenceType::ALL.len());
        for tag in ReferenceType::ALL {
            assert_eq!(ReferenceType::from_code(tag.code()), Some(tag));
        }
        assert_eq!(ReferenceType::from_code(0), None);
    }

    #[test]
    fn external_is_shared_between_resolution_and_visibility() {
        let dims = ReferenceType::External.dimensions();
        assert!(dims.contains(&Dimension::Resolution));
        assert!(dims.contains(&Dimension::Visibility));
        assert_eq!(
            Resolution::External.reference_type(),
            Visibility::External.reference_type()
        );
    }

    #[test]
    fn typed_dimensions_reject_foreign_tags() {
        assert_eq!(Resolution::from_reference_type(ReferenceType::Public), None);
        assert_eq!(Visibility::from_reference_type(ReferenceType::SameFile), None);
        assert_eq!(
            ServiceImpact::from_reference_type(ReferenceType::External),
            None
        );
    }

    #[test]
    fn resolution_orders_by_specificity() {
        assert!(Resolution::SameFunction < Resolution::SameFile);
        assert!(Resolution::SameFile < Resolution::CrossFile);
        assert!(Resolution::CrossFileAmbiguous < Resolution::External);
    }

    #[test]
    fn occurrence_kind_parsing() {
        assert_eq!(OccurrenceKind::from_str_loose("Block"), Some(OccurrenceKind::Block));
        assert_eq!(OccurrenceKind::from_str_loose("attr"), Some(OccurrenceKind::Attribute));
        assert_eq!(OccurrenceKind::from_str_loose("nope"), None);
    }

    #[test]
    fn ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&StepId(7)).unwrap();
        assert_eq!(json, "7");
        let back: StepId = serde_json::from_str("7").unwrap();
        assert_eq!(back, StepId(7));
    }
}
