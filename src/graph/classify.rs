//! Reference classifier: assigns the three independent tags of an edge.
//!
//! - **Resolution** comes from where the callee's definition was found,
//!   relative to the caller.
//! - **Visibility** comes from the casing of the subject identifier. Anonymous
//!   functions are always private and an unresolved edge is always tagged
//!   external, whatever the casing.
//! - **Service impact** stays unset until both endpoints' services are known.

use crate::indexer::universe::Lookup;
use crate::types::{Classification, Resolution, ServiceImpact, Visibility};

/// One raw edge, as seen at population time.
#[derive(Debug, Clone, Copy)]
pub struct RawEdge<'a> {
    /// Calling function.
    pub caller: &'a str,
    pub caller_file: &'a str,
    pub caller_service: Option<&'a str>,
    /// Identifier whose casing decides visibility.
    pub subject: &'a str,
    /// The subject is a closure or otherwise unnamed.
    pub subject_anonymous: bool,
    /// Where the callee was found; `None` when it resolves nowhere.
    pub target: Option<Lookup<'a>>,
    /// Service of the target row, once that row exists.
    pub target_service: Option<&'a str>,
}

pub fn resolution_for(caller: &str, caller_file: &str, target: Option<&Lookup<'_>>) -> Resolution {
    let Some(hit) = target else {
        return Resolution::External;
    };
    let site = hit.site;
    if site.file == caller_file {
        if site.enclosing.as_deref() == Some(caller) {
            Resolution::SameFunction
        } else {
            Resolution::SameFile
        }
    } else if hit.ambiguous {
        Resolution::CrossFileAmbiguous
    } else {
        Resolution::CrossFile
    }
}

pub fn visibility_for(subject: &str, anonymous: bool, resolution: Resolution) -> Visibility {
    if resolution == Resolution::External {
        return Visibility::External;
    }
    if anonymous {
        return Visibility::Private;
    }
    match subject.chars().next() {
        Some(c) if c.is_uppercase() => Visibility::Public,
        _ => Visibility::Private,
    }
}

pub fn service_impact_for<S: PartialEq + ?Sized>(a: Option<&S>, b: Option<&S>) -> Option<ServiceImpact> {
    match (a, b) {
        (Some(a), Some(b)) if a == b => Some(ServiceImpact::SameService),
        (Some(_), Some(_)) => Some(ServiceImpact::CrossService),
        _ => None,
    }
}

pub fn classify(edge: &RawEdge<'_>) -> Classification {
    let resolution = resolution_for(edge.caller, edge.caller_file, edge.target.as_ref());
    let visibility = visibility_for(edge.subject, edge.subject_anonymous, resolution);
    let service_impact = if resolution == Resolution::External {
        None
    } else {
        service_impact_for(edge.caller_service, edge.target_service)
    };
    Classification {
        resolution,
        visibility,
        service_impact,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
