//! Governance policy documents.
//!
//! A policy file declares named logging profiles. Each profile lists fields
//! that must never leave the process and optionally assigns severity labels
//! to fields; a `Forbidden` severity is equivalent to being disallowed.

use crate::{FieldSet, GovernanceError, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Severity label that makes a field redact-eligible.
pub const FORBIDDEN_SEVERITY: &str = "Forbidden";

/// A parsed policy file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Free-form document version.
    #[serde(default, alias = "Version")]
    pub version: String,

    /// Profiles in declaration order.
    #[serde(
        rename = "LoggingProfiles",
        alias = "loggingProfiles",
        alias = "profiles",
        default,
        deserialize_with = "ordered_profiles",
        serialize_with = "serialize_profiles"
    )]
    pub profiles: Vec<(String, Profile)>,
}

/// Field rules for one logging profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Fields that must always be redacted.
    #[serde(rename = "DisallowedFields", alias = "disallowedFields", default)]
    pub disallowed_fields: Vec<String>,

    /// Severity label per field.
    #[serde(rename = "FieldSeverities", alias = "fieldSeverities", default)]
    pub field_severities: BTreeMap<String, String>,
}

impl Profile {
    /// Collect every redact-eligible field into `out`.
    pub fn collect_redact_fields(&self, out: &mut FieldSet) {
        for field in &self.disallowed_fields {
            out.insert(field);
        }
        for (field, severity) in &self.field_severities {
            if severity.trim().eq_ignore_ascii_case(FORBIDDEN_SEVERITY) {
                out.insert(field);
            }
        }
    }

    /// The redact-eligible fields as a new set.
    pub fn redact_fields(&self) -> FieldSet {
        let mut set = FieldSet::new();
        self.collect_redact_fields(&mut set);
        set
    }
}

impl PolicyDocument {
    /// Parse a policy from JSON text.
    pub fn parse(text: &str) -> Result<Self> {
        let doc: PolicyDocument = serde_json::from_str(text)?;
        if doc.profiles.is_empty() {
            return Err(GovernanceError::PolicyError(
                "policy declares no logging profiles".to_string(),
            ));
        }
        Ok(doc)
    }

    /// Load a policy from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Save the policy to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Select a profile by case-insensitive name.
    ///
    /// Falls back to the first declared profile when nothing matches, so a
    /// misspelled profile name still gets the primary rules.
    pub fn profile(&self, name: &str) -> Option<(&str, &Profile)> {
        self.profiles
            .iter()
            .find(|(declared, _)| declared.eq_ignore_ascii_case(name))
            .or_else(|| self.profiles.first())
            .map(|(declared, profile)| (declared.as_str(), profile))
    }

    /// Resolve the redact set for a profile.
    pub fn redact_fields(&self, profile: &str) -> FieldSet {
        self.profile(profile)
            .map(|(_, p)| p.redact_fields())
            .unwrap_or_default()
    }

    /// Add or replace a profile.
    pub fn set_profile(&mut self, name: impl Into<String>, profile: Profile) {
        let name = name.into();
        match self
            .profiles
            .iter_mut()
            .find(|(declared, _)| declared.eq_ignore_ascii_case(&name))
        {
            Some((_, existing)) => *existing = profile,
            None => self.profiles.push((name, profile)),
        }
    }
}

fn ordered_profiles<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, Profile)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ProfilesVisitor;

    impl<'de> Visitor<'de> for ProfilesVisitor {
        type Value = Vec<(String, Profile)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of profile name to profile")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
            let mut profiles = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((name, profile)) = access.next_entry::<String, Profile>()? {
                profiles.push((name, profile));
            }
            Ok(profiles)
        }
    }

    deserializer.deserialize_map(ProfilesVisitor)
}

fn serialize_profiles<S>(profiles: &[(String, Profile)], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(profiles.len()))?;
    for (name, profile) in profiles {
        map.serialize_entry(name, profile)?;
    }
    map.end()
}

/// Outcome of a fail-open policy load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    /// The document parsed and a profile was selected.
    Loaded,
    /// The file does not exist.
    Missing,
    /// The file exists but could not be read.
    Unreadable,
    /// The file is not a valid policy document.
    Malformed,
    /// The document parsed but declares no profiles.
    NoProfiles,
}

impl PolicyStatus {
    /// Whether the load degraded to an empty redact set.
    pub fn is_fail_open(&self) -> bool {
        !matches!(self, PolicyStatus::Loaded)
    }

    fn from_error(err: &GovernanceError) -> Self {
        match err {
            GovernanceError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
                PolicyStatus::Missing
            }
            GovernanceError::IoError(_) => PolicyStatus::Unreadable,
            GovernanceError::PolicyError(_) => PolicyStatus::NoProfiles,
            _ => PolicyStatus::Malformed,
        }
    }
}

impl fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PolicyStatus::Loaded => "loaded",
            PolicyStatus::Missing => "missing",
            PolicyStatus::Unreadable => "unreadable",
            PolicyStatus::Malformed => "malformed",
            PolicyStatus::NoProfiles => "no_profiles",
        };
        write!(f, "{}", s)
    }
}

/// Fail-open policy loader.
pub struct PolicyStore;

impl PolicyStore {
    /// Load the redact set for `profile` from `path`.
    ///
    /// Never fails: an absent, unreadable, or malformed file yields an empty set.
    pub fn load<P: AsRef<Path>>(path: P, profile: &str) -> FieldSet {
        Self::load_with_status(path, profile).0
    }

    /// Load the redact set and report how the load went.
    pub fn load_with_status<P: AsRef<Path>>(path: P, profile: &str) -> (FieldSet, PolicyStatus) {
        match PolicyDocument::from_file(path.as_ref()) {
            Ok(doc) => (doc.redact_fields(profile), PolicyStatus::Loaded),
            Err(err) => {
                let status = PolicyStatus::from_error(&err);
                tracing::warn!(
                    target: "governance.policy.fail_open",
                    path = %path.as_ref().display(),
                    profile,
                    %status,
                    error = %err,
                    "policy unavailable, no policy-driven redaction will occur"
                );
                (FieldSet::new(), status)
            }
        }
    }
}
