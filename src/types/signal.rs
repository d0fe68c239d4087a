//! Signals: atomic extracted statements with provenance.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Stable identifier of a signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalId(String);

impl SignalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SignalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Classification enums
// ---------------------------------------------------------------------------

/// Identity dimension a signal or principle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dimension {
    IdentityCore,
    CharacterTraits,
    VoicePresence,
    HonestyFramework,
    BoundariesEthics,
    RelationshipDynamics,
    ContinuityGrowth,
}

impl Dimension {
    /// Every dimension, in canonical order.
    pub const ALL: [Dimension; 7] = [
        Dimension::IdentityCore,
        Dimension::CharacterTraits,
        Dimension::VoicePresence,
        Dimension::HonestyFramework,
        Dimension::BoundariesEthics,
        Dimension::RelationshipDynamics,
        Dimension::ContinuityGrowth,
    ];

    /// Kebab-case label used in prompts and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdentityCore => "identity-core",
            Self::CharacterTraits => "character-traits",
            Self::VoicePresence => "voice-presence",
            Self::HonestyFramework => "honesty-framework",
            Self::BoundariesEthics => "boundaries-ethics",
            Self::RelationshipDynamics => "relationship-dynamics",
            Self::ContinuityGrowth => "continuity-growth",
        }
    }

    /// Parse a label, tolerating case, surrounding whitespace and
    /// underscores in place of hyphens.
    pub fn from_label(label: &str) -> Option<Self> {
        let norm = label.trim().to_lowercase().replace(&['_', ' '][..], "-");
        Self::ALL.iter().copied().find(|d| d.as_str() == norm)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a source came from, which determines its provenance class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Agent-written memory file.
    Memory,
    /// Agent-written reflection or journal entry.
    Reflection,
    /// Material selected by a human from agent output.
    Curated,
    /// Interview transcript answered by a human.
    Interview,
    /// Any other third-party material.
    External,
}

impl SourceType {
    pub fn provenance(&self) -> Provenance {
        match self {
            Self::Memory | Self::Reflection => Provenance::SelfAuthored,
            Self::Curated => Provenance::Curated,
            Self::Interview | Self::External => Provenance::External,
        }
    }
}

/// Provenance class used by the promotion gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    SelfAuthored,
    Curated,
    External,
}

/// Epistemic stance of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Assert,
    Deny,
    Question,
    Qualify,
}

impl Stance {
    /// Whether the statement challenges rather than affirms.
    pub fn is_questioning(&self) -> bool {
        matches!(self, Self::Question)
    }
}

/// How much weight the author put on a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Core,
    Supporting,
    Peripheral,
}

/// Whether a behavior was volunteered by the agent or drawn out by context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElicitationOrigin {
    AgentInitiated,
    UserElicited,
    ContextDependent,
    ConsistentAcrossContext,
}

// ---------------------------------------------------------------------------
// Source provenance
// ---------------------------------------------------------------------------

/// The file (and line, when known) a signal was extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSource {
    /// Path or logical name of the source file.
    pub path: String,
    /// Kind of source.
    pub source_type: SourceType,
    /// 1-based line number inside the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl SignalSource {
    pub fn new(path: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            path: path.into(),
            source_type,
            line: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

/// An atomic extracted statement.
///
/// Signals are immutable after construction; downstream structures hold
/// them behind an `Arc` or refer to them by [`SignalId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    id: SignalId,
    text: String,
    source: SignalSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dimension: Option<Dimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stance: Option<Stance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    importance: Option<Importance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    elicitation: Option<ElicitationOrigin>,
}

impl Signal {
    pub fn new(id: impl Into<SignalId>, text: impl Into<String>, source: SignalSource) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source,
            dimension: None,
            stance: None,
            importance: None,
            elicitation: None,
        }
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn with_stance(mut self, stance: Stance) -> Self {
        self.stance = Some(stance);
        self
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = Some(importance);
        self
    }

    pub fn with_elicitation(mut self, origin: ElicitationOrigin) -> Self {
        self.elicitation = Some(origin);
        self
    }

    pub fn id(&self) -> &SignalId {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> &SignalSource {
        &self.source
    }

    pub fn dimension(&self) -> Option<Dimension> {
        self.dimension
    }

    pub fn stance(&self) -> Option<Stance> {
        self.stance
    }

    pub fn importance(&self) -> Option<Importance> {
        self.importance
    }

    pub fn elicitation(&self) -> Option<ElicitationOrigin> {
        self.elicitation
    }

    pub fn provenance(&self) -> Provenance {
        self.source.source_type.provenance()
    }

    /// Whether this signal counts as outside or self-challenging evidence
    /// for the promotion gate.
    pub fn is_external_or_questioning(&self) -> bool {
        self.provenance() == Provenance::External
            || self.stance.map(|s| s.is_questioning()).unwrap_or(false)
    }
}

impl From<String> for SignalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Source documents
// ---------------------------------------------------------------------------

/// A raw text source handed to extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Path or logical name.
    pub path: String,
    /// Kind of source.
    pub source_type: SourceType,
    /// Raw text contents.
    pub text: String,
    /// Dimension to assign to every signal from this source.
    #[serde(default)]
    pub dimension_hint: Option<Dimension>,
    /// Elicitation tag to assign to every signal from this source.
    #[serde(default)]
    pub elicitation: Option<ElicitationOrigin>,
}

impl SourceDocument {
    pub fn new(path: impl Into<String>, source_type: SourceType, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source_type,
            text: text.into(),
            dimension_hint: None,
            elicitation: None,
        }
    }

    pub fn with_dimension_hint(mut self, dimension: Dimension) -> Self {
        self.dimension_hint = Some(dimension);
        self
    }
}
