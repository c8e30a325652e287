//! Controlled vocabularies for enumerated evidence fields.
//!
//! Every enum carries its canonical label (the spelling written to the output
//! record) plus loose aliases accepted from upstream extractors, e.g.
//! `PREDICTIVE` or `predictive` for [`EvidenceType::Predictive`].
//! [`parse_loose`](EvidenceType::parse_loose) matches case- and
//! separator-insensitively; serde only accepts the canonical label.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a string is not part of a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{term}' is not a recognised {vocabulary}")]
pub struct UnknownTerm {
    pub vocabulary: &'static str,
    pub term: String,
}

/// Lowercase, map `_`/`-` to spaces and collapse whitespace.
pub fn normalize_label(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident ($title:literal) {
            $( $variant:ident => $label:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $( #[serde(rename = $label)] $variant ),+
        }

        impl $name {
            /// Every member, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical label written to the output record.
            pub fn label(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }

            /// Case- and separator-insensitive match against labels and aliases.
            pub fn parse_loose(raw: &str) -> Option<Self> {
                let key = normalize_label(raw);
                $(
                    if key == normalize_label($label) $(|| key == normalize_label($alias))* {
                        return Some($name::$variant);
                    }
                )+
                None
            }

            /// All canonical labels.
            pub fn labels() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.label()).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = UnknownTerm;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse_loose(s).ok_or_else(|| UnknownTerm {
                    vocabulary: $title,
                    term: s.to_string(),
                })
            }
        }
    };
}

vocabulary! {
    /// Top-level classification; fixes required fields and allowed significance.
    EvidenceType ("evidence type") {
        Predictive => "Predictive",
        Prognostic => "Prognostic",
        Diagnostic => "Diagnostic",
        Predisposing => "Predisposing",
        Oncogenic => "Oncogenic",
        Functional => "Functional",
    }
}

vocabulary! {
    /// Evidence level, A (validated) through E (inferential).
    EvidenceLevel ("evidence level") {
        A => "A" | "level a" | "validated",
        B => "B" | "level b" | "clinical",
        C => "C" | "level c" | "case study",
        D => "D" | "level d" | "preclinical",
        E => "E" | "level e" | "inferential",
    }
}

vocabulary! {
    /// Polarity of the evidence relative to its significance.
    EvidenceDirection ("evidence direction") {
        Supports => "Supports",
        DoesNotSupport => "Does Not Support" | "doesnotsupport" | "refutes",
    }
}

vocabulary! {
    /// Clinical significance across all evidence types.
    Significance ("significance") {
        SensitivityResponse => "Sensitivity/Response" | "sensitivity" | "response" | "sensitivity response",
        Resistance => "Resistance",
        AdverseResponse => "Adverse Response",
        ReducedSensitivity => "Reduced Sensitivity",
        BetterOutcome => "Better Outcome",
        PoorOutcome => "Poor Outcome",
        Positive => "Positive",
        Negative => "Negative",
        Predisposition => "Predisposition",
        Protectiveness => "Protectiveness",
        Oncogenicity => "Oncogenicity",
        GainOfFunction => "Gain of Function",
        LossOfFunction => "Loss of Function",
        UnalteredFunction => "Unaltered Function",
        Neomorphic => "Neomorphic",
        DominantNegative => "Dominant Negative",
        Unknown => "Unknown",
        NotApplicable => "N/A" | "na" | "not applicable",
    }
}

vocabulary! {
    /// Somatic or germline origin of the variant.
    VariantOrigin ("variant origin") {
        Somatic => "Somatic",
        RareGermline => "Rare Germline" | "germline",
        CommonGermline => "Common Germline",
        Unknown => "Unknown",
        NotApplicable => "N/A" | "na" | "not applicable",
    }
}

vocabulary! {
    /// How multiple therapies relate within one evidence item.
    TherapyInteraction ("therapy interaction type") {
        Combination => "Combination",
        Sequential => "Sequential",
        Substitutes => "Substitutes",
    }
}

vocabulary! {
    /// Study design classes recognised by the level and rating rules.
    StudyDesign ("study design") {
        Phase3Trial => "Phase III Trial" | "phase 3 trial" | "phase iii rct" | "phase iii" | "rct",
        Phase2Trial => "Phase II Trial" | "phase 2 trial" | "phase ii",
        Phase1Trial => "Phase I Trial" | "phase 1 trial" | "phase i",
        Cohort => "Cohort Study" | "cohort" | "observational",
        CaseStudy => "Case Study" | "case report" | "case series",
        Preclinical => "Preclinical" | "in vitro" | "in vivo" | "cell line" | "xenograft",
        Inferential => "Inferential",
    }
}

vocabulary! {
    /// Variant kind as used by the coordinate base-shape check.
    VariantKind ("variant kind") {
        Point => "Point" | "snv" | "snp" | "substitution" | "missense" | "point mutation",
        Insertion => "Insertion" | "ins",
        Deletion => "Deletion" | "del",
        Other => "Other" | "fusion" | "indel" | "delins" | "amplification",
    }
}

impl EvidenceType {
    /// Permitted significance values for this evidence type.
    pub fn allowed_significance(&self) -> &'static [Significance] {
        use Significance::*;
        match self {
            EvidenceType::Predictive => &[
                SensitivityResponse,
                Resistance,
                AdverseResponse,
                ReducedSensitivity,
                NotApplicable,
            ],
            EvidenceType::Prognostic => &[BetterOutcome, PoorOutcome, NotApplicable],
            EvidenceType::Diagnostic => &[Positive, Negative],
            EvidenceType::Predisposing => &[Predisposition, Protectiveness],
            EvidenceType::Oncogenic => &[Oncogenicity, Protectiveness],
            EvidenceType::Functional => &[
                GainOfFunction,
                LossOfFunction,
                UnalteredFunction,
                Neomorphic,
                DominantNegative,
                Unknown,
            ],
        }
    }

    pub fn allows(&self, significance: Significance) -> bool {
        self.allowed_significance().contains(&significance)
    }
}

impl VariantOrigin {
    pub fn is_germline(&self) -> bool {
        matches!(self, VariantOrigin::RareGermline | VariantOrigin::CommonGermline)
    }
}

impl StudyDesign {
    /// Whether the design involves patients (trials, cohorts, case reports).
    pub fn is_clinical(&self) -> bool {
        !matches!(self, StudyDesign::Preclinical | StudyDesign::Inferential)
    }
}
