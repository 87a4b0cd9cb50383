//! Enum types for analysis verdicts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// RISK LEVEL
// ============================================================================

/// Overall risk verdict for a page.
///
/// Variants are declared from least to most severe so the derived `Ord`
/// is the severity order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[default]
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// All levels in severity order.
    pub const ALL: [RiskLevel; 5] = [
        RiskLevel::Safe,
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    /// Wire representation used by the model and the persisted cache.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    /// Parse from the wire representation (case-insensitive).
    pub fn from_wire_str(s: &str) -> Result<Self, RiskLevelParseError> {
        match normalize_token(s).as_str() {
            "safe" => Ok(RiskLevel::Safe),
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            _ => Err(RiskLevelParseError(s.to_string())),
        }
    }

    /// Numeric severity, 0 for SAFE up to 4 for CRITICAL.
    pub fn score(&self) -> u8 {
        match self {
            RiskLevel::Safe => 0,
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
            RiskLevel::Critical => 4,
        }
    }

    /// Check whether this level is at least as severe as `other`.
    pub fn is_at_least(&self, other: RiskLevel) -> bool {
        *self >= other
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

impl FromStr for RiskLevel {
    type Err = RiskLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire_str(s)
    }
}

/// Error when parsing an invalid risk level string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskLevelParseError(pub String);

impl fmt::Display for RiskLevelParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid risk level: {}", self.0)
    }
}

impl std::error::Error for RiskLevelParseError {}

// ============================================================================
// THREAT KIND
// ============================================================================

/// Recognized threat tags.
///
/// Tags returned by the model that do not map onto one of these are dropped
/// during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatKind {
    Phishing,
    FakeShop,
    TechSupportScam,
    InvestmentFraud,
    CryptoScam,
    Impersonation,
    FakeGiveaway,
    RomanceScam,
    Malware,
    DataHarvesting,
    UrgencyManipulation,
    SuspiciousPayment,
}

impl ThreatKind {
    /// Every recognized tag.
    pub const ALL: [ThreatKind; 12] = [
        ThreatKind::Phishing,
        ThreatKind::FakeShop,
        ThreatKind::TechSupportScam,
        ThreatKind::InvestmentFraud,
        ThreatKind::CryptoScam,
        ThreatKind::Impersonation,
        ThreatKind::FakeGiveaway,
        ThreatKind::RomanceScam,
        ThreatKind::Malware,
        ThreatKind::DataHarvesting,
        ThreatKind::UrgencyManipulation,
        ThreatKind::SuspiciousPayment,
    ];

    pub fn as_wire_str(&self) -> &'static str {
        match self {
            ThreatKind::Phishing => "PHISHING",
            ThreatKind::FakeShop => "FAKE_SHOP",
            ThreatKind::TechSupportScam => "TECH_SUPPORT_SCAM",
            ThreatKind::InvestmentFraud => "INVESTMENT_FRAUD",
            ThreatKind::CryptoScam => "CRYPTO_SCAM",
            ThreatKind::Impersonation => "IMPERSONATION",
            ThreatKind::FakeGiveaway => "FAKE_GIVEAWAY",
            ThreatKind::RomanceScam => "ROMANCE_SCAM",
            ThreatKind::Malware => "MALWARE",
            ThreatKind::DataHarvesting => "DATA_HARVESTING",
            ThreatKind::UrgencyManipulation => "URGENCY_MANIPULATION",
            ThreatKind::SuspiciousPayment => "SUSPICIOUS_PAYMENT",
        }
    }

    /// Parse a tag, tolerating case, spaces, dashes and underscores.
    ///
    /// Returns `None` for unrecognized tags; callers drop those silently.
    pub fn from_tag(s: &str) -> Option<Self> {
        let normalized = normalize_token(s);
        match normalized.as_str() {
            "phishing" => Some(ThreatKind::Phishing),
            "fakeshop" => Some(ThreatKind::FakeShop),
            "techsupportscam" => Some(ThreatKind::TechSupportScam),
            "investmentfraud" => Some(ThreatKind::InvestmentFraud),
            "cryptoscam" => Some(ThreatKind::CryptoScam),
            "impersonation" => Some(ThreatKind::Impersonation),
            "fakegiveaway" => Some(ThreatKind::FakeGiveaway),
            "romancescam" => Some(ThreatKind::RomanceScam),
            "malware" => Some(ThreatKind::Malware),
            "dataharvesting" => Some(ThreatKind::DataHarvesting),
            "urgencymanipulation" => Some(ThreatKind::UrgencyManipulation),
            "suspiciouspayment" => Some(ThreatKind::SuspiciousPayment),
            _ => None,
        }
    }
}

impl fmt::Display for ThreatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// ============================================================================
// FEEDBACK VERDICT
// ============================================================================

/// User judgement on a delivered verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackVerdict {
    /// Page was flagged but is legitimate
    FalsePositive,
    /// Page was passed but is a scam
    FalseNegative,
    Correct,
}
