//! Audio validity gating
//!
//! Every clip is checked against the active backend's acceptance rules
//! before any network request is issued; this is the only guard against
//! spending recognition quota on malformed captures.

use std::fmt;

use crate::audio::AudioClip;

/// How a rule set treats the clip's sample rate
#[derive(Debug, Clone, Copy)]
pub enum RatePolicy {
    /// The rate must be exactly one of these values
    Exact(&'static [u32]),
    /// Any rate passes; the backend normalizes to the nearest listed value
    Nearest(&'static [u32]),
}

/// Backend-specific acceptance rules
#[derive(Debug, Clone, Copy)]
pub struct GateRules {
    /// Required channel count
    pub channels: u16,
    /// Required bytes per sample
    pub sample_width_bytes: u16,
    /// Sample-rate policy
    pub rate: RatePolicy,
    /// Minimum clip duration in seconds
    pub min_duration: f32,
    /// Maximum clip duration in seconds, if any
    pub max_duration: Option<f32>,
}

/// Baidu short-speech rules: mono 16-bit, 8k or 16k (nearest-match
/// normalization for anything else), 0.3s to 60s
pub const BAIDU_RULES: GateRules = GateRules {
    channels: 1,
    sample_width_bytes: 2,
    rate: RatePolicy::Nearest(&[8000, 16000]),
    min_duration: 0.3,
    max_duration: Some(60.0),
};

/// iFlytek transcription rules: mono 16-bit, exactly 16kHz, at least 0.3s
pub const IFLY_RULES: GateRules = GateRules {
    channels: 1,
    sample_width_bytes: 2,
    rate: RatePolicy::Exact(&[16000]),
    min_duration: 0.3,
    max_duration: None,
};

/// A single violated rule
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleViolation {
    /// Wrong channel count
    Channels { actual: u16 },
    /// Wrong sample width
    SampleWidth { actual: u16 },
    /// Rate outside the allowed set
    FrameRate { actual: u32 },
    /// Shorter than the minimum duration
    TooShort { actual: f32 },
    /// Longer than the maximum duration
    TooLong { actual: f32 },
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channels { actual } => write!(f, "need mono audio, got {actual} channels"),
            Self::SampleWidth { actual } => {
                write!(f, "need 16-bit samples, got {}-bit", actual * 8)
            }
            Self::FrameRate { actual } => write!(f, "unsupported sample rate {actual} Hz"),
            Self::TooShort { actual } => write!(f, "clip too short ({actual:.2}s)"),
            Self::TooLong { actual } => write!(f, "clip too long ({actual:.2}s)"),
        }
    }
}

/// All rules a clip violated, in check order
#[derive(Debug, Clone)]
pub struct GateRejection {
    violations: Vec<RuleViolation>,
}

impl GateRejection {
    /// The recorded violations
    #[must_use]
    pub fn violations(&self) -> &[RuleViolation] {
        &self.violations
    }
}

impl fmt::Display for GateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for violation in &self.violations {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{violation}")?;
            first = false;
        }
        Ok(())
    }
}

/// Validate a clip against a backend's rules
///
/// Checks every rule so the rejection lists all violations, and logs each
/// one. Succeeds only if the clip satisfies the whole rule set.
///
/// # Errors
///
/// Returns the full violation list if any rule fails
pub fn validate(clip: &AudioClip, rules: &GateRules) -> Result<(), GateRejection> {
    let mut violations = Vec::new();

    if clip.channels() != rules.channels {
        violations.push(RuleViolation::Channels {
            actual: clip.channels(),
        });
    }

    if clip.sample_width_bytes() != rules.sample_width_bytes {
        violations.push(RuleViolation::SampleWidth {
            actual: clip.sample_width_bytes(),
        });
    }

    if let RatePolicy::Exact(allowed) = rules.rate
        && !allowed.contains(&clip.frame_rate())
    {
        violations.push(RuleViolation::FrameRate {
            actual: clip.frame_rate(),
        });
    }

    let duration = clip.duration_secs();
    if duration < rules.min_duration {
        violations.push(RuleViolation::TooShort { actual: duration });
    } else if let Some(max) = rules.max_duration
        && duration > max
    {
        violations.push(RuleViolation::TooLong { actual: duration });
    }

    if violations.is_empty() {
        return Ok(());
    }

    for violation in &violations {
        tracing::warn!(%violation, "audio clip rejected");
    }

    Err(GateRejection { violations })
}
