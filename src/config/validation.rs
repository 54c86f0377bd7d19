//! Config validation: unknown-key detection with Levenshtein suggestions
//! and physical range checks.
//!
//! The raw TOML is first walked as a `toml::Value` tree and compared
//! against the known field names, producing "did you mean?" warnings. Serde
//! deserialization runs afterwards. Warnings never break a config.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for FreefallConfig.
///
/// Any new field added to FreefallConfig must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [sensor]
        "sensor",
        "sensor.sample_rate_hz",
        "sensor.max_abs_g",
        // [pipeline]
        "pipeline",
        "pipeline.window_size",
        "pipeline.threshold",
        "pipeline.boundary",
        "pipeline.output_mode",
        "pipeline.mode",
        // [storage]
        "storage",
        "storage.backend",
        "storage.path",
        "storage.capacity_entries",
        // [link]
        "link",
        "link.device_address",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// A table `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|&(_, dist)| dist <= 3)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Parse errors are left for serde to report.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate physical ranges on a parsed FreefallConfig.
///
/// Returns one message per impossible value.
pub fn validate_ranges(config: &super::FreefallConfig) -> Vec<String> {
    let mut errors = Vec::new();

    let rate = config.sensor.sample_rate_hz;
    if !rate.is_finite() || rate <= 0.0 {
        errors.push(format!(
            "sensor.sample_rate_hz = {rate} must be a finite number > 0"
        ));
    }

    let full_scale = config.sensor.max_abs_g;
    if !full_scale.is_finite() || full_scale <= 0.0 {
        errors.push(format!(
            "sensor.max_abs_g = {full_scale} must be a finite number > 0"
        ));
    }

    let threshold = config.pipeline.threshold;
    if !threshold.is_finite() {
        errors.push(format!("pipeline.threshold = {threshold} must be finite"));
    } else if threshold < 0.0 {
        // Magnitudes are never negative, so the free-fall branch could never fire.
        errors.push(format!(
            "pipeline.threshold = {threshold:.3} cannot be negative"
        ));
    } else if full_scale.is_finite() && threshold > full_scale {
        errors.push(format!(
            "pipeline.threshold = {threshold:.3} exceeds sensor full scale ({full_scale:.1} g)"
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FreefallConfig;

    #[test]
    fn test_typo_gets_suggestion() {
        let warnings = validate_unknown_keys(
            r#"
[pipeline]
windw_size = 8
"#,
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "pipeline.windw_size");
        assert_eq!(warnings[0].suggestion.as_deref(), Some("pipeline.window_size"));
    }

    #[test]
    fn test_valid_config_has_no_warnings() {
        let warnings = validate_unknown_keys(
            r#"
[sensor]
sample_rate_hz = 100.0

[pipeline]
window_size = 8
threshold = 0.4
boundary = "exclusive"

[storage]
backend = "memory"
"#,
        );
        assert!(warnings.is_empty(), "unexpected: {warnings:?}");
    }

    #[test]
    fn test_unrelated_key_has_no_suggestion() {
        let warnings = validate_unknown_keys("completely_unrelated_section = 1\n");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].suggestion.is_none());
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let mut config = FreefallConfig::default();
        config.pipeline.threshold = -0.1;
        let errors = validate_ranges(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("pipeline.threshold"));
    }

    #[test]
    fn test_nan_rate_rejected() {
        let mut config = FreefallConfig::default();
        config.sensor.sample_rate_hz = f32::NAN;
        assert_eq!(validate_ranges(&config).len(), 1);
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("mode", "mode"), 0);
        assert_eq!(levenshtein("mdoe", "mode"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
    }
}
