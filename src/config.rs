use serde_json::{json, Map, Value};

use crate::calc::OverallPolicy;

/// Runtime policies, process-local and patched over IPC. Thresholds are
/// expressed on the canonical percent scale.
#[derive(Debug, Clone)]
pub struct Policies {
    pub overall_average_policy: OverallPolicy,
    /// Parent alert fires when the unrounded overall average falls below
    /// this value (strict `<`).
    pub alert_average_below: f64,
    /// Parent alert fires when the latest behavior note is Poor.
    pub alert_poor_latest_note: bool,
    /// Default cap for recent-announcement lists.
    pub announcement_limit: usize,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            overall_average_policy: OverallPolicy::EqualSubjects,
            alert_average_below: 50.0,
            alert_poor_latest_note: true,
            announcement_limit: 20,
        }
    }
}

impl Policies {
    pub fn to_json(&self) -> Value {
        json!({
            "overallAveragePolicy": self.overall_average_policy.as_str(),
            "alertAverageBelow": self.alert_average_below,
            "alertPoorLatestNote": self.alert_poor_latest_note,
            "announcementLimit": self.announcement_limit,
        })
    }

    /// Typed patch validation: unknown fields and out-of-range values are
    /// rejected whole, leaving the current policies untouched.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> Result<(), String> {
        let mut next = self.clone();
        for (k, v) in patch {
            match k.as_str() {
                "overallAveragePolicy" => {
                    let s = v
                        .as_str()
                        .ok_or_else(|| "overallAveragePolicy must be a string".to_string())?;
                    next.overall_average_policy = OverallPolicy::parse(s).ok_or_else(|| {
                        "overallAveragePolicy must be one of: equalSubjects, creditWeighted"
                            .to_string()
                    })?;
                }
                "alertAverageBelow" => {
                    let n = v
                        .as_f64()
                        .ok_or_else(|| "alertAverageBelow must be a number".to_string())?;
                    if !(0.0..=100.0).contains(&n) {
                        return Err("alertAverageBelow must be in 0..=100".to_string());
                    }
                    next.alert_average_below = n;
                }
                "alertPoorLatestNote" => {
                    next.alert_poor_latest_note = v
                        .as_bool()
                        .ok_or_else(|| "alertPoorLatestNote must be boolean".to_string())?;
                }
                "announcementLimit" => {
                    let n = v
                        .as_i64()
                        .ok_or_else(|| "announcementLimit must be integer".to_string())?;
                    if !(1..=100).contains(&n) {
                        return Err("announcementLimit must be in 1..=100".to_string());
                    }
                    next.announcement_limit = n as usize;
                }
                _ => return Err(format!("unknown config field: {}", k)),
            }
        }
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(v: Value) -> Map<String, Value> {
        v.as_object().expect("patch object").clone()
    }

    #[test]
    fn defaults_match_the_documented_policy() {
        let p = Policies::default();
        assert_eq!(p.overall_average_policy, OverallPolicy::EqualSubjects);
        assert_eq!(p.alert_average_below, 50.0);
        assert!(p.alert_poor_latest_note);
        assert_eq!(p.announcement_limit, 20);
    }

    #[test]
    fn patch_applies_known_fields() {
        let mut p = Policies::default();
        p.apply_patch(&patch(json!({
            "overallAveragePolicy": "creditWeighted",
            "alertAverageBelow": 40.0,
            "alertPoorLatestNote": false,
            "announcementLimit": 5
        })))
        .expect("valid patch");
        assert_eq!(p.overall_average_policy, OverallPolicy::CreditWeighted);
        assert_eq!(p.alert_average_below, 40.0);
        assert!(!p.alert_poor_latest_note);
        assert_eq!(p.announcement_limit, 5);
    }

    #[test]
    fn unknown_field_rejects_the_whole_patch() {
        let mut p = Policies::default();
        let err = p
            .apply_patch(&patch(json!({
                "alertAverageBelow": 10.0,
                "mystery": true
            })))
            .expect_err("unknown field");
        assert!(err.contains("unknown config field"));
        // Nothing from the failed patch leaked in.
        assert_eq!(p.alert_average_below, 50.0);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut p = Policies::default();
        assert!(p
            .apply_patch(&patch(json!({ "alertAverageBelow": 101.0 })))
            .is_err());
        assert!(p
            .apply_patch(&patch(json!({ "announcementLimit": 0 })))
            .is_err());
        assert!(p
            .apply_patch(&patch(json!({ "overallAveragePolicy": "perClass" })))
            .is_err());
    }
}
