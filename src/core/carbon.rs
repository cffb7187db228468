//! Carbon scenario analysis returned by the generative-AI service.
//!
//! The payload is untrusted: it is parsed with `serde_json` and then checked before any
//! figure from it is used. The giver picks one scenario (usually the recommended one),
//! and the difference between the landfill baseline and that scenario becomes the
//! listing's `carbon_saved`.

use crate::core::impact::round2;
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// Minimum landfill emission assumed per serving, in kg CO2e.
pub const BASELINE_KG_PER_SERVING: f64 = 0.8;

/// Icon the AI attaches to each scenario; `Trash` marks the landfill baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioIcon {
    /// Thrown away
    Trash,
    /// Frozen for later
    Snowflake,
    /// Shared, picked up by bike
    Bike,
    /// Shared, picked up by car
    Car,
    /// Shared, picked up on foot
    Walk,
}

/// One disposal or delivery option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarbonScenario {
    /// Short action name
    pub action: String,
    /// Estimated kg CO2e
    pub co2e: f64,
    /// Explanation shown to the user
    pub description: String,
    /// Display icon
    pub icon: ScenarioIcon,
    /// Exactly one scenario per analysis is recommended
    pub is_recommended: bool,
}

/// The full analysis for one (dish, quantity, location).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarbonAnalysis {
    /// Dish as understood by the model
    pub dish_name: String,
    /// Servings
    pub quantity: u32,
    /// Mutually exclusive options
    pub scenarios: Vec<CarbonScenario>,
    /// Recommendation text
    #[serde(default)]
    pub recommendation: String,
    /// Summary text
    #[serde(default)]
    pub impact_summary: String,
}

fn malformed(message: impl Into<String>) -> Error {
    Error::MalformedAiResponse {
        message: message.into(),
    }
}

/// Parses and validates a carbon analysis payload.
///
/// # Errors
/// [`Error::MalformedAiResponse`] when the text is empty or not the expected JSON, or
/// when [`CarbonAnalysis::validate`] rejects it.
pub fn parse_carbon_analysis(raw: &str) -> Result<CarbonAnalysis> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(malformed("empty response"));
    }
    let analysis: CarbonAnalysis =
        serde_json::from_str(trimmed).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
    analysis.validate()?;
    Ok(analysis)
}

impl CarbonAnalysis {
    /// Checks the invariants the rest of the crate relies on.
    pub fn validate(&self) -> Result<()> {
        if self.dish_name.trim().is_empty() {
            return Err(malformed("missing dish name"));
        }
        if self.quantity == 0 {
            return Err(malformed("quantity must be at least 1"));
        }
        if self.scenarios.is_empty() {
            return Err(malformed("no scenarios"));
        }
        if let Some(bad) = self
            .scenarios
            .iter()
            .find(|s| !s.co2e.is_finite() || s.co2e < 0.0)
        {
            return Err(malformed(format!(
                "scenario {:?} has invalid co2e {}",
                bad.action, bad.co2e
            )));
        }
        let recommended = self.scenarios.iter().filter(|s| s.is_recommended).count();
        if recommended != 1 {
            return Err(malformed(format!(
                "expected exactly one recommended scenario, found {recommended}"
            )));
        }
        Ok(())
    }

    /// The recommended scenario. Only `None` on an unvalidated analysis.
    #[must_use]
    pub fn recommended(&self) -> Option<&CarbonScenario> {
        self.scenarios.iter().find(|s| s.is_recommended)
    }

    /// Emissions if the food is thrown away: the landfill scenario, but never less than
    /// [`BASELINE_KG_PER_SERVING`] per serving.
    #[must_use]
    pub fn baseline_emission(&self) -> f64 {
        let landfill = self
            .scenarios
            .iter()
            .find(|s| s.icon == ScenarioIcon::Trash)
            .map_or(0.0, |s| s.co2e);
        landfill.max(BASELINE_KG_PER_SERVING * f64::from(self.quantity))
    }

    /// kg CO2e saved by choosing `selected` over the baseline, floored at zero and
    /// rounded to two decimals.
    #[must_use]
    pub fn carbon_saved(&self, selected: &CarbonScenario) -> f64 {
        round2((self.baseline_emission() - selected.co2e).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    const SAMPLE: &str = r#"{
        "dishName": "Vegetable Lasagna",
        "quantity": 4,
        "scenarios": [
            {"action": "Throw away", "co2e": 3.5, "description": "Landfill methane", "icon": "trash", "isRecommended": false},
            {"action": "Freeze", "co2e": 0.4, "description": "Eat later", "icon": "snowflake", "isRecommended": false},
            {"action": "Share (bike pickup)", "co2e": 0.1, "description": "Neighbour collects", "icon": "bike", "isRecommended": true}
        ],
        "recommendation": "Share it",
        "impactSummary": "Sharing avoids most emissions"
    }"#;

    #[test]
    fn test_parse_valid_analysis() {
        let analysis = parse_carbon_analysis(SAMPLE).unwrap();
        assert_eq!(analysis.quantity, 4);
        assert_eq!(analysis.scenarios.len(), 3);
        assert_eq!(analysis.recommended().unwrap().icon, ScenarioIcon::Bike);
    }

    #[test]
    fn test_carbon_saved_against_landfill() {
        let analysis = parse_carbon_analysis(SAMPLE).unwrap();
        // max(3.5, 0.8 * 4) = 3.5
        assert_eq!(analysis.baseline_emission(), 3.5);
        let pick = analysis.recommended().unwrap();
        assert_eq!(analysis.carbon_saved(pick), 3.4);
    }

    #[test]
    fn test_baseline_floor_without_landfill_scenario() {
        let mut analysis = parse_carbon_analysis(SAMPLE).unwrap();
        analysis.scenarios.retain(|s| s.icon != ScenarioIcon::Trash);
        assert_eq!(analysis.baseline_emission(), 3.2);

        let worse = CarbonScenario {
            action: "Drive across town".to_string(),
            co2e: 5.0,
            description: String::new(),
            icon: ScenarioIcon::Car,
            is_recommended: false,
        };
        assert_eq!(analysis.carbon_saved(&worse), 0.0);
    }

    #[test]
    fn test_rejects_empty_and_invalid_json() {
        for raw in ["", "   ", "not json", "{\"dishName\": \"x\"}"] {
            assert!(matches!(
                parse_carbon_analysis(raw),
                Err(Error::MalformedAiResponse { .. })
            ));
        }
    }

    #[test]
    fn test_rejects_bad_recommendation_count() {
        let none = SAMPLE.replace("\"isRecommended\": true", "\"isRecommended\": false");
        assert!(parse_carbon_analysis(&none).is_err());

        let two = SAMPLE.replace(
            "\"icon\": \"snowflake\", \"isRecommended\": false",
            "\"icon\": \"snowflake\", \"isRecommended\": true",
        );
        assert!(parse_carbon_analysis(&two).is_err());
    }

    #[test]
    fn test_rejects_negative_emission_and_zero_quantity() {
        let negative = SAMPLE.replace("\"co2e\": 0.4", "\"co2e\": -0.4");
        assert!(parse_carbon_analysis(&negative).is_err());

        let zero = SAMPLE.replace("\"quantity\": 4", "\"quantity\": 0");
        assert!(parse_carbon_analysis(&zero).is_err());
    }
}
