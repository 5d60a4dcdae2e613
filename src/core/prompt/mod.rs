//! 提示词构建 - 纯函数，相同输入得到逐字节相同的输出

pub mod templates;

use std::fmt;
use std::fmt::Write as _;

use crate::core::features::FeatureRecord;

use templates::*;

/// Fully rendered instruction for the inference service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PromptInput<'a> {
    Features(&'a FeatureRecord),
    /// Already-normalized expression description.
    Description(&'a str),
}

pub fn build_prompt(input: PromptInput<'_>) -> Prompt {
    match input {
        PromptInput::Features(record) => build_feature_prompt(record),
        PromptInput::Description(text) => build_description_prompt(text),
    }
}

fn build_feature_prompt(record: &FeatureRecord) -> Prompt {
    let eye_state = if record.eye_visible {
        EYE_VISIBLE
    } else {
        EYE_NOT_VISIBLE
    };
    let mouth_state = if record.mouth_open_likely {
        MOUTH_OPEN
    } else {
        MOUTH_CLOSED
    };

    let mut text = String::new();
    // write! 到 String 不会失败
    let _ = writeln!(text, "{}\n", FEATURE_PREAMBLE);
    let _ = writeln!(text, "Posture Angle: {} degrees", record.posture_angle);
    let _ = writeln!(text, "Eye Visibility: {}", eye_state);
    let _ = writeln!(text, "Mouth Status: {}", mouth_state);
    let _ = writeln!(text, "Edge Intensity: {:.2}", record.edge_intensity);
    let _ = writeln!(text, "Color Dominance: {:.2} (HSV Hue)\n", record.color_dominance);

    text.push_str("Consider these aspects:\n");
    for (i, (aspect, detail)) in ANALYSIS_ASPECTS.iter().enumerate() {
        let _ = writeln!(text, "{}. {}: {}", i + 1, aspect, detail);
    }
    text.push('\n');
    text.push_str(FEATURE_CLOSING);

    Prompt(text)
}

fn build_description_prompt(description: &str) -> Prompt {
    let mut text = String::new();
    let _ = writeln!(
        text,
        "{} The description is: \"{}\"\n",
        VETERINARY_ROLE, description
    );

    text.push_str("Focus on facial expression cues, such as:\n");
    for cue in EXPRESSION_CUES {
        let _ = writeln!(text, "- {}", cue);
    }
    text.push('\n');

    let _ = writeln!(
        text,
        "Predict possible diseases, such as {}, or other relevant conditions. \
         For each prediction, provide:",
        CANDIDATE_DISEASES.join(", ")
    );
    for field in PREDICTION_FIELDS {
        let _ = writeln!(text, "- {}", field);
    }
    text.push('\n');

    text.push_str(HEALTHY_GUIDANCE);
    text.push_str("\n\n");
    text.push_str(RESPONSE_FORMAT);

    Prompt(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> FeatureRecord {
        FeatureRecord {
            posture_angle: -12.5,
            eye_visible: true,
            mouth_open_likely: false,
            edge_intensity: 17.456,
            color_dominance: 33.333,
        }
    }

    #[test]
    fn test_feature_prompt_lines() {
        let prompt = build_prompt(PromptInput::Features(&sample_record()));
        let text = prompt.as_str();

        assert!(text.starts_with(FEATURE_PREAMBLE));
        assert!(text.contains("Posture Angle: -12.5 degrees\n"));
        assert!(text.contains("Eye Visibility: Visible\n"));
        assert!(text.contains("Mouth Status: Possibly closed\n"));
        assert!(text.contains("Edge Intensity: 17.46\n"));
        assert!(text.contains("Color Dominance: 33.33 (HSV Hue)\n"));
        assert!(text.contains("1. Behavioral Patterns: Resting, grazing, or unusual movements\n"));
        assert!(text.contains("5. Coat Condition: Health indicators from fur appearance\n"));
        assert!(text.ends_with(FEATURE_CLOSING));
    }

    #[test]
    fn test_zero_record_renders_plain_zero_angle() {
        let record = FeatureRecord {
            posture_angle: 0.0,
            eye_visible: false,
            mouth_open_likely: true,
            edge_intensity: 0.0,
            color_dominance: 0.0,
        };
        let text = build_prompt(PromptInput::Features(&record)).into_string();

        assert!(text.contains("Posture Angle: 0 degrees"));
        assert!(text.contains("Eye Visibility: Not clearly visible"));
        assert!(text.contains("Mouth Status: Possibly open"));
        assert!(text.contains("Edge Intensity: 0.00"));
        assert!(text.contains("Color Dominance: 0.00 (HSV Hue)"));
    }

    #[test]
    fn test_prompt_is_pure() {
        let record = sample_record();
        let first = build_prompt(PromptInput::Features(&record));
        let second = build_prompt(PromptInput::Features(&record));
        assert_eq!(first.as_str().as_bytes(), second.as_str().as_bytes());

        let a = build_prompt(PromptInput::Description("droopy eyes"));
        let b = build_prompt(PromptInput::Description("droopy eyes"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_description_embedded_verbatim() {
        let text = build_prompt(PromptInput::Description("droopy eyes, lowered head")).into_string();

        assert!(text.contains("The description is: \"droopy eyes, lowered head\""));
        assert!(text.contains("- Ear position"));
        assert!(text.contains("mastitis, ketosis, lameness, foot-and-mouth disease"));
        assert!(text.contains("A confidence level (high, medium, low)."));
        assert!(text.contains("- **Limitations**: [Any issues with the description]"));
    }

    #[test]
    fn test_description_prompt_lists_every_format_field() {
        let text = build_prompt(PromptInput::Description("watery eyes")).into_string();
        for field in [
            "**Predicted Disease**",
            "**Expression Cues**",
            "**Confidence**",
            "**Explanation**",
            "**Overall Assessment**",
            "**Recommendations**",
            "**Limitations**",
        ] {
            assert!(text.contains(field), "missing {}", field);
        }
    }
}
