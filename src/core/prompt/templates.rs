//! 固定提示词模板片段

pub const FEATURE_PREAMBLE: &str =
    "Analyze this cow's health based on the following behavioral metrics:";

pub const EYE_VISIBLE: &str = "Visible";
pub const EYE_NOT_VISIBLE: &str = "Not clearly visible";
pub const MOUTH_OPEN: &str = "Possibly open";
pub const MOUTH_CLOSED: &str = "Possibly closed";

pub const ANALYSIS_ASPECTS: &[(&str, &str)] = &[
    (
        "Behavioral Patterns",
        "Resting, grazing, or unusual movements",
    ),
    ("Posture Analysis", "Normal stance or signs of discomfort"),
    ("Feeding Habits", "Signs of normal or abnormal eating"),
    ("Facial Expressions", "Indicators of stress or pain"),
    ("Coat Condition", "Health indicators from fur appearance"),
];

pub const FEATURE_CLOSING: &str = "Provide a detailed health assessment with recommendations.";

pub const VETERINARY_ROLE: &str = "You are a veterinary AI assistant with expertise in cattle health. \
Based on the following description of a cattle's facial expressions, predict potential diseases.";

pub const EXPRESSION_CUES: &[&str] = &[
    "Eye appearance (e.g., droopy, sunken, squinted, or watery eyes indicating lethargy, pain, or stress).",
    "Ear position (e.g., drooping, pinned back, or asymmetrical ears suggesting discomfort or illness).",
    "Mouth and jaw (e.g., tensed mouth, open mouth, or excessive salivation indicating pain or distress).",
    "Head position (e.g., lowered head, tilted head, or rigid posture signaling weakness or neurological issues).",
];

pub const CANDIDATE_DISEASES: &[&str] = &[
    "bovine respiratory disease (BRD)",
    "mastitis",
    "ketosis",
    "lameness",
    "foot-and-mouth disease",
];

pub const PREDICTION_FIELDS: &[&str] = &[
    "The predicted disease name.",
    "A list of specific expression cues from the description.",
    "A confidence level (high, medium, low).",
    "An explanation of how the expressions correlate with the disease, referencing veterinary knowledge.",
];

pub const HEALTHY_GUIDANCE: &str = "If the expressions appear normal or no clear disease-related cues \
are described, state that the cattle appears healthy and recommend further clinical examination. \
If the description is vague, note the limitation and suggest a more detailed input.";

/// 输出格式约定，保证返回文本可被下游解析
pub const RESPONSE_FORMAT: &str = "Format your response as follows:
- **Predicted Disease**: [Disease Name]
  - **Expression Cues**: [List of observed cues]
  - **Confidence**: [High/Medium/Low]
  - **Explanation**: [How the expressions suggest this disease]
- **Overall Assessment**: [Summary of findings]
- **Recommendations**: [Next steps]
- **Limitations**: [Any issues with the description]";
