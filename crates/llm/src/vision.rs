//! Vision-model element detection.
//!
//! The model sees the current screenshot and a prompt describing the step; it answers
//! with a JSON document whose first `elements[]` entry is taken as the target.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use perceiver_visual::prepare_for_vision;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stepwright_core_types::{ActionType, BoundingBox, Point, UiContextHint};
use tracing::{debug, info};

use crate::errors::LlmError;
use crate::openai::{ChatMessage, ContentPart, ImageUrl, OpenAiClient};
use crate::utils::extract_json_object;

pub const VISION_MAX_TOKENS: u32 = 1500;
pub const VISION_TEMPERATURE: f32 = 0.1;
const DEFAULT_ELEMENT_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub screenshot: PathBuf,
    pub instruction: String,
    pub page_url: Option<String>,
    pub page_title: Option<String>,
    pub previous_action: Option<String>,
    pub ui_context: Option<UiContextHint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedElement {
    pub element_type: String,
    pub description: String,
    pub bounding_box: BoundingBox,
    pub center: Point,
    pub confidence: f64,
    pub visible_text: Option<String>,
    pub interaction_type: String,
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisionDetection {
    pub found: bool,
    pub primary: Option<DetectedElement>,
    pub alternatives: Vec<DetectedElement>,
    pub page_analysis: Value,
    pub overall_confidence: Option<f64>,
    pub recommendation: String,
    pub error_message: Option<String>,
}

impl VisionDetection {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            found: false,
            primary: None,
            alternatives: Vec::new(),
            page_analysis: Value::Null,
            overall_confidence: None,
            recommendation: String::new(),
            error_message: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait VisionDetector: Send + Sync {
    /// A single detection attempt; retry policy belongs to the caller.
    async fn detect(&self, request: &VisionRequest) -> Result<VisionDetection, LlmError>;
}

/// Rewrites an instruction so the model looks for controls rather than decoration.
pub fn enhanced_instruction(action: ActionType, target: &str) -> String {
    let verb = match action {
        ActionType::Click => "clicked",
        ActionType::Type => "typed into",
        ActionType::Upload => "used to upload",
        ActionType::Verify => "verified",
        ActionType::Navigate => "navigated to",
        ActionType::Wait => "waited for",
    };
    format!(
        "Find the interactive {} element that can be {}. Look for input fields, buttons, or clickable elements, NOT decorative divs or styling elements.",
        target, verb
    )
}

pub fn build_vision_prompt(request: &VisionRequest) -> String {
    let mut prompt = String::new();
    let _ = write!(
        prompt,
        "Analyze this webpage screenshot to help execute the instruction: \"{}\"\n\n\
         Page context:\n- URL: {}\n- Title: {}\n- Previous action: {}\n",
        request.instruction,
        request.page_url.as_deref().unwrap_or("Unknown"),
        request.page_title.as_deref().unwrap_or("Unknown"),
        request.previous_action.as_deref().unwrap_or("None"),
    );

    if let Some(ctx) = &request.ui_context {
        let kind = &ctx.ui_context_type;
        let _ = write!(
            prompt,
            "\nUI context:\n- A {kind} was opened in step {step}\n- It was opened from: {target}\n\
             - Scope requirement: {scope}\n\
             Search strategy: first locate that {kind} region, then look only inside it for the target. \
             Do not pick similar elements outside the {kind}. If several {kind}s are visible, use the one \
             opened in step {step}.\n",
            kind = kind,
            step = ctx.opened_step,
            target = ctx.target,
            scope = ctx.search_scope,
        );
    }

    prompt.push_str(
        "\nTask: identify the UI element to interact with for this instruction. Give a precise \
         bounding box (x, y, width, height) in viewport pixels, the center point for clicking, \
         a confidence between 0.0 and 1.0, the element type and any visible text.\n",
    );

    prompt.push_str(
        r#"
Respond with JSON only, in this shape:
{
  "elements": [
    {
      "element_type": "button|input|link|dropdown|tab|text",
      "description": "short description",
      "bounding_box": {"x": 0, "y": 0, "width": 0, "height": 0},
      "center_coordinates": {"x": 0, "y": 0},
      "confidence": 0.95,
      "visible_text": "text on the element",
      "attributes": {"placeholder": "hint text"},
      "interaction_type": "click|type|hover|scroll"
    }
  ],
  "page_analysis": {
    "layout_type": "form|dashboard|list|search|landing",
    "notable_elements": [],
    "potential_issues": []
  },
  "overall_confidence": 0.85,
  "recommendation": "primary action to take"
}
"#,
    );

    if let Some(ctx) = &request.ui_context {
        let _ = writeln!(
            prompt,
            "The element must be inside the {} opened in step {}; if nothing suitable is there, set confidence to 0.0.",
            ctx.ui_context_type, ctx.opened_step
        );
    }
    prompt.push_str(
        "Coordinates drive automation, so be precise. When several elements match, pick the one a user would most likely mean. Return only valid JSON.",
    );
    prompt
}

#[derive(Debug, Default, Deserialize)]
struct RawResponse {
    #[serde(default)]
    elements: Vec<RawElement>,
    #[serde(default)]
    page_analysis: Value,
    #[serde(default)]
    overall_confidence: Option<f64>,
    #[serde(default)]
    recommendation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawElement {
    #[serde(default)]
    element_type: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    bounding_box: RawBox,
    #[serde(default)]
    center_coordinates: RawPoint,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    visible_text: Option<String>,
    #[serde(default)]
    interaction_type: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawBox {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
}

#[derive(Debug, Default, Deserialize)]
struct RawPoint {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

impl From<RawElement> for DetectedElement {
    fn from(raw: RawElement) -> Self {
        let bounding_box = BoundingBox::new(
            raw.bounding_box.x,
            raw.bounding_box.y,
            raw.bounding_box.width,
            raw.bounding_box.height,
        );
        let mut center = Point::new(raw.center_coordinates.x, raw.center_coordinates.y);
        if center.x == 0.0 && center.y == 0.0 && !bounding_box.is_empty() {
            center = bounding_box.center();
        }
        DetectedElement {
            element_type: raw.element_type.unwrap_or_else(|| "unknown".to_string()),
            description: raw.description.unwrap_or_default(),
            bounding_box,
            center,
            confidence: raw
                .confidence
                .unwrap_or(DEFAULT_ELEMENT_CONFIDENCE)
                .clamp(0.0, 1.0),
            visible_text: raw.visible_text.filter(|t| !t.is_empty()),
            interaction_type: raw.interaction_type.unwrap_or_else(|| "click".to_string()),
            attributes: raw.attributes,
        }
    }
}

/// Parses model output, tolerating prose around the JSON document.
pub fn parse_vision_content(content: &str) -> Result<VisionDetection, LlmError> {
    let raw: RawResponse = match serde_json::from_str(content.trim()) {
        Ok(raw) => raw,
        Err(_) => {
            let json = extract_json_object(content).ok_or_else(|| {
                LlmError::InvalidResponse(format!(
                    "no JSON object in vision response: {}",
                    content.chars().take(200).collect::<String>()
                ))
            })?;
            serde_json::from_str(&json)
                .map_err(|err| LlmError::InvalidResponse(format!("vision JSON: {err}")))?
        }
    };

    let mut elements = raw.elements.into_iter().map(DetectedElement::from);
    let Some(primary) = elements.next() else {
        return Ok(VisionDetection::not_found("No elements detected in screenshot"));
    };
    Ok(VisionDetection {
        found: true,
        primary: Some(primary),
        alternatives: elements.collect(),
        page_analysis: raw.page_analysis,
        overall_confidence: raw.overall_confidence,
        recommendation: raw.recommendation.unwrap_or_default(),
        error_message: None,
    })
}

pub struct OpenAiVisionDetector {
    client: Arc<OpenAiClient>,
}

impl OpenAiVisionDetector {
    pub fn new(client: Arc<OpenAiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VisionDetector for OpenAiVisionDetector {
    async fn detect(&self, request: &VisionRequest) -> Result<VisionDetection, LlmError> {
        let image = prepare_for_vision(&request.screenshot).await?;
        let prompt = build_vision_prompt(request);
        debug!(
            width = image.width,
            height = image.height,
            prompt_len = prompt.len(),
            "calling vision model"
        );
        let message = ChatMessage::user_parts(vec![
            ContentPart::Text { text: prompt },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image.data_url(),
                    detail: "high",
                },
            },
        ]);
        let model = self.client.config().model.clone();
        let content = self
            .client
            .complete(&model, vec![message], VISION_MAX_TOKENS, VISION_TEMPERATURE)
            .await?;
        let detection = parse_vision_content(&content)?;
        if let Some(primary) = &detection.primary {
            info!(
                element_type = %primary.element_type,
                x = primary.center.x,
                y = primary.center.y,
                confidence = primary.confidence,
                "vision detected element"
            );
        }
        Ok(detection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(ctx: Option<UiContextHint>) -> VisionRequest {
        VisionRequest {
            screenshot: PathBuf::from("/tmp/shot.png"),
            instruction: "click on Chatbot".into(),
            page_url: Some("https://app.example.com/home".into()),
            page_title: None,
            previous_action: Some("click".into()),
            ui_context: ctx,
        }
    }

    #[test]
    fn prose_wrapped_response_is_parsed() {
        let content = r#"Sure! Here is what I found:
{"elements": [{"element_type": "button", "bounding_box": {"x": 10, "y": 20, "width": 100, "height": 40},
 "center_coordinates": {"x": 60, "y": 40}, "visible_text": "Create"},
 {"element_type": "link", "confidence": 0.4}],
 "overall_confidence": 0.7, "recommendation": "click Create"}
Let me know if you need more."#;
        let detection = parse_vision_content(content).unwrap();
        assert!(detection.found);
        let primary = detection.primary.unwrap();
        assert_eq!(primary.center, Point::new(60.0, 40.0));
        assert_eq!(primary.confidence, 0.8);
        assert_eq!(primary.interaction_type, "click");
        assert_eq!(detection.alternatives.len(), 1);
        assert_eq!(detection.recommendation, "click Create");
    }

    #[test]
    fn empty_elements_mean_not_found() {
        let detection = parse_vision_content(r#"{"elements": []}"#).unwrap();
        assert!(!detection.found);
        assert!(detection.error_message.is_some());
    }

    #[test]
    fn missing_center_falls_back_to_box_center() {
        let detection = parse_vision_content(
            r#"{"elements":[{"bounding_box":{"x":0,"y":0,"width":50,"height":20}}]}"#,
        )
        .unwrap();
        assert_eq!(detection.primary.unwrap().center, Point::new(25.0, 10.0));
    }

    #[test]
    fn garbage_is_an_invalid_response() {
        let err = parse_vision_content("I could not see anything").unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn prompt_mentions_scope_only_with_context() {
        let plain = build_vision_prompt(&request(None));
        assert!(plain.contains("https://app.example.com/home"));
        assert!(plain.contains("Title: Unknown"));
        assert!(!plain.contains("Scope requirement"));

        let scoped = build_vision_prompt(&request(Some(UiContextHint {
            ui_context_type: "dropdown".into(),
            state: "opened".into(),
            opened_step: 2,
            target: "Create".into(),
            region_hint: "dropdown opened in step 2".into(),
            search_scope: "within the dropdown that was opened in step 2".into(),
            context_keywords: vec![],
        })));
        assert!(scoped.contains("Scope requirement: within the dropdown that was opened in step 2"));
        assert!(scoped.contains("inside the dropdown opened in step 2"));
    }

    #[test]
    fn enhanced_instruction_targets_controls() {
        let text = enhanced_instruction(ActionType::Type, "search box");
        assert!(text.starts_with("Find the interactive search box element that can be typed into."));
        assert!(text.contains("NOT decorative divs"));
    }
}
