//! Model-backed helpers used by the resolver's last tiers.
//!
//! [`VisionDetector`] turns a screenshot plus prompt into element coordinates;
//! [`TermNormalizer`] maps a human phrase onto selector-friendly alternatives.
//! Both have OpenAI-compatible implementations over a shared [`OpenAiClient`].

pub mod errors;
pub mod normalize;
pub mod openai;
pub mod utils;
pub mod vision;

pub use errors::LlmError;
pub use normalize::{
    is_stop_word, normalize_or_fallback, post_process_terms, static_normalization, NormalizeRequest,
    OpenAiTermNormalizer, StaticNormalizer, TermNormalizer, MAX_NORMALIZED_TERMS, STOP_WORDS,
};
pub use openai::{OpenAiClient, OpenAiConfig, UsageStats};
pub use utils::extract_json_object;
pub use vision::{
    build_vision_prompt, enhanced_instruction, parse_vision_content, DetectedElement,
    OpenAiVisionDetector, VisionDetection, VisionDetector, VisionRequest,
};
