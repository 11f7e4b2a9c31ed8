// src/prompt.rs

use serde::Serialize;
use serde_json::json;

use crate::enrichment::PropertyContext;
use crate::generation::{GenerationRequest, ListingCopy};
use crate::llm::ChatMessage;

const SYSTEM_PROMPT: &str = "You are a professional US real estate listing copywriter. \
Write concise, accurate copy with neutral tone. Avoid prohibited Fair Housing language \
(no references to protected classes, perceived safety, or ideal occupants). Do not invent facts. \
Respect provided length limits. Return only JSON in the specified schema.";

const COMPLIANCE_PROMPT: &str = "Review the provided texts for US Fair Housing risk \
(protected classes, perceived safety, preferred occupants) and unverifiable claims. \
Return only JSON with an array named flags of findings: type, original, suggest, note.";

/// A highly rated earlier generation, used as few-shot guidance.
#[derive(Debug, Clone)]
pub struct LearningExample {
    pub rating: i64,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
}

pub fn system_prompt(examples: &[LearningExample]) -> ChatMessage {
    let mut prompt = SYSTEM_PROMPT.to_string();
    if !examples.is_empty() {
        let patterns = examples
            .iter()
            .map(describe_example)
            .collect::<Vec<_>>()
            .join("\n");
        prompt.push_str(
            "\n\nLearning Context: Based on previous successful listings, these patterns received high ratings:\n",
        );
        prompt.push_str(&patterns);
        prompt.push_str("\nIncorporate successful patterns while maintaining originality.");
    }
    ChatMessage::system(prompt)
}

fn describe_example(example: &LearningExample) -> String {
    let voice = example
        .input
        .pointer("/style/voice")
        .and_then(|v| v.as_str())
        .unwrap_or("neutral");
    let property_type = example
        .input
        .pointer("/property/type")
        .and_then(|v| v.as_str())
        .unwrap_or("property");
    // output rows hold {primary, variations}; older rows may be bare copy
    let output = example.output.get("primary").unwrap_or(&example.output);
    let elements = output
        .get("bullets")
        .and_then(|b| b.as_array())
        .map(|bullets| {
            bullets
                .iter()
                .filter_map(|b| b.as_str())
                .take(2)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "effective messaging".to_string());
    format!(
        "Rating {}/5: Used {voice} voice for {property_type} - successful elements: {elements}",
        example.rating
    )
}

#[derive(Serialize)]
struct Facts<'a> {
    address: Option<&'a str>,
    #[serde(rename = "type")]
    property_type: Option<&'a str>,
    beds: Option<f64>,
    baths: Option<f64>,
    sqft: Option<f64>,
    lot_size: Option<f64>,
    year_built: Option<i64>,
    parking: Option<&'a str>,
    hoa: Option<&'a str>,
    school_district: Option<&'a str>,
}

pub fn user_prompt(request: &GenerationRequest, context: &PropertyContext) -> ChatMessage {
    let p = &request.property;
    let facts = Facts {
        address: p.address.as_deref(),
        property_type: p.property_type.as_deref(),
        beds: p.beds,
        baths: p.baths,
        sqft: p.sqft,
        lot_size: p.lot_size,
        year_built: p.year_built,
        parking: p.parking.as_deref(),
        hoa: p.hoa.as_deref(),
        school_district: p.school_district.as_deref(),
    };
    let style = &request.style;

    let content = json!({
        "task": "Write listing copy in JSON schema (description_mls, bullets, social_caption).",
        "facts": facts,
        "context": context,
        "highlights": request.highlights,
        "style": {
            "voice": style.voice.as_deref().unwrap_or("neutral"),
            "reading_level": style.reading_level.as_deref().unwrap_or("standard"),
            "length": style.length.as_deref().unwrap_or("mls"),
            "keywords": style.keywords,
        },
        "constraints": {
            "fair_housing_safe": request.compliance.fair_housing.unwrap_or(true),
            "avoid_puffery": true,
            "no_fabrication": true,
        },
        "output_schema": {
            "description_mls": "string: 800–1000 characters, line breaks allowed",
            "bullets": "array of 5–7 items, each ≤ 120 characters",
            "social_caption": "string ≤ 2200 characters; include 3–6 relevant hashtags; no emojis unless requested",
        },
    });
    ChatMessage::user(content.to_string())
}

pub fn variation_instruction(index: u32, total: u32) -> ChatMessage {
    ChatMessage::system(format!(
        "Generate variation {index} of {total}. Make each variation distinctly different in tone and emphasis while maintaining accuracy."
    ))
}

pub fn compliance_prompt(copy: &ListingCopy) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(COMPLIANCE_PROMPT),
        ChatMessage::user(json!({ "texts": copy }).to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learning_examples_extend_system_prompt() {
        let examples = vec![LearningExample {
            rating: 5,
            input: json!({"style": {"voice": "luxury"}, "property": {"type": "Condo"}}),
            output: json!({"primary": {"bullets": ["Rooftop deck", "Chef kitchen", "Gym"]}}),
        }];
        let msg = system_prompt(&examples);
        assert!(msg.content.contains("Learning Context"));
        assert!(msg
            .content
            .contains("Rating 5/5: Used luxury voice for Condo - successful elements: Rooftop deck, Chef kitchen"));
    }

    #[test]
    fn no_examples_keeps_base_prompt() {
        assert_eq!(system_prompt(&[]).content, SYSTEM_PROMPT);
    }
}
