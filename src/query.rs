use crate::analysis::AnalysisService;
use log::info;
use serde::{Deserialize, Serialize};

/// Flattened helper output. Every field is optional: a failed generation
/// leaves the text fields empty and fills `error` instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AiImageQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl AiImageQuery {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

pub async fn generate_ai_image_query(
    service: &AnalysisService,
    image_base64: Option<&str>,
) -> AiImageQuery {
    let Some(image) = image_base64.filter(|s| !s.is_empty()) else {
        return AiImageQuery::default();
    };
    match service.generate_image_analysis(image).await {
        Ok(analysis) => AiImageQuery {
            title: Some(analysis.title),
            caption: Some(analysis.caption),
            tags: Some(analysis.tags.join(", ")),
            semantic_description: Some(analysis.semantic_description),
            error: None,
            error_kind: None,
        },
        Err(e) => {
            info!("Error generating AI image text: {}", e);
            AiImageQuery {
                error: Some(e.to_string()),
                error_kind: Some(e.kind().code().to_string()),
                ..Default::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case_and_skips_empty() {
        let q = AiImageQuery {
            semantic_description: Some("d".into()),
            error_kind: Some("provider".into()),
            ..Default::default()
        };
        let v = serde_json::to_value(&q).unwrap();
        assert_eq!(v, serde_json::json!({"semanticDescription": "d", "errorKind": "provider"}));
    }
}
