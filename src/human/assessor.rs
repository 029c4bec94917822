//! Human-caused risk assessment via an OpenAI-compatible chat-completion
//! service. The model is asked for a JSON object embedded in free text;
//! any failure along the way yields the fixed fallback assessment, so
//! this component never fails outward.

use crate::config::RiskConfig;
use crate::human::error::AssessError;
use crate::rate_limit::RateLimiter;
use crate::types::area::AreaDescriptor;
use crate::types::assessment::{HumanRiskAssessment, RiskFactor};
use crate::types::coordinate::LatLon;
use log::warn;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

/// The JSON object the model is asked to embed in its reply.
#[derive(Deserialize)]
struct AssessmentWire {
    human_risk_score: f64,
    #[serde(default)]
    human_risk_factors: Vec<RiskFactor>,
    #[serde(default)]
    analysis: String,
}

pub struct HumanRiskAssessor {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    limiter: Arc<RateLimiter>,
}

impl HumanRiskAssessor {
    pub fn new(config: &RiskConfig, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http: Client::new(),
            base_url: config.llm_base_url.trim_end_matches('/').to_string(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            timeout: config.request_timeout,
            limiter,
        }
    }

    /// Assesses human-caused fire risk for an area. Infallible by
    /// contract: transport errors, bad statuses, and unparsable replies
    /// all collapse to [`HumanRiskAssessment::fallback`].
    pub async fn assess(&self, location: LatLon, area: &AreaDescriptor) -> HumanRiskAssessment {
        self.limiter.acquire().await;
        match self.request_assessment(location, area).await {
            Ok(assessment) => assessment,
            Err(e) => {
                warn!(
                    "human risk assessment failed for area '{}' ({e}); using fallback",
                    area.name
                );
                HumanRiskAssessment::fallback()
            }
        }
    }

    async fn request_assessment(
        &self,
        location: LatLon,
        area: &AreaDescriptor,
    ) -> Result<HumanRiskAssessment, AssessError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": build_prompt(location, area) }],
            "max_tokens": 1024,
            "temperature": 0.7,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AssessError::NetworkRequest(url.clone(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssessError::ServiceStatus { url, status });
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| AssessError::MalformedResponse(url, e))?;
        let content = completion
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or(AssessError::NoChoices)?;

        parse_assessment(content)
    }
}

/// Extracts the first-`{`-to-last-`}` span of the text, the region the
/// model was asked to place its JSON object in.
fn extract_json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end >= start).then(|| &text[start..=end])
}

/// Decodes the embedded assessment object, clamping the score into range.
fn parse_assessment(text: &str) -> Result<HumanRiskAssessment, AssessError> {
    let span = extract_json_span(text).ok_or(AssessError::NoJsonObject)?;
    let wire: AssessmentWire = serde_json::from_str(span).map_err(AssessError::Decode)?;
    Ok(HumanRiskAssessment {
        score: wire.human_risk_score.clamp(0.0, 100.0),
        factors: wire.human_risk_factors,
        narrative: wire.analysis,
    })
}

fn build_prompt(location: LatLon, area: &AreaDescriptor) -> String {
    format!(
        "You are assessing human-caused wildfire risk.\n\
         Coordinates: {:.4}, {:.4}\n\
         Area type: {}\n\
         Area size: {} ha\n\
         Area name: {}\n\
         \n\
         Consider settlement proximity, tourism activity, agriculture, road \
         network, industry, camp and picnic sites, power lines, and overall \
         human traffic. Give each relevant factor a 0-100 score and an \
         overall human-caused risk score.\n\
         \n\
         Reply with a single JSON object of this shape:\n\
         {{\n\
           \"human_risk_score\": <0-100>,\n\
           \"human_risk_factors\": [{{\"factor\": \"name\", \"score\": <0-100>, \"description\": \"short text\"}}],\n\
           \"analysis\": \"short overall narrative\"\n\
         }}",
        location.0, location.1, area.land_use, area.area_ha, area.name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::area::LandUse;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn assessor(base_url: String) -> HumanRiskAssessor {
        let config = crate::config::RiskConfig::builder()
            .weather_api_key("unused")
            .llm_api_key("test-key")
            .llm_base_url(base_url)
            .build();
        HumanRiskAssessor::new(
            &config,
            Arc::new(crate::rate_limit::RateLimiter::new(
                10,
                Duration::from_secs(1),
            )),
        )
    }

    /// One-shot completions endpoint answering every request with `body`.
    async fn spawn_completions(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 8192];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn assess_decodes_the_model_reply() {
        let body = r#"{"choices":[{"message":{"content":"Here you go: {\"human_risk_score\": 63, \"human_risk_factors\": [{\"factor\": \"Tourism activity\", \"score\": 70, \"description\": \"Beach season\"}], \"analysis\": \"Coastal traffic\"} Anything else?"}}]}"#;
        let assessor = assessor(spawn_completions(body).await);
        let area = AreaDescriptor::new("Olympos", LandUse::Forest, 420.0, None);

        let assessment = assessor.assess(LatLon(36.4, 30.4), &area).await;
        assert_eq!(assessment.score, 63.0);
        assert_eq!(assessment.factors.len(), 1);
        assert_eq!(assessment.narrative, "Coastal traffic");
    }

    #[tokio::test]
    async fn transport_failure_yields_the_fallback() {
        // Bind then drop, so the port refuses connections.
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let assessor = assessor(format!("http://{addr}"));
        let area = AreaDescriptor::new("Olympos", LandUse::Forest, 420.0, None);

        let assessment = assessor.assess(LatLon(36.4, 30.4), &area).await;
        assert_eq!(assessment, HumanRiskAssessment::fallback());
    }

    #[tokio::test]
    async fn unparsable_reply_yields_the_fallback() {
        let body = r#"{"choices":[{"message":{"content":"I cannot produce JSON today."}}]}"#;
        let assessor = assessor(spawn_completions(body).await);
        let area = AreaDescriptor::new("Olympos", LandUse::Forest, 420.0, None);

        let assessment = assessor.assess(LatLon(36.4, 30.4), &area).await;
        assert_eq!(assessment, HumanRiskAssessment::fallback());
    }

    #[test]
    fn extracts_object_surrounded_by_prose() {
        let text = "Sure, here is the assessment:\n{\"human_risk_score\": 62}\nHope this helps!";
        assert_eq!(extract_json_span(text), Some("{\"human_risk_score\": 62}"));
    }

    #[test]
    fn extraction_spans_nested_braces() {
        let text = "x {\"a\": {\"b\": 1}} y";
        assert_eq!(extract_json_span(text), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn braceless_text_yields_none() {
        assert_eq!(extract_json_span("no json here"), None);
        assert_eq!(extract_json_span(""), None);
    }

    #[test]
    fn reversed_braces_yield_none() {
        assert_eq!(extract_json_span("} backwards {"), None);
    }

    #[test]
    fn parses_full_assessment() {
        let text = r#"Assessment follows.
        {
            "human_risk_score": 72,
            "human_risk_factors": [
                {"factor": "Settlement proximity", "score": 80, "description": "Dense housing nearby"},
                {"factor": "Road network", "score": 64, "description": "Two highways cross the area"}
            ],
            "analysis": "Human activity dominates the risk picture here."
        }"#;
        let assessment = parse_assessment(text).expect("parses");
        assert_eq!(assessment.score, 72.0);
        assert_eq!(assessment.factors.len(), 2);
        assert_eq!(assessment.factors[0].factor, "Settlement proximity");
    }

    #[test]
    fn out_of_range_score_is_clamped() {
        let assessment = parse_assessment(r#"{"human_risk_score": 140}"#).expect("parses");
        assert_eq!(assessment.score, 100.0);
    }

    #[test]
    fn undecodable_span_is_an_error() {
        assert!(matches!(
            parse_assessment("{not json}"),
            Err(AssessError::Decode(_))
        ));
        assert!(matches!(
            parse_assessment("plain text"),
            Err(AssessError::NoJsonObject)
        ));
    }

    #[test]
    fn fallback_assessment_has_three_canned_factors() {
        let fallback = HumanRiskAssessment::fallback();
        assert_eq!(fallback.score, 50.0);
        assert_eq!(fallback.factors.len(), 3);
    }

    #[test]
    fn prompt_carries_area_context() {
        let area = AreaDescriptor::new("Olympos", LandUse::Forest, 420.0, None);
        let prompt = build_prompt(LatLon(36.4, 30.4), &area);
        assert!(prompt.contains("36.4000, 30.4000"));
        assert!(prompt.contains("forest"));
        assert!(prompt.contains("Olympos"));
    }
}
