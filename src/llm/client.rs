use crate::error::{LlmError, Result};
use crate::llm::config::ModelConfig;
use crate::llm::types::{ChatCompletionRequest, ChatCompletionResponse};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::debug;

pub(crate) fn assemble_req_header(model: &ModelConfig) -> Result<HeaderMap> {
    let mut header_map = HeaderMap::new();
    let bearer = HeaderValue::from_str(&format!("Bearer {}", model.apikey))
        .map_err(|e| LlmError::InvalidResponse(format!("Invalid Authorization header: {}", e)))?;
    header_map.insert(AUTHORIZATION, bearer);
    header_map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(header_map)
}

pub(crate) async fn post(
    client: &Client,
    request_body: &ChatCompletionRequest,
    header_map: HeaderMap,
    url: &str,
) -> Result<ChatCompletionResponse> {
    let response = client
        .post(url)
        .headers(header_map)
        .json(request_body)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(LlmError::ApiError {
            status,
            message: error_text,
        }
        .into());
    }

    let completion_response = response
        .json::<ChatCompletionResponse>()
        .await
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

    debug!(choices = completion_response.choices.len(), "LLM 响应");

    Ok(completion_response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_contains_bearer() {
        let model = ModelConfig {
            model: "gpt-4o".to_string(),
            baseurl: "http://localhost".to_string(),
            apikey: "sk-abc".to_string(),
        };
        let headers = assemble_req_header(&model).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer sk-abc");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }
}
