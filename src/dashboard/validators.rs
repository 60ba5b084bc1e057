use super::models::{UpdateApiKeyRequest, MAX_API_KEY_LENGTH};
use crate::common::{ValidationResult, Validator};

pub struct ApiKeyValidator;

impl Validator<UpdateApiKeyRequest> for ApiKeyValidator {
    fn validate(&self, data: &UpdateApiKeyRequest) -> ValidationResult {
        let mut result = ValidationResult::new();
        let key = data.api_key.trim();

        if key.is_empty() {
            result.add_error("api_key", "API key is required");
            return result;
        }

        if key.chars().count() > MAX_API_KEY_LENGTH {
            result.add_error("api_key", "API key must not exceed 256 characters");
        }

        if key.chars().any(char::is_whitespace) {
            result.add_error("api_key", "API key must not contain whitespace");
        }

        result
    }
}
