use super::ApiError;

/// Checks a history window against the configured maximum.
pub fn validate_limit(limit: usize, max: usize) -> Result<usize, ApiError> {
    const MIN_LIMIT: usize = 1;

    if !(MIN_LIMIT..=max).contains(&limit) {
        return Err(ApiError::validation(format!(
            "Invalid limit: {}. Limit must be between {} and {}",
            limit, MIN_LIMIT, max
        )));
    }
    Ok(limit)
}

pub fn validate_voice_settings_json(raw: &str) -> Result<crate::models::VoiceSettings, ApiError> {
    if raw.trim().is_empty() {
        return Ok(crate::models::VoiceSettings::default());
    }
    serde_json::from_str(raw)
        .map_err(|e| ApiError::validation(format!("Invalid voice_settings: {e}")))
}
