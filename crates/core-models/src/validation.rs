//! Portable, synchronous validators used by the Call Pipeline's parameter
//! validation stage (§4.6 step 4) before any provider is invoked.

use crate::error::ModelError;

/// A phone number must be in loose E.164 form: a leading `+` followed by
/// 8-15 digits. We don't pull in a full libphonenumber binding for this —
/// the providers reject anything malformed anyway, so this is a cheap
/// pre-filter.
pub fn validate_phone_number(number: &str) -> Result<(), ModelError> {
    let digits = number.strip_prefix('+').unwrap_or(number);
    let valid = number.starts_with('+')
        && !digits.is_empty()
        && digits.len() >= 8
        && digits.len() <= 15
        && digits.chars().all(|c| c.is_ascii_digit());

    if valid {
        Ok(())
    } else {
        Err(ModelError::InvalidPhoneNumber(number.to_string()))
    }
}

/// The bot's media stream URL must be a `wss://` URL with a non-empty host.
/// Bot Warmup (§4.3) derives the HTTPS warmup URL from this same host.
pub fn validate_wss_url(url: &str) -> Result<(), ModelError> {
    let rest = url
        .strip_prefix("wss://")
        .ok_or_else(|| ModelError::InvalidWssUrl(url.to_string()))?;

    let host = rest.split(['/', '?']).next().unwrap_or("");
    if host.is_empty() {
        return Err(ModelError::InvalidWssUrl(url.to_string()));
    }

    Ok(())
}

/// Derive the HTTPS warmup URL on the same host as a `wss://` media stream
/// URL (§4.3). Returns `None` if the URL doesn't parse as a proper
/// `wss://host[:port][/path]` — warmup is then skipped, not failed.
pub fn derive_warmup_url(wss_url: &str) -> Option<String> {
    let rest = wss_url.strip_prefix("wss://")?;
    let host = rest.split(['/', '?']).next()?;
    if host.is_empty() {
        return None;
    }
    Some(format!("https://{}/warmup", host))
}

/// Plivo auth IDs are 20-character uppercase alphanumeric SIDs.
pub fn validate_plivo_sid(sid: &str) -> Result<(), ModelError> {
    let valid = sid.len() == 20 && sid.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(ModelError::InvalidCredentialFormat(format!(
            "plivo auth_id must be 20 uppercase alphanumeric characters, got {:?}",
            sid
        )))
    }
}

/// Twilio account SIDs are `AC` followed by 32 lowercase-hex characters.
pub fn validate_twilio_sid(sid: &str) -> Result<(), ModelError> {
    let valid = sid.len() == 34
        && sid.starts_with("AC")
        && sid[2..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase());
    if valid {
        Ok(())
    } else {
        Err(ModelError::InvalidCredentialFormat(format!(
            "twilio account_sid must be 'AC' followed by 32 lowercase-hex characters, got {:?}",
            sid
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_e164_numbers() {
        assert!(validate_phone_number("+15551234567").is_ok());
        assert!(validate_phone_number("+442071838750").is_ok());
    }

    #[test]
    fn rejects_missing_plus_or_bad_length() {
        assert!(validate_phone_number("15551234567").is_err());
        assert!(validate_phone_number("+1").is_err());
        assert!(validate_phone_number("+1555abc4567").is_err());
    }

    #[test]
    fn wss_url_requires_scheme_and_host() {
        assert!(validate_wss_url("wss://bot.example.com/media").is_ok());
        assert!(validate_wss_url("https://bot.example.com/media").is_err());
        assert!(validate_wss_url("wss://").is_err());
    }

    #[test]
    fn warmup_url_derived_on_same_host() {
        assert_eq!(
            derive_warmup_url("wss://bot.example.com/media/abc"),
            Some("https://bot.example.com/warmup".to_string())
        );
        assert_eq!(derive_warmup_url("not-a-wss-url"), None);
    }

    #[test]
    fn plivo_sid_format() {
        assert!(validate_plivo_sid("MAXXXXXXXXXXXXXXXXXX").is_ok());
        assert!(validate_plivo_sid("too-short").is_err());
        assert!(validate_plivo_sid("lowercaseXXXXXXXXXXX").is_err());
    }

    #[test]
    fn twilio_sid_format() {
        assert!(validate_twilio_sid("ACabcdef0123456789abcdef0123456789").is_ok());
        assert!(validate_twilio_sid("too-short").is_err());
        assert!(validate_twilio_sid("ACABCDEF0123456789ABCDEF0123456789").is_err());
    }
}
