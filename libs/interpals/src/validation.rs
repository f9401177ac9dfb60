//! Input validation utilities

use std::sync::OnceLock;

use common::{InterpalsError, InterpalsResult};
use regex::Regex;

/// Lowest age accepted by the search form
pub const MIN_AGE: u32 = 16;

/// Highest age accepted by the search form
pub const MAX_AGE: u32 = 110;

/// Continent codes understood by the search form
pub const CONTINENTS: [&str; 6] = ["AF", "AS", "EU", "NA", "OC", "SA"];

fn invalid(message: impl Into<String>) -> InterpalsError {
    InterpalsError::Validation(message.into())
}

/// Validate a username used to build a profile path
pub fn validate_username(username: &str) -> InterpalsResult<()> {
    if username.is_empty() {
        return Err(invalid("Username is required"));
    }

    if username.len() > 64 {
        return Err(invalid("Username must be at most 64 characters long"));
    }

    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_.-]+$").expect("Failed to compile username regex"));

    if !regex.is_match(username) {
        return Err(invalid(format!(
            "Username {username:?} can only contain letters, numbers, dots, dashes and underscores"
        )));
    }

    // "." and ".." collapse to the home page path
    if !username.chars().any(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid(format!(
            "Username {username:?} must contain a letter or a number"
        )));
    }

    Ok(())
}

/// Validate a search age range
pub fn validate_age_range(age1: u32, age2: u32) -> InterpalsResult<()> {
    if !(MIN_AGE..=MAX_AGE).contains(&age1) || !(MIN_AGE..=MAX_AGE).contains(&age2) {
        return Err(invalid(format!(
            "Ages must be between {MIN_AGE} and {MAX_AGE}, got {age1}..{age2}"
        )));
    }

    if age1 > age2 {
        return Err(invalid(format!(
            "Lower age {age1} is greater than upper age {age2}"
        )));
    }

    Ok(())
}

/// Validate a continent code
pub fn validate_continent(code: &str) -> InterpalsResult<()> {
    if !CONTINENTS.contains(&code) {
        return Err(invalid(format!(
            "Unknown continent {code:?}, expected one of {}",
            CONTINENTS.join(", ")
        )));
    }

    Ok(())
}

/// Validate a two-letter country code
pub fn validate_country(code: &str) -> InterpalsResult<()> {
    static COUNTRY_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = COUNTRY_REGEX
        .get_or_init(|| Regex::new(r"^[A-Z]{2}$").expect("Failed to compile country regex"));

    if !regex.is_match(code) {
        return Err(invalid(format!(
            "Country code {code:?} must be two uppercase letters"
        )));
    }

    Ok(())
}

/// Validate a city code returned by the city autocomplete
pub fn validate_city_code(code: &str) -> InterpalsResult<()> {
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid(format!("City code {code:?} must be numeric")));
    }

    Ok(())
}

/// Validate the text of a chat message
pub fn validate_message(text: &str) -> InterpalsResult<()> {
    if text.trim().is_empty() {
        return Err(invalid("Message text is required"));
    }

    Ok(())
}
