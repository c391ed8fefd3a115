use once_cell::sync::Lazy;
use regex::Regex;

// Regex untuk email validation
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

// Username: huruf, angka, underscore, 3-24 karakter
static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]{3,24}$").unwrap());

pub const MAX_DISPLAY_NAME_LENGTH: usize = 50;

// Validate format email
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email.trim())
}

// Validate username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.trim().is_empty() {
        return Err("Username tidak boleh kosong".to_string());
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(
            "Username hanya boleh huruf, angka, underscore (3-24 karakter)".to_string(),
        );
    }

    Ok(())
}

// Validate display name
pub fn validate_display_name(display_name: &str) -> Result<(), String> {
    let trimmed = display_name.trim();

    if trimmed.is_empty() {
        return Err("Nama tampilan tidak boleh kosong".to_string());
    }

    if trimmed.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(format!(
            "Nama tampilan maksimal {} karakter",
            MAX_DISPLAY_NAME_LENGTH
        ));
    }

    Ok(())
}

// Sanitize string untuk prevent XSS
pub fn sanitize_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

// Kebalikan sanitize_html, untuk membaca atribut markup yang tersimpan
pub fn unescape_html(input: &str) -> String {
    input
        .replace("&#x27;", "'")
        .replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}
