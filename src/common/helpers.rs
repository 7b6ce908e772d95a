// Redaction helpers for log output

/// Masks an email address for log lines, keeping the first character and
/// the domain so individual flows stay traceable.
pub fn safe_email_log(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            format!("{}***@{}", &local[..1], domain)
        }
        _ => "***@***.***".to_string(),
    }
}

/// Masks a token for log lines, showing only the first and last 4 characters.
pub fn safe_token_log(token: &str) -> String {
    if token.len() > 8 {
        format!("{}...{}", &token[..4], &token[token.len() - 4..])
    } else {
        "***".to_string()
    }
}
