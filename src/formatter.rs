//! Placeholder substitution for alert message templates.
//!
//! Tokens look like `{name}`. The table of known names is fixed; anything else
//! is copied through verbatim. The template is scanned once, so text produced
//! by a substitution is never substituted again.
//!
//! Templates are Telegram HTML. Substituted values are escaped; channels that
//! cannot render markup use [`to_plain_text`].
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use teloxide::utils::html;

use crate::model::Alert;

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").expect("valid placeholder pattern"));

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Render `template` for `alert`. `now` fills `{sent_at}`.
pub fn format_message(template: &str, alert: &Alert, now: DateTime<Utc>) -> String {
    TOKEN
        .replace_all(template, |caps: &Captures| {
            substitute(&caps[1], alert, now)
                .map(|value| html::escape(&value))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Escape plain text for an HTML parse-mode message.
pub fn escape_html(text: &str) -> String {
    html::escape(text)
}

/// Drop tags and decode entities, turning an HTML message into plain text.
pub fn to_plain_text(text: &str) -> String {
    TAG.replace_all(text, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn substitute(token: &str, alert: &Alert, now: DateTime<Utc>) -> Option<String> {
    let value = match token {
        "alert_type" => alert.alert_type.replace('_', " ").to_uppercase(),
        "severity" => alert.severity.to_uppercase(),
        "region" => alert
            .affected_regions
            .first()
            .cloned()
            .unwrap_or_else(|| "Multiple regions".to_string()),
        "regions" => {
            if alert.affected_regions.is_empty() {
                "Multiple regions".to_string()
            } else {
                alert.affected_regions.join(", ")
            }
        }
        "emotional_tone" => non_blank(alert.emotional_tone.as_deref()).unwrap_or("mixed").to_string(),
        "title" => non_blank(alert.title.as_deref())
            .unwrap_or("Civic alert")
            .to_string(),
        "timestamp" => alert.created_at.format(TIME_FORMAT).to_string(),
        "sentiment_score" => sentiment_score(&alert.severity).to_string(),
        "sent_at" => now.format(TIME_FORMAT).to_string(),
        _ => return None,
    };
    Some(value)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Alerts carry no numeric score; derive one from severity.
fn sentiment_score(severity: &str) -> u8 {
    match severity.to_ascii_lowercase().as_str() {
        "critical" => 90,
        "high" => 75,
        "medium" => 50,
        "low" => 25,
        _ => 0,
    }
}
