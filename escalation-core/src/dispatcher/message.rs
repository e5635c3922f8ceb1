//! Staff notification bodies.
//!
//! Fixed formatting only. Every body starts with the priority marker so staff
//! can triage from a lock screen.

use crate::types::EscalationPriority;

/// Reason text beyond this many characters is cut from SMS and push bodies.
const SHORT_REASON_CHARS: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub subject: String,
    pub html_body: String,
    /// SMS and push body.
    pub text_body: String,
}

pub fn render(ticket_number: &str, priority: EscalationPriority, reason: &str) -> NotificationMessage {
    let marker = priority.marker();
    let subject = format!("{marker} Escalated ticket #{ticket_number}");

    let html_body = format!(
        "<h2>{marker} Chat escalated to staff</h2>\n\
         <p><strong>Ticket:</strong> #{number}</p>\n\
         <p><strong>Priority:</strong> {priority}</p>\n\
         <p><strong>Reason:</strong> {reason}</p>\n\
         <p>A customer conversation needs a human. Open the support queue to pick it up.</p>",
        number = escape_html(ticket_number),
        reason = escape_html(reason),
    );

    let text_body = format!(
        "{marker} Ticket #{ticket_number}: {}. Check the support queue.",
        truncate_chars(reason, SHORT_REASON_CHARS)
    );

    NotificationMessage {
        subject,
        html_body,
        text_body,
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_body_carries_marker() {
        let msg = render("1042", EscalationPriority::Urgent, "Urgent issue reported: \"flooding\"");
        assert!(msg.subject.starts_with("🚨 URGENT"));
        assert!(msg.html_body.contains("🚨 URGENT"));
        assert!(msg.text_body.starts_with("🚨 URGENT"));
        assert!(msg.subject.contains("#1042"));
    }

    #[test]
    fn test_reason_is_escaped_in_html() {
        let msg = render("7", EscalationPriority::High, "<script>alert('x')</script>");
        assert!(!msg.html_body.contains("<script>"));
        assert!(msg.html_body.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_long_reason_truncated_in_text_body() {
        let reason = "é".repeat(500);
        let msg = render("7", EscalationPriority::Low, &reason);
        assert!(msg.text_body.contains('…'));
        assert!(msg.text_body.chars().count() < 200);
        assert!(msg.html_body.contains(&reason));
    }
}
