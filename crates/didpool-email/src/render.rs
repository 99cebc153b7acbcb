// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering of the pool-exhaustion alert.

use didpool_core::types::PoolExhaustedAlert;

pub const ALERT_SUBJECT: &str = "DID Pool Capacity Exhausted";

/// A rendered alert, as plain text and HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub fn render_alert(alert: &PoolExhaustedAlert) -> AlertMessage {
    let campaign = alert.campaign_id.as_deref().unwrap_or("Unknown");
    let agent = alert.agent_id.as_deref().unwrap_or("Unknown");
    let time = alert.occurred_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();

    let text = format!(
        "{ALERT_SUBJECT}\n\n\
         All DIDs in your pool have reached their daily capacity limits.\n\n\
         Campaign: {campaign}\n\
         Agent: {agent}\n\
         Time: {time}\n\n\
         Consider increasing your DID pool capacity or adding more DIDs to handle the call volume.\n"
    );

    let html = format!(
        "<h2 style=\"color: #ef4444;\">{ALERT_SUBJECT}</h2>\n\
         <p>All DIDs in your pool have reached their daily capacity limits.</p>\n\
         <p><strong>Campaign:</strong> {}</p>\n\
         <p><strong>Agent:</strong> {}</p>\n\
         <p><strong>Time:</strong> {time}</p>\n\
         <hr style=\"margin: 20px 0; border: none; border-top: 1px solid #e5e7eb;\">\n\
         <p style=\"color: #6b7280; font-size: 14px;\">\n\
         Consider increasing your DID pool capacity or adding more DIDs to handle the call volume.\n\
         </p>\n",
        escape_html(campaign),
        escape_html(agent),
    );

    AlertMessage {
        subject: ALERT_SUBJECT.to_string(),
        text,
        html,
    }
}

/// Campaign and agent ids come straight from the dialer's query string.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use didpool_core::types::TenantId;

    fn alert(campaign: Option<&str>, agent: Option<&str>) -> PoolExhaustedAlert {
        PoolExhaustedAlert {
            tenant_id: TenantId::from("acme"),
            recipients: vec!["ops@acme.test".into()],
            campaign_id: campaign.map(String::from),
            agent_id: agent.map(String::from),
            occurred_at: Utc.with_ymd_and_hms(2026, 3, 4, 15, 30, 0).unwrap(),
        }
    }

    #[test]
    fn names_campaign_agent_and_time() {
        let msg = render_alert(&alert(Some("spring"), Some("agent-7")));
        assert_eq!(msg.subject, "DID Pool Capacity Exhausted");
        assert!(msg.text.contains("Campaign: spring"));
        assert!(msg.text.contains("Agent: agent-7"));
        assert!(msg.text.contains("Time: 2026-03-04 15:30:00 UTC"));
        assert!(msg.html.contains("<strong>Campaign:</strong> spring"));
        assert!(msg.text.contains("adding more DIDs"));
    }

    #[test]
    fn missing_context_reads_unknown() {
        let msg = render_alert(&alert(None, None));
        assert!(msg.text.contains("Campaign: Unknown"));
        assert!(msg.text.contains("Agent: Unknown"));
    }

    #[test]
    fn html_escapes_dialer_input() {
        let msg = render_alert(&alert(Some("<script>x</script>"), Some("a&b")));
        assert!(!msg.html.contains("<script>"));
        assert!(msg.html.contains("&lt;script&gt;"));
        assert!(msg.html.contains("a&amp;b"));
        // Plain text is left as-is.
        assert!(msg.text.contains("Campaign: <script>x</script>"));
    }
}
