// ── Sync report ──
//
// One message per router per cycle summarizing who came and went.

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};

use crate::reconcile::Reconciliation;

/// Telegram's hard limit for a message body, in characters.
pub const MESSAGE_LIMIT: usize = 4096;
const TRUNCATED_LEN: usize = 4000;
const TRUNCATION_NOTICE: &str = "\n\n...(message truncated due to length limit)";

/// Events collected from one router's cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub router_name: String,
    pub at: DateTime<Utc>,
    pub logins: Vec<String>,
    pub logouts: Vec<String>,
    pub total_secrets: usize,
    pub total_active: usize,
    pub disconnected: Vec<String>,
}

impl SyncReport {
    pub fn from_cycle(router_name: &str, at: DateTime<Utc>, cycle: &Reconciliation) -> Self {
        Self {
            router_name: router_name.to_owned(),
            at,
            logins: cycle.logins.clone(),
            logouts: cycle.logouts.clone(),
            total_secrets: cycle.statuses.len(),
            total_active: cycle.online_count(),
            disconnected: cycle.offline_names(),
        }
    }

    /// Nothing happened worth telling anyone about.
    pub fn is_quiet(&self) -> bool {
        self.logins.is_empty() && self.logouts.is_empty()
    }

    /// HTML message body, or `None` for a quiet cycle.
    pub fn render(&self) -> Option<String> {
        if self.is_quiet() {
            return None;
        }

        let mut msg = String::new();
        let time = self.at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
        let _ = writeln!(msg, "📊 <b>Sync Report</b>");
        let _ = writeln!(msg, "Router: {}", escape_html(&self.router_name));
        let _ = writeln!(msg, "Time: {time}");
        msg.push_str("---\n\n");

        section(&mut msg, "✅ <b>LOGIN:</b>", &self.logins);
        section(&mut msg, "❌ <b>LOGOUT:</b>", &self.logouts);

        msg.push_str("==============================\n");
        let _ = writeln!(msg, "Total Secrets: {}", self.total_secrets);
        let _ = writeln!(msg, "Total Active: {}", self.total_active);
        msg.push_str("==============================\n");

        if !self.disconnected.is_empty() {
            let mut names: Vec<&str> = self.disconnected.iter().map(String::as_str).collect();
            names.sort_unstable();
            let _ = writeln!(msg, "Disconnected Users ({}):", names.len());
            for name in names {
                let _ = writeln!(msg, "• {}", escape_html(name));
            }
        }

        Some(truncate(msg.trim_end()))
    }
}

fn section(msg: &mut String, title: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    let mut sorted: Vec<&str> = names.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let _ = writeln!(msg, "{title}");
    msg.push_str("---\n");
    for (i, name) in sorted.iter().enumerate() {
        let _ = writeln!(msg, "{}. {}", i + 1, escape_html(name));
    }
    msg.push_str("\n\n");
}

/// Cut to the transport limit without splitting a line or an HTML entity.
pub fn truncate(text: &str) -> String {
    if text.chars().count() <= MESSAGE_LIMIT {
        return text.to_owned();
    }
    let end = text
        .char_indices()
        .nth(TRUNCATED_LEN)
        .map_or(text.len(), |(i, _)| i);
    let mut head = &text[..end];
    if let Some(nl) = head.rfind('\n') {
        head = &head[..nl];
    }
    head = &head[..markup_safe_end(head)];

    let mut out = head.trim_end().to_owned();
    out.push_str(TRUNCATION_NOTICE);
    out
}

/// Byte offset before an entity or tag left open at the end of `head`.
fn markup_safe_end(head: &str) -> usize {
    let end = head
        .rfind('&')
        .filter(|&amp| !head[amp..].contains(';'))
        .unwrap_or(head.len());
    head[..end]
        .rfind('<')
        .filter(|&lt| !head[lt..end].contains('>'))
        .unwrap_or(end)
}

/// Secret names are operator input; keep them from being read as markup.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
