//! Structured output of an automation run: one embed (description, named
//! fields, footer) plus per-user private-message buckets. Delivery is the
//! caller's concern; [`Report::private_messages`] pre-formats the bursts.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub embed: Embed,
    /// user id -> private lines accumulated for that user
    pub pm_queue: HashMap<String, Vec<String>>,
}

impl Report {
    /// One message body per user, lines joined, prefixed with `title`
    /// when given.
    pub fn private_messages(&self, title: Option<&str>) -> Vec<(String, String)> {
        let mut messages: Vec<(String, String)> = self
            .pm_queue
            .iter()
            .map(|(user, lines)| {
                let body = lines.join("\n");
                let body = match title {
                    Some(title) => format!("{}\n{}", title, body),
                    None => body,
                };
                (user.clone(), body)
            })
            .collect();
        messages.sort();
        messages
    }
}
