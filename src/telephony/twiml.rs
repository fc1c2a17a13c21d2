//! TwiML voice response documents

use std::fmt::Write as _;

/// Content type of a voice response document
pub const CONTENT_TYPE: &str = "application/xml";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verb {
    Say(String),
    Gather {
        action: String,
        timeout: u32,
        prompt: Option<String>,
    },
    Redirect(String),
    Hangup,
}

/// Builder for a `<Response>` document
///
/// Every `<Say>` carries the same voice and language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceResponse {
    voice: String,
    language: String,
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    #[must_use]
    pub fn new(voice: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
            language: language.into(),
            verbs: Vec::new(),
        }
    }

    /// Speak `text`
    #[must_use]
    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    /// Collect speech and post it to `action`, optionally speaking `prompt`
    /// while listening
    #[must_use]
    pub fn gather(mut self, action: impl Into<String>, timeout: u32, prompt: Option<String>) -> Self {
        self.verbs.push(Verb::Gather {
            action: action.into(),
            timeout,
            prompt,
        });
        self
    }

    /// Continue the call at `url`
    #[must_use]
    pub fn redirect(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Redirect(url.into()));
        self
    }

    #[must_use]
    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    /// Whether the document waits for more caller speech
    #[must_use]
    pub fn gathers(&self) -> bool {
        self.verbs.iter().any(|v| matches!(v, Verb::Gather { .. }))
    }

    /// Text of every `<Say>`, in document order
    #[must_use]
    pub fn spoken(&self) -> Vec<&str> {
        self.verbs
            .iter()
            .filter_map(|v| match v {
                Verb::Say(text) => Some(text.as_str()),
                Verb::Gather {
                    prompt: Some(text), ..
                } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Render the document
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);
        for verb in &self.verbs {
            match verb {
                Verb::Say(text) => self.write_say(&mut xml, text),
                Verb::Gather {
                    action,
                    timeout,
                    prompt,
                } => {
                    let _ = write!(
                        xml,
                        r#"<Gather input="speech" action="{}" method="POST" timeout="{timeout}">"#,
                        escape(action)
                    );
                    if let Some(prompt) = prompt {
                        self.write_say(&mut xml, prompt);
                    }
                    xml.push_str("</Gather>");
                }
                Verb::Redirect(url) => {
                    let _ = write!(xml, r#"<Redirect method="POST">{}</Redirect>"#, escape(url));
                }
                Verb::Hangup => xml.push_str("<Hangup/>"),
            }
        }
        xml.push_str("</Response>");
        xml
    }

    fn write_say(&self, xml: &mut String, text: &str) {
        let _ = write!(
            xml,
            r#"<Say voice="{}" language="{}">{}</Say>"#,
            escape(&self.voice),
            escape(&self.language),
            escape(text)
        );
    }
}

impl std::fmt::Display for VoiceResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_xml())
    }
}

/// Escape text for XML content and attribute values
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
