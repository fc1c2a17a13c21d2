//! Two-question call dialogue: product category, then budget tier

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::twiml::VoiceResponse;
use crate::Result;
use crate::db::{ProductRepo, format_price};

/// Said before a re-prompt
pub const REPROMPT_LINE: &str = "Sorry, I could not understand. Please repeat.";

/// Said when the budget filter matched nothing
pub const NO_RESULTS_LINE: &str = "Sorry, is budget me koi product available nahi hai.";

/// Said before the call ends normally
pub const CLOSING_LINE: &str = "Dhanyavaad! Aapse baat karke accha laga. Goodbye.";

/// Said when a finished or unknown conversation receives input
pub const FALLBACK_LINE: &str = "Sorry, kuch problem ho gayi. Call end kar raha hu.";

/// Where a call's conversation stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AwaitCategory,
    AwaitBudget,
    Done,
}

/// Dialogue state of one call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversation {
    pub stage: Stage,
    pub category: Option<String>,
    pub budget: Option<String>,
    /// Consecutive silent attempts in the current stage
    pub reprompts: u32,
    pub last_seen: DateTime<Utc>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            stage: Stage::AwaitCategory,
            category: None,
            budget: None,
            reprompts: 0,
            last_seen: Utc::now(),
        }
    }
}

/// What the dialogue decided to do with one caller utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Category stored; ask for the budget
    AskBudget { category: String },
    /// Budget stored; look up products and finish
    Lookup { category: String, budget: String },
    /// Nothing usable was heard; ask for `Stage` again
    Reprompt(Stage),
    /// Too many silent attempts; end the call
    GiveUp,
    /// Input arrived after the dialogue finished
    Fallback,
}

impl Conversation {
    /// Feed one caller utterance into the dialogue
    ///
    /// Missing or blank utterances re-prompt the current stage until
    /// `max_reprompts` is exceeded.
    pub fn advance(&mut self, utterance: Option<&str>, max_reprompts: u32) -> Step {
        self.last_seen = Utc::now();

        if self.stage == Stage::Done {
            return Step::Fallback;
        }

        let Some(text) = utterance.map(normalize_utterance).filter(|t| !t.is_empty()) else {
            if self.reprompts >= max_reprompts {
                self.stage = Stage::Done;
                return Step::GiveUp;
            }
            self.reprompts += 1;
            return Step::Reprompt(self.stage);
        };

        self.reprompts = 0;
        match self.stage {
            Stage::AwaitCategory => {
                self.category = Some(text.clone());
                self.stage = Stage::AwaitBudget;
                Step::AskBudget { category: text }
            }
            Stage::AwaitBudget => {
                self.budget = Some(text.clone());
                self.stage = Stage::Done;
                Step::Lookup {
                    category: self.category.clone().unwrap_or_default(),
                    budget: text,
                }
            }
            Stage::Done => Step::Fallback,
        }
    }
}

/// Lower-case an utterance and strip recognizer punctuation
#[must_use]
pub fn normalize_utterance(text: &str) -> String {
    text.trim()
        .trim_end_matches(['.', '!', '?', ','])
        .trim()
        .to_lowercase()
}

/// Fixed wording and limits of the call script
#[derive(Debug, Clone)]
pub struct DialogueScript {
    pub store_name: String,
    pub voice: String,
    pub language: String,
    /// Absolute URL speech results are posted to
    pub process_url: String,
    pub gather_timeout: u32,
    pub max_reprompts: u32,
    pub readback_limit: usize,
}

impl DialogueScript {
    /// Greeting and category question
    #[must_use]
    pub fn greeting(&self) -> String {
        format!(
            "Namaste! Welcome to {}. Aap kis type ka product dekhna chahte ho? Example lipstick, cream, foundation.",
            self.store_name
        )
    }

    /// Budget question for a stored category
    #[must_use]
    pub fn budget_prompt(category: &str) -> String {
        format!("Thik hai, aapko {category} chahiye. Aapka budget kya hai? Low, Medium, ya Premium?")
    }

    fn response(&self) -> VoiceResponse {
        VoiceResponse::new(&self.voice, &self.language)
    }

    /// Gather for the next utterance, falling through to the process URL on
    /// silence so the re-prompt limit applies
    fn listen(&self, response: VoiceResponse, prompt: String) -> VoiceResponse {
        response
            .gather(&self.process_url, self.gather_timeout, Some(prompt))
            .redirect(&self.process_url)
    }

    /// Opening document of a call
    #[must_use]
    pub fn opening(&self) -> VoiceResponse {
        self.listen(self.response(), self.greeting())
    }

    fn stage_prompt(&self, stage: Stage, conversation: &Conversation) -> Option<String> {
        match stage {
            Stage::AwaitCategory => Some(self.greeting()),
            Stage::AwaitBudget => Some(Self::budget_prompt(
                conversation.category.as_deref().unwrap_or_default(),
            )),
            Stage::Done => None,
        }
    }

    /// Read-back sentence for matching products
    #[must_use]
    pub fn results_line(&self, products: &[crate::db::Product]) -> String {
        if products.is_empty() {
            return NO_RESULTS_LINE.to_string();
        }
        let list = products
            .iter()
            .take(self.readback_limit)
            .map(|p| format!("{} {} rupees", p.name, format_price(p.price)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("Aapke liye ye products mil gaye: {list}.")
    }
}

/// Renders dialogue steps into voice documents
#[derive(Clone)]
pub struct Dialogue {
    script: DialogueScript,
    catalog: ProductRepo,
}

impl Dialogue {
    #[must_use]
    pub const fn new(script: DialogueScript, catalog: ProductRepo) -> Self {
        Self { script, catalog }
    }

    #[must_use]
    pub const fn script(&self) -> &DialogueScript {
        &self.script
    }

    /// Voice document for a step
    ///
    /// # Errors
    ///
    /// Returns error if the catalog lookup fails
    pub fn render(&self, step: &Step, conversation: &Conversation) -> Result<VoiceResponse> {
        let response = self.script.response();
        let response = match step {
            Step::AskBudget { category } => {
                self.script.listen(response, DialogueScript::budget_prompt(category))
            }
            Step::Lookup { category, budget } => {
                let products = self.catalog.fetch_by_text(Some(category), Some(budget))?;
                tracing::info!(%category, %budget, matches = products.len(), "catalog lookup for caller");
                response
                    .say(self.script.results_line(&products))
                    .say(CLOSING_LINE)
                    .hangup()
            }
            Step::Reprompt(stage) => match self.script.stage_prompt(*stage, conversation) {
                Some(prompt) => self.script.listen(response.say(REPROMPT_LINE), prompt),
                None => response.say(FALLBACK_LINE).hangup(),
            },
            Step::GiveUp => response.say(REPROMPT_LINE).say(CLOSING_LINE).hangup(),
            Step::Fallback => response.say(FALLBACK_LINE).hangup(),
        };
        Ok(response)
    }
}
