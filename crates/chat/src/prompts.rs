//! Fixed reply texts and instruction templates.

pub const HELP: &str = "Available commands:
/help - Show this list of commands.
/start - Show a short greeting describing the bot.
/history - Show the conversation history kept for this chat.
/clear - Clear the conversation history of this chat.
/rollback <n> - Remove the last <n> messages from the history (default 1).
/tr <text> - Translate <text> from any language into English.
/fixgrammar <text> - Correct the grammar of <text>.
/enhance <text> - Improve the style and wording of <text>.
/imagine <text> - Generate an image described by <text>.
/temperature <n> - Show or set the creativity of the model. Allowed values: 0.0 - 1.2";

pub const GREETING: &str = "Hello! I am an assistant built on a large language model, and I am here to help you with questions and tasks. Just write your question or request and I will do my best to help. For a list of commands, type /help.";

pub const HISTORY_EMPTY: &str = "The conversation history is empty.";
pub const HISTORY_CLEARED: &str = "The conversation history has been cleared.";
pub const BACKEND_FAILURE: &str =
    "Sorry, the language model could not answer right now. Please try again later.";
pub const ADMIN_ONLY: &str = "This command is only available to the administrator.";
pub const ACCESS_DENIED: &str = "Sorry, you do not have access to this bot.";
pub const IMAGINE_USAGE: &str = "Please describe the image to generate. Usage: /imagine <text>";
pub const TEMPERATURE_INVALID: &str = "Invalid temperature. It must be between 0.0 and 1.2.";

/// One-shot text transformations that bypass the conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTask {
    Translate,
    FixGrammar,
    Enhance,
}

impl TextTask {
    #[must_use]
    pub fn system_prompt(self) -> &'static str {
        match self {
            Self::Translate => "You are a helpful assistant that translates text.",
            Self::FixGrammar => "You are a helpful assistant that corrects grammar.",
            Self::Enhance => {
                "You are a helpful assistant that reviews texts for grammar, style and similar issues."
            },
        }
    }

    /// Wrap the user's text in the task instruction.
    #[must_use]
    pub fn instruction(self, text: &str) -> String {
        match self {
            Self::Translate => format!(
                "Translate the following text into English: \"{text}\". Answer only with the translated text, without explanations or quotes."
            ),
            Self::FixGrammar => {
                format!("Correct the following text: \"{text}\". Answer only with the corrected text.")
            },
            Self::Enhance => format!(
                "Review and improve the following text: \"{text}\". Answer with the improved text."
            ),
        }
    }

    #[must_use]
    pub fn usage(self) -> &'static str {
        match self {
            Self::Translate => "Please provide the text to translate. Usage: /tr <text>",
            Self::FixGrammar => "Please provide the text to correct. Usage: /fixgrammar <text>",
            Self::Enhance => "Please provide the text to improve. Usage: /enhance <text>",
        }
    }
}
