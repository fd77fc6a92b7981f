//! Interpreter prompts for the translation collaborator.
//!
//! [`InterpreterPrompt`] builds the `(system_msg, user_msg)` pair sent to an
//! OpenAI-compatible chat endpoint.  The system message tells the model to act
//! as a live interpreter from the broadcaster's language into the room's
//! language and to answer with the translation only.

use crate::room::Language;

/// Korean room.
const SYSTEM_INSTRUCTION_KO: &str = "\
You are a real-time interpreter.
When the speaker speaks Chinese, translate verbally into Korean.
Maintain tone, pace, and emotion.
Respond only in Korean.";

/// Vietnamese room.
const SYSTEM_INSTRUCTION_VI: &str = "\
You are a real-time interpreter.
When the speaker speaks Chinese, translate verbally into Vietnamese.
Maintain tone, pace, and emotion.
Respond only in Vietnamese.";

/// Appended to every instruction; keeps replies usable as subtitles.
const OUTPUT_RULES: &str = "
Reply with ONLY the translation: no quotes, notes or romanisation.
If the input is empty or only filler, reply with an empty message.";

#[derive(Debug, Clone)]
pub struct InterpreterPrompt {
    source: Language,
    target: Language,
}

impl InterpreterPrompt {
    /// Prompt for translating the broadcaster's speech into `target`.
    pub fn new(target: Language) -> Self {
        Self {
            source: Language::SOURCE,
            target,
        }
    }

    pub fn target(&self) -> Language {
        self.target
    }

    /// System instruction for this target language.
    pub fn system(&self) -> String {
        let base = match self.target {
            Language::Korean => SYSTEM_INSTRUCTION_KO.to_string(),
            Language::Vietnamese => SYSTEM_INSTRUCTION_VI.to_string(),
            other => format!(
                "You are a real-time interpreter.\n\
                 When the speaker speaks {src}, translate verbally into {dst}.\n\
                 Maintain tone, pace, and emotion.\n\
                 Respond only in {dst}.",
                src = self.source.english_name(),
                dst = other.english_name(),
            ),
        };
        format!("{base}\n{OUTPUT_RULES}")
    }

    /// `(system_msg, user_msg)` for a chat-completions request.
    pub fn build_chat(&self, text: &str) -> (String, String) {
        (self.system(), text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn korean_prompt_names_both_languages() {
        let (system, user) = InterpreterPrompt::new(Language::Korean).build_chat("  你好  ");
        assert!(system.contains("translate verbally into Korean"));
        assert!(system.contains("Respond only in Korean."));
        assert!(system.contains("speaks Chinese"));
        assert_eq!(user, "你好");
    }

    #[test]
    fn vietnamese_prompt_differs_from_korean() {
        let ko = InterpreterPrompt::new(Language::Korean).system();
        let vi = InterpreterPrompt::new(Language::Vietnamese).system();
        assert_ne!(ko, vi);
        assert!(vi.contains("Respond only in Vietnamese."));
    }

    #[test]
    fn every_prompt_carries_output_rules() {
        for lang in [Language::Korean, Language::Vietnamese, Language::Chinese] {
            assert!(InterpreterPrompt::new(lang)
                .system()
                .contains("Reply with ONLY the translation"));
        }
    }
}
