//! Embedded prompts
//!
//! Compiled into the binary from .pmt files.

use tracing::debug;

/// Coaching instruction block sent ahead of every request
const INSTRUCTIONS: &str = include_str!("../../prompts/coach.pmt");

/// Opening assistant turn shown in every new session
const GREETING: &str = include_str!("../../prompts/greeting.pmt");

/// Static usage notes for the help panel
const HELP: &str = include_str!("../../prompts/help.pmt");

/// Fixed part of the reply substituted when a completion call fails
pub const APOLOGY: &str = "죄송해요, 일시적인 오류가 발생했어요. 잠시 후 다시 시도해주세요.";

pub fn instruction_block() -> &'static str {
    INSTRUCTIONS.trim_end()
}

pub fn greeting() -> &'static str {
    GREETING.trim_end()
}

pub fn help_text() -> &'static str {
    HELP.trim_end()
}

/// Build the user-facing apology with the failure detail appended
pub fn apology(detail: &str) -> String {
    debug!(detail_len = detail.len(), "apology: called");
    format!("{} (오류: {})", APOLOGY, detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_block_describes_grow() {
        let block = instruction_block();
        assert!(block.contains("GROW"));
        assert!(block.contains("[Goal"));
        assert!(block.contains("[Reality"));
        assert!(block.contains("[Options"));
        assert!(block.contains("[Will"));
    }

    #[test]
    fn test_embedded_text_is_trimmed() {
        assert!(!greeting().ends_with('\n'));
        assert!(!instruction_block().ends_with('\n'));
        assert!(greeting().starts_with("안녕!"));
    }

    #[test]
    fn test_apology_embeds_detail() {
        let text = apology("API error 401: invalid key");
        assert!(text.starts_with(APOLOGY));
        assert!(text.ends_with("(오류: API error 401: invalid key)"));
    }

    #[test]
    fn test_help_text() {
        assert!(help_text().contains("저장되지 않으며"));
        assert_eq!(help_text().lines().count(), 4);
        // Surfaces add their own bullet
        assert!(help_text().lines().all(|l| !l.starts_with('-')));
    }
}
