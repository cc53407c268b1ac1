/// Markdown bold marker the model likes to emit.
const BOLD_MARKER: &str = "**";

/// Strips `**` emphasis markers from model output.
///
/// Idempotent: in any run of asterisks only a single odd one survives.
pub fn clean(text: &str) -> String {
    text.replace(BOLD_MARKER, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_bold_markers() {
        assert_eq!(clean("**Rome** is great"), "Rome is great");
        assert_eq!(clean("**The Ritz** is nearby"), "The Ritz is nearby");
    }

    #[test]
    fn keeps_single_asterisks() {
        assert_eq!(clean("* item\n* other"), "* item\n* other");
        assert_eq!(clean("***"), "*");
    }

    proptest! {
        #[test]
        fn clean_is_idempotent(text in "[a-z *\n]{0,64}") {
            let once = clean(&text);
            prop_assert_eq!(clean(&once), once.clone());
            prop_assert!(!once.contains(BOLD_MARKER));
        }
    }
}
