//! User-facing text of the unread reminder.
//!
//! Russian numerals agree with the count in three forms, so the wording has
//! three buckets rather than singular/plural.

/// Grammatical number form selected by an unread count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluralForm {
    /// Exactly one.
    One,
    /// Two to four.
    Few,
    /// Five and above.
    Many,
}

impl PluralForm {
    pub fn for_count(count: i64) -> Self {
        match count {
            1 => PluralForm::One,
            2..=4 => PluralForm::Few,
            _ => PluralForm::Many,
        }
    }
}

const CALL_TO_ACTION: &str = "Загляните в чаты, чтобы не пропустить важное.";

/// Reminder text for a user with `unread_count` unread messages.
pub fn format_unread_message(unread_count: i64) -> String {
    match PluralForm::for_count(unread_count) {
        PluralForm::One => {
            format!("💬 У вас есть 1 непрочитанное сообщение! {CALL_TO_ACTION}")
        }
        PluralForm::Few => {
            format!("💬 У вас есть {unread_count} непрочитанных сообщения! {CALL_TO_ACTION}")
        }
        PluralForm::Many => {
            format!("💬 У вас есть {unread_count} непрочитанных сообщений! {CALL_TO_ACTION}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plural_buckets() {
        assert_eq!(PluralForm::for_count(1), PluralForm::One);
        for n in 2..=4 {
            assert_eq!(PluralForm::for_count(n), PluralForm::Few);
        }
        for n in [5, 7, 11, 21, 100] {
            assert_eq!(PluralForm::for_count(n), PluralForm::Many);
        }
    }

    #[test]
    fn test_singular_text() {
        let text = format_unread_message(1);
        assert!(text.contains("1 непрочитанное сообщение!"));
    }

    #[test]
    fn test_few_text() {
        let text = format_unread_message(3);
        assert!(text.contains("3 непрочитанных сообщения!"));
    }

    #[test]
    fn test_many_text() {
        let text = format_unread_message(7);
        assert!(text.contains("7 непрочитанных сообщений!"));
    }

    #[test]
    fn test_buckets_render_distinct_texts() {
        let one = format_unread_message(1);
        let few = format_unread_message(3);
        let many = format_unread_message(7);
        assert_ne!(one.replace('1', "N"), few.replace('3', "N"));
        assert_ne!(few.replace('3', "N"), many.replace('7', "N"));
        assert!(one.ends_with(CALL_TO_ACTION));
    }
}
