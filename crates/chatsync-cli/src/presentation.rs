//! Output formatting.

use serde::Serialize;

use chatsync_core::{ConversationSummary, DeliveryState, Message};

use crate::error::CliError;

/// Serialize `value` as pretty or compact JSON.
pub fn to_json<T: Serialize>(value: &T, compact: bool) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    rendered.map_err(|e| CliError::Sync(format!("could not render output: {e}")))
}

pub const fn delivery_label(state: DeliveryState) -> &'static str {
    match state {
        DeliveryState::Pending => "PENDING",
        DeliveryState::Confirmed => "CONFIRMED",
        DeliveryState::Failed => "FAILED",
    }
}

/// One line per message: time, direction, state, body.
pub fn message_line(message: &Message, current_user_id: &str) -> String {
    let arrow = if message.from_id == current_user_id {
        "->"
    } else {
        "<-"
    };
    format!(
        "{} {arrow} [{}] {}",
        message.created_at.format("%Y-%m-%d %H:%M:%S"),
        delivery_label(message.delivery_state),
        message.body
    )
}

pub fn summary_line(summary: &ConversationSummary) -> String {
    let unread = if summary.unread_count > 0 {
        format!(" ({} unread)", summary.unread_count)
    } else {
        String::new()
    };
    let preview = summary
        .last_message
        .as_ref()
        .map(|m| format!(": {}", m.body))
        .unwrap_or_default();
    format!(
        "{} [{}] {}{unread}{preview}",
        summary.participant_id,
        summary.participant_role.as_str(),
        summary.participant_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync_core::{Participant, ParticipantRole};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_message_line_direction() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mine = Message::new("1", "me", "p", "hi", at);
        assert_eq!(
            message_line(&mine, "me"),
            "2024-03-01 12:00:00 -> [CONFIRMED] hi"
        );
        assert!(message_line(&mine, "p").contains(" <- "));
    }

    #[test]
    fn test_summary_line() {
        let mut summary =
            ConversationSummary::empty(Participant::new("s1", "Shop", ParticipantRole::Seller));
        assert_eq!(summary_line(&summary), "s1 [seller] Shop");
        summary.unread_count = 2;
        assert_eq!(summary_line(&summary), "s1 [seller] Shop (2 unread)");
    }
}
