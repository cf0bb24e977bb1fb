//! Day-bucket grouping of persisted exchanges for the history view.

use chrono::NaiveDate;
use medichat_types::ConversationRecord;

/// Exchanges bucketed the way the history screen shows them:
/// Aujourd'hui / Hier / Plus ancien, original order preserved inside each
/// bucket.
#[derive(Debug, Default)]
pub struct GroupedHistory {
    pub today: Vec<ConversationRecord>,
    pub yesterday: Vec<ConversationRecord>,
    pub older: Vec<ConversationRecord>,
}

pub fn group_by_day(records: &[ConversationRecord], today: NaiveDate) -> GroupedHistory {
    let yesterday = today.pred_opt();
    let mut grouped = GroupedHistory::default();

    for record in records {
        let day = record.timestamp.date_naive();
        if day == today {
            grouped.today.push(record.clone());
        } else if Some(day) == yesterday {
            grouped.yesterday.push(record.clone());
        } else {
            grouped.older.push(record.clone());
        }
    }
    grouped
}
