use extpulse_model::{CategoryCounts, SessionRecord};
use serde::Serialize;
use std::collections::HashMap;

/// One session annotated with the user ordinal derived for this rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionWithUser {
    #[serde(flatten)]
    pub record: SessionRecord,
    pub user_no: u32,
}

/// Running category totals for one derived user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTotals {
    pub user_no: u32,
    pub categories: CategoryCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardRollup {
    pub sessions: Vec<SessionWithUser>,
    pub users: Vec<UserTotals>,
}

/// Single pass over records already sorted by `session_start` ascending.
/// The first distinct IP encountered gets ordinal 1, the next distinct IP
/// ordinal 2, and so on; each record's counts accumulate into its user's
/// totals.
#[must_use]
pub fn rollup_dashboard(records: Vec<SessionRecord>) -> DashboardRollup {
    let mut ordinals: HashMap<String, u32> = HashMap::new();
    let mut users: Vec<UserTotals> = Vec::new();
    let mut sessions = Vec::with_capacity(records.len());

    for record in records {
        let next = u32::try_from(users.len()).unwrap_or(u32::MAX).saturating_add(1);
        let user_no = *ordinals.entry(record.ip_address.clone()).or_insert(next);
        if user_no == next {
            users.push(UserTotals {
                user_no,
                categories: CategoryCounts::default(),
            });
        }
        users[(user_no - 1) as usize]
            .categories
            .accumulate(&record.categories);
        sessions.push(SessionWithUser { record, user_no });
    }

    DashboardRollup { sessions, users }
}

/// Flat per-caller totals: the record set is already filtered to one IP, so
/// no per-user breakdown is needed.
#[must_use]
pub fn total_categories(records: &[SessionRecord]) -> CategoryCounts {
    let mut totals = CategoryCounts::default();
    for record in records {
        totals.accumulate(&record.categories);
    }
    totals
}
