use crate::domain::models::StreakData;
use chrono::NaiveDate;

/// Aggregates logged session days into streak figures. `session_days` carries
/// one entry per logged session (duplicates per day expected); a streak is a
/// run of consecutive calendar days, and the current streak survives until a
/// full day without sessions has passed.
pub fn compute_streak(session_days: &[NaiveDate], today: NaiveDate) -> StreakData {
    let total_sessions = session_days.len() as u32;

    let mut days = session_days.to_vec();
    days.sort_unstable();
    days.dedup();

    let mut longest_days: u32 = 0;
    let mut run: u32 = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in &days {
        run = match previous {
            Some(prior) if *day == prior.succ_opt().unwrap_or(prior) => run + 1,
            _ => 1,
        };
        longest_days = longest_days.max(run);
        previous = Some(*day);
    }

    let current_days = match days.last() {
        Some(last) if *last == today || Some(*last) == today.pred_opt() => run,
        _ => 0,
    };

    StreakData {
        current_days,
        longest_days,
        total_sessions,
    }
}
