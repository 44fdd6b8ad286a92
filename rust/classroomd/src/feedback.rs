//! Transient scan feedback with deadline-based auto-clear.

use crate::checkin::{Mode, Outcome};
use serde_json::json;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackWindows {
    pub attendance_unknown: Duration,
    pub homework_unknown: Duration,
    pub homework_ack: Duration,
    pub attendance_ack: Duration,
}

impl Default for FeedbackWindows {
    fn default() -> Self {
        Self {
            attendance_unknown: Duration::from_millis(3000),
            homework_unknown: Duration::from_millis(3000),
            homework_ack: Duration::from_millis(2500),
            attendance_ack: Duration::from_millis(2500),
        }
    }
}

impl FeedbackWindows {
    pub fn window_for(&self, mode: Mode, outcome: &Outcome) -> Duration {
        match (mode, outcome) {
            (Mode::Attendance, Outcome::Unknown { .. }) => self.attendance_unknown,
            (Mode::Homework, Outcome::Unknown { .. }) => self.homework_unknown,
            (Mode::Homework, _) => self.homework_ack,
            (Mode::Attendance, _) => self.attendance_ack,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Success,
    Duplicate,
    UnknownId,
}

impl FeedbackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Duplicate => "duplicate",
            Self::UnknownId => "unknown_id",
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, Self::UnknownId)
    }
}

#[derive(Debug, Clone)]
pub struct Feedback {
    pub kind: FeedbackKind,
    pub message: String,
    pub avatar: Option<String>,
    pub shown_at: Instant,
    pub clears_after: Duration,
}

impl Feedback {
    pub fn for_outcome(
        mode: Mode,
        outcome: &Outcome,
        windows: &FeedbackWindows,
        now: Instant,
    ) -> Self {
        let (kind, message, avatar) = match outcome {
            Outcome::Unknown { identifier } => (
                FeedbackKind::UnknownId,
                format!("no student matches {}", identifier),
                None,
            ),
            Outcome::AlreadyDone {
                display_name,
                avatar,
                ..
            } => (
                FeedbackKind::Duplicate,
                format!("{} already handed this in", display_name),
                avatar.clone(),
            ),
            Outcome::Recorded {
                display_name,
                avatar,
                ..
            } => (
                FeedbackKind::Success,
                match mode {
                    Mode::Attendance => format!("{} checked in", display_name),
                    Mode::Homework => format!("{} marked complete", display_name),
                },
                avatar.clone(),
            ),
        };
        Self {
            kind,
            message,
            avatar,
            shown_at: now,
            clears_after: windows.window_for(mode, outcome),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) >= self.clears_after
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.clears_after
            .saturating_sub(now.saturating_duration_since(self.shown_at))
    }

    pub fn to_json(&self, now: Instant) -> serde_json::Value {
        json!({
            "kind": self.kind.as_str(),
            "error": self.kind.is_error(),
            "message": self.message,
            "avatar": self.avatar,
            "clearsAfterMs": self.clears_after.as_millis() as u64,
            "remainingMs": self.remaining(now).as_millis() as u64,
        })
    }
}

/// Holds at most one banner. A newer banner replaces the pending one.
#[derive(Debug, Default)]
pub struct FeedbackSlot {
    current: Option<Feedback>,
}

impl FeedbackSlot {
    pub fn show(&mut self, feedback: Feedback) {
        self.current = Some(feedback);
    }

    pub fn current(&mut self, now: Instant) -> Option<&Feedback> {
        if self.current.as_ref().is_some_and(|f| f.is_expired(now)) {
            self.current = None;
        }
        self.current.as_ref()
    }

    /// Drops any pending banner; returns whether one was pending.
    pub fn clear(&mut self) -> bool {
        self.current.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unknown() -> Outcome {
        Outcome::Unknown {
            identifier: "Z9".to_string(),
        }
    }

    #[test]
    fn windows_follow_mode_and_outcome() {
        let w = FeedbackWindows::default();
        let dup = Outcome::AlreadyDone {
            student_id: "A1".to_string(),
            display_name: "Ana".to_string(),
            avatar: None,
        };
        assert_eq!(
            w.window_for(Mode::Attendance, &unknown()),
            Duration::from_millis(3000)
        );
        assert_eq!(
            w.window_for(Mode::Homework, &unknown()),
            Duration::from_millis(3000)
        );
        assert_eq!(w.window_for(Mode::Homework, &dup), Duration::from_millis(2500));
    }

    #[test]
    fn unknown_banner_clears_after_window() {
        let t0 = Instant::now();
        let mut slot = FeedbackSlot::default();
        slot.show(Feedback::for_outcome(
            Mode::Attendance,
            &unknown(),
            &FeedbackWindows::default(),
            t0,
        ));

        let shown = slot
            .current(t0 + Duration::from_millis(2999))
            .expect("still shown");
        assert!(shown.kind.is_error());
        assert!(shown.avatar.is_none());
        assert!(slot.current(t0 + Duration::from_millis(3000)).is_none());
        assert!(!slot.clear());
    }

    #[test]
    fn newer_banner_replaces_pending_one() {
        let t0 = Instant::now();
        let windows = FeedbackWindows::default();
        let mut slot = FeedbackSlot::default();
        slot.show(Feedback::for_outcome(Mode::Homework, &unknown(), &windows, t0));
        let recorded = Outcome::AlreadyDone {
            student_id: "A1".to_string(),
            display_name: "Ana".to_string(),
            avatar: None,
        };
        let t1 = t0 + Duration::from_millis(100);
        slot.show(Feedback::for_outcome(Mode::Homework, &recorded, &windows, t1));
        let current = slot.current(t1).expect("current");
        assert_eq!(current.kind, FeedbackKind::Duplicate);
        assert_eq!(current.remaining(t1), Duration::from_millis(2500));
    }

    #[test]
    fn success_banner_shows_student_avatar() {
        let t0 = Instant::now();
        let recorded = Outcome::Recorded {
            student_id: "A1".to_string(),
            display_name: "Ana".to_string(),
            avatar: Some("avatars/ana.png".to_string()),
            mutation: crate::checkin::Mutation::Attendance {
                student_id: "A1".to_string(),
                date: "2024-01-10".to_string(),
                status: crate::checkin::AttendanceStatus::Present,
            },
        };
        let banner = Feedback::for_outcome(
            Mode::Attendance,
            &recorded,
            &FeedbackWindows::default(),
            t0,
        );
        assert_eq!(banner.kind, FeedbackKind::Success);
        assert_eq!(
            banner.to_json(t0).get("avatar").and_then(|v| v.as_str()),
            Some("avatars/ana.png")
        );
    }
}
