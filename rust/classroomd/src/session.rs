//! Scan session: the window between opening and closing the scanner view.
//!
//! Holding a `ScanSession` is holding the sensor subscription. Dropping it
//! (close, workspace switch, or a new `checkin.open`) releases it and
//! discards any pending banner.

use crate::checkin::{reconcile, CheckinContext, CheckinError, Mode, Outcome, Roster};
use crate::cue::{play_best_effort, CuePlayer};
use crate::feedback::{Feedback, FeedbackSlot, FeedbackWindows};
use log::{debug, info};
use serde_json::json;
use std::time::Instant;

pub struct ScanSession {
    pub class_id: String,
    pub mode: Mode,
    pub context: CheckinContext,
    windows: FeedbackWindows,
    cue: Option<Box<dyn CuePlayer>>,
    feedback: FeedbackSlot,
    scans: u64,
}

impl ScanSession {
    pub fn open(
        class_id: String,
        mode: Mode,
        context: CheckinContext,
        windows: FeedbackWindows,
        cue: Option<Box<dyn CuePlayer>>,
    ) -> Result<Self, CheckinError> {
        if mode == Mode::Homework
            && context
                .selected_assignment_id
                .as_deref()
                .map_or(true, str::is_empty)
        {
            return Err(CheckinError::NoTargetSelected);
        }
        info!(
            "event=checkin_open module=session status=ok mode={} date={} assignment={}",
            mode.as_str(),
            context.selected_date,
            context.selected_assignment_id.as_deref().unwrap_or("-")
        );
        Ok(Self {
            class_id,
            mode,
            context,
            windows,
            cue,
            feedback: FeedbackSlot::default(),
            scans: 0,
        })
    }

    /// Handles one decode event. Any pending banner is replaced.
    pub fn scan(
        &mut self,
        identifier: &str,
        roster: &Roster,
        now: Instant,
    ) -> Result<Outcome, CheckinError> {
        self.feedback.clear();
        let outcome = reconcile(identifier, &self.context, roster, self.mode)?;
        self.scans += 1;
        self.feedback.show(Feedback::for_outcome(
            self.mode,
            &outcome,
            &self.windows,
            now,
        ));
        if let (Outcome::Recorded { .. }, Some(cue)) = (&outcome, self.cue.as_deref()) {
            play_best_effort(cue);
        }
        debug!(
            "event=checkin_scan module=session status=ok mode={} outcome={}",
            self.mode.as_str(),
            outcome.kind()
        );
        Ok(outcome)
    }

    pub fn feedback(&mut self, now: Instant) -> Option<&Feedback> {
        self.feedback.current(now)
    }

    pub fn scans(&self) -> u64 {
        self.scans
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "classId": self.class_id,
            "mode": self.mode.as_str(),
            "date": self.context.selected_date,
            "assignmentId": self.context.selected_assignment_id,
            "scans": self.scans,
        })
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        let discarded = self.feedback.clear();
        info!(
            "event=checkin_close module=session status=ok mode={} scans={} discarded_feedback={}",
            self.mode.as_str(),
            self.scans,
            discarded
        );
    }
}
