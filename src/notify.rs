use crate::agg::PeriodStatus;
use serde::Serialize;
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// The opaque push collaborator. Implementations must be time-bounded per
/// send; a timed-out delivery is reported as an `Err`, never a stall.
pub trait PushNotifier {
    fn send(
        &self,
        target: &str,
        title: &str,
        body: &str,
        metadata: &serde_json::Value,
    ) -> anyhow::Result<()>;
}

/// Placeholder wiring before a workspace is selected.
pub struct NullNotifier;

impl PushNotifier for NullNotifier {
    fn send(&self, _: &str, _: &str, _: &str, _: &serde_json::Value) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Default collaborator: appends deliveries to `outbox.jsonl` inside the
/// workspace, where the host process picks them up for actual transport.
/// Push tokens are opaque but must be non-empty and whitespace-free;
/// anything else is unroutable and counts as a dispatch failure.
pub struct OutboxNotifier {
    path: PathBuf,
}

impl OutboxNotifier {
    pub fn new(workspace: &Path) -> Self {
        Self {
            path: workspace.join("outbox.jsonl"),
        }
    }
}

impl PushNotifier for OutboxNotifier {
    fn send(
        &self,
        target: &str,
        title: &str,
        body: &str,
        metadata: &serde_json::Value,
    ) -> anyhow::Result<()> {
        if target.is_empty() || target.chars().any(|c| c.is_whitespace()) {
            anyhow::bail!("unroutable push token");
        }
        let line = json!({
            "target": target,
            "title": title,
            "body": body,
            "metadata": metadata,
            "createdAt": chrono::Utc::now().to_rfc3339(),
        });
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(f, "{}", line)?;
        Ok(())
    }
}

/// What the dispatcher needs to know about a recipient.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub roll_number: String,
    pub push_token: Option<String>,
    pub notify_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Failed,
    Skipped,
}

impl Delivery {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl DispatchReport {
    pub fn tally(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Sent => self.sent += 1,
            Delivery::Failed => self.failed += 1,
            Delivery::Skipped => self.skipped += 1,
        }
    }
}

fn deliver(
    notifier: &dyn PushNotifier,
    recipient: &Recipient,
    title: &str,
    body: &str,
    metadata: serde_json::Value,
) -> Delivery {
    // Token-less or opted-out students are an expected, common path.
    let Some(token) = recipient.push_token.as_deref() else {
        return Delivery::Skipped;
    };
    if !recipient.notify_enabled {
        return Delivery::Skipped;
    }
    match notifier.send(token, title, body, &metadata) {
        Ok(()) => Delivery::Sent,
        Err(e) => {
            log::warn!(
                "push dispatch failed for {}: {}",
                recipient.roll_number,
                e
            );
            Delivery::Failed
        }
    }
}

/// Per-student confirmation after marking. Tiers: present at >=90% gets the
/// celebratory wording; absent below 75% escalates to a low-attendance alert.
pub fn notify_marked(
    notifier: &dyn PushNotifier,
    recipient: &Recipient,
    subject_id: &str,
    subject_name: &str,
    status: PeriodStatus,
    percentage: i64,
) -> Delivery {
    let (title, body, kind) = match status {
        PeriodStatus::Present if percentage >= 90 => (
            "Attendance Marked",
            format!(
                "Excellent! You were marked present in {}. Keep it up! ({}%)",
                subject_name, percentage
            ),
            "attendance_marked",
        ),
        PeriodStatus::Present => (
            "Attendance Marked",
            format!(
                "You were marked present in {}. Current: {}%",
                subject_name, percentage
            ),
            "attendance_marked",
        ),
        PeriodStatus::Absent if percentage < 75 => (
            "Low Attendance Alert",
            format!(
                "You were marked absent in {}. Your attendance dropped to {}%! Please attend next classes.",
                subject_name, percentage
            ),
            "low_attendance",
        ),
        PeriodStatus::Absent => (
            "Attendance Marked",
            format!(
                "You were marked absent in {}. Current: {}%",
                subject_name, percentage
            ),
            "attendance_marked",
        ),
    };
    let metadata = json!({
        "type": kind,
        "subjectId": subject_id,
        "subjectName": subject_name,
        "status": status.as_str(),
        "percentage": percentage.to_string(),
    });
    deliver(notifier, recipient, title, &body, metadata)
}

pub fn notify_low_attendance(
    notifier: &dyn PushNotifier,
    recipient: &Recipient,
    subject_id: &str,
    subject_name: &str,
    percentage: i64,
    classes_needed: i64,
    threshold: i64,
) -> Delivery {
    let body = format!(
        "Your {} attendance is {}%. You need to attend {} more classes to reach {}%.",
        subject_name, percentage, classes_needed, threshold
    );
    let metadata = json!({
        "type": "low_attendance",
        "subjectId": subject_id,
        "subjectName": subject_name,
        "percentage": percentage.to_string(),
        "threshold": threshold.to_string(),
        "classesNeeded": classes_needed.to_string(),
    });
    deliver(notifier, recipient, "Low Attendance Alert", &body, metadata)
}

pub fn notify_weekly_summary(
    notifier: &dyn PushNotifier,
    recipient: &Recipient,
    overall_percentage: i64,
) -> Delivery {
    let advice = if overall_percentage >= 90 {
        "Excellent attendance! Keep it up!"
    } else if overall_percentage < 75 {
        "Please attend classes regularly to improve your attendance."
    } else {
        "Keep up the good work!"
    };
    let body = format!(
        "Your overall attendance: {}%. {}",
        overall_percentage, advice
    );
    let metadata = json!({
        "type": "attendance_reminder",
        "percentage": overall_percentage.to_string(),
    });
    deliver(
        notifier,
        recipient,
        "Weekly Attendance Summary",
        &body,
        metadata,
    )
}

pub fn notify_daily_reminder(notifier: &dyn PushNotifier, recipient: &Recipient) -> Delivery {
    let metadata = json!({ "type": "attendance_reminder" });
    deliver(
        notifier,
        recipient,
        "Good Morning!",
        "Don't forget to attend your classes today. Every class counts!",
        metadata,
    )
}
