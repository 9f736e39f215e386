// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::{Duration, Instant};

pub const NOTICE_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

/// Transient banners. One slot per kind; a newer notice of the same kind
/// replaces the older one and restarts its timer.
#[derive(Debug, Clone)]
pub struct Notices {
    duration: Duration,
    success: Option<(Notice, Instant)>,
    error: Option<(Notice, Instant)>,
}

impl Notices {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            success: None,
            error: None,
        }
    }

    pub fn push(&mut self, notice: Notice, now: Instant) {
        let deadline = now + self.duration;
        match notice.kind {
            NoticeKind::Success => self.success = Some((notice, deadline)),
            NoticeKind::Error => self.error = Some((notice, deadline)),
        }
    }

    pub fn expire(&mut self, now: Instant) {
        for slot in [&mut self.success, &mut self.error] {
            if matches!(slot, Some((_, deadline)) if *deadline <= now) {
                *slot = None;
            }
        }
    }

    pub fn current(&self, kind: NoticeKind) -> Option<&Notice> {
        let slot = match kind {
            NoticeKind::Success => &self.success,
            NoticeKind::Error => &self.error,
        };
        slot.as_ref().map(|(notice, _)| notice)
    }
}

impl Default for Notices {
    fn default() -> Self {
        Self::new(NOTICE_DURATION)
    }
}

#[cfg(test)]
mod tests {
    use super::{Notice, NoticeKind, Notices};
    use std::time::{Duration, Instant};

    #[test]
    fn notices_expire_after_duration() {
        let start = Instant::now();
        let mut notices = Notices::new(Duration::from_secs(3));
        notices.push(Notice::success("saved"), start);

        notices.expire(start + Duration::from_millis(2_999));
        assert!(notices.current(NoticeKind::Success).is_some());

        notices.expire(start + Duration::from_secs(3));
        assert!(notices.current(NoticeKind::Success).is_none());
    }

    #[test]
    fn kinds_have_independent_slots() {
        let start = Instant::now();
        let mut notices = Notices::default();
        notices.push(Notice::error("boom"), start);
        notices.push(Notice::success("ok"), start + Duration::from_secs(2));

        notices.expire(start + Duration::from_secs(3));
        assert!(notices.current(NoticeKind::Error).is_none());
        assert_eq!(
            notices.current(NoticeKind::Success).map(|n| n.message.as_str()),
            Some("ok")
        );
    }

    #[test]
    fn newer_notice_replaces_older_of_same_kind() {
        let start = Instant::now();
        let mut notices = Notices::default();
        notices.push(Notice::error("first"), start);
        notices.push(Notice::error("second"), start + Duration::from_secs(2));

        notices.expire(start + Duration::from_secs(4));
        assert_eq!(
            notices.current(NoticeKind::Error).map(|n| n.message.as_str()),
            Some("second")
        );
    }
}
