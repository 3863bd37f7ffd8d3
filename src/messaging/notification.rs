// Notifications - diagnostics surfaced to the control side
//
// Anything the user should see (boot fallbacks, refused instances, dropped
// commands) is pushed here in addition to the tracing log. Producers never
// wait: see `channels::notify`.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        })
    }
}

/// Subsystem that raised the notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    Interchange,
    Instance,
    Audio,
    Midi,
    Config,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub category: NotificationCategory,
    /// Instance the event belongs to, if any
    pub instance: Option<u32>,
    pub message: String,
    /// Millisecondes depuis l'époque Unix
    pub timestamp: u64,
}

impl Notification {
    pub fn new(level: NotificationLevel, category: NotificationCategory, message: String) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64);
        Self {
            level,
            category,
            instance: None,
            message,
            timestamp,
        }
    }

    pub fn info(category: NotificationCategory, message: String) -> Self {
        Self::new(NotificationLevel::Info, category, message)
    }

    pub fn warning(category: NotificationCategory, message: String) -> Self {
        Self::new(NotificationLevel::Warning, category, message)
    }

    pub fn error(category: NotificationCategory, message: String) -> Self {
        Self::new(NotificationLevel::Error, category, message)
    }

    pub fn for_instance(mut self, id: u32) -> Self {
        self.instance = Some(id);
        self
    }
}

/// `[warning] message`, or `[warning #3] message` for an instance
impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instance {
            Some(id) => write!(f, "[{} #{}] {}", self.level, id, self.message),
            None => write!(f, "[{}] {}", self.level, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_tag() {
        let notif = Notification::error(
            NotificationCategory::Instance,
            "Instance limit reached".to_string(),
        )
        .for_instance(3);

        assert_eq!(notif.category, NotificationCategory::Instance);
        assert_eq!(notif.instance, Some(3));
        assert!(notif.timestamp > 0);
        assert_eq!(notif.to_string(), "[error #3] Instance limit reached");
    }

    #[test]
    fn test_levels_order() {
        let info = Notification::info(NotificationCategory::Audio, "Using no audio".to_string());
        let warning = Notification::warning(NotificationCategory::Midi, "No port".to_string());

        assert!(info.level < warning.level);
        assert_eq!(info.to_string(), "[info] Using no audio");
    }
}
