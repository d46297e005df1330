//! Security-focused logging module to track authentication and access events

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

/// Types of security events to track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityEvent {
    // Authentication events
    SignInStarted { provider: String },
    SignInFailed { provider: String, reason: String },
    SignedIn { user_id: String },
    SignedOut { user_id: Option<String> },
    /// Local sign-out succeeded but the backend could not be told
    SignOutDegraded { user_id: Option<String>, reason: String },

    // Authorization events
    AccessRedirected { user_id: Option<String>, path: String, target: String },

    // System security
    ConfigurationWarning { component: String, warning: String },
}

impl SecurityEvent {
    /// Event key for tracking
    pub fn key(&self) -> &'static str {
        match self {
            SecurityEvent::SignInStarted { .. } => "sign_in_started",
            SecurityEvent::SignInFailed { .. } => "sign_in_failed",
            SecurityEvent::SignedIn { .. } => "signed_in",
            SecurityEvent::SignedOut { .. } => "signed_out",
            SecurityEvent::SignOutDegraded { .. } => "sign_out_degraded",
            SecurityEvent::AccessRedirected { .. } => "access_redirected",
            SecurityEvent::ConfigurationWarning { .. } => "config_warning",
        }
    }

    /// Log this event through the global logger, or plain `log` if none is installed
    pub fn log(self) {
        match get_security_logger() {
            Some(logger) => logger.log_event(self),
            None => emit(&self),
        }
    }
}

fn emit(event: &SecurityEvent) {
    match event {
        SecurityEvent::SignInStarted { provider } => {
            log::info!("SECURITY: Sign-in started - Provider: {}", provider);
        }
        SecurityEvent::SignInFailed { provider, reason } => {
            log::warn!("SECURITY: Sign-in failed - Provider: {}, Reason: {}", provider, reason);
        }
        SecurityEvent::SignedIn { user_id } => {
            log::info!("SECURITY: Signed in - User: {}", user_id);
        }
        SecurityEvent::SignedOut { user_id } => {
            log::info!("SECURITY: Signed out - User: {:?}", user_id);
        }
        SecurityEvent::SignOutDegraded { user_id, reason } => {
            log::warn!(
                "SECURITY: Signed out locally, backend not invalidated - User: {:?}, Reason: {}",
                user_id,
                reason
            );
        }
        SecurityEvent::AccessRedirected { user_id, path, target } => {
            log::debug!(
                "SECURITY: Access redirected - User: {:?}, Path: {}, Target: {}",
                user_id,
                path,
                target
            );
        }
        SecurityEvent::ConfigurationWarning { component, warning } => {
            log::warn!("SECURITY: Configuration warning - Component: {}, Warning: {}", component, warning);
        }
    }
}

/// Security event with timestamp
#[derive(Debug, Clone)]
struct TimestampedEvent {
    event: SecurityEvent,
    timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct LoggerState {
    events: Vec<TimestampedEvent>,
    event_counts: HashMap<&'static str, usize>,
}

/// Security logger for tracking and alerting on security events.
///
/// Recording never suspends, so the route guard can report from its
/// synchronous decision path.
pub struct SecurityLogger {
    state: Mutex<LoggerState>,
    max_events: usize,
    alert_thresholds: HashMap<&'static str, usize>,
}

impl Default for SecurityLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityLogger {
    /// Create a new security logger
    pub fn new() -> Self {
        let mut alert_thresholds = HashMap::new();
        alert_thresholds.insert("sign_in_failed", 5);
        alert_thresholds.insert("sign_out_degraded", 3);

        Self {
            state: Mutex::new(LoggerState::default()),
            max_events: 10_000,
            alert_thresholds,
        }
    }

    /// Log a security event
    pub fn log_event(&self, event: SecurityEvent) {
        let key = event.key();
        emit(&event);

        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        state.events.push(TimestampedEvent {
            event: event.clone(),
            timestamp: Utc::now(),
        });
        // Limit memory usage
        if state.events.len() > self.max_events {
            let excess = state.events.len() - self.max_events;
            state.events.drain(0..excess);
        }

        let count = state.event_counts.entry(key).or_insert(0);
        *count += 1;
        if let Some(&threshold) = self.alert_thresholds.get(key) {
            if *count >= threshold {
                log::error!("SECURITY ALERT: {} events of type '{}' detected", count, key);
                log::error!("Sample event: {:?}", event);
                *count = 0;
            }
        }
    }

    /// Get security events recorded within `duration`
    pub fn get_recent_events(&self, duration: Duration) -> Vec<SecurityEvent> {
        let cutoff = cutoff(duration);
        match self.state.lock() {
            Ok(state) => state
                .events
                .iter()
                .filter(|e| e.timestamp > cutoff)
                .map(|e| e.event.clone())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Get event statistics (counts since the last alert for each kind)
    pub fn get_event_stats(&self) -> HashMap<String, usize> {
        match self.state.lock() {
            Ok(state) => state
                .event_counts
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            Err(_) => HashMap::new(),
        }
    }

    /// Clean up old events
    pub fn cleanup_old_events(&self, max_age: Duration) {
        let cutoff = cutoff(max_age);
        if let Ok(mut state) = self.state.lock() {
            state.events.retain(|e| e.timestamp > cutoff);
        }
    }

    /// Start periodic cleanup task
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300)); // Every 5 minutes
            loop {
                interval.tick().await;
                self.cleanup_old_events(Duration::from_secs(3600 * 24)); // Keep 24 hours
            }
        });
    }
}

fn cutoff(age: Duration) -> DateTime<Utc> {
    let age = chrono::Duration::from_std(age).unwrap_or(chrono::Duration::MAX);
    Utc::now()
        .checked_sub_signed(age)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Global security logger instance - thread-safe singleton
static SECURITY_LOGGER: OnceLock<Arc<SecurityLogger>> = OnceLock::new();

/// Initialize the global security logger; must run inside a tokio runtime
pub fn init_security_logger() {
    SECURITY_LOGGER.get_or_init(|| {
        let logger = Arc::new(SecurityLogger::new());
        logger.clone().start_cleanup_task();
        logger
    });
}

/// Get the global security logger
pub fn get_security_logger() -> Option<Arc<SecurityLogger>> {
    SECURITY_LOGGER.get().cloned()
}
