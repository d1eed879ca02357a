use std::sync::Arc;
use std::time::SystemTime;

use lasit_translator::{ErrorInfo, RequestEvent};
use tokio::sync::RwLock;

/// Request status as observed from client events
#[derive(Clone, Debug, Default)]
pub struct RequestStatus {
    pub in_flight: bool,
    pub last_event_time: Option<SystemTime>,
    pub completed: u64,
    pub error_count: u64,
    pub rate_limited: bool,
    pub overloaded: bool,
    pub last_error: Option<ErrorInfo>,
    pub current_message: String,
}

impl RequestStatus {
    pub fn apply(&mut self, event: &RequestEvent) {
        self.last_event_time = Some(SystemTime::now());

        match event {
            RequestEvent::Start { attempt, .. } => {
                self.in_flight = true;
                self.current_message = if *attempt > 1 {
                    format!("Retrying (attempt {attempt})")
                } else {
                    "Sending".to_string()
                };
            }
            RequestEvent::Success { .. } => {
                self.in_flight = false;
                self.completed += 1;
                self.rate_limited = false;
                self.overloaded = false;
                self.current_message = "Done".to_string();
            }
            RequestEvent::Error { info, will_retry, .. } => {
                self.error_count += 1;
                self.last_error = Some(info.clone());
                self.current_message = if *will_retry {
                    format!("{} Retrying.", info.user_message)
                } else {
                    info.user_message.clone()
                };
            }
            RequestEvent::RateLimited { .. } => self.rate_limited = true,
            RequestEvent::Overloaded { .. } => self.overloaded = true,
            RequestEvent::Failed { info, .. } => {
                self.in_flight = false;
                self.current_message = format!("{} {}", info.user_message, info.recommendation);
            }
        }
    }
}

/// Application status
pub struct AppStatus {
    pub requests: Arc<RwLock<RequestStatus>>,
}

impl AppStatus {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(RwLock::new(RequestStatus::default())),
        }
    }
}

impl Default for AppStatus {
    fn default() -> Self {
        Self::new()
    }
}
