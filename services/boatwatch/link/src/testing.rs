//! Test doubles shared by the dispatcher tests.

use boatwatch_notify::Notifier;
use std::sync::Mutex;

/// Notifier that keeps every `(tag, body)` it is handed
#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub(crate) fn tags(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }

    pub(crate) fn bodies(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, b)| b.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn submit(&self, subject: &str, body: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
    }

    fn alert(&self, tag: &str, body: &str) {
        self.submit(tag, body);
    }
}
