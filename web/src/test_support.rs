use crate::router::define_routes;
use axum::Router;
use change_feed::WatcherMonitor;
use clap::Parser;
use events::EventPublisher;
use hub::notifier::DownstreamNotifier;
use hub::{Hub, HubEventHandler};
use service::config::Config;
use service::AppState;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) calls: Mutex<Vec<String>>,
}

impl DownstreamNotifier for RecordingNotifier {
    fn notify(&self, model_type: &str) {
        self.calls.lock().unwrap().push(model_type.to_string());
    }
}

pub(crate) struct TestApp {
    pub(crate) router: Router,
    pub(crate) hub: Arc<Hub>,
    pub(crate) notifier: Arc<RecordingNotifier>,
}

pub(crate) fn test_app(watchers: Vec<WatcherMonitor>) -> TestApp {
    let config = Config::try_parse_from(["model_notify"]).unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let hub = Arc::new(Hub::new(Duration::from_secs(25), notifier.clone()));
    let publisher = Arc::new(
        EventPublisher::new().with_handler(Arc::new(HubEventHandler::new(hub.clone()))),
    );
    let app_state = AppState::new(config, &hub, &publisher, watchers);

    TestApp {
        router: define_routes(app_state),
        hub,
        notifier,
    }
}
