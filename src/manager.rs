// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Health manager: sink registration status and per-class sessions.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::events::{EventSink, StatusKind, StatusResult};
use crate::hdp::{DeviceClass, DeviceSession, Measurement, SessionConfig};

/// Outcome of a sink application (un)registration reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppConfigStatus {
    RegistrationSuccess,
    RegistrationFailure,
    UnregistrationSuccess,
    UnregistrationFailure,
}

/// Owns one session per connected device class.
pub struct HealthManager {
    config: SessionConfig,
    events: EventSink,
    registered: RwLock<HashSet<DeviceClass>>,
    sessions: Mutex<HashMap<DeviceClass, JoinHandle<()>>>,
}

impl HealthManager {
    pub fn new(config: SessionConfig, events: EventSink) -> Self {
        Self {
            config,
            events,
            registered: RwLock::new(HashSet::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Platform callback: sink application registration changed.
    pub fn on_application_status(&self, class: DeviceClass, status: AppConfigStatus) {
        let (kind, result) = match status {
            AppConfigStatus::RegistrationSuccess => {
                self.registered.write().insert(class);
                (StatusKind::Registered, StatusResult::Ok)
            }
            AppConfigStatus::RegistrationFailure => (StatusKind::Registered, StatusResult::Fail),
            AppConfigStatus::UnregistrationSuccess => {
                self.registered.write().remove(&class);
                (StatusKind::Unregistered, StatusResult::Ok)
            }
            AppConfigStatus::UnregistrationFailure => {
                self.registered.write().remove(&class);
                (StatusKind::Unregistered, StatusResult::Fail)
            }
        };
        info!("{}: application {:?}", class, status);
        self.events.status(class, kind, result);
    }

    pub fn is_registered(&self, class: DeviceClass) -> bool {
        self.registered.read().contains(&class)
    }

    /// Platform callback: a channel to an agent is connected.
    ///
    /// Announces "no reading" for every kind the class reports, then starts
    /// the session. A session still running for the class is replaced.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_channel_connected<C>(&self, class: DeviceClass, channel: C)
    where
        C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        info!("{}: channel connected", class);
        self.events
            .status(class, StatusKind::ChannelOpened, StatusResult::Ok);
        for &kind in class.measurement_kinds() {
            self.events.measurement(Measurement::no_reading(class, kind));
        }

        let session = DeviceSession::new(class, channel, &self.config, self.events.clone());
        let handle = tokio::spawn(async move {
            if let Err(e) = session.run().await {
                error!("{}: session ended with error: {}", class, e);
            }
        });

        if let Some(previous) = self.sessions.lock().insert(class, handle) {
            if !previous.is_finished() {
                warn!("{}: replacing session that is still running", class);
                previous.abort();
            }
        }
    }

    /// Platform callback: channel setup failed.
    pub fn on_channel_failed(&self, class: DeviceClass) {
        warn!("{}: channel setup failed", class);
        self.events
            .status(class, StatusKind::ChannelOpened, StatusResult::Fail);
    }

    /// Platform callback: the channel went away.
    ///
    /// The session notices on its own when the stream ends, so a session
    /// still reading stays registered until then and a reconnect can still
    /// replace it.
    pub fn on_channel_disconnected(&self, class: DeviceClass) {
        info!("{}: channel disconnected", class);
        {
            let mut sessions = self.sessions.lock();
            if sessions.get(&class).is_some_and(|h| h.is_finished()) {
                sessions.remove(&class);
            }
        }
        self.events
            .status(class, StatusKind::ChannelClosed, StatusResult::Ok);
    }

    /// Classes whose session is still running.
    pub fn active_sessions(&self) -> Vec<DeviceClass> {
        let sessions = self.sessions.lock();
        DeviceClass::ALL
            .into_iter()
            .filter(|class| sessions.get(class).is_some_and(|h| !h.is_finished()))
            .collect()
    }

    /// Abort every session.
    pub fn shutdown(&self) {
        for (class, handle) in self.sessions.lock().drain() {
            info!("{}: stopping session", class);
            handle.abort();
        }
    }
}

impl Drop for HealthManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
