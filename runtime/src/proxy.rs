use crate::plugin::Plugin;
use futures::FutureExt;
use parking_lot::Mutex;
use snap_plugin_error::{PluginError, Result};
use snap_plugin_proto::rpc;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

/// Why a session stopped serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// The host asked the plugin to stop.
    Killed(String),
    /// No ping arrived within the ping timeout.
    PingTimeout(Duration),
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::Killed(reason) => write!(f, "killed: {}", reason),
            HaltReason::PingTimeout(silent) => {
                write!(f, "no ping for {}", humantime::format_duration(*silent))
            }
        }
    }
}

/// Liveness state shared by every service of one running plugin.
#[derive(Debug)]
pub struct SessionState {
    last_ping: Mutex<Instant>,
    ping_timeout: Duration,
    halt: CancellationToken,
    halt_reason: Mutex<Option<HaltReason>>,
}

impl SessionState {
    pub fn new(ping_timeout: Duration) -> Self {
        Self {
            last_ping: Mutex::new(Instant::now()),
            ping_timeout,
            halt: CancellationToken::new(),
            halt_reason: Mutex::new(None),
        }
    }

    pub fn ping_timeout(&self) -> Duration {
        self.ping_timeout
    }

    /// Record a ping from the host.
    pub fn touch(&self) {
        *self.last_ping.lock() = Instant::now();
    }

    pub fn since_last_ping(&self) -> Duration {
        self.last_ping.lock().elapsed()
    }

    /// Fire the halt signal. Only the first call has an effect; returns
    /// whether this call was it.
    pub fn halt(&self, reason: HaltReason) -> bool {
        {
            let mut slot = self.halt_reason.lock();
            if slot.is_some() {
                debug!("Halt already requested, ignoring {}", reason);
                return false;
            }
            info!("Halting plugin: {}", reason);
            *slot = Some(reason);
        }
        self.halt.cancel();
        true
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_cancelled()
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt_reason.lock().clone()
    }

    /// Resolves once the halt signal has fired.
    pub async fn halted(&self) {
        self.halt.cancelled().await
    }

    pub(crate) fn halt_token(&self) -> CancellationToken {
        self.halt.clone()
    }

    /// Start the heartbeat watcher on the current runtime.
    ///
    /// The watcher checks every half timeout (at least every millisecond)
    /// and halts the session the first time the host has been silent for
    /// longer than the timeout. A zero timeout disables it.
    pub fn spawn_heartbeat(self: &Arc<Self>) -> JoinHandle<()> {
        let state = Arc::clone(self);
        tokio::spawn(async move { state.heartbeat_watch().await })
    }

    async fn heartbeat_watch(&self) {
        let timeout = self.ping_timeout;
        if timeout.is_zero() {
            info!("Ping timeout disabled, heartbeat watcher not started");
            return;
        }

        self.touch();
        let tick = (timeout / 2).max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(
            "Heartbeat watcher started (timeout {}, tick {})",
            humantime::format_duration(timeout),
            humantime::format_duration(tick)
        );

        loop {
            tokio::select! {
                _ = self.halt.cancelled() => {
                    debug!("Heartbeat watcher stopped");
                    return;
                }
                _ = interval.tick() => {
                    let silent = self.since_last_ping();
                    if silent > timeout {
                        warn!(
                            "Heartbeat timeout expired: no ping for {}",
                            humantime::format_duration(silent)
                        );
                        self.halt(HaltReason::PingTimeout(silent));
                        return;
                    }
                }
            }
        }
    }
}

/// Run a plugin call, turning a panic into [`PluginError::Panicked`].
pub(crate) async fn guarded<T, F>(call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(PluginError::Panicked(message))
        }
    }
}

/// gRPC status for a failed collector-kind call.
pub(crate) fn hard_failure(err: PluginError) -> Status {
    match err {
        PluginError::Panicked(_) => Status::internal(err.to_string()),
        other => Status::unknown(other.to_string()),
    }
}

/// Calls every plugin service answers: ping, kill and the config policy.
pub struct PluginProxy<P: ?Sized> {
    plugin: Arc<P>,
    state: Arc<SessionState>,
}

impl<P: ?Sized> Clone for PluginProxy<P> {
    fn clone(&self) -> Self {
        Self {
            plugin: Arc::clone(&self.plugin),
            state: Arc::clone(&self.state),
        }
    }
}

impl<P: ?Sized + Plugin> PluginProxy<P> {
    pub fn new(plugin: Arc<P>, state: Arc<SessionState>) -> Self {
        Self { plugin, state }
    }

    pub fn plugin(&self) -> &Arc<P> {
        &self.plugin
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn ping(
        &self,
        _request: Request<rpc::Empty>,
    ) -> std::result::Result<Response<rpc::ErrReply>, Status> {
        self.state.touch();
        Ok(Response::new(rpc::ErrReply::default()))
    }

    /// Returns at once; the session stops on its own task.
    pub fn kill(
        &self,
        request: Request<rpc::KillArg>,
    ) -> std::result::Result<Response<rpc::ErrReply>, Status> {
        let reason = request.into_inner().reason;
        self.state.halt(HaltReason::Killed(reason));
        Ok(Response::new(rpc::ErrReply::default()))
    }

    /// Plugin errors travel in `GetConfigPolicyReply::error`.
    pub async fn get_config_policy(
        &self,
        _request: Request<rpc::Empty>,
    ) -> std::result::Result<Response<rpc::GetConfigPolicyReply>, Status> {
        let reply = match guarded(self.plugin.get_config_policy()).await {
            Ok(policy) => rpc::GetConfigPolicyReply::from(&policy),
            Err(e) => {
                warn!("GetConfigPolicy failed: {}", e);
                rpc::GetConfigPolicyReply {
                    error: e.to_string(),
                    ..Default::default()
                }
            }
        };
        Ok(Response::new(reply))
    }
}
