//! The verification pipeline.
//!
//! Each step gates the next; the first failure decides the outcome:
//!
//! ```text
//! parse → signature → freshness → origin screen → device binding → notify
//! ```

use crate::binding::{BindOutcome, BindingStore, DeviceBinding};
use crate::error::GateError;
use crate::notify::{Delivery, Notice, NotificationSink};
use crate::origin::{OriginScreen, OriginVerdict};
use chrono::Utc;
use init_data::{FreshnessGuard, SignatureVerifier, UnverifiedLaunchData};
use secrecy::{ExposeSecret, SecretString};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A successful verification.
#[derive(Debug, Clone)]
pub struct Verified {
    pub user_id: i64,
    /// The binding in force after this request
    pub binding: DeviceBinding,
    /// Whether this request created the binding
    pub newly_bound: bool,
    /// Outcome of the success notice
    pub notification: Delivery,
}

/// Verifies launch requests and enforces one device per user.
pub struct Gate {
    verifier: SignatureVerifier,
    freshness: FreshnessGuard,
    origin: Arc<dyn OriginScreen>,
    store: Arc<dyn BindingStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl Gate {
    /// Build a gate keyed by the bot token. Fails if the token is unset or blank.
    pub fn new(
        bot_token: Option<&SecretString>,
        origin: Arc<dyn OriginScreen>,
        store: Arc<dyn BindingStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self, GateError> {
        let token = bot_token
            .map(|t| t.expose_secret().trim())
            .filter(|t| !t.is_empty())
            .ok_or(GateError::BotTokenMissing)?;

        Ok(Self {
            verifier: SignatureVerifier::new(token.as_bytes()),
            freshness: FreshnessGuard::default(),
            origin,
            store,
            notifier,
        })
    }

    /// Run the full pipeline for one request.
    ///
    /// `client_ip` is the caller address as seen by the server; without one
    /// the origin cannot be screened and the request fails closed.
    #[instrument(skip(self, init_data), fields(user_id = tracing::field::Empty))]
    pub async fn verify(
        &self,
        init_data: &str,
        device_id: &str,
        client_ip: Option<IpAddr>,
    ) -> Result<Verified, GateError> {
        let unverified = UnverifiedLaunchData::parse(init_data, device_id)?;
        let launch = self.verifier.verify(unverified)?;
        let user_id = launch.user_id();
        tracing::Span::current().record("user_id", user_id);

        let age = self.freshness.check(&launch, Utc::now())?;
        debug!(age, "Launch data is fresh");

        let ip = client_ip.ok_or_else(|| {
            GateError::OriginCheckFailed("client address unavailable".into())
        })?;

        match self.origin.screen(ip).await {
            Ok(OriginVerdict::Clean) => {}
            Ok(OriginVerdict::Proxied) => {
                info!(%ip, "Blocked proxied origin");
                return Err(GateError::OriginBlocked { ip });
            }
            Err(e) => return Err(GateError::OriginCheckFailed(e.to_string())),
        }

        let candidate = DeviceBinding::new(launch.device_id(), ip);
        let (binding, newly_bound) = match self.store.bind_if_absent(user_id, candidate).await? {
            BindOutcome::Created(binding) => {
                info!(device_id = %binding.device_id, "Device bound");
                (binding, true)
            }
            BindOutcome::Existing(binding) if binding.device_id == launch.device_id() => {
                debug!("Known device");
                (binding, false)
            }
            BindOutcome::Existing(binding) => {
                warn!(
                    bound = %binding.device_id,
                    presented = %launch.device_id(),
                    "Device change blocked"
                );
                let alert = self.send(user_id, Notice::DeviceChanged).await;
                return Err(GateError::DeviceChanged { user_id, alert });
            }
        };

        let notification = self.send(user_id, Notice::Verified).await;

        Ok(Verified {
            user_id,
            binding,
            newly_bound,
            notification,
        })
    }

    async fn send(&self, user_id: i64, notice: Notice) -> Delivery {
        let delivery = self.notifier.notify(user_id, notice).await;
        if let Delivery::Failed(reason) = &delivery {
            warn!(user_id, ?notice, %reason, "Notification not delivered");
        }
        delivery
    }
}
