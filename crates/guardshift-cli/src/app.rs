//! Wiring shared by the commands: config, credential gate, store and runtime.

use std::future::Future;
use std::sync::Arc;

use clap::Args;
use guardshift_core::lifecycle::Dispatch;
use guardshift_core::location::{LocationProvider, ManualLocation};
use guardshift_core::{
    Config, CredentialGate, HttpShiftGateway, LifecycleError, LifecycleStore, MemoryStore,
    RetryAffordance, SnapshotFile,
};

pub type Store = LifecycleStore<HttpShiftGateway, ManualLocation>;
pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Options every command accepts.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Keep the session in memory only; nothing touches the OS keyring
    #[arg(long, global = true)]
    pub ephemeral: bool,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

/// Device position supplied on the command line.
#[derive(Args, Debug, Clone, Default)]
pub struct LocationArgs {
    /// Latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<f64>,
    /// Longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: Option<f64>,
    /// Accuracy radius in meters
    #[arg(long, default_value_t = 25.0)]
    pub accuracy: f64,
    /// Street address of the fix
    #[arg(long)]
    pub address: Option<String>,
}

impl LocationArgs {
    pub fn source(&self) -> ManualLocation {
        ManualLocation::from_coordinates(self.lat, self.lon, self.accuracy, self.address.clone())
    }
}

pub struct App {
    pub config: Config,
    pub credentials: Arc<CredentialGate>,
    pub snapshot: SnapshotFile,
    pub opts: GlobalOpts,
}

impl App {
    pub fn load(opts: GlobalOpts) -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        let prefix = &config.credentials.key_prefix;
        let credentials = if opts.ephemeral {
            CredentialGate::new(Box::new(MemoryStore::new()), prefix)
        } else {
            CredentialGate::keyring(prefix)
        };
        Ok(Self {
            credentials: Arc::new(credentials),
            snapshot: SnapshotFile::default_location()?,
            config,
            opts,
        })
    }

    /// Build a store seeded from the saved snapshot.
    pub fn store(&self, location: ManualLocation) -> Result<Store, Box<dyn std::error::Error>> {
        let gateway = HttpShiftGateway::new(&self.config.api.base_url, self.credentials.clone())?
            .with_timeouts(self.config.api.timeout(), self.config.api.active_timeout());
        let provider = LocationProvider::new(location, self.config.location.policy());
        Ok(
            LifecycleStore::new(gateway, provider, self.credentials.clone())
                .with_past_limit(self.config.api.past_limit)
                .with_state(self.snapshot.load()),
        )
    }

    /// Persist the store's state and log its events.
    pub fn finish(&self, store: &Store) -> CliResult {
        for event in store.drain_events() {
            tracing::info!(?event, "lifecycle event");
        }
        self.snapshot.save(&store.snapshot())?;
        Ok(())
    }
}

/// Ask the backend for the active shift when the snapshot has none.
pub fn ensure_active(store: &Store) -> CliResult {
    if store.snapshot().active.is_none() {
        block_on(store.fetch_active())??;
    }
    Ok(())
}

pub fn block_on<F: Future>(future: F) -> Result<F::Output, Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

/// Turn an intent outcome into CLI output. Failures carry a retry hint.
pub fn report(outcome: Result<Dispatch, LifecycleError>, done: &str) -> CliResult {
    match outcome {
        Ok(Dispatch::Applied) => {
            println!("{done}");
            Ok(())
        }
        Ok(Dispatch::Skipped) => Err("not signed in; run `guardshift session login`".into()),
        Ok(Dispatch::Ignored) => {
            println!("already in progress");
            Ok(())
        }
        Err(e) => {
            if let Some(hint) = hint(e.retry_affordance()) {
                eprintln!("hint: {hint}");
            }
            Err(e.into())
        }
    }
}

fn hint(affordance: RetryAffordance) -> Option<&'static str> {
    match affordance {
        RetryAffordance::RetryLocation => Some("check --lat/--lon and try again"),
        RetryAffordance::RetrySubmit => Some("the location was fine; resubmit"),
        RetryAffordance::Relogin => Some("sign in again with `guardshift session login`"),
        RetryAffordance::CheckConnection => Some("check your connection and `api.base_url`"),
        RetryAffordance::OpenSettings => Some("location access is denied for this device"),
        RetryAffordance::None => None,
    }
}
