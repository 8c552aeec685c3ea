//! Provider configuration registry.
//!
//! # Data Flow
//! ```text
//! install(records):
//!     parser.parse(records)            (no lock held; may be slow)
//!     → lock write state
//!     → unregister layers that lost their default
//!     → register layers that gained one
//!     → swap the live snapshot (next generation)
//!     → unlock
//!
//! refresh():
//!     parse the installed records, then publish only if they are still
//!     the installed ones; otherwise start over with the newer records
//!
//! resolve / current_snapshot:
//!     lock-free load of the live snapshot
//! ```
//!
//! # Design Decisions
//! - One owned `Registry` per process, injected where needed; no ambient statics
//! - Readers never see a partially built snapshot: publication is a single pointer swap
//! - Installs are serialized by the write-state mutex; readers never take it
//! - A failed parse leaves both the live snapshot and the ledger untouched

pub mod authority;

use arc_swap::ArcSwap;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::config::parser::{ConfigParser, ParseError};
use crate::config::schema::MessageSecurityConfig;
use crate::model::ConfigSnapshot;
use crate::observability::metrics;

pub use authority::{InMemoryAuthority, Registration, RegistrationAuthority, RegistrationId};

/// State only touched under exclusive access.
#[derive(Default)]
struct WriteState {
    /// One key per layer with a default provider. The id is present when an
    /// authority holds the matching registration.
    ledger: HashMap<String, Option<RegistrationId>>,
    /// Records behind the live snapshot, kept for `refresh`.
    installed: Option<Arc<Vec<MessageSecurityConfig>>>,
}

/// Holds the live configuration snapshot.
pub struct Registry {
    provider_name: String,
    parser: Arc<dyn ConfigParser>,
    authority: Option<Arc<dyn RegistrationAuthority>>,
    current: ArcSwap<ConfigSnapshot>,
    write: Mutex<WriteState>,
    initialized: OnceLock<()>,
    init_lock: Mutex<()>,
}

impl Registry {
    /// Create an empty registry (generation 0, no layers).
    ///
    /// Without an authority the ledger still tracks every layer with a
    /// default provider; nothing is registered outside the process.
    pub fn new(parser: Arc<dyn ConfigParser>, provider_name: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            parser,
            authority: None,
            current: ArcSwap::from_pointee(ConfigSnapshot::empty()),
            write: Mutex::new(WriteState::default()),
            initialized: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Keep `authority` in sync with the layers that have a default provider.
    pub fn with_authority(mut self, authority: Arc<dyn RegistrationAuthority>) -> Self {
        self.authority = Some(authority);
        self
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// The live snapshot.
    pub fn current_snapshot(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    /// Parse `records` and make the result the live snapshot.
    pub fn install(
        &self,
        records: &[MessageSecurityConfig],
    ) -> Result<Arc<ConfigSnapshot>, ParseError> {
        let snapshot = self.install_records(Arc::new(records.to_vec()), None)?;
        Ok(snapshot.unwrap_or_else(|| self.current_snapshot()))
    }

    /// Install `records` unless a first install has already completed.
    ///
    /// Concurrent first callers block until the one performing the install
    /// finishes. If that install fails the registry stays uninitialized and
    /// the next caller tries again.
    pub fn initialize_once(&self, records: &[MessageSecurityConfig]) -> Result<(), ParseError> {
        if self.initialized.get().is_some() {
            return Ok(());
        }

        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.initialized.get().is_some() {
            return Ok(());
        }

        self.install(records)?;
        let _ = self.initialized.set(());
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get().is_some()
    }

    /// Re-parse the most recently installed records.
    ///
    /// Picks up property changes behind `${name}` placeholders. If another
    /// install lands while the records are being parsed, the newer records
    /// are parsed instead; a refresh never puts older records back.
    pub fn refresh(&self) -> Result<Arc<ConfigSnapshot>, ParseError> {
        loop {
            let records = self
                .lock_write()
                .installed
                .clone()
                .ok_or(ParseError::NothingInstalled)?;
            if let Some(snapshot) = self.install_records(Arc::clone(&records), Some(&records))? {
                return Ok(snapshot);
            }
            tracing::debug!(
                generation = self.generation(),
                "Configuration replaced during refresh; re-parsing"
            );
        }
    }

    /// Layers in the default-provider ledger, sorted.
    pub fn registered_layers(&self) -> Vec<String> {
        let mut layers: Vec<String> = self.lock_write().ledger.keys().cloned().collect();
        layers.sort();
        layers
    }

    /// Parse and publish `records`.
    ///
    /// With `expected` set, publication happens only if `expected` is still
    /// the installed record set once the write lock is held; otherwise
    /// nothing changes and `Ok(None)` is returned.
    fn install_records(
        &self,
        records: Arc<Vec<MessageSecurityConfig>>,
        expected: Option<&Arc<Vec<MessageSecurityConfig>>>,
    ) -> Result<Option<Arc<ConfigSnapshot>>, ParseError> {
        let parsed = match self.parser.parse(&records) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    generation = self.generation(),
                    "Failed to parse configuration. Keeping current snapshot."
                );
                metrics::record_reload("failed");
                return Err(e);
            }
        };

        let mut state = self.lock_write();
        if let Some(expected) = expected {
            let still_current = state
                .installed
                .as_ref()
                .is_some_and(|installed| Arc::ptr_eq(installed, expected));
            if !still_current {
                return Ok(None);
            }
        }
        self.reconcile(&mut state.ledger, &parsed.layers_with_default);

        let generation = next_generation(self.current.load().generation);
        let snapshot = Arc::new(ConfigSnapshot::from_parsed(parsed, generation));
        self.current.store(Arc::clone(&snapshot));
        state.installed = Some(records);
        let registered = state.ledger.len();
        drop(state);

        tracing::info!(
            generation,
            layers = snapshot.by_layer.len(),
            layers_with_default = ?snapshot.layers_with_default,
            registered,
            "Configuration installed"
        );
        metrics::record_reload("installed");
        metrics::record_generation(generation);
        Ok(Some(snapshot))
    }

    fn reconcile(
        &self,
        ledger: &mut HashMap<String, Option<RegistrationId>>,
        layers_with_default: &BTreeSet<String>,
    ) {
        let stale: Vec<String> = ledger
            .keys()
            .filter(|layer| !layers_with_default.contains(*layer))
            .cloned()
            .collect();
        for layer in stale {
            let registration = ledger.remove(&layer).flatten();
            if let (Some(authority), Some(id)) = (&self.authority, registration) {
                if !authority.unregister(&id) {
                    tracing::warn!(layer = %layer, registration_id = %id, "Authority did not know registration");
                }
            }
            tracing::debug!(layer = %layer, "Default provider withdrawn");
        }

        for layer in layers_with_default {
            if !ledger.contains_key(layer) {
                let id = self
                    .authority
                    .as_ref()
                    .map(|authority| authority.register_default(&self.provider_name, layer));
                ledger.insert(layer.clone(), id);
            }
        }
    }

    fn lock_write(&self) -> MutexGuard<'_, WriteState> {
        self.write.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("provider_name", &self.provider_name)
            .field("generation", &self.generation())
            .field("has_authority", &self.authority.is_some())
            .finish()
    }
}

/// Generation following `current`. Wraps to 1; 0 is reserved for the empty registry.
pub(crate) fn next_generation(current: u64) -> u64 {
    match current.wrapping_add(1) {
        0 => 1,
        next => next,
    }
}
