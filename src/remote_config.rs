//! Remotely configurable feature flags with fetch/activate semantics.
//!
//! Flag values come from a flags document (the "remote" source). A fetch
//! inside the cache expiry window serves the already-fetched values; real
//! fetches are budgeted and report [`CkError::FetchThrottled`] once the
//! budget for the current window is spent. Fetched values take effect only
//! after [`RemoteConfig::activate`], so a failed or throttled fetch leaves
//! the previously activated values in place.

use std::{collections::HashMap, fs, path::PathBuf};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, trace, warn};

use crate::{CkError, Config, Result};

/// Flag gating the color picker and row tinting.
pub const COLOR_PICKER_ENABLED: &str = "color_picker_enabled";

/// Real fetches allowed per throttle window.
const MAX_FETCHES_PER_WINDOW: usize = 5;

/// Length of the fetch throttle window.
const THROTTLE_WINDOW_S: i64 = 3600;

/// The feature-flag service handle.
pub struct RemoteConfig {
    /// Document the fetch reads flag values from
    flags_source: PathBuf,

    /// Compiled-in defaults, consulted when no activated value exists
    defaults: HashMap<String, bool>,

    /// Values from the last successful fetch, not yet activated
    fetched: Option<HashMap<String, bool>>,

    /// Values currently in effect
    active: HashMap<String, bool>,

    /// Time of the last successful fetch, for cache expiry
    last_fetch: Option<DateTime<Utc>>,

    /// Times of real fetches inside the current throttle window
    fetch_times: Vec<DateTime<Utc>>,
}

impl RemoteConfig {
    pub fn new(config: &Config) -> Self {
        let mut defaults = HashMap::new();
        defaults.insert(COLOR_PICKER_ENABLED.to_string(), false);

        Self {
            flags_source: config.flags_source(),
            defaults,
            fetched: None,
            active: HashMap::new(),
            last_fetch: None,
            fetch_times: Vec::new(),
        }
    }

    /// Overrides a compiled-in default value.
    pub fn set_default(&mut self, name: &str, value: bool) {
        self.defaults.insert(name.to_string(), value);
    }

    /// Fetches flag values, honoring the cache expiry window.
    ///
    /// A fetch within `cache_ttl_s` of the last successful one serves the
    /// cached values and succeeds without touching the source. Real fetches
    /// beyond the per-window budget fail with `FetchThrottled` carrying the
    /// end of the throttle window.
    pub fn fetch(&mut self, cache_ttl_s: u64) -> Result<()> {
        let now = Utc::now();

        if let Some(last) = self.last_fetch {
            if cache_ttl_s > 0 && (now - last).num_seconds() < cache_ttl_s as i64 {
                debug!("Config fetch served from cache (ttl {}s)", cache_ttl_s);
                return Ok(());
            }
        }

        self.fetch_times
            .retain(|t| (now - *t).num_seconds() < THROTTLE_WINDOW_S);
        if self.fetch_times.len() >= MAX_FETCHES_PER_WINDOW {
            let throttle_end = self.fetch_times[0] + Duration::seconds(THROTTLE_WINDOW_S);
            warn!("Config fetch throttled until {}", throttle_end);
            return Err(CkError::FetchThrottled { throttle_end });
        }

        let values = if self.flags_source.exists() {
            let content = fs::read_to_string(&self.flags_source)?;
            serde_json::from_str::<HashMap<String, bool>>(&content)?
        } else {
            // No overrides published yet; an empty fetch is still a fetch
            debug!(
                "Flags source {} does not exist, fetched empty set",
                self.flags_source.display()
            );
            HashMap::new()
        };

        self.fetch_times.push(now);
        self.last_fetch = Some(now);
        info!("Fetched {} flag values", values.len());
        self.fetched = Some(values);
        Ok(())
    }

    /// Puts the last fetched values into effect.
    ///
    /// Returns true if a fetched set was activated, false when there was
    /// nothing new to activate.
    pub fn activate(&mut self) -> bool {
        match self.fetched.take() {
            Some(values) => {
                info!("Activated {} flag values", values.len());
                self.active = values;
                true
            }
            None => {
                debug!("No fetched config to activate");
                false
            }
        }
    }

    /// Reads a boolean flag: activated value, else default, else false.
    pub fn get_boolean(&self, name: &str) -> bool {
        let value = self
            .active
            .get(name)
            .or_else(|| self.defaults.get(name))
            .copied()
            .unwrap_or(false);
        trace!("Flag {} = {}", name, value);
        value
    }
}
