use std::{env, fs, ops::Deref, sync::Arc};

use crate::{
    cache::MemoryStore,
    error::Error,
    metrics::Metrics,
    model::PrewarmTarget,
    provider::{HttpTransport, LeadsApi},
};

#[derive(Debug)]
pub struct AppState<T>(Arc<T>);

impl<T> AppState<T> {
    pub fn new(state: T) -> AppState<T> {
        AppState(Arc::new(state))
    }
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> AppState<T> {
        AppState(Arc::clone(&self.0))
    }
}

impl<T> Deref for AppState<T> {
    type Target = Arc<T>;

    fn deref(&self) -> &Arc<T> {
        &self.0
    }
}

#[derive(Debug)]
pub struct State {
    pub config: Config,
    pub metrics: Metrics<MemoryStore, HttpTransport>,
}

impl State {
    pub fn new(config: Config) -> Result<State, Error> {
        let transport = HttpTransport::new(config.timeout)?;
        let api = LeadsApi::new(
            transport,
            &config.api_host,
            &config.api_token,
            &config.api_secret,
        );
        let metrics =
            Metrics::new(MemoryStore::new(), api, config.cache_minutes);
        Ok(State { config, metrics })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub api_host: String,
    pub api_token: String,
    pub api_secret: String,
    pub account_id: Option<String>,
    pub cache_minutes: Option<u64>,
    pub timeout: u64,
    pub prewarm_interval_secs: u64,
    pub prewarm_targets: Vec<PrewarmTarget>,
    pub auth: String,
}

pub fn get_configuration() -> Result<Config, Error> {
    let server_host = env::var("SERVER_HOST")?;
    let port: u16 = env::var("PORT")?.parse()?;
    let allowed_origins = env::var("ALLOWED_ORIGINS")?
        .split(',')
        .map(|item| item.to_owned())
        .collect::<Vec<String>>();

    let api_host = env::var("API_HOST")?;

    // Credentials may legitimately be unset: the fetcher reports
    // NotConfigured per call instead of refusing to start.
    let api_token = env::var("API_TOKEN").unwrap_or_default();
    let api_secret = env::var("API_SECRET").unwrap_or_default();

    let account_id = match env::var("ACCOUNT_ID") {
        Ok(id) if !id.is_empty() => Some(id),
        _ => None,
    };

    let cache_minutes = match env::var("CACHE_MINUTES") {
        Ok(value) => Some(value.parse()?),
        Err(_) => None,
    };

    let timeout = match env::var("TIMEOUT") {
        Ok(value) => value.parse()?,
        Err(_) => 30,
    };

    let prewarm_interval_secs = match env::var("PREWARM_INTERVAL_IN_SEC") {
        Ok(value) => value.parse()?,
        Err(_) => 3600,
    };

    let prewarm_targets = match env::var("PREWARM_TARGETS") {
        Ok(value) => parse_prewarm_targets(&value),
        Err(_) => Vec::new(),
    };

    let auth = env::var("AUTH")?;

    Ok(Config {
        server_host,
        port,
        allowed_origins,
        api_host,
        api_token,
        api_secret,
        account_id,
        cache_minutes,
        timeout,
        prewarm_interval_secs,
        prewarm_targets,
        auth,
    })
}

pub fn set_configuration() -> Result<(), Error> {
    let config_file: &str = ".env";

    let directory = env!("CARGO_MANIFEST_DIR");
    let path = format!("{}/{}", directory, config_file);

    if let Ok(config_string) = fs::read_to_string(path) {
        parse_config_string(config_string);
    }

    Ok(())
}

fn parse_config_string(config: String) {
    let params: Vec<Option<(&str, &str)>> = config
        .split('\n')
        .map(|s| {
            let element = s.find('=');
            if let Some(e) = element {
                return Some(s.split_at(e));
            }
            None
        })
        .map(|value| {
            if let Some((k, v)) = value {
                return Some((k, &v[1..]));
            }
            None
        })
        .collect();

    for (key, value) in params.into_iter().flatten() {
        std::env::set_var(key, value);
    }
}

/// Parse the prewarm target list, a tuple-list string like
/// `(all,12),(4821,3)`. Entries that do not split into an account and a
/// window are dropped; selector validity is checked later, per entry, by
/// the prewarm planner.
fn parse_prewarm_targets(data: &str) -> Vec<PrewarmTarget> {
    let mut targets = Vec::new();

    if data.len() < 2 {
        return targets;
    }

    for tuple in data[1..].split(",(") {
        let Some(index) = tuple.find(')') else {
            continue;
        };
        let items: Vec<&str> = tuple[..index].split(',').collect();
        if items.len() != 2 {
            continue;
        }

        let account = match items[0].trim() {
            "" | "all" => None,
            id => Some(id.to_owned()),
        };
        targets.push(PrewarmTarget {
            account,
            window: items[1].trim().to_owned(),
        });
    }

    targets
}
