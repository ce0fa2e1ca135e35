use std::env;
use std::path::PathBuf;

include!(concat!(env!("OUT_DIR"), "/convo_env_allowlist.rs"));

fn fallback_dotenv_path(convo_home: Option<PathBuf>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(convo_home) = convo_home {
        return Some(convo_home.join(".env"));
    }
    Some(home_dir?.join(".convo-db/.env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("CONVO_HOME").map(PathBuf::from),
        dirs::home_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}

fn unknown_env_keys<I>(keys: I, allowlist: &[&str]) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut unknown = keys
        .into_iter()
        .filter(|key| key.starts_with("CONVO_") && !allowlist.contains(&key.as_str()))
        .collect::<Vec<_>>();
    unknown.sort();
    unknown
}

/// Flag `CONVO_*` variables nothing reads; usually a typo.
pub fn warn_unknown_env_keys() {
    let keys = env::vars_os().filter_map(|(k, _)| k.into_string().ok());
    for key in unknown_env_keys(keys, GENERATED_CONVO_ENV_ALLOWLIST) {
        tracing::warn!("ignoring unknown environment variable {key}");
    }
}
