#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{
    DigestOverrides, build_posters, default_settings_toml, digest_json, feed_source, load_settings,
    open_store, render_curate_summary, render_status, reset_ledger, resolve_data_dir,
};
