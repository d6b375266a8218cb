use std::io::Write;

/// Initialise `env_logger` with source locations in each record.
/// Defaults to `info`; `RUST_LOG` overrides. Safe to call twice.
pub fn init_logging()
{   let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env)
      .format(|buf, record| {
        writeln!(
          buf,
          "{} {:<5} [{}:{}] {}",
          buf.timestamp_millis(),
          record.level(),
          record.file().unwrap_or_else(|| record.target()),
          record.line().unwrap_or(0),
          record.args()
        )
      })
      .try_init();
}
