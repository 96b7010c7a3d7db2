//! Logger initialisation: `env_logger` filtered by the configured level, emitting either plain
//! text or one JSON object per line.
use std::io::Write;

use chrono::Utc;

use crate::config::{LogConfig, LogFormat};

pub fn init_logging(config: &LogConfig) {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&config.level);
    if config.format == LogFormat::Json {
        builder.format(|buf, record| {
            let line = serde_json::json!({
                "timestamp": Utc::now().to_rfc3339(),
                "level": record.level().to_string(),
                "target": record.target(),
                "message": record.args().to_string(),
            });
            writeln!(buf, "{line}")
        });
    }
    // Tests may have initialised a logger already; that is fine.
    let _ = builder.try_init();
}
