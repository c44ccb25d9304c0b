//! Logging utilities and structured logging support

use std::io::Write;

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging with millisecond timestamps and source locations
///
/// Lines look like `2019-01-05T10:22:31.042Z [scene_walker.rs:88] DEBUG message`.
/// Safe to call more than once; later calls are ignored.
pub fn init_with_timestamps() {
    let _ = env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let file = record
                .file()
                .and_then(|path| path.rsplit(['/', '\\']).next())
                .unwrap_or("");
            writeln!(
                buf,
                "{} [{}:{}] {} {}",
                buf.timestamp_millis(),
                file,
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_harmless() {
        init_with_timestamps();
        init_with_timestamps();
        info!("logger installed");
    }
}
