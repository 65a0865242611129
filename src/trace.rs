use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes the global tracing subscriber, printing events at `level` and above.
pub fn init_tracing_subscriber(level: LevelFilter) {
	tracing_subscriber::registry()
		.with(level)
		.with(
			tracing_subscriber::fmt::layer()
				.with_ansi(cfg!(debug_assertions))
				.with_target(true),
		)
		.init();

	tracing::debug!(%level, "tracing initialized");
}
