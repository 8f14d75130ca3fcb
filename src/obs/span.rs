// self
use crate::{_prelude::*, obs::Stage};

#[cfg(feature = "tracing")]
/// Future returned by [`StageSpan::instrument`].
pub type InstrumentedStage<F> = tracing::instrument::Instrumented<F>;
#[cfg(not(feature = "tracing"))]
/// Future returned by [`StageSpan::instrument`]; the input future itself without `tracing`.
pub type InstrumentedStage<F> = F;

/// `session_relay.stage` span for one pipeline stage, labeled with the call site.
///
/// Zero-sized when the `tracing` feature is off.
#[derive(Clone, Debug)]
pub struct StageSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl StageSpan {
	/// Opens a span for `stage` at `site`.
	pub fn new(stage: Stage, site: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		return Self {
			span: tracing::info_span!("session_relay.stage", stage = stage.as_str(), site),
		};

		#[cfg(not(feature = "tracing"))]
		{
			let _ = (stage, site);

			Self {}
		}
	}

	/// Attaches the span to `fut`.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedStage<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		return tracing::Instrument::instrument(fut, self.span.clone());

		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}

	/// Records `message` at debug level. Never pass token material.
	pub fn note(&self, message: &str) {
		#[cfg(feature = "tracing")]
		self.span.in_scope(|| tracing::debug!("{message}"));

		#[cfg(not(feature = "tracing"))]
		let _ = message;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn spans_pass_values_through_and_accept_notes() {
		let span = StageSpan::new(Stage::Replay, "spans_pass_values_through");

		span.note("replaying");

		assert_eq!(span.instrument(async { "ok" }).await, "ok");
	}
}
