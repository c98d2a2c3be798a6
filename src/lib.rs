//! Pageveil: real-time media filtering for live pages.
//!
//! Watches a mutating document for video and image elements, captures
//! bounded JPEG samples at an adaptive rate, submits them to an external
//! classification service, and obscures flagged regions with overlay
//! artifacts until they expire or their element leaves the document.
//!
//! # Architecture
//!
//! The pipeline is an explicit data flow driven by one engine task:
//!
//! ```text
//! discovery → capture → queue → classify → overlay
//!                ↑                   ↓
//!                └───── control ←────┘
//! ```
//!
//! The document side is abstracted behind [`surface::PageSurface`]; the
//! engine multiplexes scanning, capture, classification flights, and
//! host control messages over a single `select!` loop.
//!
//! # Design Principles
//!
//! - **Single ownership**: one engine task owns all pipeline state, so
//!   nothing needs a lock
//! - **Bounded everywhere**: queue capacity, concurrent submissions,
//!   sample dimensions, and retry budgets are hard limits
//! - **Fail-soft**: a degraded service slows sampling down rather than
//!   stopping filtering
//! - **Surface-agnostic**: tests and demos script an in-memory page
//!   through the same trait a real document bridge implements
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pageveil::classify::ScriptedClassifier;
//! use pageveil::engine::{EngineConfig, FilterEngine};
//! use pageveil::profile::SiteProfileTable;
//! use pageveil::settings::UserSettings;
//! use pageveil::surface::{MockPage, RectPx};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     // A scripted page with one image, against a classifier stub that
//!     // flags every third sample.
//!     let page = MockPage::new("example.com");
//!     page.add_image(RectPx::new(100.0, 100.0, 320.0, 240.0), "https://cdn/photo.jpg");
//!     let classifier = Arc::new(ScriptedClassifier::flag_every(3, 0.9));
//!
//!     let (engine, handle) = FilterEngine::new(
//!         page.clone(),
//!         classifier,
//!         &SiteProfileTable::builtin(),
//!         UserSettings::default(),
//!         EngineConfig::default(),
//!     );
//!
//!     tokio::join!(engine.run(), async {
//!         tokio::time::sleep(Duration::from_secs(5)).await;
//!         let stats = handle.stats().await.unwrap();
//!         println!(
//!             "captured {} samples, {} flagged",
//!             stats.samples_captured, stats.verdicts_flagged
//!         );
//!         handle.shutdown();
//!     });
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod classify;
pub mod control;
pub mod discovery;
pub mod engine;
pub mod metrics;
pub mod overlay;
pub mod profile;
pub mod queue;
pub mod settings;
pub mod surface;

// Re-export commonly used types at crate root
pub use classify::{Classifier, HttpClassifier, ScriptedClassifier, Verdict};
pub use engine::{EngineConfig, EngineHandle, FileConfig, FilterEngine, StatsSnapshot};
pub use profile::{SiteProfile, SiteProfileTable};
pub use settings::UserSettings;
pub use surface::{MockPage, PageSurface};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
