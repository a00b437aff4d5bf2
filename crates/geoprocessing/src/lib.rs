pub mod client;
pub mod error;
pub mod orchestrator;
pub mod presenter;
pub mod protocol;
pub mod scripted;

pub use client::*;
pub use error::*;
pub use orchestrator::*;
pub use presenter::{DisplayText, FeatureInfo, describe_viewshed, render, render_errors};
pub use protocol::*;
pub use scripted::*;
