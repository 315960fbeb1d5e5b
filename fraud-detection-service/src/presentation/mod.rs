//! View models for everything the service displays. Each type serializes to
//! the JSON a client needs to draw the corresponding widget.

pub mod analysis;
pub mod charts;
pub mod genie;
pub mod verdict;

pub use analysis::{AnalysisReport, PerformanceMetrics, ToolOutputView, ToolPanel};
pub use charts::{Axis, ChartPanel, Orientation, Series};
pub use genie::{GenieStatus, GenieView, Notice, NoticeLevel};
pub use verdict::{VerdictBanner, VerdictTone};
