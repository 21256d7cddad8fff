//! Visualization: static SVG charts for pipeline reports

pub mod charts;

pub use charts::{bar_chart_svg, correlation_heatmap_svg};
