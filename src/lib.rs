//! PlotData: load tabular data, filter it with boolean expressions over
//! column names, and plot the selection.

pub mod app;
pub mod chart;
pub mod color;
pub mod config;
pub mod data;
pub mod state;
pub mod ui;
